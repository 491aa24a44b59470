//! Threshold clustering of marker pins.
//!
//! Pins that would overlap are merged into one label such as `"3,4,5"`. The
//! same pass runs at two scales: against a fixed screen-pixel distance for the
//! live view, and against a distance proportional to the label size when the
//! map is rendered for export.
//!
//! The pass is greedy and single-shot. Markers are visited in ascending
//! sequence order; each one joins the first cluster whose running centroid is
//! within the threshold on both axes, which shifts that centroid. Visiting in
//! sequence order makes representative ids and labels deterministic regardless
//! of how markers are stored.

#[cfg(test)]
#[path = "cluster_test.rs"]
mod cluster_test;

use serde::Serialize;

use crate::consts::{EXPORT_CLUSTER_RATIO, EXPORT_MARKER_MIN_PX, EXPORT_MARKER_WIDTH_RATIO};
use crate::doc::{ImageSize, Marker, MarkerId, MarkerStore, PlanPosition};

/// One displayed pin: a single marker or a merged group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterDescriptor {
    /// Id of the member with the lowest sequence number.
    pub id: MarkerId,
    /// Member ids in ascending sequence order.
    pub member_ids: Vec<MarkerId>,
    /// Member sequence numbers, ascending.
    pub seqs: Vec<u32>,
    /// Mean of the member positions.
    pub position: PlanPosition,
    /// Sequence numbers joined with `,`.
    pub label: String,
    /// More than one member.
    pub is_cluster: bool,
}

/// What tapping a pin resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterPick<'a> {
    /// A lone pin opens its marker directly.
    Single(&'a Marker),
    /// A merged pin asks the user to choose, members sorted by sequence.
    Choose(Vec<&'a Marker>),
}

impl ClusterDescriptor {
    /// Resolve the member markers in ascending sequence order.
    ///
    /// Members no longer present in `store` are skipped.
    #[must_use]
    pub fn members<'a>(&self, store: &'a MarkerStore) -> Vec<&'a Marker> {
        let mut members: Vec<&Marker> = self.member_ids.iter().filter_map(|id| store.get(*id)).collect();
        members.sort_by_key(|m| (m.seq, m.id));
        members
    }

    /// Resolve a tap on this pin.
    #[must_use]
    pub fn pick<'a>(&self, store: &'a MarkerStore) -> Option<ClusterPick<'a>> {
        let mut members = self.members(store);
        match members.len() {
            0 => None,
            1 => members.pop().map(ClusterPick::Single),
            _ => Some(ClusterPick::Choose(members)),
        }
    }
}

struct Accumulator {
    ids: Vec<MarkerId>,
    seqs: Vec<u32>,
    sum_x: f64,
    sum_y: f64,
}

impl Accumulator {
    #[allow(clippy::cast_precision_loss)]
    fn centroid(&self) -> PlanPosition {
        let n = self.ids.len() as f64;
        PlanPosition::new(self.sum_x / n, self.sum_y / n)
    }
}

/// Per-axis percentage thresholds for a pixel distance on a plan of `size`.
#[must_use]
pub fn percent_thresholds(size: ImageSize, threshold_px: f64) -> (f64, f64) {
    (threshold_px / f64::from(size.width) * 100.0, threshold_px / f64::from(size.height) * 100.0)
}

/// Group `markers` for display on a plan of `size`.
///
/// Two positions match when they differ by strictly less than the threshold on
/// each axis independently; this is a box test, not a Euclidean one. Returns
/// an empty list when either side of `size` is zero.
pub fn cluster<'a, I>(markers: I, size: ImageSize, threshold_px: f64) -> Vec<ClusterDescriptor>
where
    I: IntoIterator<Item = &'a Marker>,
{
    if size.is_empty() {
        return Vec::new();
    }
    let (threshold_x, threshold_y) = percent_thresholds(size, threshold_px);

    let mut sorted: Vec<&Marker> = markers.into_iter().collect();
    sorted.sort_by_key(|m| (m.seq, m.id));

    let mut clusters: Vec<Accumulator> = Vec::new();
    for marker in sorted {
        let pos = marker.position;
        let existing = clusters.iter_mut().find(|c| {
            let center = c.centroid();
            (center.x - pos.x).abs() < threshold_x && (center.y - pos.y).abs() < threshold_y
        });
        if let Some(c) = existing {
            c.ids.push(marker.id);
            c.seqs.push(marker.seq);
            c.sum_x += pos.x;
            c.sum_y += pos.y;
        } else {
            clusters.push(Accumulator { ids: vec![marker.id], seqs: vec![marker.seq], sum_x: pos.x, sum_y: pos.y });
        }
    }

    clusters
        .into_iter()
        .map(|c| {
            let position = c.centroid();
            let label = c.seqs.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
            ClusterDescriptor {
                id: c.ids[0],
                is_cluster: c.ids.len() > 1,
                member_ids: c.ids,
                seqs: c.seqs,
                position,
                label,
            }
        })
        .collect()
}

/// Edge length of an export label box for an image `width` pixels wide.
#[must_use]
pub fn export_marker_size(width: u32) -> f64 {
    (f64::from(width) * EXPORT_MARKER_WIDTH_RATIO).max(EXPORT_MARKER_MIN_PX)
}

/// Merge distance used when rendering an export map `width` pixels wide.
#[must_use]
pub fn export_threshold(width: u32) -> f64 {
    export_marker_size(width) * EXPORT_CLUSTER_RATIO
}
