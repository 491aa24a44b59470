//! Report export: marker photos under convention file names plus one
//! labelled map per plan that carries markers.
//!
//! ```text
//! <project>/photos/001_7MF_Stair 2_1_0_2_0_0_0_3_0_0_1_30_20_倒吊面_1_0.jpg
//! <project>/maps/L1_marked.jpg
//! ```

#[cfg(test)]
#[path = "export_test.rs"]
mod export_test;

use std::collections::BTreeSet;

use tracing::{error, info};

use crate::archive::{Bundle, VirtualTree, file_stem, path_safe};
use crate::consts::EXPORT_JPEG_QUALITY;
use crate::decode::ImageDecoder;
use crate::doc::{Marker, MarkerStore, Project};
use crate::render;

/// Photo file name for a marker.
///
/// `{seq:03}_{floor}[M]F_{location}_{metal}_{pvc}_{length}_{width}_{surface}_{incomplete}_{no barrier}.jpg`
/// with pipe counts joined by `_` in size order and flags as `0`/`1`.
/// Path separators in the location are replaced with `-`.
#[must_use]
pub fn marker_file_name(marker: &Marker) -> String {
    let d = &marker.data;
    let location = path_safe(&d.location);
    format!(
        "{:03}_{}_{}_{}_{}_{}_{}_{}_{}_{}.jpg",
        marker.seq,
        d.floor_label(),
        location,
        d.metal.joined(),
        d.pvc.joined(),
        d.length,
        d.width,
        d.surface_type.label(),
        u8::from(d.is_incomplete),
        u8::from(d.no_fire_barrier),
    )
}

/// Report archive name: `<project>_Report.zip`.
#[must_use]
pub fn report_file_name(project_name: &str) -> String {
    format!("{}_Report.zip", file_stem(project_name))
}

/// Map file stem for a plan, unique within one report.
///
/// Path separators become `-`. A name already taken gets `_<plan number>`
/// appended, counting up until it is free.
fn map_stem(name: &str, plan_index: usize, taken: &mut BTreeSet<String>) -> String {
    let base = path_safe(name);
    let mut stem = base.clone();
    let mut n = plan_index + 1;
    while !taken.insert(stem.clone()) {
        stem = format!("{base}_{n}");
        n += 1;
    }
    stem
}

/// Indices of plans that carry at least one marker, in first-appearance order.
#[must_use]
pub fn plans_with_markers(markers: &MarkerStore) -> Vec<usize> {
    let mut seen = Vec::new();
    for m in markers.iter() {
        if !seen.contains(&m.plan_index) {
            seen.push(m.plan_index);
        }
    }
    seen
}

/// Finished report plus the plans that could not be rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub bundle: Bundle,
    /// Names of plans skipped because rendering failed.
    pub skipped_plans: Vec<String>,
}

/// Build the report tree.
///
/// A plan that fails to decode or encode is logged and left out; the rest of
/// the report is still produced.
pub fn build_report<D>(project: &Project, markers: &MarkerStore, decoder: &D) -> Report
where
    D: ImageDecoder + ?Sized,
{
    let folder = file_stem(&project.name);
    let mut tree = VirtualTree::new();
    let mut skipped_plans = Vec::new();
    let mut map_stems = BTreeSet::new();

    for marker in markers.iter() {
        tree.insert(format!("{folder}/photos/{}", marker_file_name(marker)), marker.photo.to_vec());
    }

    for plan_index in plans_with_markers(markers) {
        let Some(plan) = project.floor_plans.get(plan_index) else {
            error!(plan_index, "markers reference a missing plan; map skipped");
            continue;
        };
        let stem = map_stem(&plan.name, plan_index, &mut map_stems);
        match render::render_plan(decoder, &plan.image, markers.for_plan(plan_index), EXPORT_JPEG_QUALITY) {
            Ok(jpeg) => {
                tree.insert(format!("{folder}/maps/{stem}_marked.jpg"), jpeg);
            }
            Err(e) => {
                error!(error = %e, plan = %plan.name, "map render failed; skipped");
                skipped_plans.push(plan.name.clone());
            }
        }
    }

    info!(photos = markers.len(), files = tree.len(), skipped = skipped_plans.len(), "report built");
    Report { bundle: Bundle { file_name: report_file_name(&project.name), tree }, skipped_plans }
}
