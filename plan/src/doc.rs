//! Document model: floor plans, markers, their inspection payload, and the
//! in-memory marker store.
//!
//! Marker positions are stored as percentages of the owning plan's pixel size
//! (`PlanPosition`), so a plan image re-rendered at another resolution keeps
//! every marker where it was. Sequence numbers are allocated project-wide and
//! are never handed out twice; the store tracks a high-water mark so deleting
//! the newest marker does not free its number.
//!
//! Data flows into this layer from the persistent store and archive loader
//! (deserialization) and from the session (user edits). The clustering and
//! export layers only read from it.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::MAX_PIPE_COUNT;
use crate::transform::Point;

/// Unique identifier for a floor plan.
pub type PlanId = Uuid;

/// Unique identifier for a marker, derived from its creation time in milliseconds.
pub type MarkerId = i64;

/// Shared immutable binary asset (plan image or marker photo).
pub type Asset = Arc<[u8]>;

fn empty_asset() -> Asset {
    Arc::from(Vec::new())
}

/// Pixel dimensions of a decoded plan image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero; nothing can be positioned on such a plan.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether an image-pixel point lies on the plan, edges included.
    #[must_use]
    pub fn contains(self, p: Point) -> bool {
        p.x >= 0.0 && p.x <= f64::from(self.width) && p.y >= 0.0 && p.y <= f64::from(self.height)
    }
}

/// Marker position as percentages (0–100) of the owning plan's width and height.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanPosition {
    pub x: f64,
    pub y: f64,
}

impl PlanPosition {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Convert an image-pixel point on a plan of `size` to percentages.
    ///
    /// Returns `None` for an empty plan.
    #[must_use]
    pub fn from_image_point(p: Point, size: ImageSize) -> Option<Self> {
        if size.is_empty() {
            return None;
        }
        Some(Self {
            x: p.x / f64::from(size.width) * 100.0,
            y: p.y / f64::from(size.height) * 100.0,
        })
    }

    /// Pixel location of this position on a plan rendered at `size`.
    #[must_use]
    pub fn to_image_point(self, size: ImageSize) -> Point {
        Point::new(self.x / 100.0 * f64::from(size.width), self.y / 100.0 * f64::from(size.height))
    }
}

/// One imported floor plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorPlan {
    /// Stable identifier, also used as the asset key.
    pub id: PlanId,
    /// User-facing name, also used for the exported map filename.
    pub name: String,
    /// Raster image bytes (PNG or JPEG).
    #[serde(skip, default = "empty_asset")]
    pub image: Asset,
    /// Pixel size, filled in on first decode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ImageSize>,
}

impl FloorPlan {
    /// Create a plan with a fresh id and no cached size.
    #[must_use]
    pub fn new(name: impl Into<String>, image: Asset) -> Self {
        Self { id: Uuid::new_v4(), name: name.into(), image, size: None }
    }
}

/// The surface a fire-stop treatment is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SurfaceType {
    /// Treated from one side only.
    #[serde(rename = "單面")]
    Single,
    /// Treated from both sides.
    #[default]
    #[serde(rename = "雙面")]
    Double,
    /// Floor penetration, treated from above.
    #[serde(rename = "腳踩面")]
    Floor,
    /// Ceiling penetration, treated from below.
    #[serde(rename = "倒吊面")]
    Overhead,
}

impl SurfaceType {
    /// All categories in form order.
    pub const ALL: [Self; 4] = [Self::Single, Self::Double, Self::Floor, Self::Overhead];

    /// Label shown in the form and written into exported filenames.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Single => "單面",
            Self::Double => "雙面",
            Self::Floor => "腳踩面",
            Self::Overhead => "倒吊面",
        }
    }

    /// Inverse of [`label`](Self::label).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.label() == label)
    }
}

/// Nominal pipe sizes counted per penetration, in form order.
pub const PIPE_SIZES: [u32; 5] = [1, 2, 3, 4, 6];

/// Pipe counts for one material class, by nominal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipeCounts {
    #[serde(rename = "1")]
    pub size1: u32,
    #[serde(rename = "2")]
    pub size2: u32,
    #[serde(rename = "3")]
    pub size3: u32,
    #[serde(rename = "4")]
    pub size4: u32,
    #[serde(rename = "6")]
    pub size6: u32,
}

impl PipeCounts {
    /// Counts in `PIPE_SIZES` order.
    #[must_use]
    pub fn as_array(self) -> [u32; 5] {
        [self.size1, self.size2, self.size3, self.size4, self.size6]
    }

    /// Counts joined with `_`, as used in exported filenames.
    #[must_use]
    pub fn joined(self) -> String {
        self.as_array().map(|n| n.to_string()).join("_")
    }

    /// `(size, count)` pairs in form order.
    pub fn by_size(self) -> impl Iterator<Item = (u32, u32)> {
        PIPE_SIZES.into_iter().zip(self.as_array())
    }
}

/// A form value outside what the form offers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("unknown floor {0:?}")]
    UnknownFloor(String),
    #[error("{count} pipes of size {size} exceeds the limit of {limit}")]
    TooManyPipes { size: u32, count: u32, limit: u32 },
}

/// Inspection payload recorded for a marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerData {
    /// Floor label, e.g. `"B2"`, `"7"` or `"R1"`.
    pub floor: String,
    /// The penetration is on the mezzanine of `floor`.
    pub is_mezzanine: bool,
    /// Free-text location inside the floor.
    pub location: String,
    /// Metal pipe counts.
    pub metal: PipeCounts,
    /// PVC pipe counts.
    pub pvc: PipeCounts,
    /// Opening length.
    pub length: u32,
    /// Opening width.
    pub width: u32,
    /// Treated surface.
    pub surface_type: SurfaceType,
    /// Existing treatment is incomplete. Exclusive with `no_fire_barrier`.
    pub is_incomplete: bool,
    /// No fire barrier present. Exclusive with `is_incomplete`.
    pub no_fire_barrier: bool,
}

impl Default for MarkerData {
    fn default() -> Self {
        Self {
            floor: "1".into(),
            is_mezzanine: false,
            location: String::new(),
            metal: PipeCounts::default(),
            pvc: PipeCounts::default(),
            length: 0,
            width: 0,
            surface_type: SurfaceType::Double,
            is_incomplete: false,
            no_fire_barrier: false,
        }
    }
}

impl MarkerData {
    /// Fresh form contents for a new marker, keeping the floor and the last
    /// used location so consecutive entries in one room are quick.
    #[must_use]
    pub fn for_new_marker(&self, last_location: &str) -> Self {
        Self { floor: self.floor.clone(), is_mezzanine: self.is_mezzanine, location: last_location.into(), ..Self::default() }
    }

    /// Flip the incomplete flag; turning it on clears `no_fire_barrier`.
    pub fn toggle_incomplete(&mut self) {
        self.is_incomplete = !self.is_incomplete;
        if self.is_incomplete {
            self.no_fire_barrier = false;
        }
    }

    /// Flip the no-fire-barrier flag; turning it on clears `is_incomplete`.
    pub fn toggle_no_fire_barrier(&mut self) {
        self.no_fire_barrier = !self.no_fire_barrier;
        if self.no_fire_barrier {
            self.is_incomplete = false;
        }
    }

    /// Check the floor and pipe counts against the form's selectable values.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::UnknownFloor`] for a floor not in
    /// [`floor_options`], or [`FormError::TooManyPipes`] for a count above
    /// `MAX_PIPE_COUNT`.
    pub fn check(&self) -> Result<(), FormError> {
        if !floor_options().contains(&self.floor) {
            return Err(FormError::UnknownFloor(self.floor.clone()));
        }
        let over = self.metal.by_size().chain(self.pvc.by_size()).find(|&(_, count)| count > MAX_PIPE_COUNT);
        match over {
            Some((size, count)) => Err(FormError::TooManyPipes { size, count, limit: MAX_PIPE_COUNT }),
            None => Ok(()),
        }
    }

    /// Floor label as written in filenames: `7F`, `7MF` for the mezzanine.
    #[must_use]
    pub fn floor_label(&self) -> String {
        if self.is_mezzanine { format!("{}MF", self.floor) } else { format!("{}F", self.floor) }
    }
}

/// Selectable floor labels: basements `B18`..`B1`, floors `1`..`88`, roofs `R1`..`R3`.
#[must_use]
pub fn floor_options() -> Vec<String> {
    let basements = (1..=18).rev().map(|i| format!("B{i}"));
    let floors = (1..=88).map(|i| i.to_string());
    let roofs = (1..=3).map(|i| format!("R{i}"));
    basements.chain(floors).chain(roofs).collect()
}

/// A point annotation on a floor plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    /// Unique, creation-ordered identifier.
    pub id: MarkerId,
    /// Index of the owning plan in `Project::floor_plans`.
    pub plan_index: usize,
    /// Position on the plan in percent.
    #[serde(flatten)]
    pub position: PlanPosition,
    /// Project-wide display number.
    pub seq: u32,
    /// Inspection payload.
    pub data: MarkerData,
    /// Photo bytes (JPEG).
    #[serde(skip, default = "empty_asset")]
    pub photo: Asset,
}

/// A project: a name and its floor plans. Markers are kept beside it in a
/// flat list so they can be indexed by plan independently.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub floor_plans: Vec<FloorPlan>,
    /// Highest sequence number ever committed in this project.
    #[serde(default)]
    pub seq_high_water: u32,
}

impl Project {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), floor_plans: Vec::new(), seq_high_water: 0 }
    }
}

/// Hands out strictly increasing marker ids from a millisecond clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerIdGen {
    last: MarkerId,
}

impl MarkerIdGen {
    /// Start after `last`, typically the largest id already stored.
    #[must_use]
    pub fn after(last: MarkerId) -> Self {
        Self { last }
    }

    /// Next id for a marker created at `now_ms`. Never repeats and never goes
    /// backwards, even if the clock does.
    pub fn next_id(&mut self, now_ms: i64) -> MarkerId {
        self.last = now_ms.max(self.last.saturating_add(1));
        self.last
    }
}

/// In-memory marker list in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MarkerStore {
    markers: Vec<Marker>,
    seq_high_water: u32,
}

impl MarkerStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all markers with a snapshot, carrying over a previously
    /// recorded high-water mark.
    pub fn load_snapshot(&mut self, markers: Vec<Marker>, seq_high_water: u32) {
        let max_seq = markers.iter().map(|m| m.seq).max().unwrap_or(0);
        self.markers = markers;
        self.seq_high_water = seq_high_water.max(max_seq);
    }

    /// Sequence number for the next new marker.
    #[must_use]
    pub fn next_seq(&self) -> u32 {
        let max_seq = self.markers.iter().map(|m| m.seq).max().unwrap_or(0);
        max_seq.max(self.seq_high_water) + 1
    }

    /// Highest sequence number ever committed.
    #[must_use]
    pub fn seq_high_water(&self) -> u32 {
        self.seq_high_water
    }

    /// Undo the high-water bump of an upsert that was rolled back.
    pub fn rewind_seq_high_water(&mut self, to: u32) {
        let max_seq = self.markers.iter().map(|m| m.seq).max().unwrap_or(0);
        self.seq_high_water = to.max(max_seq);
    }

    /// Insert a new marker or replace the one with the same id.
    ///
    /// Returns the replaced marker, if any.
    pub fn upsert(&mut self, marker: Marker) -> Option<Marker> {
        self.seq_high_water = self.seq_high_water.max(marker.seq);
        if let Some(slot) = self.markers.iter_mut().find(|m| m.id == marker.id) {
            return Some(std::mem::replace(slot, marker));
        }
        self.markers.push(marker);
        None
    }

    /// Remove a marker by id, returning its former index and the marker.
    pub fn remove(&mut self, id: MarkerId) -> Option<(usize, Marker)> {
        let idx = self.markers.iter().position(|m| m.id == id)?;
        Some((idx, self.markers.remove(idx)))
    }

    /// Put a removed marker back at its former index.
    pub fn restore_at(&mut self, idx: usize, marker: Marker) {
        let idx = idx.min(self.markers.len());
        self.markers.insert(idx, marker);
    }

    /// Look up a marker by id.
    #[must_use]
    pub fn get(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }

    /// Markers placed on the plan at `plan_index`, in insertion order.
    pub fn for_plan(&self, plan_index: usize) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(move |m| m.plan_index == plan_index)
    }

    /// All markers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }

    /// Largest marker id present, or 0.
    #[must_use]
    pub fn max_id(&self) -> MarkerId {
        self.markers.iter().map(|m| m.id).max().unwrap_or(0)
    }

    /// Location text of the most recently created marker, if any.
    #[must_use]
    pub fn last_location(&self) -> Option<&str> {
        self.markers
            .iter()
            .max_by_key(|m| m.id)
            .map(|m| m.data.location.as_str())
            .filter(|loc| !loc.is_empty())
    }

    /// Number of markers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Returns `true` if the store holds no markers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Drop every marker and forget the high-water mark.
    pub fn clear(&mut self) {
        self.markers.clear();
        self.seq_high_water = 0;
    }
}
