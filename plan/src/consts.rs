//! Shared numeric constants for the plan crate.

// ── View transform ──────────────────────────────────────────────

/// Smallest zoom factor a pinch may reach.
pub const MIN_SCALE: f64 = 0.1;

/// Largest zoom factor a pinch may reach.
pub const MAX_SCALE: f64 = 20.0;

// ── Gestures ────────────────────────────────────────────────────

/// Hold time before a mark-mode touch turns into a placement with the loupe.
pub const LONG_PRESS_MS: u32 = 100;

/// The loupe samples this many screen pixels above the finger so the finger
/// does not cover the point being placed.
pub const LOUPE_OFFSET_Y_PX: f64 = 30.0;

// ── Loupe layout ────────────────────────────────────────────────

/// Diameter of the circular magnifier viewport in screen pixels.
pub const LOUPE_SIZE_PX: f64 = 140.0;

/// Magnification applied inside the loupe.
pub const LOUPE_ZOOM: f64 = 2.0;

/// Distance from the finger to the top edge of the loupe viewport.
pub const LOUPE_LIFT_PX: f64 = 180.0;

// ── Clustering ──────────────────────────────────────────────────

/// On-screen merge distance for marker pins, roughly one pin width.
pub const UI_CLUSTER_THRESHOLD_PX: f64 = 29.0;

// ── Export rendering ────────────────────────────────────────────

/// Lower bound for the export label box edge, in image pixels.
pub const EXPORT_MARKER_MIN_PX: f64 = 24.0;

/// Export label box edge as a fraction of the image width.
pub const EXPORT_MARKER_WIDTH_RATIO: f64 = 0.008;

/// Export merge distance as a multiple of the label box edge.
pub const EXPORT_CLUSTER_RATIO: f64 = 1.2;

/// Label font size as a fraction of the box edge.
pub const EXPORT_FONT_RATIO: f64 = 0.55;

/// Horizontal padding added around wide labels, as a fraction of the box edge.
pub const EXPORT_PADDING_RATIO: f64 = 0.4;

/// Outline width as a fraction of the box edge.
pub const EXPORT_STROKE_RATIO: f64 = 0.08;

/// Downward nudge of the label baseline, as a fraction of the box edge.
pub const EXPORT_TEXT_NUDGE_RATIO: f64 = 0.05;

/// JPEG quality used for exported maps.
pub const EXPORT_JPEG_QUALITY: u8 = 90;

// ── Marker form ─────────────────────────────────────────────────

/// Largest selectable pipe count in the marker form.
pub const MAX_PIPE_COUNT: u32 = 188;
