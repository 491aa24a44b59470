//! Magnifier shown while a marker is being placed.
//!
//! The loupe samples the plan a fixed distance above the finger and draws a
//! 2× view of the plan, markers included, centred on that point inside a
//! circular viewport floating over the finger.

#[cfg(test)]
#[path = "loupe_test.rs"]
mod loupe_test;

use serde::Serialize;

use crate::consts::{LOUPE_LIFT_PX, LOUPE_SIZE_PX, LOUPE_ZOOM};
use crate::doc::ImageSize;
use crate::transform::{Point, Transform};

/// Loupe state for one finger position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Loupe {
    /// Finger position in container screen pixels.
    pub finger: Point,
    /// Image-pixel point under the loupe crosshair, `None` when it falls off the plan.
    pub target: Option<Point>,
}

impl Loupe {
    /// Sample the plan `offset_y` pixels above `finger`.
    #[must_use]
    pub fn sample(finger: Point, offset_y: f64, transform: &Transform, size: ImageSize) -> Self {
        let lifted = Point::new(finger.x, finger.y - offset_y);
        let image = transform.to_image_space(lifted);
        let target = (!size.is_empty() && size.contains(image)).then_some(image);
        Self { finger, target }
    }

    /// Where to draw the loupe. `None` while the target is off the plan.
    #[must_use]
    pub fn layout(&self, size: ImageSize) -> Option<MagnifierLayout> {
        let target = self.target?;
        let half = LOUPE_SIZE_PX / 2.0;
        Some(MagnifierLayout {
            left: self.finger.x - half,
            top: self.finger.y - LOUPE_LIFT_PX,
            diameter: LOUPE_SIZE_PX,
            content_width: f64::from(size.width) * LOUPE_ZOOM,
            content_height: f64::from(size.height) * LOUPE_ZOOM,
            content_offset: Point::new(-target.x * LOUPE_ZOOM + half, -target.y * LOUPE_ZOOM + half),
        })
    }
}

/// Screen placement of the magnifier and of the zoomed plan inside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MagnifierLayout {
    /// Viewport left edge in container pixels.
    pub left: f64,
    /// Viewport top edge in container pixels.
    pub top: f64,
    /// Viewport diameter.
    pub diameter: f64,
    /// Width of the zoomed plan layer.
    pub content_width: f64,
    /// Height of the zoomed plan layer.
    pub content_height: f64,
    /// Translation of the zoomed plan layer inside the viewport.
    pub content_offset: Point,
}
