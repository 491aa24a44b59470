#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_SCALE, MIN_SCALE};

/// A point in either screen or image space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Point halfway between `self` and `other`.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self { x: (self.x + other.x) / 2.0, y: (self.y + other.y) / 2.0 }
    }
}

/// View transform mapping floor-plan image pixels to the visible canvas.
///
/// `x` / `y` are the screen-pixel translation of the image origin.
/// `scale` is a uniform zoom factor (1.0 = one image pixel per screen pixel).
/// The host applies it with a `0 0` transform origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, scale: 1.0 }
    }
}

impl Transform {
    /// Fit the image to the container width with the origin at the top-left corner.
    ///
    /// Called once per plan image load. A degenerate ratio (zero or non-finite)
    /// falls back to a scale of 1.
    pub fn reset_to_fit(&mut self, container_width: f64, image_width: f64) {
        let ratio = container_width / image_width;
        self.scale = if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 };
        self.x = 0.0;
        self.y = 0.0;
    }

    /// Convert a screen-space point to image pixels.
    #[must_use]
    pub fn to_image_space(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.x) / self.scale,
            y: (screen.y - self.y) / self.scale,
        }
    }

    /// Convert an image-pixel point to screen space.
    #[must_use]
    pub fn to_screen_space(&self, image: Point) -> Point {
        Point {
            x: image.x * self.scale + self.x,
            y: image.y * self.scale + self.y,
        }
    }

    /// Translate by a screen-space delta. Panning is not bounded.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Apply one pinch step.
    ///
    /// The scale is multiplied by `factor` and clamped. The translation is
    /// chosen so the image point that sat under `prev_mid` ends up under `mid`,
    /// which keeps it stationary when the midpoint does not move and pans along
    /// with the fingers when it does.
    pub fn zoom_about(&mut self, prev_mid: Point, mid: Point, factor: f64) {
        let new_scale = clamp_scale(self.scale * factor);
        let effective = new_scale / self.scale;
        self.x = mid.x - (prev_mid.x - self.x) * effective;
        self.y = mid.y - (prev_mid.y - self.y) * effective;
        self.scale = new_scale;
    }

    /// CSS `transform` value for web hosts.
    #[must_use]
    pub fn css(&self) -> String {
        format!("translate({}px, {}px) scale({})", self.x, self.y, self.scale)
    }
}

/// Clamp a zoom factor to the supported range.
#[must_use]
pub fn clamp_scale(scale: f64) -> f64 {
    scale.clamp(MIN_SCALE, MAX_SCALE)
}
