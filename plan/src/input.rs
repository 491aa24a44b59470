//! Input model: interaction modes and the gesture state machine's states.
//!
//! `Mode` captures what a single finger does on the plan. `GestureState` is
//! the active gesture tracked between touch-start and touch-end, carrying the
//! references needed to compute per-event deltas. All coordinates here are
//! screen pixels relative to the plan container's top-left corner.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use serde::{Deserialize, Serialize};

use crate::transform::Point;

/// What a single finger does on the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Drag to pan (default). Two fingers always pinch-zoom.
    #[default]
    Move,
    /// Press and hold to place a marker with the loupe.
    Mark,
}

/// Internal state for the gesture state machine.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GestureState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// One finger dragging the plan in move mode.
    Panning {
        /// Finger position at the previous event.
        last: Point,
    },
    /// Two fingers zooming and panning, in either mode.
    Pinching {
        /// Finger distance at the previous event.
        last_dist: f64,
        /// Finger midpoint at the previous event.
        last_mid: Point,
    },
    /// One finger down in mark mode, long-press timer armed.
    PendingMark {
        /// Token of the armed timer; a fire with any other token is stale.
        gesture: u64,
        /// Latest finger position, used when the timer fires.
        finger: Point,
    },
    /// Long press recognised; the loupe follows the finger.
    Marking {
        /// Latest finger position.
        finger: Point,
        /// Image-pixel point the marker would be placed at, `None` when off the plan.
        target: Option<Point>,
    },
}

impl GestureState {
    /// Whether a long press is armed or active.
    #[must_use]
    pub fn is_long_press(&self) -> bool {
        matches!(self, Self::PendingMark { .. } | Self::Marking { .. })
    }
}

/// Distance and midpoint of the first two touches.
#[must_use]
pub fn two_finger_geometry(touches: &[Point]) -> Option<(f64, Point)> {
    let [a, b, ..] = touches else {
        return None;
    };
    Some((a.distance(*b), a.midpoint(*b)))
}
