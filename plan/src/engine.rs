//! Gesture engine for the floor-plan view.
//!
//! `EngineCore` turns raw touch streams into view-transform updates and marker
//! placement requests. It never touches storage and never owns a timer: the
//! host arms and cancels the long-press timer when told to through
//! [`Action`]s, and reports back with the gesture token it was given.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use serde::Serialize;

use crate::consts::{LONG_PRESS_MS, LOUPE_OFFSET_Y_PX};
use crate::doc::ImageSize;
use crate::input::{GestureState, Mode, two_finger_geometry};
use crate::loupe::Loupe;
use crate::transform::{Point, Transform};

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Start a timer and call [`EngineCore::on_long_press_elapsed`] with `gesture` when it fires.
    ArmLongPress { gesture: u64, delay_ms: u32 },
    /// Drop any armed long-press timer.
    CancelLongPress,
    /// The view transform changed; re-apply it.
    TransformChanged { transform: Transform },
    /// Show or move the magnifier.
    LoupeMoved { loupe: Loupe },
    /// Hide the magnifier.
    LoupeHidden,
    /// Start a new marker at this image-pixel point.
    PlaceMarker { at: Point },
}

/// Tunables for gesture recognition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Hold time before a mark-mode touch becomes a placement.
    pub long_press_ms: u32,
    /// How far above the finger the loupe samples, in screen pixels.
    pub loupe_offset_y: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self { long_press_ms: LONG_PRESS_MS, loupe_offset_y: LOUPE_OFFSET_Y_PX }
    }
}

/// Gesture engine state.
#[derive(Debug, Clone, Default)]
pub struct EngineCore {
    pub transform: Transform,
    pub mode: Mode,
    pub input: GestureState,
    /// Pixel size of the active plan image; empty until one is loaded.
    pub image_size: ImageSize,
    pub config: GestureConfig,
    gesture_seq: u64,
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: GestureConfig) -> Self {
        Self { config, ..Self::default() }
    }

    // --- Plan / view ---

    /// A plan image finished loading: fit it to the container and drop any gesture.
    pub fn load_plan(&mut self, container_width: f64, size: ImageSize) -> Vec<Action> {
        let mut actions = self.teardown();
        self.image_size = size;
        self.transform.reset_to_fit(container_width, f64::from(size.width));
        actions.push(Action::TransformChanged { transform: self.transform });
        actions
    }

    /// The active plan changed: identity transform until the new image loads.
    pub fn reset_view(&mut self) -> Vec<Action> {
        let mut actions = self.teardown();
        self.image_size = ImageSize::default();
        self.transform = Transform::default();
        actions.push(Action::TransformChanged { transform: self.transform });
        actions
    }

    /// Switch between move and mark mode. Any long press in flight is dropped.
    pub fn set_mode(&mut self, mode: Mode) -> Vec<Action> {
        self.mode = mode;
        if self.input.is_long_press() { self.teardown() } else { Vec::new() }
    }

    /// Cancel any pending or active long press and return to idle.
    pub fn teardown(&mut self) -> Vec<Action> {
        let actions = self.cancel_long_press();
        self.input = GestureState::Idle;
        actions
    }

    // --- Touch input ---

    pub fn on_touch_start(&mut self, touches: &[Point]) -> Vec<Action> {
        if let Some((dist, mid)) = two_finger_geometry(touches) {
            let actions = self.cancel_long_press();
            self.input = GestureState::Pinching { last_dist: dist, last_mid: mid };
            return actions;
        }
        let Some(&finger) = touches.first() else {
            return Vec::new();
        };
        match self.mode {
            Mode::Move => {
                self.input = GestureState::Panning { last: finger };
                Vec::new()
            }
            Mode::Mark => {
                self.gesture_seq += 1;
                let gesture = self.gesture_seq;
                self.input = GestureState::PendingMark { gesture, finger };
                vec![Action::ArmLongPress { gesture, delay_ms: self.config.long_press_ms }]
            }
        }
    }

    pub fn on_touch_move(&mut self, touches: &[Point]) -> Vec<Action> {
        if let Some((dist, mid)) = two_finger_geometry(touches) {
            return self.pinch_to(dist, mid);
        }
        let Some(&finger) = touches.first() else {
            return Vec::new();
        };
        match self.input {
            GestureState::Panning { last } => {
                self.transform.pan_by(finger.x - last.x, finger.y - last.y);
                self.input = GestureState::Panning { last: finger };
                vec![Action::TransformChanged { transform: self.transform }]
            }
            GestureState::PendingMark { gesture, .. } => {
                self.input = GestureState::PendingMark { gesture, finger };
                Vec::new()
            }
            GestureState::Marking { .. } => self.show_loupe(finger),
            GestureState::Idle | GestureState::Pinching { .. } => Vec::new(),
        }
    }

    pub fn on_touch_end(&mut self) -> Vec<Action> {
        let prev = std::mem::take(&mut self.input);
        match prev {
            GestureState::Marking { target, .. } => {
                let mut actions = vec![Action::LoupeHidden];
                if let Some(at) = target {
                    actions.push(Action::PlaceMarker { at });
                }
                actions
            }
            GestureState::PendingMark { .. } => vec![Action::CancelLongPress],
            GestureState::Idle | GestureState::Panning { .. } | GestureState::Pinching { .. } => Vec::new(),
        }
    }

    /// The host's long-press timer fired. Tokens from cancelled gestures are ignored.
    pub fn on_long_press_elapsed(&mut self, gesture: u64) -> Vec<Action> {
        match self.input {
            GestureState::PendingMark { gesture: armed, finger } if armed == gesture => self.show_loupe(finger),
            _ => Vec::new(),
        }
    }

    // --- Queries ---

    /// The current view transform.
    #[must_use]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// The loupe while a placement is in progress.
    #[must_use]
    pub fn loupe(&self) -> Option<Loupe> {
        match self.input {
            GestureState::Marking { finger, target } => Some(Loupe { finger, target }),
            _ => None,
        }
    }

    // --- Internals ---

    fn pinch_to(&mut self, dist: f64, mid: Point) -> Vec<Action> {
        if let GestureState::Pinching { last_dist, last_mid } = self.input {
            self.input = GestureState::Pinching { last_dist: dist, last_mid: mid };
            if last_dist > 0.0 && dist > 0.0 {
                self.transform.zoom_about(last_mid, mid, dist / last_dist);
            } else {
                self.transform.pan_by(mid.x - last_mid.x, mid.y - last_mid.y);
            }
            return vec![Action::TransformChanged { transform: self.transform }];
        }
        let actions = self.cancel_long_press();
        self.input = GestureState::Pinching { last_dist: dist, last_mid: mid };
        actions
    }

    fn show_loupe(&mut self, finger: Point) -> Vec<Action> {
        let loupe = Loupe::sample(finger, self.config.loupe_offset_y, &self.transform, self.image_size);
        self.input = GestureState::Marking { finger, target: loupe.target };
        vec![Action::LoupeMoved { loupe }]
    }

    fn cancel_long_press(&mut self) -> Vec<Action> {
        match self.input {
            GestureState::PendingMark { .. } => vec![Action::CancelLongPress],
            GestureState::Marking { .. } => vec![Action::LoupeHidden],
            _ => Vec::new(),
        }
    }
}
