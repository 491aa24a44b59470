#![allow(clippy::float_cmp)]

use super::*;

// =============================================================
// Mode
// =============================================================

#[test]
fn mode_default_is_move() {
    assert_eq!(Mode::default(), Mode::Move);
}

#[test]
fn mode_serde_lowercase() {
    assert_eq!(serde_json::to_string(&Mode::Mark).unwrap(), "\"mark\"");
    let back: Mode = serde_json::from_str("\"move\"").unwrap();
    assert_eq!(back, Mode::Move);
}

// =============================================================
// GestureState
// =============================================================

#[test]
fn gesture_state_default_is_idle() {
    assert_eq!(GestureState::default(), GestureState::Idle);
}

#[test]
fn long_press_states() {
    let p = Point::new(1.0, 2.0);
    assert!(GestureState::PendingMark { gesture: 1, finger: p }.is_long_press());
    assert!(GestureState::Marking { finger: p, target: None }.is_long_press());
    assert!(!GestureState::Panning { last: p }.is_long_press());
    assert!(!GestureState::Pinching { last_dist: 1.0, last_mid: p }.is_long_press());
    assert!(!GestureState::Idle.is_long_press());
}

// =============================================================
// two_finger_geometry
// =============================================================

#[test]
fn geometry_needs_two_points() {
    assert!(two_finger_geometry(&[]).is_none());
    assert!(two_finger_geometry(&[Point::new(1.0, 1.0)]).is_none());
}

#[test]
fn geometry_distance_and_midpoint() {
    let (dist, mid) = two_finger_geometry(&[Point::new(0.0, 0.0), Point::new(6.0, 8.0)]).unwrap();
    assert_eq!(dist, 10.0);
    assert_eq!(mid, Point::new(3.0, 4.0));
}

#[test]
fn geometry_ignores_extra_touches() {
    let touches = [Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(100.0, 100.0)];
    let (dist, mid) = two_finger_geometry(&touches).unwrap();
    assert_eq!(dist, 2.0);
    assert_eq!(mid, Point::new(1.0, 0.0));
}
