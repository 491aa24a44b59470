#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use super::*;
use crate::consts::{MAX_SCALE, MIN_SCALE};

// =============================================================
// Helpers
// =============================================================

const PLAN: ImageSize = ImageSize { width: 2000, height: 1500 };

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

/// Engine with an identity transform over a 2000x1500 plan.
fn engine(mode: Mode) -> EngineCore {
    let mut core = EngineCore::new();
    core.image_size = PLAN;
    core.mode = mode;
    core
}

fn armed_token(actions: &[Action]) -> u64 {
    match actions {
        [Action::ArmLongPress { gesture, .. }] => *gesture,
        other => panic!("expected a single ArmLongPress, got {other:?}"),
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// =============================================================
// Plan loading
// =============================================================

#[test]
fn load_plan_fits_width() {
    let mut core = EngineCore::new();
    let actions = core.load_plan(400.0, PLAN);
    assert_eq!(core.transform, Transform { x: 0.0, y: 0.0, scale: 0.2 });
    assert_eq!(core.image_size, PLAN);
    assert_eq!(actions, vec![Action::TransformChanged { transform: core.transform }]);
}

#[test]
fn load_plan_during_marking_hides_loupe() {
    let mut core = engine(Mode::Mark);
    let token = armed_token(&core.on_touch_start(&[pt(100.0, 200.0)]));
    core.on_long_press_elapsed(token);
    let actions = core.load_plan(400.0, PLAN);
    assert_eq!(actions[0], Action::LoupeHidden);
    assert_eq!(core.input, GestureState::Idle);
}

#[test]
fn reset_view_is_identity() {
    let mut core = EngineCore::new();
    core.load_plan(400.0, PLAN);
    core.reset_view();
    assert_eq!(core.transform, Transform::default());
    assert!(core.image_size.is_empty());
}

// =============================================================
// Panning
// =============================================================

#[test]
fn move_mode_single_finger_pans() {
    let mut core = engine(Mode::Move);
    assert!(core.on_touch_start(&[pt(10.0, 10.0)]).is_empty());
    core.on_touch_move(&[pt(30.0, 5.0)]);
    let actions = core.on_touch_move(&[pt(35.0, 15.0)]);
    assert_eq!(core.transform.x, 25.0);
    assert_eq!(core.transform.y, 5.0);
    assert_eq!(actions, vec![Action::TransformChanged { transform: core.transform }]);
}

#[test]
fn pan_is_unbounded() {
    let mut core = engine(Mode::Move);
    core.on_touch_start(&[pt(0.0, 0.0)]);
    core.on_touch_move(&[pt(-50_000.0, 90_000.0)]);
    assert_eq!(core.transform.x, -50_000.0);
    assert_eq!(core.transform.y, 90_000.0);
}

#[test]
fn touch_end_after_pan_is_idle() {
    let mut core = engine(Mode::Move);
    core.on_touch_start(&[pt(0.0, 0.0)]);
    core.on_touch_move(&[pt(5.0, 5.0)]);
    assert!(core.on_touch_end().is_empty());
    assert_eq!(core.input, GestureState::Idle);
}

#[test]
fn move_without_touch_start_does_nothing() {
    let mut core = engine(Mode::Move);
    assert!(core.on_touch_move(&[pt(5.0, 5.0)]).is_empty());
    assert_eq!(core.transform, Transform::default());
}

// =============================================================
// Pinching
// =============================================================

#[test]
fn two_finger_start_enters_pinch() {
    let mut core = engine(Mode::Move);
    core.on_touch_start(&[pt(0.0, 0.0), pt(100.0, 0.0)]);
    assert_eq!(core.input, GestureState::Pinching { last_dist: 100.0, last_mid: pt(50.0, 0.0) });
}

#[test]
fn pinch_keeps_midpoint_stationary() {
    let mut core = engine(Mode::Move);
    core.transform = Transform { x: 30.0, y: -40.0, scale: 0.5 };
    let mid = pt(150.0, 200.0);
    let before = core.transform.to_image_space(mid);

    core.on_touch_start(&[pt(100.0, 200.0), pt(200.0, 200.0)]);
    core.on_touch_move(&[pt(50.0, 200.0), pt(250.0, 200.0)]);

    assert!(approx(core.transform.scale, 1.0));
    let after = core.transform.to_image_space(mid);
    assert!(approx(before.x, after.x));
    assert!(approx(before.y, after.y));
}

#[test]
fn pinch_updates_references_every_event() {
    let mut core = engine(Mode::Move);
    core.on_touch_start(&[pt(0.0, 0.0), pt(100.0, 0.0)]);
    core.on_touch_move(&[pt(0.0, 0.0), pt(200.0, 0.0)]);
    core.on_touch_move(&[pt(0.0, 0.0), pt(400.0, 0.0)]);
    assert!(approx(core.transform.scale, 4.0));
}

#[test]
fn pinch_scale_clamps_high() {
    let mut core = engine(Mode::Move);
    core.on_touch_start(&[pt(0.0, 0.0), pt(1.0, 0.0)]);
    core.on_touch_move(&[pt(0.0, 0.0), pt(1000.0, 0.0)]);
    assert_eq!(core.transform.scale, MAX_SCALE);
}

#[test]
fn pinch_scale_clamps_low() {
    let mut core = engine(Mode::Move);
    core.on_touch_start(&[pt(0.0, 0.0), pt(1000.0, 0.0)]);
    core.on_touch_move(&[pt(0.0, 0.0), pt(1.0, 0.0)]);
    assert_eq!(core.transform.scale, MIN_SCALE);
}

#[test]
fn pinch_at_limit_holds_image_point_under_fingers() {
    let mut core = engine(Mode::Move);
    core.transform.scale = MAX_SCALE;
    let mid = pt(100.0, 100.0);
    let before = core.transform.to_image_space(mid);
    core.on_touch_start(&[pt(50.0, 100.0), pt(150.0, 100.0)]);
    core.on_touch_move(&[pt(0.0, 100.0), pt(200.0, 100.0)]);
    assert_eq!(core.transform.scale, MAX_SCALE);
    let after = core.transform.to_image_space(mid);
    assert!(approx(before.x, after.x));
    assert!(approx(before.y, after.y));
}

#[test]
fn pinch_with_moving_midpoint_pans() {
    let mut core = engine(Mode::Move);
    core.on_touch_start(&[pt(0.0, 0.0), pt(100.0, 0.0)]);
    core.on_touch_move(&[pt(10.0, 20.0), pt(110.0, 20.0)]);
    assert!(approx(core.transform.scale, 1.0));
    assert!(approx(core.transform.x, 10.0));
    assert!(approx(core.transform.y, 20.0));
}

#[test]
fn coincident_fingers_do_not_produce_nan() {
    let mut core = engine(Mode::Move);
    core.on_touch_start(&[pt(10.0, 10.0), pt(10.0, 10.0)]);
    core.on_touch_move(&[pt(0.0, 10.0), pt(20.0, 10.0)]);
    assert!(core.transform.scale.is_finite());
    assert!(core.transform.x.is_finite());
}

#[test]
fn second_finger_mid_pan_switches_to_pinch() {
    let mut core = engine(Mode::Move);
    core.on_touch_start(&[pt(0.0, 0.0)]);
    let actions = core.on_touch_move(&[pt(0.0, 0.0), pt(100.0, 0.0)]);
    assert!(actions.is_empty());
    assert_eq!(core.transform, Transform::default());
    assert!(matches!(core.input, GestureState::Pinching { .. }));
}

#[test]
fn single_finger_move_while_pinching_is_ignored() {
    let mut core = engine(Mode::Move);
    core.on_touch_start(&[pt(0.0, 0.0), pt(100.0, 0.0)]);
    assert!(core.on_touch_move(&[pt(40.0, 40.0)]).is_empty());
    assert_eq!(core.transform, Transform::default());
}

#[test]
fn pinch_works_in_mark_mode() {
    let mut core = engine(Mode::Mark);
    core.on_touch_start(&[pt(0.0, 0.0), pt(100.0, 0.0)]);
    core.on_touch_move(&[pt(0.0, 0.0), pt(300.0, 0.0)]);
    assert!(approx(core.transform.scale, 3.0));
}

// =============================================================
// Long press and marking
// =============================================================

#[test]
fn mark_mode_touch_arms_timer() {
    let mut core = engine(Mode::Mark);
    let actions = core.on_touch_start(&[pt(100.0, 200.0)]);
    assert_eq!(actions, vec![Action::ArmLongPress { gesture: 1, delay_ms: 100 }]);
}

#[test]
fn each_touch_gets_fresh_token() {
    let mut core = engine(Mode::Mark);
    let a = armed_token(&core.on_touch_start(&[pt(1.0, 1.0)]));
    core.on_touch_end();
    let b = armed_token(&core.on_touch_start(&[pt(1.0, 1.0)]));
    assert_ne!(a, b);
}

#[test]
fn custom_long_press_delay() {
    let mut core = EngineCore::with_config(GestureConfig { long_press_ms: 250, loupe_offset_y: 30.0 });
    core.mode = Mode::Mark;
    let actions = core.on_touch_start(&[pt(1.0, 1.0)]);
    assert!(matches!(actions[..], [Action::ArmLongPress { delay_ms: 250, .. }]));
}

#[test]
fn timer_fire_shows_loupe_at_latest_finger() {
    let mut core = engine(Mode::Mark);
    let token = armed_token(&core.on_touch_start(&[pt(100.0, 200.0)]));
    core.on_touch_move(&[pt(120.0, 230.0)]);
    let actions = core.on_long_press_elapsed(token);
    let expected = Loupe { finger: pt(120.0, 230.0), target: Some(pt(120.0, 200.0)) };
    assert_eq!(actions, vec![Action::LoupeMoved { loupe: expected }]);
    assert_eq!(core.loupe(), Some(expected));
}

#[test]
fn stale_timer_is_ignored() {
    let mut core = engine(Mode::Mark);
    let old = armed_token(&core.on_touch_start(&[pt(100.0, 200.0)]));
    core.on_touch_end();
    armed_token(&core.on_touch_start(&[pt(100.0, 200.0)]));
    assert!(core.on_long_press_elapsed(old).is_empty());
    assert!(matches!(core.input, GestureState::PendingMark { .. }));
}

#[test]
fn timer_after_release_is_ignored() {
    let mut core = engine(Mode::Mark);
    let token = armed_token(&core.on_touch_start(&[pt(100.0, 200.0)]));
    assert_eq!(core.on_touch_end(), vec![Action::CancelLongPress]);
    assert!(core.on_long_press_elapsed(token).is_empty());
    assert_eq!(core.input, GestureState::Idle);
}

#[test]
fn quick_tap_in_mark_mode_places_nothing() {
    let mut core = engine(Mode::Mark);
    core.on_touch_start(&[pt(100.0, 200.0)]);
    let actions = core.on_touch_end();
    assert!(!actions.iter().any(|a| matches!(a, Action::PlaceMarker { .. })));
}

#[test]
fn marking_move_tracks_loupe() {
    let mut core = engine(Mode::Mark);
    let token = armed_token(&core.on_touch_start(&[pt(100.0, 200.0)]));
    core.on_long_press_elapsed(token);
    let actions = core.on_touch_move(&[pt(300.0, 430.0)]);
    let expected = Loupe { finger: pt(300.0, 430.0), target: Some(pt(300.0, 400.0)) };
    assert_eq!(actions, vec![Action::LoupeMoved { loupe: expected }]);
}

#[test]
fn release_while_marking_places_marker() {
    let mut core = engine(Mode::Mark);
    core.transform = Transform { x: 10.0, y: 20.0, scale: 0.5 };
    let token = armed_token(&core.on_touch_start(&[pt(60.0, 100.0)]));
    core.on_long_press_elapsed(token);
    let actions = core.on_touch_end();
    assert_eq!(actions, vec![Action::LoupeHidden, Action::PlaceMarker { at: pt(100.0, 100.0) }]);
    assert_eq!(core.input, GestureState::Idle);
    assert!(core.loupe().is_none());
}

#[test]
fn release_off_plan_places_nothing() {
    let mut core = engine(Mode::Mark);
    let token = armed_token(&core.on_touch_start(&[pt(100.0, 200.0)]));
    core.on_long_press_elapsed(token);
    core.on_touch_move(&[pt(-20.0, 10.0)]);
    assert_eq!(core.on_touch_end(), vec![Action::LoupeHidden]);
}

#[test]
fn loupe_without_plan_has_no_target() {
    let mut core = EngineCore::new();
    core.mode = Mode::Mark;
    let token = armed_token(&core.on_touch_start(&[pt(100.0, 200.0)]));
    match core.on_long_press_elapsed(token).as_slice() {
        [Action::LoupeMoved { loupe }] => assert!(loupe.target.is_none()),
        other => panic!("expected loupe, got {other:?}"),
    }
}

#[test]
fn second_finger_cancels_pending_mark() {
    let mut core = engine(Mode::Mark);
    let token = armed_token(&core.on_touch_start(&[pt(100.0, 200.0)]));
    let actions = core.on_touch_start(&[pt(100.0, 200.0), pt(200.0, 200.0)]);
    assert_eq!(actions, vec![Action::CancelLongPress]);
    assert!(core.on_long_press_elapsed(token).is_empty());
}

#[test]
fn second_finger_while_marking_hides_loupe() {
    let mut core = engine(Mode::Mark);
    let token = armed_token(&core.on_touch_start(&[pt(100.0, 200.0)]));
    core.on_long_press_elapsed(token);
    let actions = core.on_touch_move(&[pt(100.0, 200.0), pt(200.0, 200.0)]);
    assert_eq!(actions, vec![Action::LoupeHidden]);
    assert!(matches!(core.input, GestureState::Pinching { .. }));
    assert!(!core.on_touch_end().iter().any(|a| matches!(a, Action::PlaceMarker { .. })));
}

// =============================================================
// Mode switches and teardown
// =============================================================

#[test]
fn mode_switch_cancels_pending_mark() {
    let mut core = engine(Mode::Mark);
    let token = armed_token(&core.on_touch_start(&[pt(100.0, 200.0)]));
    assert_eq!(core.set_mode(Mode::Move), vec![Action::CancelLongPress]);
    assert!(core.on_long_press_elapsed(token).is_empty());
    assert_eq!(core.mode, Mode::Move);
}

#[test]
fn mode_switch_while_idle_is_silent() {
    let mut core = engine(Mode::Move);
    assert!(core.set_mode(Mode::Mark).is_empty());
    assert_eq!(core.mode, Mode::Mark);
}

#[test]
fn teardown_hides_active_loupe() {
    let mut core = engine(Mode::Mark);
    let token = armed_token(&core.on_touch_start(&[pt(100.0, 200.0)]));
    core.on_long_press_elapsed(token);
    assert_eq!(core.teardown(), vec![Action::LoupeHidden]);
    assert_eq!(core.input, GestureState::Idle);
    assert!(core.on_touch_end().is_empty());
}

#[test]
fn empty_touch_list_is_ignored() {
    let mut core = engine(Mode::Mark);
    assert!(core.on_touch_start(&[]).is_empty());
    assert!(core.on_touch_move(&[]).is_empty());
    assert_eq!(core.input, GestureState::Idle);
}

// =============================================================
// Action wire format
// =============================================================

#[test]
fn actions_serialize_tagged() {
    let json = serde_json::to_value(Action::ArmLongPress { gesture: 3, delay_ms: 100 }).unwrap();
    assert_eq!(json, serde_json::json!({ "type": "arm_long_press", "gesture": 3, "delay_ms": 100 }));
    let json = serde_json::to_value(Action::PlaceMarker { at: pt(1.5, 2.0) }).unwrap();
    assert_eq!(json, serde_json::json!({ "type": "place_marker", "at": { "x": 1.5, "y": 2.0 } }));
    let json = serde_json::to_value(Action::LoupeHidden).unwrap();
    assert_eq!(json, serde_json::json!({ "type": "loupe_hidden" }));
}
