//! Movement inference from position samples

use powershades_rs::movement::MovementTracker;

#[test]
fn first_sample_records_without_inference() {
    let mut tracker = MovementTracker::new();
    tracker.observe(30);
    assert!(!tracker.is_opening());
    assert!(!tracker.is_closing());
    assert_eq!(tracker.last_position(), Some(30));
}

#[test]
fn rising_positions_mean_opening() {
    let mut tracker = MovementTracker::new();
    tracker.observe(30);
    tracker.observe(60);
    assert!(tracker.is_opening());
    assert!(!tracker.is_closing());
}

#[test]
fn falling_positions_mean_closing() {
    let mut tracker = MovementTracker::new();
    tracker.observe(80);
    tracker.observe(55);
    assert!(!tracker.is_opening());
    assert!(tracker.is_closing());
}

#[test]
fn unchanged_position_keeps_previous_flags() {
    let mut tracker = MovementTracker::new();
    tracker.observe(30);
    tracker.observe(60);
    assert!(tracker.is_opening());
    tracker.observe(60);
    assert!(tracker.is_opening());
}

#[test]
fn arrival_within_tolerance_clears_movement() {
    let mut tracker = MovementTracker::new();
    tracker.observe(40);
    tracker.apply_intent(true, false, Some(60));
    tracker.observe(58);
    assert!(!tracker.is_opening());
    assert!(!tracker.is_closing());
    assert_eq!(tracker.target(), None);
}

#[test]
fn arrival_wins_over_direction() {
    let mut tracker = MovementTracker::new();
    tracker.observe(40);
    tracker.apply_intent(false, true, Some(62));
    // position rose, which alone would mean opening, but it landed on target
    tracker.observe(61);
    assert!(!tracker.is_opening());
    assert!(!tracker.is_closing());
}

#[test]
fn arrival_on_unchanged_position_clears_movement() {
    let mut tracker = MovementTracker::new();
    tracker.observe(59);
    tracker.apply_intent(true, false, Some(60));
    tracker.observe(59);
    assert!(!tracker.is_opening());
    assert_eq!(tracker.target(), None);
}

#[test]
fn stop_suppresses_stale_reply_inference() {
    let mut tracker = MovementTracker::new();
    tracker.observe(20);
    tracker.apply_intent(true, false, Some(100));
    tracker.observe(40);
    assert!(tracker.is_opening());

    tracker.apply_stop();
    assert!(!tracker.is_opening());
    assert!(!tracker.is_closing());

    // an in-flight reply from before the stop must not re-assert movement
    tracker.observe(55);
    assert!(!tracker.is_opening());
    assert!(!tracker.is_closing());
    assert_eq!(tracker.last_position(), Some(55));
}

#[test]
fn inference_resumes_after_the_first_post_stop_sample() {
    let mut tracker = MovementTracker::new();
    tracker.observe(20);
    tracker.observe(40);
    assert!(tracker.is_opening());

    tracker.apply_stop();
    tracker.observe(60);
    assert!(!tracker.is_opening());

    // the shade is moved again later (e.g. a wall switch); deltas must show
    tracker.observe(80);
    assert!(tracker.is_opening());
    tracker.observe(65);
    assert!(tracker.is_closing());
}

#[test]
fn new_intent_lifts_stop_suppression() {
    let mut tracker = MovementTracker::new();
    tracker.observe(20);
    tracker.apply_stop();
    tracker.apply_intent(false, true, Some(0));
    tracker.observe(10);
    assert!(tracker.is_closing());
}

#[test]
fn intent_never_sets_both_flags() {
    let mut tracker = MovementTracker::new();
    tracker.apply_intent(true, false, None);
    assert!(tracker.is_opening() && !tracker.is_closing());
    tracker.apply_intent(false, true, None);
    assert!(!tracker.is_opening() && tracker.is_closing());
    tracker.apply_intent(false, false, None);
    assert!(!tracker.is_opening() && !tracker.is_closing());
}
