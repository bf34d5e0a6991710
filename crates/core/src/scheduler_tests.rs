// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{TimeZone, Utc};
use yare::parameterized;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap()
}

fn state_at_level(level: u8) -> ReviewState {
    ReviewState {
        mastery_level: level,
        times_encountered: 4,
        times_correct: 3,
        last_reviewed_at: t0() - Duration::days(7),
        next_review_at: t0(),
    }
}

#[parameterized(
    level_0 = { 0, 1 },
    level_1 = { 1, 3 },
    level_2 = { 2, 7 },
    level_3 = { 3, 14 },
    level_4 = { 4, 30 },
    level_5 = { 5, 90 },
    clamped = { 9, 90 },
)]
fn base_interval_table(level: u8, days: i64) {
    assert_eq!(base_interval(level), Duration::days(days));
}

#[test]
fn correct_review_at_level_two_schedules_a_week_out() {
    let next = reviewed(&state_at_level(2), true, t0());

    assert_eq!(next.next_review_at, t0() + Duration::days(7));
    assert_eq!(next.mastery_level, 3);
    assert_eq!(next.last_reviewed_at, t0());
}

#[test]
fn incorrect_review_at_level_two_comes_back_in_half_a_week() {
    let next = reviewed(&state_at_level(2), false, t0());

    assert_eq!(next.next_review_at, t0() + Duration::hours(84));
    assert_eq!(next.mastery_level, 1);
}

#[parameterized(
    level_0 = { 0 },
    level_2 = { 2 },
    level_5 = { 5 },
)]
fn correct_never_schedules_sooner_than_incorrect(level: u8) {
    let state = state_at_level(level);
    let correct = reviewed(&state, true, t0());
    let incorrect = reviewed(&state, false, t0());

    assert!(correct.next_review_at > incorrect.next_review_at);
}

#[parameterized(
    level_0 = { 0 },
    level_1 = { 1 },
    level_4 = { 4 },
    level_5 = { 5 },
)]
fn mastery_moves_by_at_most_one(level: u8) {
    let state = state_at_level(level);
    let up = reviewed(&state, true, t0());
    let down = reviewed(&state, false, t0());

    assert!(up.mastery_level <= level + 1);
    assert!(up.mastery_level <= MAX_MASTERY_LEVEL);
    assert!(down.mastery_level >= level.saturating_sub(1));
}

#[test]
fn mastery_is_bounded_at_the_extremes() {
    let floor = reviewed(&state_at_level(0), false, t0());
    assert_eq!(floor.mastery_level, 0);

    let ceiling = reviewed(&state_at_level(5), true, t0());
    assert_eq!(ceiling.mastery_level, 5);
}

#[test]
fn counters_track_encounters_and_correct_answers() {
    let state = state_at_level(1);
    let correct = reviewed(&state, true, t0());
    assert_eq!(correct.times_encountered, 5);
    assert_eq!(correct.times_correct, 4);

    let incorrect = reviewed(&state, false, t0());
    assert_eq!(incorrect.times_encountered, 5);
    assert_eq!(incorrect.times_correct, 3);
}

#[test]
fn next_review_never_precedes_last_review() {
    let state = state_at_level(0);
    let next = reviewed(&state, false, t0());
    assert!(next.next_review_at >= next.last_reviewed_at);
}

#[test]
fn not_due_items_have_no_priority() {
    let mut state = state_at_level(2);
    state.next_review_at = t0() + Duration::hours(1);
    assert_eq!(priority_score(&state, t0()), None);
}

#[test]
fn overdue_scores_above_any_merely_due_item() {
    let mut overdue = state_at_level(5);
    overdue.next_review_at = t0() - Duration::days(2);

    let mut merely_due = state_at_level(0);
    merely_due.next_review_at = t0() - Duration::hours(3);

    let overdue_score = priority_score(&overdue, t0()).unwrap();
    let due_score = priority_score(&merely_due, t0()).unwrap();

    // Lowest-mastery merely-due item still ranks below the overdue one.
    assert_eq!(overdue_score, 102);
    assert_eq!(due_score, 100);
    assert!(overdue_score > due_score);
    assert_eq!(compare_due(&overdue, &merely_due, t0()), std::cmp::Ordering::Less);
}

#[test]
fn merely_due_favors_lower_mastery() {
    let mut weak = state_at_level(1);
    weak.next_review_at = t0() - Duration::hours(1);

    let mut strong = state_at_level(4);
    strong.next_review_at = t0() - Duration::hours(1);

    assert_eq!(priority_score(&weak, t0()).unwrap(), 90);
    assert_eq!(priority_score(&strong, t0()).unwrap(), 60);
    assert_eq!(compare_due(&weak, &strong, t0()), std::cmp::Ordering::Less);
}

#[test]
fn ties_break_by_due_time_ascending() {
    let mut earlier = state_at_level(3);
    earlier.next_review_at = t0() - Duration::hours(6);

    let mut later = state_at_level(3);
    later.next_review_at = t0() - Duration::hours(2);

    assert_eq!(
        priority_score(&earlier, t0()),
        priority_score(&later, t0())
    );
    assert_eq!(compare_due(&earlier, &later, t0()), std::cmp::Ordering::Less);
}

#[test]
fn repeated_review_of_same_state_is_deterministic() {
    let state = state_at_level(2);
    let a = reviewed(&state, true, t0());
    let b = reviewed(&state, true, t0());
    assert_eq!(a, b);
}
