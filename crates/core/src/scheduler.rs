// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Spaced-repetition scheduling as pure functions.
//!
//! Scheduling rules:
//! - Base interval is keyed by the item's mastery level *before* the review:
//!   1 day, 3 days, 1 week, 2 weeks, 1 month, 3 months.
//! - A correct answer keeps the full interval; an incorrect answer halves it.
//! - Mastery moves by exactly one level per review, bounded at 0 and
//!   [`MAX_MASTERY_LEVEL`]. A single outlier answer never jumps levels.
//! - Due-item ordering is a total order: overdue items (a full day or more
//!   past due) rank above merely-due items, then lower mastery first, with
//!   ties broken by `next_review_at` ascending.
//!
//! All functions take `now` explicitly so tests run on a fixed clock.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};

use crate::review::{ReviewState, MAX_MASTERY_LEVEL};

/// Base review intervals in days, indexed by mastery level.
pub const BASE_INTERVAL_DAYS: [i64; (MAX_MASTERY_LEVEL as usize) + 1] = [1, 3, 7, 14, 30, 90];

/// Priority floor for items at least one full day overdue.
const OVERDUE_BASE_SCORE: i64 = 100;

/// Priority floor for items due but less than a day late.
const DUE_BASE_SCORE: i64 = 50;

/// Returns the base interval for the given mastery level.
///
/// Levels beyond the table (not reachable through [`reviewed`]) clamp to the
/// longest interval.
pub fn base_interval(mastery_level: u8) -> Duration {
    let idx = usize::from(mastery_level).min(BASE_INTERVAL_DAYS.len() - 1);
    Duration::hours(BASE_INTERVAL_DAYS[idx] * 24)
}

/// Computes the state after a review at `now`.
///
/// The interval is keyed by the mastery level going into the review, so a
/// correct answer at level 2 schedules the next review a week out and only
/// then advances to level 3.
pub fn reviewed(state: &ReviewState, was_correct: bool, now: DateTime<Utc>) -> ReviewState {
    let interval = base_interval(state.mastery_level);
    let interval = if was_correct { interval } else { interval / 2 };

    let mastery_level = if was_correct {
        state.mastery_level.saturating_add(1).min(MAX_MASTERY_LEVEL)
    } else {
        state.mastery_level.saturating_sub(1)
    };

    ReviewState {
        mastery_level,
        times_encountered: state.times_encountered.saturating_add(1),
        times_correct: state
            .times_correct
            .saturating_add(u32::from(was_correct)),
        last_reviewed_at: now,
        next_review_at: now + interval,
    }
}

/// Returns the selection priority for a due item, or `None` if not yet due.
///
/// Overdue items score `100 + days_overdue`; due-but-not-overdue items score
/// `50 + (max_level - mastery_level) * 10`. Higher scores are presented
/// first.
pub fn priority_score(state: &ReviewState, now: DateTime<Utc>) -> Option<i64> {
    if !state.is_due(now) {
        return None;
    }

    let days_overdue = (now - state.next_review_at).num_days();
    if days_overdue >= 1 {
        Some(OVERDUE_BASE_SCORE + days_overdue)
    } else {
        Some(DUE_BASE_SCORE + i64::from(MAX_MASTERY_LEVEL - state.mastery_level) * 10)
    }
}

/// Total order over due items: higher priority first, ties by due time
/// ascending.
///
/// Both states must be due at `now`; not-due states sort last.
pub fn compare_due(a: &ReviewState, b: &ReviewState, now: DateTime<Utc>) -> Ordering {
    let score_a = priority_score(a, now);
    let score_b = priority_score(b, now);
    score_b
        .cmp(&score_a)
        .then_with(|| a.next_review_at.cmp(&b.next_review_at))
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
