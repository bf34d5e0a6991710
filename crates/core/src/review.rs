// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Review progress tracked for a learnable item.
//!
//! `ReviewState` lives inside an entity's payload and is only ever advanced
//! through the scheduler; `next_review_at` is never hand-edited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest reachable mastery level.
pub const MAX_MASTERY_LEVEL: u8 = 5;

/// Spaced-repetition state for a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewState {
    /// Bounded mastery level, 0..=MAX_MASTERY_LEVEL.
    pub mastery_level: u8,
    /// Total number of reviews, correct or not. Monotonically increasing.
    pub times_encountered: u32,
    /// Number of correct reviews. Monotonically increasing.
    pub times_correct: u32,
    /// When the item was last reviewed.
    pub last_reviewed_at: DateTime<Utc>,
    /// When the item is next due. Always >= `last_reviewed_at`.
    pub next_review_at: DateTime<Utc>,
}

impl ReviewState {
    /// Creates the initial review state for a newly learned item.
    ///
    /// New items are due immediately.
    pub fn new(now: DateTime<Utc>) -> Self {
        ReviewState {
            mastery_level: 0,
            times_encountered: 0,
            times_correct: 0,
            last_reviewed_at: now,
            next_review_at: now,
        }
    }

    /// Returns true if the item is due for review at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }
}
