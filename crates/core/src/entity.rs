// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Core entity types for the gloss vocabulary trainer.
//!
//! An [`Entity`] is a user-owned vocabulary record. Its id is a
//! client-generated UUID so creation works fully offline; the `version`
//! counter is assigned by the server and drives conflict detection.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::review::ReviewState;

/// Where an entity sits in the sync lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local mutation not yet transmitted. Initial state for new entities.
    Pending,
    /// Claimed by the current sync batch.
    Syncing,
    /// Acknowledged by the server.
    Synced,
    /// An unresolved conflict awaits a user decision.
    ///
    /// Only the conflict resolver's defer path sets this value.
    Conflict,
}

impl SyncStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Conflict => "conflict",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "syncing" => Ok(SyncStatus::Syncing),
            "synced" => Ok(SyncStatus::Synced),
            "conflict" => Ok(SyncStatus::Conflict),
            _ => Err(Error::InvalidSyncStatus(s.to_string())),
        }
    }
}

/// Domain fields of a vocabulary record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// The word or phrase being learned.
    pub text: String,
    /// Translation into the user's language.
    pub translation: String,
    /// Optional usage context or example sentence.
    pub context: Option<String>,
    /// User tags. A set so concurrent edits merge by union.
    pub tags: BTreeSet<String>,
    /// Review progress, present once the item is learnable.
    pub review: Option<ReviewState>,
}

impl Payload {
    /// Creates a payload with the given text and translation.
    pub fn new(text: impl Into<String>, translation: impl Into<String>) -> Self {
        Payload {
            text: text.into(),
            translation: translation.into(),
            context: None,
            tags: BTreeSet::new(),
            review: None,
        }
    }

    /// Returns the payload with a usage context attached.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Returns the payload with the given tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the payload with review tracking enabled.
    pub fn with_review(mut self, review: ReviewState) -> Self {
        self.review = Some(review);
        self
    }
}

/// A user-owned vocabulary record tracked by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable client-generated identifier.
    pub id: Uuid,
    /// Domain fields.
    pub payload: Payload,
    /// Server-assigned version counter used for conflict comparison.
    ///
    /// Zero until the server has acknowledged the entity at least once.
    pub version: i64,
    /// Wall-clock timestamp of the last local or remote write.
    pub updated_at: DateTime<Utc>,
    /// Sync lifecycle state.
    pub sync_status: SyncStatus,
}

impl Entity {
    /// Creates a new local entity in `Pending` state with a fresh id.
    pub fn new(payload: Payload, now: DateTime<Utc>) -> Self {
        Entity {
            id: Uuid::new_v4(),
            payload,
            version: 0,
            updated_at: now,
            sync_status: SyncStatus::Pending,
        }
    }
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
