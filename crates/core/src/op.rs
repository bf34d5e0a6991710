// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operations for offline mutation tracking.
//!
//! Every entity mutation is captured as an immutable [`Operation`] and
//! queued for transmission. Ops are designed to be:
//!
//! - Serializable: stored in the durable queue and sent on the wire
//! - Idempotent: the server upserts keyed by `op_id`, so retries and double
//!   acknowledgements are safe
//! - Self-describing for conflict detection: each op records the entity
//!   version (and optionally the payload snapshot) the client saw when the
//!   op was created

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Entity, Payload};
use crate::error::{Error, Result};
use crate::review::ReviewState;

/// The kind of mutation an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Create a new entity.
    Create,
    /// Update fields of an existing entity.
    Update,
    /// Delete an entity.
    Delete,
}

impl OpKind {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Create => "create",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(OpKind::Create),
            "update" => Ok(OpKind::Update),
            "delete" => Ok(OpKind::Delete),
            _ => Err(Error::InvalidOpKind(s.to_string())),
        }
    }
}

/// Partial payload carrying only the fields a mutation touched.
///
/// `None` means "unchanged"; the conflict resolver treats set fields as the
/// local side of a field-level merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewState>,
}

impl PayloadPatch {
    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.translation.is_none()
            && self.context.is_none()
            && self.tags.is_none()
            && self.review.is_none()
    }

    /// Returns the patch with a new text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Returns the patch with a new translation.
    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }

    /// Returns the patch with a new context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Returns the patch with a replacement tag set.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the patch with a new review state.
    pub fn with_review(mut self, review: ReviewState) -> Self {
        self.review = Some(review);
        self
    }

    /// Captures a full payload as a patch (used for create operations).
    pub fn from_payload(payload: &Payload) -> Self {
        PayloadPatch {
            text: Some(payload.text.clone()),
            translation: Some(payload.translation.clone()),
            context: payload.context.clone(),
            tags: Some(payload.tags.clone()),
            review: payload.review.clone(),
        }
    }

    /// Applies the patch on top of a base payload.
    pub fn apply_to(&self, base: &Payload) -> Payload {
        Payload {
            text: self.text.clone().unwrap_or_else(|| base.text.clone()),
            translation: self
                .translation
                .clone()
                .unwrap_or_else(|| base.translation.clone()),
            context: self.context.clone().or_else(|| base.context.clone()),
            tags: self.tags.clone().unwrap_or_else(|| base.tags.clone()),
            review: self.review.clone().or_else(|| base.review.clone()),
        }
    }
}

/// An immutable record of intent to mutate one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique identifier used for idempotent replay.
    pub op_id: Uuid,
    /// The entity this operation mutates.
    pub entity_id: Uuid,
    /// The kind of mutation.
    pub kind: OpKind,
    /// Fields touched by the mutation. Empty for deletes.
    pub data: PayloadPatch,
    /// Payload snapshot the client saw when the op was created.
    ///
    /// Enables field-level three-way comparison in the conflict resolver;
    /// absent for creates (no base exists) and the resolver falls back to
    /// whole-record last-write-wins without it.
    pub base: Option<Payload>,
    /// Entity version the client believed was current at creation time.
    pub base_version: i64,
    /// When the op was created locally.
    pub created_at: DateTime<Utc>,
}

impl Operation {
    /// Creates a create-operation from a freshly built entity.
    pub fn create(entity: &Entity, now: DateTime<Utc>) -> Self {
        Operation {
            op_id: Uuid::new_v4(),
            entity_id: entity.id,
            kind: OpKind::Create,
            data: PayloadPatch::from_payload(&entity.payload),
            base: None,
            base_version: 0,
            created_at: now,
        }
    }

    /// Creates an update-operation against the given entity snapshot.
    pub fn update(entity: &Entity, data: PayloadPatch, now: DateTime<Utc>) -> Self {
        Operation {
            op_id: Uuid::new_v4(),
            entity_id: entity.id,
            kind: OpKind::Update,
            data,
            base: Some(entity.payload.clone()),
            base_version: entity.version,
            created_at: now,
        }
    }

    /// Creates a delete-operation against the given entity snapshot.
    pub fn delete(entity: &Entity, now: DateTime<Utc>) -> Self {
        Operation {
            op_id: Uuid::new_v4(),
            entity_id: entity.id,
            kind: OpKind::Delete,
            data: PayloadPatch::default(),
            base: Some(entity.payload.clone()),
            base_version: entity.version,
            created_at: now,
        }
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
