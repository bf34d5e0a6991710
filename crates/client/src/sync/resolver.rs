// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pure conflict resolution for rejected push operations.
//!
//! When the server rejects an operation because the entity changed
//! underneath it, the resolver decides what the local replica should
//! do. Decisions are a pure function of the operation and the server's
//! current copy, so every replica facing the same conflict reaches the
//! same verdict.
//!
//! Updates that carry a base snapshot get a field-level three-way
//! merge: tag sets union, review counters take the max, review
//! scheduling follows the most recent review, and scalar fields keep
//! whichever side diverged from the base. Only a scalar field edited
//! differently on both sides is surfaced to the user. Operations
//! without a base fall back to last-writer-wins on the whole record,
//! with ties going to the server.

use std::cmp::Ordering;

use gl_core::{Entity, OpKind, Operation, Payload, ReviewState};

/// Outcome of resolving one rejected operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The local change stands; re-push it rebased on the server copy.
    UseLocal(Payload),
    /// The server copy stands; adopt it and drop the local change.
    UseRemote(Payload),
    /// Both sides contributed; store and re-push the combined payload.
    Merged(Payload),
    /// A scalar field was edited differently on both sides; the user
    /// must pick.
    DeferToUser {
        /// What this replica wanted.
        local: Payload,
        /// What the server currently holds.
        remote: Payload,
    },
}

/// Resolve a rejected operation against the server's current entity.
pub fn resolve(op: &Operation, remote: &Entity) -> Resolution {
    if op.base_version == remote.version {
        // Not a true conflict; the rejection was about something else
        // (for example a stale session). The local intent stands.
        let base = op.base.as_ref().unwrap_or(&remote.payload);
        return Resolution::UseLocal(op.data.apply_to(base));
    }

    if op.kind == OpKind::Delete {
        // Deletes cannot be merged field by field; last writer wins.
        return if op.created_at > remote.updated_at {
            Resolution::UseLocal(remote.payload.clone())
        } else {
            Resolution::UseRemote(remote.payload.clone())
        };
    }

    match &op.base {
        Some(base) => {
            let local = op.data.apply_to(base);
            match three_way(base, &local, &remote.payload) {
                Some(merged) => classify(merged, &local, &remote.payload),
                None => Resolution::DeferToUser {
                    local,
                    remote: remote.payload.clone(),
                },
            }
        }
        None => {
            // No base to diff against (concurrent create of the same
            // id, or a patch from an older client). Whole-record LWW,
            // keeping the mergeable fields merged.
            let local = op.data.apply_to(&remote.payload);
            let mut winner = if op.created_at > remote.updated_at {
                local.clone()
            } else {
                remote.payload.clone()
            };
            winner.tags = local.tags.union(&remote.payload.tags).cloned().collect();
            winner.review = merge_review(local.review.as_ref(), remote.payload.review.as_ref());
            classify(winner, &local, &remote.payload)
        }
    }
}

fn classify(merged: Payload, local: &Payload, remote: &Payload) -> Resolution {
    if merged == *remote {
        Resolution::UseRemote(merged)
    } else if merged == *local {
        Resolution::UseLocal(merged)
    } else {
        Resolution::Merged(merged)
    }
}

/// Field-level three-way merge. Returns `None` when a scalar field was
/// edited differently on both sides.
fn three_way(base: &Payload, local: &Payload, remote: &Payload) -> Option<Payload> {
    Some(Payload {
        text: scalar(&base.text, &local.text, &remote.text)?.clone(),
        translation: scalar(&base.translation, &local.translation, &remote.translation)?.clone(),
        context: scalar(&base.context, &local.context, &remote.context)?.clone(),
        tags: local.tags.union(&remote.tags).cloned().collect(),
        review: merge_review(local.review.as_ref(), remote.review.as_ref()),
    })
}

/// Merge one scalar field: an unchanged side yields to the other.
fn scalar<'a, T: PartialEq>(base: &T, local: &'a T, remote: &'a T) -> Option<&'a T> {
    if local == base {
        Some(remote)
    } else if remote == base || local == remote {
        Some(local)
    } else {
        None
    }
}

/// Merge review state: counters take the max, scheduling follows the
/// most recent review. Never defers.
fn merge_review(local: Option<&ReviewState>, remote: Option<&ReviewState>) -> Option<ReviewState> {
    match (local, remote) {
        (None, None) => None,
        (Some(l), None) => Some(l.clone()),
        (None, Some(r)) => Some(r.clone()),
        (Some(l), Some(r)) => {
            let newest = match l.last_reviewed_at.cmp(&r.last_reviewed_at) {
                Ordering::Greater => l,
                _ => r,
            };
            Some(ReviewState {
                mastery_level: newest.mastery_level,
                times_encountered: l.times_encountered.max(r.times_encountered),
                times_correct: l.times_correct.max(r.times_correct),
                last_reviewed_at: newest.last_reviewed_at,
                next_review_at: newest.next_review_at,
            })
        }
    }
}
