// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire messages for client-server communication.
//!
//! The protocol is simple:
//! - Client pushes operations and pulls changes since a checkpoint
//! - Server answers each request and may stream unsolicited change
//!   notifications; clients without the stream degrade to polling

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checkpoint::Checkpoint;
use crate::entity::Entity;
use crate::op::Operation;

/// A single remote change returned by a pull or streamed by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteChange {
    /// The server's current view of the entity.
    pub entity: Entity,
    /// True if the entity was deleted (the payload is the tombstone's last
    /// known state).
    pub deleted: bool,
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Push one operation.
    ///
    /// The server upserts keyed by `op_id` (idempotent on retry) and always
    /// answers with its current view of the entity.
    Push { op: Operation },

    /// Request changes strictly after the given checkpoint.
    Pull { since: Checkpoint },

    /// Ping message for the reachability probe.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Response to a Push request.
    PushResponse {
        /// Echoed from the pushed operation.
        op_id: Uuid,
        /// True if the op was applied as-is; false means the client's
        /// `base_version` no longer matches and `current` carries the
        /// server's copy for conflict resolution.
        accepted: bool,
        /// The server's current view of the entity after the push attempt.
        ///
        /// `None` only when the entity does not exist server-side (e.g. the
        /// push deleted it, or a delete raced a delete).
        current: Option<Entity>,
        /// Server time of the response.
        server_time: DateTime<Utc>,
    },

    /// Response to a Pull request.
    PullResponse {
        /// Changes strictly after the requested checkpoint, in sequence
        /// order.
        changes: Vec<RemoteChange>,
        /// New high-water mark to persist after merging all changes.
        checkpoint: Checkpoint,
    },

    /// Unsolicited change notification (streaming feed).
    ///
    /// Advisory only: clients treat it as a hint to pull, never as a
    /// substitute for the checkpointed pull.
    Change(RemoteChange),

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },

    /// The pushed operation was permanently rejected (payload shape).
    ///
    /// Never retried: retrying an invalid operation can never succeed.
    Rejected {
        /// The offending operation.
        op_id: Uuid,
        /// Human-readable reason.
        message: String,
    },
}

impl ClientMessage {
    /// Creates a Push message.
    pub fn push(op: Operation) -> Self {
        ClientMessage::Push { op }
    }

    /// Creates a Pull message.
    pub fn pull(since: Checkpoint) -> Self {
        ClientMessage::Pull { since }
    }

    /// Creates a Ping message.
    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates a PushResponse message.
    pub fn push_response(
        op_id: Uuid,
        accepted: bool,
        current: Option<Entity>,
        server_time: DateTime<Utc>,
    ) -> Self {
        ServerMessage::PushResponse {
            op_id,
            accepted,
            current,
            server_time,
        }
    }

    /// Creates a PullResponse message.
    pub fn pull_response(changes: Vec<RemoteChange>, checkpoint: Checkpoint) -> Self {
        ServerMessage::PullResponse {
            changes,
            checkpoint,
        }
    }

    /// Creates a Change notification.
    pub fn change(entity: Entity, deleted: bool) -> Self {
        ServerMessage::Change(RemoteChange { entity, deleted })
    }

    /// Creates a Pong message.
    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    /// Creates a Rejected message.
    pub fn rejected(op_id: Uuid, message: impl Into<String>) -> Self {
        ServerMessage::Rejected {
            op_id,
            message: message.into(),
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
