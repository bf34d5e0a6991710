// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync checkpoint: the cursor marking the last remote change merged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted cursor for incremental pulls.
///
/// The server assigns a monotonically increasing sequence number to every
/// change; pulls request changes strictly after `server_seq`. Re-pulling
/// with the same checkpoint is safe (the pull endpoint is idempotent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Server-assigned sequence number of the last merged change.
    pub server_seq: i64,
    /// Wall-clock time of the last successful pull.
    pub pulled_at: DateTime<Utc>,
}

impl Checkpoint {
    /// The checkpoint of a client that has never pulled.
    pub fn origin() -> Self {
        Checkpoint {
            server_seq: 0,
            pulled_at: DateTime::UNIX_EPOCH,
        }
    }

    /// Returns true if this checkpoint is strictly ahead of the other.
    pub fn is_after(&self, other: &Checkpoint) -> bool {
        self.server_seq > other.server_seq
    }
}
