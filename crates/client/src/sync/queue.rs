// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable queue for operations awaiting transmission.
//!
//! Uses JSONL format for durability - each entry is written as a single
//! line and fsynced immediately. Entries keep FIFO order per entity so
//! that dependent mutations are never reordered on the wire. Failed
//! transmissions are retried with exponential backoff until a retry
//! ceiling moves them to the `Failed` state for explicit user handling.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use gl_core::Operation;
use rand::Rng;
use uuid::Uuid;

/// Error type for queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation not found in the queue.
    #[error("operation not found in queue: {0}")]
    OpNotFound(Uuid),
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Default number of retries before an entry is marked failed.
pub const DEFAULT_RETRY_CEILING: u32 = 5;

const BACKOFF_BASE_MS: i64 = 1_000;
const BACKOFF_CAP_MS: i64 = 60_000;
const BACKOFF_JITTER_MS: i64 = 250;

/// Lifecycle state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEntryState {
    /// Awaiting transmission (possibly delayed by retry backoff).
    Pending,
    /// Gave up after exhausting retries or a server rejection.
    Failed,
}

/// A queued operation with its retry bookkeeping.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QueuedOp {
    /// The operation to transmit.
    pub op: Operation,
    /// Number of failed transmission attempts so far.
    pub retry_count: u32,
    /// Earliest time the next attempt may happen, if backed off.
    pub next_eligible_at: Option<DateTime<Utc>>,
    /// Entry lifecycle state.
    pub state: QueueEntryState,
    /// Message from the most recent failure, if any.
    pub last_error: Option<String>,
}

/// Durable FIFO queue of operations.
///
/// Entries are stored in a JSONL file, one entry per line. Appends are
/// fsynced; state changes rewrite the file.
#[derive(Debug)]
pub struct OperationQueue {
    /// Path to the queue file.
    path: PathBuf,
    /// In-memory mirror of the file, in FIFO order.
    entries: Vec<QueuedOp>,
    /// Retries allowed before an entry is marked failed.
    retry_ceiling: u32,
}

impl OperationQueue {
    /// Create or open a queue at the given path.
    pub fn open(path: &Path) -> QueueResult<Self> {
        OpenOptions::new().create(true).append(true).open(path)?;

        let mut entries = Vec::new();
        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: QueuedOp = serde_json::from_str(&line)?;
            entries.push(entry);
        }

        Ok(OperationQueue {
            path: path.to_path_buf(),
            entries,
            retry_ceiling: DEFAULT_RETRY_CEILING,
        })
    }

    /// Override the retry ceiling.
    pub fn with_retry_ceiling(mut self, ceiling: u32) -> Self {
        self.retry_ceiling = ceiling;
        self
    }

    /// Number of entries, including failed ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the queue has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries still awaiting transmission.
    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == QueueEntryState::Pending)
            .count()
    }

    /// All entries, in FIFO order.
    pub fn entries(&self) -> &[QueuedOp] {
        &self.entries
    }

    /// Entries that exhausted their retries or were rejected.
    pub fn failed(&self) -> Vec<&QueuedOp> {
        self.entries
            .iter()
            .filter(|e| e.state == QueueEntryState::Failed)
            .collect()
    }

    /// Whether any pending entry targets the given entity.
    pub fn has_pending_for(&self, entity_id: Uuid) -> bool {
        self.entries
            .iter()
            .any(|e| e.state == QueueEntryState::Pending && e.op.entity_id == entity_id)
    }

    /// Append an operation to the queue.
    ///
    /// The entry is immediately persisted to disk. Returns `false` if an
    /// entry with the same operation id is already queued.
    pub fn enqueue(&mut self, op: &Operation) -> QueueResult<bool> {
        if self.entries.iter().any(|e| e.op.op_id == op.op_id) {
            return Ok(false);
        }

        let entry = QueuedOp {
            op: op.clone(),
            retry_count: 0,
            next_eligible_at: None,
            state: QueueEntryState::Pending,
            last_error: None,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let json = serde_json::to_string(&entry)?;
        writeln!(file, "{}", json)?;
        file.sync_all()?;

        self.entries.push(entry);
        Ok(true)
    }

    /// Take up to `batch` pending operations that are eligible at `now`.
    ///
    /// Entries are returned in FIFO order. If the oldest unsettled entry
    /// for an entity is still backed off or failed, every younger entry
    /// for that entity is held back too, so per-entity ordering survives
    /// retries.
    pub fn drain(&self, batch: usize, now: DateTime<Utc>) -> Vec<Operation> {
        let mut held_back: HashSet<Uuid> = HashSet::new();
        let mut ops = Vec::new();

        for entry in &self.entries {
            if ops.len() >= batch {
                break;
            }
            if entry.state == QueueEntryState::Failed {
                // A failed entry parks its entity until the user retries
                // or discards it; younger operations must not overtake.
                held_back.insert(entry.op.entity_id);
                continue;
            }
            if held_back.contains(&entry.op.entity_id) {
                continue;
            }
            let eligible = entry.next_eligible_at.is_none_or(|t| t <= now);
            if eligible {
                ops.push(entry.op.clone());
            } else {
                held_back.insert(entry.op.entity_id);
            }
        }

        ops
    }

    /// Remove an entry after the server acknowledged it.
    pub fn mark_complete(&mut self, op_id: Uuid) -> QueueResult<()> {
        let idx = self.position(op_id)?;
        self.entries.remove(idx);
        self.rewrite()
    }

    /// Record a failed transmission attempt.
    ///
    /// The entry is scheduled for a later attempt with exponential
    /// backoff, or marked failed once the retry ceiling is exceeded.
    /// Returns the resulting entry state.
    pub fn requeue(
        &mut self,
        op_id: Uuid,
        error: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<QueueEntryState> {
        let ceiling = self.retry_ceiling;
        let idx = self.position(op_id)?;
        let entry = &mut self.entries[idx];

        entry.retry_count += 1;
        entry.last_error = Some(error.to_string());

        if entry.retry_count > ceiling {
            entry.state = QueueEntryState::Failed;
            entry.next_eligible_at = None;
            tracing::warn!(%op_id, retries = entry.retry_count, "operation exhausted retries");
        } else {
            let jitter = Duration::milliseconds(
                rand::thread_rng().gen_range(0..=BACKOFF_JITTER_MS),
            );
            entry.next_eligible_at = Some(now + backoff_delay(entry.retry_count) + jitter);
        }

        let state = entry.state;
        self.rewrite()?;
        Ok(state)
    }

    /// Mark an entry failed without further retries.
    ///
    /// Used when the server rejected the operation outright.
    pub fn mark_failed(&mut self, op_id: Uuid, error: &str) -> QueueResult<()> {
        let idx = self.position(op_id)?;
        let entry = &mut self.entries[idx];
        entry.state = QueueEntryState::Failed;
        entry.next_eligible_at = None;
        entry.last_error = Some(error.to_string());
        self.rewrite()
    }

    /// Put a failed entry back into rotation with a fresh retry budget.
    pub fn retry_failed(&mut self, op_id: Uuid) -> QueueResult<()> {
        let idx = self.position(op_id)?;
        let entry = &mut self.entries[idx];
        entry.state = QueueEntryState::Pending;
        entry.retry_count = 0;
        entry.next_eligible_at = None;
        entry.last_error = None;
        self.rewrite()
    }

    /// Drop an entry without transmitting it.
    pub fn discard(&mut self, op_id: Uuid) -> QueueResult<()> {
        let idx = self.position(op_id)?;
        self.entries.remove(idx);
        self.rewrite()
    }

    fn position(&self, op_id: Uuid) -> QueueResult<usize> {
        self.entries
            .iter()
            .position(|e| e.op.op_id == op_id)
            .ok_or(QueueError::OpNotFound(op_id))
    }

    fn rewrite(&self) -> QueueResult<()> {
        let mut file = File::create(&self.path)?;
        for entry in &self.entries {
            let json = serde_json::to_string(entry)?;
            writeln!(file, "{}", json)?;
        }
        file.sync_all()?;
        Ok(())
    }
}

/// Backoff delay before the nth retry, without jitter.
///
/// Doubles from one second per attempt, capped at one minute.
pub(super) fn backoff_delay(retry_count: u32) -> Duration {
    let exp = retry_count.saturating_sub(1).min(10);
    let ms = BACKOFF_BASE_MS.saturating_mul(1_i64 << exp);
    Duration::milliseconds(ms.min(BACKOFF_CAP_MS))
}
