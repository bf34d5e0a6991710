// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed local store for entities and the sync checkpoint.
//!
//! The [`LocalStore`] is the embedded, transactional store the client works
//! against while offline. It holds one row per entity (payload fields,
//! review columns, sync metadata) plus a single-row checkpoint table. All
//! reads and writes are fast and non-suspending; callers serialize access
//! through a single mutual-exclusion point.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::checkpoint::Checkpoint;
use crate::entity::{Entity, Payload, SyncStatus};
use crate::error::{Error, Result};
use crate::op::PayloadPatch;
use crate::protocol::RemoteChange;
use crate::review::ReviewState;
use crate::scheduler;

/// SQL schema for the local store.
pub const SCHEMA: &str = r#"
-- One row per vocabulary entity, review columns nullable as a group
CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    translation TEXT NOT NULL,
    context TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    mastery_level INTEGER,
    times_encountered INTEGER,
    times_correct INTEGER,
    last_reviewed_at TEXT,
    next_review_at TEXT,
    version INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    sync_status TEXT NOT NULL DEFAULT 'pending'
);

CREATE INDEX IF NOT EXISTS idx_entities_next_review ON entities(next_review_at);
CREATE INDEX IF NOT EXISTS idx_entities_sync_status ON entities(sync_status);

-- Single-row pull cursor
CREATE TABLE IF NOT EXISTS checkpoint (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    server_seq INTEGER NOT NULL,
    pulled_at TEXT NOT NULL
);
"#;

const ENTITY_COLUMNS: &str = "id, text, translation, context, tags, mastery_level, \
     times_encountered, times_correct, last_reviewed_at, next_review_at, \
     version, updated_at, sync_status";

/// Parse a string value from the database, returning a rusqlite error on parse failure.
fn parse_db<T: std::str::FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid value '{value}' in column '{column}'"
            ))),
        )
    })
}

/// Parse an RFC3339 timestamp from the database.
fn parse_timestamp(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(Error::CorruptedData(format!(
                    "invalid timestamp '{value}' in column '{column}'"
                ))),
            )
        })
}

/// Parse a JSON-encoded tag set from the database.
fn parse_tags(value: &str) -> std::result::Result<std::collections::BTreeSet<String>, rusqlite::Error> {
    serde_json::from_str(value).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!("invalid tags '{value}'"))),
        )
    })
}

/// Counts of entities per sync status, for the non-blocking UI indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub syncing: usize,
    pub synced: usize,
    pub conflict: usize,
}

/// SQLite connection with local-store operations.
pub struct LocalStore {
    /// The underlying SQLite connection.
    pub conn: Connection,
}

impl LocalStore {
    /// Open a store at the given path, creating the schema if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(LocalStore { conn })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(LocalStore { conn })
    }

    // ========================================================================
    // Entity operations
    // ========================================================================

    /// Inserts a new entity.
    pub fn insert_entity(&self, entity: &Entity) -> Result<()> {
        self.write_row(entity, false)
    }

    /// Returns the entity with the given id.
    pub fn get_entity(&self, id: Uuid) -> Result<Entity> {
        self.try_get_entity(id)?
            .ok_or_else(|| Error::EntityNotFound(id.to_string()))
    }

    /// Returns the entity with the given id, or `None` if absent.
    pub fn try_get_entity(&self, id: Uuid) -> Result<Option<Entity>> {
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?1");
        let entity = self
            .conn
            .query_row(&sql, params![id.to_string()], row_to_entity)
            .optional()?;
        Ok(entity)
    }

    /// Returns true if the entity exists.
    pub fn entity_exists(&self, id: Uuid) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Returns all entities ordered by `updated_at` descending.
    pub fn list_entities(&self) -> Result<Vec<Entity>> {
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities ORDER BY updated_at DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_entity)?;
        let mut entities = Vec::new();
        for row in rows {
            entities.push(row?);
        }
        Ok(entities)
    }

    /// Applies a local patch optimistically: payload updated, status back to
    /// `Pending`, version untouched (versions are assigned by the server).
    pub fn apply_patch(&self, id: Uuid, patch: &PayloadPatch, now: DateTime<Utc>) -> Result<Entity> {
        let mut entity = self.get_entity(id)?;
        entity.payload = patch.apply_to(&entity.payload);
        entity.updated_at = now;
        entity.sync_status = SyncStatus::Pending;
        self.write_row(&entity, true)?;
        Ok(entity)
    }

    /// Deletes the entity locally. Returns true if a row was removed.
    pub fn delete_entity(&self, id: Uuid) -> Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM entities WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Sets the sync status of an entity.
    pub fn set_sync_status(&self, id: Uuid, status: SyncStatus) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE entities SET sync_status = ?1 WHERE id = ?2",
            params![status.as_str(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::EntityNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Records a server acknowledgement: new version, status `Synced`.
    pub fn mark_synced(&self, id: Uuid, version: i64, now: DateTime<Utc>) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE entities SET version = ?1, updated_at = ?2, sync_status = ?3 WHERE id = ?4",
            params![
                version,
                now.to_rfc3339(),
                SyncStatus::Synced.as_str(),
                id.to_string()
            ],
        )?;
        if changed == 0 {
            return Err(Error::EntityNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Replaces an entity wholesale (resolution outcomes).
    pub fn put_entity(&self, entity: &Entity) -> Result<()> {
        self.write_row(entity, true)
    }

    /// Merges one pulled remote change into the store.
    ///
    /// Entities with local pending edits or an unresolved conflict keep
    /// their local payload (the push phase resolves them against the
    /// server); only the version advances. Everything else adopts the
    /// server copy, and tombstones remove the row.
    pub fn apply_remote(&self, change: &RemoteChange) -> Result<()> {
        if change.deleted {
            self.delete_entity(change.entity.id)?;
            return Ok(());
        }

        match self.try_get_entity(change.entity.id)? {
            Some(local)
                if matches!(
                    local.sync_status,
                    SyncStatus::Pending | SyncStatus::Conflict
                ) =>
            {
                self.conn.execute(
                    "UPDATE entities SET version = ?1 WHERE id = ?2",
                    params![change.entity.version, local.id.to_string()],
                )?;
                Ok(())
            }
            Some(_) | None => {
                let mut entity = change.entity.clone();
                entity.sync_status = SyncStatus::Synced;
                self.write_row(&entity, true)
            }
        }
    }

    // ========================================================================
    // Review queries
    // ========================================================================

    /// Returns up to `limit` due items in scheduler priority order.
    ///
    /// Strictly-overdue items always rank above merely-due items; ties break
    /// by due time ascending, then id ascending for full determinism.
    pub fn due_items(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Entity>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE next_review_at IS NOT NULL AND next_review_at <= ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![now.to_rfc3339()], row_to_entity)?;

        let mut due: Vec<Entity> = Vec::new();
        for row in rows {
            due.push(row?);
        }

        due.sort_by(|a, b| match (&a.payload.review, &b.payload.review) {
            (Some(ra), Some(rb)) => scheduler::compare_due(ra, rb, now)
                .then_with(|| a.id.cmp(&b.id)),
            _ => a.id.cmp(&b.id),
        });
        due.truncate(limit);
        Ok(due)
    }

    /// Returns per-status entity counts.
    pub fn status_counts(&self) -> Result<StatusCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT sync_status, COUNT(*) FROM entities GROUP BY sync_status")?;
        let rows = stmt.query_map([], |row| {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((status, count))
        })?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, count) = row?;
            let count = usize::try_from(count).unwrap_or(0);
            match status.parse::<SyncStatus>() {
                Ok(SyncStatus::Pending) => counts.pending = count,
                Ok(SyncStatus::Syncing) => counts.syncing = count,
                Ok(SyncStatus::Synced) => counts.synced = count,
                Ok(SyncStatus::Conflict) => counts.conflict = count,
                Err(_) => return Err(Error::CorruptedData(format!("sync status '{status}'"))),
            }
        }
        Ok(counts)
    }

    // ========================================================================
    // Checkpoint
    // ========================================================================

    /// Returns the persisted checkpoint, or the origin if none exists.
    pub fn checkpoint(&self) -> Result<Checkpoint> {
        let row = self
            .conn
            .query_row(
                "SELECT server_seq, pulled_at FROM checkpoint WHERE id = 1",
                [],
                |row| {
                    let server_seq: i64 = row.get(0)?;
                    let pulled_at: String = row.get(1)?;
                    let pulled_at = parse_timestamp(&pulled_at, "pulled_at")?;
                    Ok(Checkpoint {
                        server_seq,
                        pulled_at,
                    })
                },
            )
            .optional()?;
        Ok(row.unwrap_or_else(Checkpoint::origin))
    }

    /// Persists the checkpoint.
    pub fn set_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.conn.execute(
            "INSERT INTO checkpoint (id, server_seq, pulled_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET server_seq = ?1, pulled_at = ?2",
            params![checkpoint.server_seq, checkpoint.pulled_at.to_rfc3339()],
        )?;
        Ok(())
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn write_row(&self, entity: &Entity, replace: bool) -> Result<()> {
        let verb = if replace {
            "INSERT OR REPLACE"
        } else {
            "INSERT"
        };
        let sql = format!(
            "{verb} INTO entities \
             (id, text, translation, context, tags, mastery_level, \
              times_encountered, times_correct, last_reviewed_at, next_review_at, \
              version, updated_at, sync_status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        );

        let tags = serde_json::to_string(&entity.payload.tags)?;
        let review = entity.payload.review.as_ref();
        self.conn.execute(
            &sql,
            params![
                entity.id.to_string(),
                entity.payload.text,
                entity.payload.translation,
                entity.payload.context,
                tags,
                review.map(|r| i64::from(r.mastery_level)),
                review.map(|r| i64::from(r.times_encountered)),
                review.map(|r| i64::from(r.times_correct)),
                review.map(|r| r.last_reviewed_at.to_rfc3339()),
                review.map(|r| r.next_review_at.to_rfc3339()),
                entity.version,
                entity.updated_at.to_rfc3339(),
                entity.sync_status.as_str(),
            ],
        )?;
        Ok(())
    }
}

/// Maps a full entity row to an [`Entity`].
fn row_to_entity(row: &rusqlite::Row<'_>) -> std::result::Result<Entity, rusqlite::Error> {
    let id: String = row.get(0)?;
    let text: String = row.get(1)?;
    let translation: String = row.get(2)?;
    let context: Option<String> = row.get(3)?;
    let tags: String = row.get(4)?;
    let mastery_level: Option<i64> = row.get(5)?;
    let times_encountered: Option<i64> = row.get(6)?;
    let times_correct: Option<i64> = row.get(7)?;
    let last_reviewed_at: Option<String> = row.get(8)?;
    let next_review_at: Option<String> = row.get(9)?;
    let version: i64 = row.get(10)?;
    let updated_at: String = row.get(11)?;
    let sync_status: String = row.get(12)?;

    let review = match (mastery_level, last_reviewed_at, next_review_at) {
        (Some(level), Some(last), Some(next)) => Some(ReviewState {
            mastery_level: u8::try_from(level).unwrap_or(0),
            times_encountered: u32::try_from(times_encountered.unwrap_or(0)).unwrap_or(0),
            times_correct: u32::try_from(times_correct.unwrap_or(0)).unwrap_or(0),
            last_reviewed_at: parse_timestamp(&last, "last_reviewed_at")?,
            next_review_at: parse_timestamp(&next, "next_review_at")?,
        }),
        _ => None,
    };

    Ok(Entity {
        id: parse_db(&id, "id")?,
        payload: Payload {
            text,
            translation,
            context,
            tags: parse_tags(&tags)?,
            review,
        },
        version,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
        sync_status: parse_db(&sync_status, "sync_status")?,
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
