// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for gl-core operations.

use thiserror::Error;

/// All possible errors that can occur in gl-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("invalid sync status: '{0}'\n  hint: valid statuses are: pending, syncing, synced, conflict")]
    InvalidSyncStatus(String),

    #[error("invalid operation kind: '{0}'\n  hint: valid kinds are: create, update, delete")]
    InvalidOpKind(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid id: {0}")]
    InvalidId(#[from] uuid::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for gl-core operations.
pub type Result<T> = std::result::Result<T, Error>;
