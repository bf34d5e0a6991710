// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error type for the client facade.

use crate::sync::QueueError;

/// Error type for handle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error from the core data layer.
    #[error(transparent)]
    Core(#[from] gl_core::Error),

    /// Error from the operation queue.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Result type for handle operations.
pub type Result<T> = std::result::Result<T, Error>;
