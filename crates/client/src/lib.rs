// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side runtime for the gloss vocabulary trainer.
//!
//! Wraps the core data model with everything a device needs to work
//! offline-first: a durable operation queue, a connectivity monitor,
//! a conflict resolver and the sync engine that drives a WebSocket
//! session against the gloss server. The [`Handle`] type is the facade
//! the UI layer talks to.

pub mod error;
pub mod handle;
pub mod sync;

pub use error::{Error, Result};
pub use handle::Handle;
pub use sync::{
    ConflictNotice, CycleSummary, NetworkMonitor, OperationQueue, QueuedOp, Resolution, SyncConfig,
    SyncEngine, SyncError, SyncState, Transport, WebSocketTransport,
};
