// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync module for local-first replication against the gloss server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Engine    │────►│  Transport  │────►│   Remote    │
//! │ (SyncEngine)│◄────│   (trait)   │◄────│   Server    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!    │         │
//!    ▼         ▼
//! ┌─────────┐ ┌──────────┐     ┌──────────┐
//! │  Queue  │ │ Resolver │     │ Monitor  │
//! │ (JSONL) │ │ (pure)   │     │ (online?)│
//! └─────────┘ └──────────┘     └──────────┘
//! ```
//!
//! # Features
//!
//! - WebSocket connection to the gloss server
//! - Durable operation queue with persisted JSONL storage and
//!   per-operation retry backoff
//! - Pull-then-push sync cycles with field-level conflict resolution
//! - Connectivity monitor combining OS-level connectivity with an
//!   application-level ping/pong reachability probe
//! - Injectable transport trait for testing

mod engine;
mod monitor;
mod queue;
mod resolver;
mod transport;

pub use engine::{ConflictNotice, CycleSummary, SyncConfig, SyncEngine, SyncError, SyncState};
pub use monitor::NetworkMonitor;
pub use queue::{OperationQueue, QueueEntryState, QueueError, QueueResult, QueuedOp};
pub use resolver::{resolve, Resolution};
pub use transport::{Transport, TransportError, TransportResult, WebSocketTransport};

#[cfg(test)]
mod test_helpers;



#[cfg(test)]
mod monitor_tests;
