// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! gl-core: Shared library for the gloss vocabulary trainer
//!
//! This crate provides the core data structures, the local SQLite store,
//! the spaced-repetition scheduler, and the wire protocol consumed by the
//! gl-client sync engine.

pub mod checkpoint;
pub mod clock;
pub mod entity;
pub mod error;
pub mod op;
pub mod protocol;
pub mod review;
pub mod scheduler;
pub mod store;

pub use checkpoint::Checkpoint;
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use entity::{Entity, Payload, SyncStatus};
pub use error::{Error, Result};
pub use op::{OpKind, Operation, PayloadPatch};
pub use protocol::{ClientMessage, RemoteChange, ServerMessage};
pub use review::{ReviewState, MAX_MASTERY_LEVEL};
pub use store::{LocalStore, StatusCounts};
