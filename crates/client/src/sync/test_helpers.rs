// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use gl_core::{Entity, LocalStore, Payload, SyncStatus};

use super::monitor::NetworkMonitor;
use super::queue::OperationQueue;

/// Fixed reference instant used across sync tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

/// A simple payload for the given headword.
pub fn payload(text: &str) -> Payload {
    Payload::new(text, format!("{text} (en)"))
}

/// An entity already acknowledged by the server at the given version.
pub fn synced_entity(text: &str, version: i64) -> Entity {
    let mut entity = Entity::new(payload(text), t0());
    entity.version = version;
    entity.sync_status = SyncStatus::Synced;
    entity
}

/// A fresh in-memory store behind the shared-handle type the engine
/// expects.
pub fn shared_store() -> Arc<Mutex<LocalStore>> {
    Arc::new(Mutex::new(LocalStore::open_in_memory().unwrap()))
}

/// A queue persisted inside the given temp dir.
pub fn shared_queue(dir: &tempfile::TempDir) -> Arc<Mutex<OperationQueue>> {
    let path = dir.path().join("queue.jsonl");
    Arc::new(Mutex::new(OperationQueue::open(&path).unwrap()))
}

/// A monitor that already believes it is online.
pub fn online_monitor() -> NetworkMonitor {
    let monitor = NetworkMonitor::new().with_probe_timeout(Duration::from_millis(100));
    monitor.report_reachable(true);
    monitor
}

/// Engine config with timeouts short enough for tests.
pub fn fast_config() -> super::engine::SyncConfig {
    super::engine::SyncConfig {
        url: "ws://mock".to_string(),
        batch_size: 10,
        request_timeout: Duration::from_millis(200),
        heartbeat: Duration::from_millis(50),
        backoff_initial: Duration::from_millis(10),
        backoff_max: Duration::from_millis(100),
    }
}
