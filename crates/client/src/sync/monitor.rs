// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity monitor for the sync engine.
//!
//! Combines two signals into a single "online" flag:
//! - connectivity: what the operating system reports (set by the
//!   embedding application)
//! - reachability: whether the gloss server actually answered an
//!   application-level ping recently
//!
//! Both must hold for the engine to attempt sync. Interested parties
//! subscribe to a watch channel and get woken on every transition.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gl_core::protocol::{ClientMessage, ServerMessage};
use tokio::sync::watch;

use super::transport::Transport;

/// Default interval between reachability probes.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

/// Default time to wait for a pong before declaring the server unreachable.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

struct Inner {
    connectivity: AtomicBool,
    reachable: AtomicBool,
    probe_seq: AtomicU64,
    online_tx: watch::Sender<bool>,
}

/// Shared connectivity state.
///
/// Cheap to clone; all clones observe and update the same state, so the
/// UI thread can flip connectivity while the engine is mid-cycle.
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<Inner>,
    probe_timeout: Duration,
}

impl NetworkMonitor {
    /// Create a monitor that assumes connectivity but has not yet
    /// confirmed the server is reachable.
    pub fn new() -> Self {
        let (online_tx, _) = watch::channel(false);
        NetworkMonitor {
            inner: Arc::new(Inner {
                connectivity: AtomicBool::new(true),
                reachable: AtomicBool::new(false),
                probe_seq: AtomicU64::new(0),
                online_tx,
            }),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Override the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Whether both connectivity and reachability currently hold.
    pub fn is_online(&self) -> bool {
        self.inner.connectivity.load(Ordering::SeqCst)
            && self.inner.reachable.load(Ordering::SeqCst)
    }

    /// The OS-level connectivity signal.
    pub fn connectivity(&self) -> bool {
        self.inner.connectivity.load(Ordering::SeqCst)
    }

    /// Record a change in OS-level connectivity.
    pub fn set_connectivity(&self, connected: bool) {
        self.inner.connectivity.store(connected, Ordering::SeqCst);
        if !connected {
            // Reachability cannot outlive the link it was observed on
            self.inner.reachable.store(false, Ordering::SeqCst);
        }
        self.publish();
    }

    /// Record the outcome of a reachability observation.
    ///
    /// The engine calls this from probe results and from transport
    /// failures noticed during normal traffic.
    pub fn report_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
        self.publish();
    }

    /// Subscribe to online/offline transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.online_tx.subscribe()
    }

    /// Probe the server with an application-level ping.
    ///
    /// Waits up to the probe timeout for the matching pong; unrelated
    /// frames arriving in between are skipped. Updates reachability and
    /// returns the new online state.
    pub async fn probe<T: Transport + ?Sized>(&self, transport: &mut T) -> bool {
        let id = self.inner.probe_seq.fetch_add(1, Ordering::Relaxed);
        let outcome = tokio::time::timeout(self.probe_timeout, async {
            if transport.send(ClientMessage::ping(id)).await.is_err() {
                return false;
            }
            loop {
                match transport.recv().await {
                    Ok(Some(ServerMessage::Pong { id: got })) if got == id => return true,
                    Ok(Some(_)) => continue,
                    _ => return false,
                }
            }
        })
        .await;

        let reachable = matches!(outcome, Ok(true));
        if !reachable {
            tracing::debug!(probe = id, "reachability probe failed");
        }
        self.report_reachable(reachable);
        self.is_online()
    }

    fn publish(&self) {
        let online = self.is_online();
        self.inner.online_tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}
