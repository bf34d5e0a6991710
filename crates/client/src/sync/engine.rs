// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync engine driving replication between the local store and the
//! gloss server.
//!
//! A sync cycle pulls remote changes first, then pushes queued
//! operations in FIFO order. Rejected pushes go through the resolver;
//! merged outcomes are re-pushed rebased on the server copy, and
//! undecidable conflicts park the entity in the `Conflict` state until
//! the user picks a side. Transient failures never escape a cycle:
//! they requeue the operation or put the engine into backoff.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use gl_core::protocol::{ClientMessage, ServerMessage};
use gl_core::{
    ClockSource, Entity, LocalStore, OpKind, Operation, Payload, PayloadPatch, RemoteChange,
    SyncStatus, SystemClock,
};
use tokio::sync::watch;
use uuid::Uuid;

use super::monitor::NetworkMonitor;
use super::queue::{OperationQueue, QueueEntryState, QueueError};
use super::resolver::{self, Resolution};
use super::transport::{Transport, TransportError};

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// URL of the gloss server.
    pub url: String,
    /// Maximum operations pushed per queue drain.
    pub batch_size: usize,
    /// Time allotted to a single request/response exchange.
    pub request_timeout: Duration,
    /// Interval between periodic sync attempts and reachability probes.
    pub heartbeat: Duration,
    /// Initial delay after a failed cycle.
    pub backoff_initial: Duration,
    /// Ceiling for the cycle backoff delay.
    pub backoff_max: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            url: "ws://localhost:7890".to_string(),
            batch_size: 50,
            request_timeout: Duration::from_secs(10),
            heartbeat: super::monitor::DEFAULT_HEARTBEAT,
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
        }
    }
}

/// Error type for sync engine operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Queue error.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] gl_core::Error),

    /// The server did not answer within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// Not connected to the server.
    #[error("not connected to server")]
    NotConnected,

    /// The server answered with a message the engine did not expect.
    #[error("unexpected server message: {0}")]
    UnexpectedMessage(&'static str),
}

impl SyncError {
    /// Whether retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_) | SyncError::Timeout | SyncError::NotConnected
        )
    }
}

/// Result type for sync engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Where the engine currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Nothing to do.
    #[default]
    Idle,
    /// Applying remote changes.
    Pulling,
    /// Transmitting queued operations.
    Pushing,
    /// Offline; waiting for connectivity.
    Paused,
    /// A cycle failed; waiting out the backoff delay.
    Backoff,
}

/// What one sync cycle accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleSummary {
    /// Remote changes applied to the local store.
    pub pulled: usize,
    /// Operations acknowledged by the server.
    pub pushed: usize,
    /// Operations put back for a later attempt.
    pub requeued: usize,
    /// Conflicts deferred to the user.
    pub conflicts: usize,
    /// Operations that gave up permanently.
    pub failed: usize,
    /// Engine state when the cycle ended.
    pub state: SyncState,
}

/// Details of a conflict the resolver could not settle.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictNotice {
    /// The contested entity.
    pub entity_id: Uuid,
    /// What this replica wanted.
    pub local: Payload,
    /// What the server currently holds.
    pub remote: Payload,
}

/// Callback invoked when a conflict is deferred to the user.
pub type ConflictCallback = Box<dyn Fn(&ConflictNotice) + Send + Sync>;

enum PushOutcome {
    /// Acknowledged by the server (directly or after resolution).
    Applied,
    /// Parked for the user to resolve.
    Deferred,
    /// Scheduled for a later attempt.
    Requeued,
    /// Gave up on this operation permanently.
    Failed,
    /// The connection broke; abort the batch.
    ConnectionLost,
}

enum RunEvent {
    Shutdown,
    CameOnline,
    WentOffline,
    Heartbeat,
    RemoteChange,
    ConnectionLost,
    Ignored,
}

/// Replication driver for one device.
pub struct SyncEngine<T: Transport, C: ClockSource = SystemClock> {
    store: Arc<Mutex<LocalStore>>,
    queue: Arc<Mutex<OperationQueue>>,
    transport: T,
    monitor: NetworkMonitor,
    clock: C,
    config: SyncConfig,
    state: SyncState,
    consecutive_failures: u32,
    backoff_until: Option<DateTime<Utc>>,
    /// Change frames observed while waiting for a response.
    buffered_changes: Vec<RemoteChange>,
    on_conflict: Option<ConflictCallback>,
}

impl<T: Transport> SyncEngine<T, SystemClock> {
    /// Create an engine on the system clock.
    pub fn new(
        store: Arc<Mutex<LocalStore>>,
        queue: Arc<Mutex<OperationQueue>>,
        transport: T,
        monitor: NetworkMonitor,
        config: SyncConfig,
    ) -> Self {
        Self::with_clock(store, queue, transport, monitor, config, SystemClock)
    }
}

impl<T: Transport, C: ClockSource> SyncEngine<T, C> {
    /// Create an engine with an injected clock.
    pub fn with_clock(
        store: Arc<Mutex<LocalStore>>,
        queue: Arc<Mutex<OperationQueue>>,
        transport: T,
        monitor: NetworkMonitor,
        config: SyncConfig,
        clock: C,
    ) -> Self {
        SyncEngine {
            store,
            queue,
            transport,
            monitor,
            clock,
            config,
            state: SyncState::Idle,
            consecutive_failures: 0,
            backoff_until: None,
            buffered_changes: Vec::new(),
            on_conflict: None,
        }
    }

    /// Register a callback for conflicts deferred to the user.
    pub fn set_on_conflict(&mut self, callback: ConflictCallback) {
        self.on_conflict = Some(callback);
    }

    /// Current engine state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Handle on the shared connectivity monitor.
    pub fn monitor(&self) -> NetworkMonitor {
        self.monitor.clone()
    }

    /// Run sync cycles until the shutdown signal fires.
    ///
    /// Reacts to connectivity transitions, periodic heartbeats and
    /// server-pushed change notifications. Fatal store errors abort the
    /// loop; everything transient is absorbed into backoff.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> SyncResult<()> {
        let mut online_rx = self.monitor.subscribe();
        let mut heartbeat = tokio::time::interval(self.config.heartbeat);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let connected = self.transport.is_connected();
            let event = tokio::select! {
                _ = shutdown.changed() => RunEvent::Shutdown,
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        RunEvent::Shutdown
                    } else if *online_rx.borrow_and_update() {
                        RunEvent::CameOnline
                    } else {
                        RunEvent::WentOffline
                    }
                }
                _ = heartbeat.tick() => RunEvent::Heartbeat,
                msg = self.transport.recv(), if connected => match msg {
                    Ok(Some(ServerMessage::Change(_))) => RunEvent::RemoteChange,
                    Ok(Some(_)) => RunEvent::Ignored,
                    Ok(None) | Err(_) => RunEvent::ConnectionLost,
                },
            };

            match event {
                RunEvent::Shutdown => {
                    let _ = self.transport.disconnect().await;
                    return Ok(());
                }
                RunEvent::CameOnline | RunEvent::RemoteChange => {
                    self.run_cycle().await?;
                }
                RunEvent::WentOffline => {
                    self.state = SyncState::Paused;
                }
                RunEvent::Heartbeat => {
                    if self.monitor.is_online() {
                        self.run_cycle().await?;
                    } else if self.monitor.connectivity() {
                        self.probe_and_maybe_sync().await?;
                    }
                }
                RunEvent::ConnectionLost => {
                    let _ = self.transport.disconnect().await;
                    self.monitor.report_reachable(false);
                    self.state = SyncState::Paused;
                }
                RunEvent::Ignored => {}
            }
        }
    }

    async fn probe_and_maybe_sync(&mut self) -> SyncResult<()> {
        if !self.transport.is_connected()
            && self.transport.connect(&self.config.url).await.is_err()
        {
            self.monitor.report_reachable(false);
            return Ok(());
        }
        if self.monitor.probe(&mut self.transport).await {
            self.run_cycle().await?;
        }
        Ok(())
    }

    /// Run one pull-then-push sync cycle.
    ///
    /// Transient failures are absorbed: the summary reports a `Paused`
    /// or `Backoff` end state instead of an error. Only store-level
    /// failures propagate.
    pub async fn run_cycle(&mut self) -> SyncResult<CycleSummary> {
        let mut summary = CycleSummary::default();

        if !self.monitor.is_online() {
            self.state = SyncState::Paused;
            summary.state = self.state;
            return Ok(summary);
        }

        if let Some(until) = self.backoff_until {
            if self.clock.now() < until {
                self.state = SyncState::Backoff;
                summary.state = self.state;
                return Ok(summary);
            }
        }

        if !self.transport.is_connected() {
            if let Err(e) = self.transport.connect(&self.config.url).await {
                tracing::warn!(error = %e, "connection attempt failed");
                self.monitor.report_reachable(false);
                self.enter_backoff();
                summary.state = self.state;
                return Ok(summary);
            }
        }

        self.state = SyncState::Pulling;
        match self.pull().await {
            Ok(pulled) => summary.pulled = pulled,
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "pull failed");
                self.enter_backoff();
                summary.state = self.state;
                return Ok(summary);
            }
            Err(e) => return Err(e),
        }

        self.state = SyncState::Pushing;
        // Entities whose operation did not settle this cycle. Their
        // younger queued operations are held back, so a retransmission
        // can never land behind an edit that depends on it.
        let mut unsettled: HashSet<Uuid> = HashSet::new();
        loop {
            let now = self.clock.now();
            let batch: Vec<Operation> = self
                .lock_queue()
                .drain(self.config.batch_size, now)
                .into_iter()
                .filter(|op| !unsettled.contains(&op.entity_id))
                .collect();
            if batch.is_empty() {
                break;
            }
            for op in batch {
                if !self.monitor.is_online() {
                    // Went offline mid-batch; remaining operations stay
                    // pending for the next cycle.
                    self.state = SyncState::Paused;
                    summary.state = self.state;
                    return Ok(summary);
                }
                if unsettled.contains(&op.entity_id) {
                    continue;
                }
                let entity_id = op.entity_id;
                match self.push_one(op).await? {
                    PushOutcome::Applied => summary.pushed += 1,
                    PushOutcome::Deferred => {
                        unsettled.insert(entity_id);
                        summary.conflicts += 1;
                    }
                    PushOutcome::Requeued => {
                        unsettled.insert(entity_id);
                        summary.requeued += 1;
                    }
                    PushOutcome::Failed => {
                        unsettled.insert(entity_id);
                        summary.failed += 1;
                    }
                    PushOutcome::ConnectionLost => {
                        self.monitor.report_reachable(false);
                        self.enter_backoff();
                        summary.state = self.state;
                        return Ok(summary);
                    }
                }
            }
        }

        // Change frames that arrived while requests were in flight may
        // postdate the last pull response; fetch them now instead of
        // waiting for the next heartbeat.
        if !self.buffered_changes.is_empty() {
            self.buffered_changes.clear();
            self.state = SyncState::Pulling;
            match self.pull().await {
                Ok(pulled) => summary.pulled += pulled,
                Err(e) if e.is_transient() => {
                    tracing::warn!(error = %e, "follow-up pull failed");
                    self.enter_backoff();
                    summary.state = self.state;
                    return Ok(summary);
                }
                Err(e) => return Err(e),
            }
        }

        self.state = SyncState::Idle;
        self.consecutive_failures = 0;
        self.backoff_until = None;
        summary.state = self.state;
        Ok(summary)
    }

    /// Fetch and apply remote changes since the stored checkpoint.
    async fn pull(&mut self) -> SyncResult<usize> {
        let since = self.lock_store().checkpoint()?;
        let reply = self.request(ClientMessage::pull(since)).await?;

        match reply {
            ServerMessage::PullResponse {
                changes,
                checkpoint,
            } => {
                let count = changes.len();
                {
                    let store = self.lock_store();
                    for change in &changes {
                        store.apply_remote(change)?;
                    }
                    // Advance only after every change landed, so an
                    // interrupted pull is replayed from the old mark.
                    store.set_checkpoint(&checkpoint)?;
                }
                Ok(count)
            }
            other => Err(SyncError::UnexpectedMessage(message_kind(&other))),
        }
    }

    /// Push a single operation, resolving one round of conflict if the
    /// server rejects it.
    async fn push_one(&mut self, op: Operation) -> SyncResult<PushOutcome> {
        let op_id = op.op_id;
        let entity_id = op.entity_id;
        let mut op = op;

        self.set_status_if_present(entity_id, SyncStatus::Syncing)?;

        for attempt in 0..2 {
            let reply = match self.request(ClientMessage::push(op.clone())).await {
                Ok(reply) => reply,
                Err(SyncError::Timeout) => {
                    self.set_status_if_present(entity_id, SyncStatus::Pending)?;
                    let now = self.clock.now();
                    let state = self.lock_queue().requeue(op_id, "request timed out", now)?;
                    return Ok(requeue_outcome(state));
                }
                Err(e) if e.is_transient() => {
                    // Leave the operation untouched; the cycle backoff
                    // paces the next attempt.
                    self.set_status_if_present(entity_id, SyncStatus::Pending)?;
                    return Ok(PushOutcome::ConnectionLost);
                }
                Err(e) => return Err(e),
            };

            match reply {
                ServerMessage::PushResponse {
                    accepted: true,
                    current,
                    ..
                } => {
                    self.finish_accepted(&op, current.as_ref())?;
                    self.lock_queue().mark_complete(op_id)?;
                    return Ok(PushOutcome::Applied);
                }
                ServerMessage::PushResponse {
                    accepted: false,
                    current: Some(remote),
                    ..
                } => {
                    if attempt > 0 {
                        // Still contested after rebasing; try again in
                        // a later cycle.
                        self.set_status_if_present(entity_id, SyncStatus::Pending)?;
                        let now = self.clock.now();
                        let state =
                            self.lock_queue()
                                .requeue(op_id, "conflict retry rejected", now)?;
                        return Ok(requeue_outcome(state));
                    }
                    match resolver::resolve(&op, &remote) {
                        Resolution::UseRemote(payload) => {
                            let mut adopted = remote;
                            adopted.payload = payload;
                            adopted.sync_status = SyncStatus::Synced;
                            self.lock_store().put_entity(&adopted)?;
                            self.lock_queue().mark_complete(op_id)?;
                            return Ok(PushOutcome::Applied);
                        }
                        Resolution::UseLocal(payload) | Resolution::Merged(payload) => {
                            if op.kind != OpKind::Delete {
                                let mut local = remote.clone();
                                local.payload = payload.clone();
                                local.sync_status = SyncStatus::Syncing;
                                self.lock_store().put_entity(&local)?;
                            }
                            op = rebased(&op, &payload, &remote);
                        }
                        Resolution::DeferToUser { local, remote: theirs } => {
                            self.defer_to_user(entity_id, op_id, local, theirs, remote)?;
                            return Ok(PushOutcome::Deferred);
                        }
                    }
                }
                ServerMessage::PushResponse {
                    accepted: false,
                    current: None,
                    ..
                } => {
                    // The entity no longer exists remotely; the delete
                    // wins over whatever this operation wanted.
                    {
                        let store = self.lock_store();
                        if store.entity_exists(entity_id)? {
                            store.delete_entity(entity_id)?;
                        }
                    }
                    self.lock_queue().mark_complete(op_id)?;
                    return Ok(PushOutcome::Applied);
                }
                ServerMessage::Rejected { message, .. } => {
                    tracing::warn!(%op_id, %message, "server rejected operation");
                    self.set_status_if_present(entity_id, SyncStatus::Pending)?;
                    self.lock_queue().mark_failed(op_id, &message)?;
                    return Ok(PushOutcome::Failed);
                }
                other => return Err(SyncError::UnexpectedMessage(message_kind(&other))),
            }
        }

        // Unreachable: the second loop pass always returns.
        self.set_status_if_present(entity_id, SyncStatus::Pending)?;
        let now = self.clock.now();
        let state = self.lock_queue().requeue(op_id, "push did not settle", now)?;
        Ok(requeue_outcome(state))
    }

    /// Record a server acknowledgement in the local store.
    fn finish_accepted(&self, op: &Operation, current: Option<&Entity>) -> SyncResult<()> {
        let now = self.clock.now();
        let store = self.lock_store();

        if op.kind == OpKind::Delete {
            if store.entity_exists(op.entity_id)? {
                store.delete_entity(op.entity_id)?;
            }
            return Ok(());
        }

        let version = current.map_or(op.base_version + 1, |e| e.version);
        match store.mark_synced(op.entity_id, version, now) {
            Ok(()) => {}
            // A later queued delete already removed the row locally.
            Err(gl_core::Error::EntityNotFound(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        // Edits enqueued while this one was in flight keep the entity
        // dirty.
        if self.lock_queue().has_pending_for(op.entity_id) {
            store.set_sync_status(op.entity_id, SyncStatus::Pending)?;
        }
        Ok(())
    }

    /// Park a contested entity for explicit user resolution.
    fn defer_to_user(
        &mut self,
        entity_id: Uuid,
        op_id: Uuid,
        local: Payload,
        theirs: Payload,
        remote: Entity,
    ) -> SyncResult<()> {
        let mut contested = remote;
        // Keep the local text visible; the notice carries both sides.
        contested.payload = local.clone();
        contested.sync_status = SyncStatus::Conflict;
        self.lock_store().put_entity(&contested)?;

        // The queued operation is spent; resolving the conflict will
        // enqueue a fresh one.
        self.lock_queue().mark_complete(op_id)?;

        let notice = ConflictNotice {
            entity_id,
            local,
            remote: theirs,
        };
        tracing::info!(%entity_id, "conflict deferred to user");
        if let Some(callback) = &self.on_conflict {
            callback(&notice);
        }
        Ok(())
    }

    /// Send a request and wait for its response.
    ///
    /// Server-initiated change frames arriving in between are buffered,
    /// stray pongs are skipped.
    async fn request(&mut self, msg: ClientMessage) -> SyncResult<ServerMessage> {
        self.transport.send(msg).await?;

        let transport = &mut self.transport;
        let buffered = &mut self.buffered_changes;
        let reply = tokio::time::timeout(self.config.request_timeout, async {
            loop {
                match transport.recv().await? {
                    Some(ServerMessage::Change(change)) => buffered.push(change),
                    Some(ServerMessage::Pong { .. }) => {}
                    Some(reply) => return Ok(reply),
                    None => return Err(SyncError::NotConnected),
                }
            }
        })
        .await
        .map_err(|_| SyncError::Timeout)??;

        Ok(reply)
    }

    fn enter_backoff(&mut self) {
        self.consecutive_failures += 1;
        let exp = self.consecutive_failures.saturating_sub(1).min(16);
        let initial = self.config.backoff_initial.as_millis() as u64;
        let max = self.config.backoff_max.as_millis() as u64;
        let delay_ms = initial.saturating_mul(1 << exp).min(max);
        self.backoff_until =
            Some(self.clock.now() + chrono::Duration::milliseconds(delay_ms as i64));
        self.state = SyncState::Backoff;
    }

    /// Set a sync status, tolerating rows that were deleted locally.
    fn set_status_if_present(&self, entity_id: Uuid, status: SyncStatus) -> SyncResult<()> {
        match self.lock_store().set_sync_status(entity_id, status) {
            Ok(()) => Ok(()),
            Err(gl_core::Error::EntityNotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, LocalStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_queue(&self) -> MutexGuard<'_, OperationQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Rebase an operation onto the server's current copy.
fn rebased(op: &Operation, payload: &Payload, remote: &Entity) -> Operation {
    let data = match op.kind {
        OpKind::Delete => PayloadPatch::default(),
        _ => PayloadPatch::from_payload(payload),
    };
    Operation {
        op_id: op.op_id,
        entity_id: op.entity_id,
        kind: op.kind,
        data,
        base: Some(remote.payload.clone()),
        base_version: remote.version,
        created_at: op.created_at,
    }
}

fn requeue_outcome(state: QueueEntryState) -> PushOutcome {
    match state {
        QueueEntryState::Pending => PushOutcome::Requeued,
        QueueEntryState::Failed => PushOutcome::Failed,
    }
}

fn message_kind(msg: &ServerMessage) -> &'static str {
    match msg {
        ServerMessage::PushResponse { .. } => "push_response",
        ServerMessage::PullResponse { .. } => "pull_response",
        ServerMessage::Change(_) => "change",
        ServerMessage::Pong { .. } => "pong",
        ServerMessage::Rejected { .. } => "rejected",
    }
}
