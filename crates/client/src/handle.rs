// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Facade the UI layer talks to.
//!
//! Every mutation goes through here: it is applied to the local store
//! optimistically and enqueued for transmission in one step, so the UI
//! never waits on the network. The sync engine shares the same store
//! and queue handles and drains them in the background.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gl_core::{
    scheduler, ClockSource, Entity, LocalStore, OpKind, Operation, Payload, PayloadPatch,
    ReviewState, StatusCounts, SyncStatus, SystemClock,
};
use uuid::Uuid;

use crate::error::Result;
use crate::sync::{OperationQueue, QueuedOp};

/// Client facade over the shared store and operation queue.
pub struct Handle<C: ClockSource = SystemClock> {
    store: Arc<Mutex<LocalStore>>,
    queue: Arc<Mutex<OperationQueue>>,
    clock: C,
}

impl Handle<SystemClock> {
    /// Create a handle on the system clock.
    pub fn new(store: Arc<Mutex<LocalStore>>, queue: Arc<Mutex<OperationQueue>>) -> Self {
        Self::with_clock(store, queue, SystemClock)
    }
}

impl<C: ClockSource> Handle<C> {
    /// Create a handle with an injected clock.
    pub fn with_clock(
        store: Arc<Mutex<LocalStore>>,
        queue: Arc<Mutex<OperationQueue>>,
        clock: C,
    ) -> Self {
        Handle {
            store,
            queue,
            clock,
        }
    }

    /// Create a vocabulary entry locally and queue it for upload.
    pub fn create_entity(&self, payload: Payload) -> Result<Entity> {
        let now = self.clock.now();
        let entity = Entity::new(payload, now);
        let op = Operation::create(&entity, now);

        self.lock_store().insert_entity(&entity)?;
        self.lock_queue().enqueue(&op)?;
        Ok(entity)
    }

    /// Apply a mutation locally and queue it for upload.
    ///
    /// `Create` mutations go through [`Handle::create_entity`] instead,
    /// since they need a full payload rather than a patch.
    pub fn enqueue_mutation(
        &self,
        entity_id: Uuid,
        kind: OpKind,
        patch: PayloadPatch,
    ) -> Result<Operation> {
        let now = self.clock.now();
        match kind {
            OpKind::Create => Err(gl_core::Error::InvalidInput(
                "create mutations require a full payload; use create_entity".to_string(),
            )
            .into()),
            OpKind::Update => {
                let snapshot = self.lock_store().get_entity(entity_id)?;
                let op = Operation::update(&snapshot, patch, now);
                self.lock_store().apply_patch(entity_id, &op.data, now)?;
                self.lock_queue().enqueue(&op)?;
                Ok(op)
            }
            OpKind::Delete => {
                let snapshot = self.lock_store().get_entity(entity_id)?;
                let op = Operation::delete(&snapshot, now);
                self.lock_store().delete_entity(entity_id)?;
                self.lock_queue().enqueue(&op)?;
                Ok(op)
            }
        }
    }

    /// Fetch one entry.
    pub fn get_entity(&self, entity_id: Uuid) -> Result<Entity> {
        Ok(self.lock_store().get_entity(entity_id)?)
    }

    /// All entries, most recently updated first.
    pub fn list_entities(&self) -> Result<Vec<Entity>> {
        Ok(self.lock_store().list_entities()?)
    }

    /// Sync lifecycle state of one entry.
    pub fn sync_status(&self, entity_id: Uuid) -> Result<SyncStatus> {
        Ok(self.lock_store().get_entity(entity_id)?.sync_status)
    }

    /// Entry counts per sync lifecycle state.
    pub fn status_counts(&self) -> Result<StatusCounts> {
        Ok(self.lock_store().status_counts()?)
    }

    /// Entries due for review, highest priority first.
    pub fn due_review_items(&self, limit: usize) -> Result<Vec<Entity>> {
        let now = self.clock.now();
        Ok(self.lock_store().due_items(now, limit)?)
    }

    /// Record a review answer and reschedule the entry.
    pub fn submit_review(&self, entity_id: Uuid, was_correct: bool) -> Result<Entity> {
        let now = self.clock.now();
        let entity = self.lock_store().get_entity(entity_id)?;

        let current = entity
            .payload
            .review
            .clone()
            .unwrap_or_else(|| ReviewState::new(now));
        let next = scheduler::reviewed(&current, was_correct, now);
        let patch = PayloadPatch::default().with_review(next);

        let op = Operation::update(&entity, patch, now);
        let updated = self.lock_store().apply_patch(entity_id, &op.data, now)?;
        self.lock_queue().enqueue(&op)?;
        Ok(updated)
    }

    /// Settle a conflict by writing the chosen payload.
    ///
    /// The caller passes either side of the conflict notice, or a
    /// hand-merged payload. The entry goes back to `Pending` and a
    /// fresh operation carries the choice to the server.
    pub fn resolve_conflict(&self, entity_id: Uuid, chosen: Payload) -> Result<Operation> {
        let now = self.clock.now();
        let entity = self.lock_store().get_entity(entity_id)?;
        if entity.sync_status != SyncStatus::Conflict {
            return Err(gl_core::Error::InvalidInput(format!(
                "entity {} is not in conflict",
                entity_id
            ))
            .into());
        }

        let mut resolved = entity;
        resolved.payload = chosen;
        resolved.updated_at = now;
        resolved.sync_status = SyncStatus::Pending;

        let op = Operation::update(
            &resolved,
            PayloadPatch::from_payload(&resolved.payload),
            now,
        );
        self.lock_store().put_entity(&resolved)?;
        self.lock_queue().enqueue(&op)?;
        Ok(op)
    }

    /// Operations that gave up on transmission.
    pub fn failed_ops(&self) -> Vec<QueuedOp> {
        self.lock_queue().failed().into_iter().cloned().collect()
    }

    /// Put a failed operation back into rotation.
    pub fn retry_failed(&self, op_id: Uuid) -> Result<()> {
        Ok(self.lock_queue().retry_failed(op_id)?)
    }

    /// Drop a failed operation without transmitting it.
    pub fn discard_failed(&self, op_id: Uuid) -> Result<()> {
        Ok(self.lock_queue().discard(op_id)?)
    }

    /// Number of operations still awaiting transmission.
    pub fn pending_op_count(&self) -> usize {
        self.lock_queue().pending_count()
    }

    fn lock_store(&self) -> MutexGuard<'_, LocalStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_queue(&self) -> MutexGuard<'_, OperationQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
