// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{Duration, TimeZone, Utc};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()
}

fn learnable(text: &str, next_due: DateTime<Utc>, level: u8) -> Entity {
    let review = ReviewState {
        mastery_level: level,
        times_encountered: 2,
        times_correct: 1,
        last_reviewed_at: next_due - Duration::days(3),
        next_review_at: next_due,
    };
    Entity::new(
        Payload::new(text, "translation").with_review(review),
        t0(),
    )
}

#[test]
fn insert_and_get_entity() {
    let store = LocalStore::open_in_memory().unwrap();
    let entity = Entity::new(
        Payload::new("brot", "bread").with_tags(["food"]),
        t0(),
    );

    store.insert_entity(&entity).unwrap();
    let retrieved = store.get_entity(entity.id).unwrap();

    assert_eq!(retrieved, entity);
    assert!(store.entity_exists(entity.id).unwrap());
}

#[test]
fn get_missing_entity_fails() {
    let store = LocalStore::open_in_memory().unwrap();
    let err = store.get_entity(uuid::Uuid::new_v4()).unwrap_err();
    assert!(err.to_string().contains("entity not found"));
}

#[test]
fn duplicate_insert_fails() {
    let store = LocalStore::open_in_memory().unwrap();
    let entity = Entity::new(Payload::new("brot", "bread"), t0());
    store.insert_entity(&entity).unwrap();
    assert!(store.insert_entity(&entity).is_err());
}

#[test]
fn apply_patch_is_optimistic() {
    let store = LocalStore::open_in_memory().unwrap();
    let mut entity = Entity::new(Payload::new("brot", "bread"), t0());
    entity.version = 4;
    entity.sync_status = SyncStatus::Synced;
    store.insert_entity(&entity).unwrap();

    let later = t0() + Duration::minutes(5);
    let patch = PayloadPatch::default().with_translation("bread (loaf)");
    let updated = store.apply_patch(entity.id, &patch, later).unwrap();

    assert_eq!(updated.payload.translation, "bread (loaf)");
    assert_eq!(updated.sync_status, SyncStatus::Pending);
    assert_eq!(updated.version, 4);
    assert_eq!(updated.updated_at, later);
}

#[test]
fn mark_synced_records_server_version() {
    let store = LocalStore::open_in_memory().unwrap();
    let entity = Entity::new(Payload::new("brot", "bread"), t0());
    store.insert_entity(&entity).unwrap();

    store.mark_synced(entity.id, 9, t0()).unwrap();
    let synced = store.get_entity(entity.id).unwrap();
    assert_eq!(synced.version, 9);
    assert_eq!(synced.sync_status, SyncStatus::Synced);
}

#[test]
fn apply_remote_tombstone_removes_row() {
    let store = LocalStore::open_in_memory().unwrap();
    let mut entity = Entity::new(Payload::new("brot", "bread"), t0());
    entity.sync_status = SyncStatus::Synced;
    store.insert_entity(&entity).unwrap();

    store
        .apply_remote(&RemoteChange {
            entity: entity.clone(),
            deleted: true,
        })
        .unwrap();

    assert!(!store.entity_exists(entity.id).unwrap());
}

#[test]
fn apply_remote_adopts_server_copy_when_no_local_edits() {
    let store = LocalStore::open_in_memory().unwrap();
    let mut entity = Entity::new(Payload::new("brot", "bread"), t0());
    entity.sync_status = SyncStatus::Synced;
    store.insert_entity(&entity).unwrap();

    let mut remote = entity.clone();
    remote.payload.translation = "bread (fresh)".to_string();
    remote.version = 11;
    store
        .apply_remote(&RemoteChange {
            entity: remote,
            deleted: false,
        })
        .unwrap();

    let merged = store.get_entity(entity.id).unwrap();
    assert_eq!(merged.payload.translation, "bread (fresh)");
    assert_eq!(merged.version, 11);
    assert_eq!(merged.sync_status, SyncStatus::Synced);
}

#[test]
fn apply_remote_preserves_local_pending_payload() {
    let store = LocalStore::open_in_memory().unwrap();
    let entity = Entity::new(Payload::new("brot", "bread"), t0());
    store.insert_entity(&entity).unwrap();

    let mut remote = entity.clone();
    remote.payload.translation = "bread (server)".to_string();
    remote.version = 6;
    store
        .apply_remote(&RemoteChange {
            entity: remote,
            deleted: false,
        })
        .unwrap();

    let merged = store.get_entity(entity.id).unwrap();
    // Local optimistic payload survives; only the version advances.
    assert_eq!(merged.payload.translation, "bread");
    assert_eq!(merged.version, 6);
    assert_eq!(merged.sync_status, SyncStatus::Pending);
}

#[test]
fn apply_remote_inserts_unknown_entity() {
    let store = LocalStore::open_in_memory().unwrap();
    let mut entity = Entity::new(Payload::new("milch", "milk"), t0());
    entity.version = 2;

    store
        .apply_remote(&RemoteChange {
            entity: entity.clone(),
            deleted: false,
        })
        .unwrap();

    let merged = store.get_entity(entity.id).unwrap();
    assert_eq!(merged.payload.text, "milch");
    assert_eq!(merged.sync_status, SyncStatus::Synced);
}

#[test]
fn due_items_orders_overdue_before_merely_due() {
    let store = LocalStore::open_in_memory().unwrap();

    let overdue = learnable("overdue", t0() - Duration::days(3), 5);
    let merely_due = learnable("due", t0() - Duration::hours(2), 0);
    let not_due = learnable("later", t0() + Duration::days(1), 0);

    store.insert_entity(&merely_due).unwrap();
    store.insert_entity(&overdue).unwrap();
    store.insert_entity(&not_due).unwrap();

    let due = store.due_items(t0(), 10).unwrap();
    assert_eq!(due.len(), 2);
    assert_eq!(due[0].payload.text, "overdue");
    assert_eq!(due[1].payload.text, "due");
}

#[test]
fn due_items_respects_limit() {
    let store = LocalStore::open_in_memory().unwrap();
    for i in 0..5 {
        let entity = learnable(&format!("w{i}"), t0() - Duration::hours(i + 1), 2);
        store.insert_entity(&entity).unwrap();
    }

    let due = store.due_items(t0(), 3).unwrap();
    assert_eq!(due.len(), 3);
}

#[test]
fn status_counts_by_lifecycle_state() {
    let store = LocalStore::open_in_memory().unwrap();

    let pending = Entity::new(Payload::new("a", "a"), t0());
    let mut synced = Entity::new(Payload::new("b", "b"), t0());
    synced.sync_status = SyncStatus::Synced;
    let mut conflict = Entity::new(Payload::new("c", "c"), t0());
    conflict.sync_status = SyncStatus::Conflict;

    store.insert_entity(&pending).unwrap();
    store.insert_entity(&synced).unwrap();
    store.insert_entity(&conflict).unwrap();

    let counts = store.status_counts().unwrap();
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.synced, 1);
    assert_eq!(counts.conflict, 1);
    assert_eq!(counts.syncing, 0);
}

#[test]
fn checkpoint_defaults_to_origin() {
    let store = LocalStore::open_in_memory().unwrap();
    assert_eq!(store.checkpoint().unwrap(), Checkpoint::origin());
}

#[test]
fn checkpoint_roundtrip() {
    let store = LocalStore::open_in_memory().unwrap();
    let cp = Checkpoint {
        server_seq: 17,
        pulled_at: t0(),
    };
    store.set_checkpoint(&cp).unwrap();
    assert_eq!(store.checkpoint().unwrap(), cp);

    let cp2 = Checkpoint {
        server_seq: 18,
        pulled_at: t0() + Duration::minutes(1),
    };
    store.set_checkpoint(&cp2).unwrap();
    assert_eq!(store.checkpoint().unwrap(), cp2);
}

#[test]
fn store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gloss.db");

    let entity = Entity::new(Payload::new("tür", "door"), t0());
    {
        let store = LocalStore::open(&path).unwrap();
        store.insert_entity(&entity).unwrap();
    }

    let store = LocalStore::open(&path).unwrap();
    let retrieved = store.get_entity(entity.id).unwrap();
    assert_eq!(retrieved.payload.text, "tür");
}
