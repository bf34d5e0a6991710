// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::Utc;
use yare::parameterized;

fn base_payload() -> Payload {
    Payload::new("schlüssel", "key")
        .with_context("Der Schlüssel steckt.")
        .with_tags(["nouns"])
}

#[parameterized(
    create = { OpKind::Create, "create" },
    update = { OpKind::Update, "update" },
    delete = { OpKind::Delete, "delete" },
)]
fn op_kind_roundtrip(kind: OpKind, s: &str) {
    assert_eq!(kind.as_str(), s);
    assert_eq!(s.parse::<OpKind>().unwrap(), kind);
}

#[test]
fn op_kind_rejects_unknown_value() {
    let err = "upsert".parse::<OpKind>().unwrap_err();
    assert!(err.to_string().contains("invalid operation kind"));
}

#[test]
fn empty_patch_changes_nothing() {
    let patch = PayloadPatch::default();
    assert!(patch.is_empty());

    let base = base_payload();
    assert_eq!(patch.apply_to(&base), base);
}

#[test]
fn patch_applies_only_touched_fields() {
    let base = base_payload();
    let patch = PayloadPatch::default()
        .with_translation("key (door)")
        .with_tags(["nouns", "a2"]);

    let patched = patch.apply_to(&base);
    assert_eq!(patched.text, "schlüssel");
    assert_eq!(patched.translation, "key (door)");
    assert_eq!(patched.context, base.context);
    assert!(patched.tags.contains("a2"));
}

#[test]
fn from_payload_captures_every_field() {
    let base = base_payload();
    let patch = PayloadPatch::from_payload(&base);
    let rebuilt = patch.apply_to(&Payload::new("", ""));
    assert_eq!(rebuilt, base);
}

#[test]
fn empty_patch_serializes_compactly() {
    let json = serde_json::to_string(&PayloadPatch::default()).unwrap();
    assert_eq!(json, "{}");
}

#[test]
fn create_op_carries_full_payload_and_no_base() {
    let now = Utc::now();
    let entity = Entity::new(base_payload(), now);
    let op = Operation::create(&entity, now);

    assert_eq!(op.kind, OpKind::Create);
    assert_eq!(op.entity_id, entity.id);
    assert_eq!(op.base_version, 0);
    assert!(op.base.is_none());
    assert_eq!(op.data.text.as_deref(), Some("schlüssel"));
}

#[test]
fn update_op_snapshots_base_payload_and_version() {
    let now = Utc::now();
    let mut entity = Entity::new(base_payload(), now);
    entity.version = 7;

    let patch = PayloadPatch::default().with_text("der schlüssel");
    let op = Operation::update(&entity, patch, now);

    assert_eq!(op.kind, OpKind::Update);
    assert_eq!(op.base_version, 7);
    assert_eq!(op.base.as_ref().unwrap(), &entity.payload);
}

#[test]
fn delete_op_has_empty_data() {
    let now = Utc::now();
    let mut entity = Entity::new(base_payload(), now);
    entity.version = 3;

    let op = Operation::delete(&entity, now);
    assert_eq!(op.kind, OpKind::Delete);
    assert!(op.data.is_empty());
    assert_eq!(op.base_version, 3);
}

#[test]
fn distinct_ops_get_distinct_ids() {
    let now = Utc::now();
    let entity = Entity::new(base_payload(), now);
    let a = Operation::create(&entity, now);
    let b = Operation::create(&entity, now);
    assert_ne!(a.op_id, b.op_id);
}

#[test]
fn op_serialization_roundtrip() {
    let now = Utc::now();
    let mut entity = Entity::new(base_payload(), now);
    entity.version = 2;
    let op = Operation::update(
        &entity,
        PayloadPatch::default().with_translation("latchkey"),
        now,
    );

    let json = serde_json::to_string(&op).unwrap();
    let parsed: Operation = serde_json::from_str(&json).unwrap();
    assert_eq!(op, parsed);
}
