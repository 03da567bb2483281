//! Seeded mini-program dataset.
//!
//! Two user identities (7, the developer account, and 9, an accidental
//! duplicate) with videos, likes, collections, watch history, and roles
//! spread across both, plus the stray rows a real store accumulates.

use std::sync::Arc;

use reelo_core::RecordId;
use reelo_reconcile::{
    Cardinality, DeduplicationPolicy, FieldDescriptor, InMemorySchemaRegistry, InMemoryStorage,
    MergeOrchestrator, Record, RecordTypeSchema, TieBreak, ValidationAuditor,
};
use serde_json::Value;

/// Build a record from its raw id and a JSON attribute object.
pub fn record(id: i64, attrs: Value) -> Record {
    match attrs {
        Value::Object(map) => Record::new(RecordId::from_raw(id), map),
        _ => panic!("record attrs must be an object"),
    }
}

/// In-memory stand-in for the host application.
pub struct TestHost {
    pub storage: Arc<InMemoryStorage>,
    pub registry: Arc<InMemorySchemaRegistry>,
}

impl TestHost {
    /// Seed the full dataset.
    pub async fn seeded() -> Self {
        let registry = Arc::new(InMemorySchemaRegistry::new(schemas()));
        let storage = Arc::new(InMemoryStorage::new());

        for (record_type, rec) in seed_records() {
            storage.insert(record_type, rec).await;
        }

        Self { storage, registry }
    }

    /// Orchestrator with the production deduplication policies.
    pub fn orchestrator(&self) -> MergeOrchestrator {
        MergeOrchestrator::new(self.storage.clone(), self.registry.clone())
            .with_policy(
                "like",
                DeduplicationPolicy::new(["user", "video"], TieBreak::KeepEarliestCreated),
            )
            .with_policy(
                "collection",
                DeduplicationPolicy::new(["user", "video"], TieBreak::KeepEarliestCreated),
            )
            .with_policy(
                "history",
                DeduplicationPolicy::new(["user", "video"], TieBreak::KeepLatestUpdated),
            )
    }

    /// Auditor over the same host.
    pub fn auditor(&self) -> ValidationAuditor {
        ValidationAuditor::new(self.storage.clone(), self.registry.clone())
    }
}

fn schemas() -> Vec<RecordTypeSchema> {
    vec![
        RecordTypeSchema::new("user", vec![FieldDescriptor::scalar("nickname")]),
        RecordTypeSchema::new(
            "role",
            vec![
                FieldDescriptor::scalar("name"),
                FieldDescriptor::relation("users", "user", Cardinality::Many),
            ],
        ),
        RecordTypeSchema::new(
            "video",
            vec![
                FieldDescriptor::scalar("title"),
                FieldDescriptor::relation("owner", "user", Cardinality::One),
            ],
        ),
        RecordTypeSchema::new(
            "like",
            vec![
                FieldDescriptor::relation("user", "user", Cardinality::One),
                FieldDescriptor::relation("video", "video", Cardinality::One),
            ],
        ),
        RecordTypeSchema::new(
            "collection",
            vec![
                FieldDescriptor::relation("user", "user", Cardinality::One),
                FieldDescriptor::relation("video", "video", Cardinality::One),
            ],
        ),
        RecordTypeSchema::new(
            "history",
            vec![
                FieldDescriptor::relation("user", "user", Cardinality::One),
                FieldDescriptor::relation("video", "video", Cardinality::One),
            ],
        ),
        // Must never show up in any run.
        RecordTypeSchema::new(
            "admin::permission",
            vec![FieldDescriptor::scalar("action")],
        ),
    ]
}

fn seed_records() -> Vec<(&'static str, Record)> {
    use serde_json::json;

    vec![
        ("user", record(7, json!({"nickname": "dev"}))),
        ("user", record(9, json!({"nickname": "dev-dup"}))),
        (
            "video",
            record(42, json!({"title": "intro", "owner": 9})),
        ),
        (
            "video",
            record(43, json!({"title": "demo", "owner": {"id": 7}})),
        ),
        (
            "video",
            record(44, json!({"title": "stray", "owner": null})),
        ),
        (
            "like",
            record(1, json!({"user": 9, "video": 42, "createdAt": "2024-01-05T00:00:00Z"})),
        ),
        (
            "like",
            record(2, json!({"user": 7, "video": 42, "createdAt": "2024-01-01T00:00:00Z"})),
        ),
        ("like", record(5, json!({"user": null, "video": 42}))),
        ("like", record(6, json!({"user": 11, "video": 43}))),
        (
            "collection",
            record(
                21,
                json!({"user": 7, "video": 42, "createdAt": "2024-03-02T00:00:00Z"}),
            ),
        ),
        (
            "collection",
            record(
                22,
                json!({"user": 9, "video": 42, "createdAt": "2024-03-01T00:00:00Z"}),
            ),
        ),
        (
            "history",
            record(
                31,
                json!({"user": 9, "video": 43, "updatedAt": "2024-02-01T00:00:00Z"}),
            ),
        ),
        (
            "history",
            record(
                32,
                json!({"user": 7, "video": 43, "updatedAt": "2024-02-10T00:00:00Z"}),
            ),
        ),
        ("role", record(1, json!({"name": "viewer", "users": []}))),
        ("role", record(2, json!({"name": "editor", "users": [7]}))),
    ]
}
