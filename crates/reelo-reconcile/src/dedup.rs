//! Duplicate record resolution.
//!
//! After a merge redirects every source identity to the canonical one,
//! records that differed only by identity become logical duplicates. This
//! module groups them by a per-record-type uniqueness key and deletes all
//! but one survivor per group.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use reelo_core::{RecordId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::detect::UserReferenceField;
use crate::error::Result;
use crate::record::{relation_ids, Record};
use crate::storage::{Filter, Storage};

/// Which duplicate survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the record with the smallest creation timestamp.
    KeepEarliestCreated,
    /// Keep the record with the largest last-modified timestamp.
    KeepLatestUpdated,
}

/// Per-record-type deduplication policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeduplicationPolicy {
    /// Fields whose normalized values identify a logical duplicate.
    pub uniqueness_key: Vec<String>,
    /// Survivor selection rule.
    pub tie_break: TieBreak,
}

impl DeduplicationPolicy {
    /// Create a policy.
    #[must_use]
    pub fn new<I, S>(uniqueness_key: I, tie_break: TieBreak) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uniqueness_key: uniqueness_key.into_iter().map(Into::into).collect(),
            tie_break,
        }
    }
}

/// Counters for one deduplication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupOutcome {
    /// Loser records deleted.
    pub removed: u64,
    /// Loser records whose deletion failed.
    pub failed: u64,
}

/// Deletes logical duplicates among the canonical identity's records.
pub struct Deduplicator {
    storage: Arc<dyn Storage>,
    config: EngineConfig,
}

impl Deduplicator {
    /// Create a deduplicator with default host conventions.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_config(storage, EngineConfig::default())
    }

    /// Create a deduplicator with custom host conventions.
    #[must_use]
    pub fn with_config(storage: Arc<dyn Storage>, config: EngineConfig) -> Self {
        Self { storage, config }
    }

    /// Deduplicate the canonical identity's records of one type.
    ///
    /// Only records referencing `canonical` through `user_field` are
    /// considered: after a merge, duplicates can only appear within that
    /// identity's own records. Records missing any key component join no
    /// group and are left for the orphan cleaner. Survivor choice is
    /// deterministic; exact timestamp ties break by lowest record id, so a
    /// re-run never removes a different winner.
    pub async fn deduplicate(
        &self,
        record_type: &str,
        user_field: &UserReferenceField,
        policy: &DeduplicationPolicy,
        canonical: UserId,
    ) -> Result<DedupOutcome> {
        let filter = Filter::references(&user_field.name, RecordId::from(canonical));
        let records = self.storage.find(record_type, &filter).await?;

        let mut groups: HashMap<Vec<String>, Vec<Record>> = HashMap::new();
        for record in records {
            let Some(key) = group_key(&record, &policy.uniqueness_key) else {
                continue;
            };
            groups.entry(key).or_default().push(record);
        }

        let mut outcome = DedupOutcome::default();
        for (_, mut members) in groups {
            if members.len() < 2 {
                continue;
            }
            members.sort_by(|a, b| self.survivor_order(a, b, policy.tie_break));

            let survivor = members[0].id;
            for loser in &members[1..] {
                match self.storage.delete(record_type, loser.id).await {
                    Ok(()) => {
                        outcome.removed += 1;
                        tracing::debug!(
                            record_type = %record_type,
                            record_id = %loser.id,
                            survivor = %survivor,
                            "Removed duplicate record"
                        );
                    }
                    Err(e) => {
                        outcome.failed += 1;
                        tracing::warn!(
                            record_type = %record_type,
                            record_id = %loser.id,
                            error = %e,
                            "Failed to remove duplicate record"
                        );
                    }
                }
            }
        }

        Ok(outcome)
    }

    /// Total order in which the survivor sorts first.
    ///
    /// A record with a parsable timestamp always beats one without; equal
    /// (or equally missing) timestamps fall back to lowest id.
    fn survivor_order(&self, a: &Record, b: &Record, tie_break: TieBreak) -> Ordering {
        let field = match tie_break {
            TieBreak::KeepEarliestCreated => &self.config.created_at_field,
            TieBreak::KeepLatestUpdated => &self.config.updated_at_field,
        };

        let primary = match (a.timestamp(field), b.timestamp(field)) {
            (Some(ta), Some(tb)) => match tie_break {
                TieBreak::KeepEarliestCreated => ta.cmp(&tb),
                TieBreak::KeepLatestUpdated => tb.cmp(&ta),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };

        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Normalize a record's uniqueness-key components.
///
/// Relation values collapse to their referenced ids; plain scalars keep
/// their string form. Returns `None` when any component is missing or is a
/// relation that references nothing.
fn group_key(record: &Record, uniqueness_key: &[String]) -> Option<Vec<String>> {
    let mut key = Vec::with_capacity(uniqueness_key.len());
    for field in uniqueness_key {
        key.push(key_component(record.get(field)?)?);
    }
    Some(key)
}

fn key_component(value: &Value) -> Option<String> {
    let ids = relation_ids(value);
    if !ids.is_empty() {
        let mut raw: Vec<i64> = ids.iter().map(|id| id.as_raw()).collect();
        raw.sort_unstable();
        let joined = raw
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        return Some(joined);
    }

    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        // Null, or a relation shape that references nothing: the record is
        // not part of any group.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use serde_json::json;

    fn record(id: i64, attrs: Value) -> Record {
        match attrs {
            Value::Object(map) => Record::new(RecordId::from_raw(id), map),
            _ => panic!("record attrs must be an object"),
        }
    }

    fn user_field() -> UserReferenceField {
        UserReferenceField {
            name: "user".to_string(),
            multi_valued: false,
        }
    }

    fn collection_policy() -> DeduplicationPolicy {
        DeduplicationPolicy::new(["user", "video"], TieBreak::KeepEarliestCreated)
    }

    #[test]
    fn test_group_key_normalizes_relation_shapes() {
        let a = record(1, json!({"user": 7, "video": {"id": 42}}));
        let b = record(2, json!({"user": {"id": 7}, "video": 42}));
        let key = vec!["user".to_string(), "video".to_string()];
        assert_eq!(group_key(&a, &key), group_key(&b, &key));
    }

    #[test]
    fn test_group_key_missing_component_skips_record() {
        let broken = record(1, json!({"user": 7, "video": null}));
        let key = vec!["user".to_string(), "video".to_string()];
        assert_eq!(group_key(&broken, &key), None);

        let absent = record(2, json!({"user": 7}));
        assert_eq!(group_key(&absent, &key), None);
    }

    #[test]
    fn test_group_key_scalar_component() {
        let r = record(1, json!({"user": 7, "slug": "daily-mix"}));
        let key = vec!["user".to_string(), "slug".to_string()];
        assert_eq!(
            group_key(&r, &key),
            Some(vec!["7".to_string(), "daily-mix".to_string()])
        );
    }

    #[tokio::test]
    async fn test_keep_earliest_created() {
        let storage = Arc::new(InMemoryStorage::new());
        // Post-merge: both collection rows reference the canonical user 7.
        storage
            .insert(
                "collection",
                record(
                    10,
                    json!({"user": 7, "video": 42, "createdAt": "2024-03-02T00:00:00Z"}),
                ),
            )
            .await;
        storage
            .insert(
                "collection",
                record(
                    11,
                    json!({"user": 7, "video": 42, "createdAt": "2024-03-01T00:00:00Z"}),
                ),
            )
            .await;

        let dedup = Deduplicator::new(storage.clone());
        let outcome = dedup
            .deduplicate(
                "collection",
                &user_field(),
                &collection_policy(),
                UserId::from_raw(7),
            )
            .await
            .unwrap();

        assert_eq!(outcome.removed, 1);
        // The earlier createdAt survives.
        assert!(storage.get("collection", RecordId::from_raw(11)).await.is_some());
        assert!(storage.get("collection", RecordId::from_raw(10)).await.is_none());
    }

    #[tokio::test]
    async fn test_keep_latest_updated() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .insert(
                "history",
                record(
                    1,
                    json!({"user": 7, "video": 42, "updatedAt": "2024-03-01T00:00:00Z"}),
                ),
            )
            .await;
        storage
            .insert(
                "history",
                record(
                    2,
                    json!({"user": 7, "video": 42, "updatedAt": "2024-03-05T00:00:00Z"}),
                ),
            )
            .await;

        let policy = DeduplicationPolicy::new(["user", "video"], TieBreak::KeepLatestUpdated);
        let dedup = Deduplicator::new(storage.clone());
        let outcome = dedup
            .deduplicate("history", &user_field(), &policy, UserId::from_raw(7))
            .await
            .unwrap();

        assert_eq!(outcome.removed, 1);
        assert!(storage.get("history", RecordId::from_raw(2)).await.is_some());
        assert!(storage.get("history", RecordId::from_raw(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_lowest_id() {
        let storage = Arc::new(InMemoryStorage::new());
        for id in [5, 3, 9] {
            storage
                .insert(
                    "collection",
                    record(
                        id,
                        json!({"user": 7, "video": 42, "createdAt": "2024-03-01T00:00:00Z"}),
                    ),
                )
                .await;
        }

        let dedup = Deduplicator::new(storage.clone());
        let outcome = dedup
            .deduplicate(
                "collection",
                &user_field(),
                &collection_policy(),
                UserId::from_raw(7),
            )
            .await
            .unwrap();

        assert_eq!(outcome.removed, 2);
        assert!(storage.get("collection", RecordId::from_raw(3)).await.is_some());
    }

    #[tokio::test]
    async fn test_timestamped_record_beats_untimestamped() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .insert("collection", record(1, json!({"user": 7, "video": 42})))
            .await;
        storage
            .insert(
                "collection",
                record(
                    2,
                    json!({"user": 7, "video": 42, "createdAt": "2024-03-01T00:00:00Z"}),
                ),
            )
            .await;

        let dedup = Deduplicator::new(storage.clone());
        dedup
            .deduplicate(
                "collection",
                &user_field(),
                &collection_policy(),
                UserId::from_raw(7),
            )
            .await
            .unwrap();

        assert!(storage.get("collection", RecordId::from_raw(2)).await.is_some());
        assert!(storage.get("collection", RecordId::from_raw(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_broken_key_records_are_left_alone() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .insert("collection", record(1, json!({"user": 7, "video": null})))
            .await;
        storage
            .insert("collection", record(2, json!({"user": 7, "video": null})))
            .await;

        let dedup = Deduplicator::new(storage.clone());
        let outcome = dedup
            .deduplicate(
                "collection",
                &user_field(),
                &collection_policy(),
                UserId::from_raw(7),
            )
            .await
            .unwrap();

        assert_eq!(outcome.removed, 0);
        assert_eq!(storage.len("collection").await, 2);
    }

    #[tokio::test]
    async fn test_other_identities_records_are_not_considered() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .insert(
                "collection",
                record(1, json!({"user": 8, "video": 42, "createdAt": "2024-03-01T00:00:00Z"})),
            )
            .await;
        storage
            .insert(
                "collection",
                record(2, json!({"user": 8, "video": 42, "createdAt": "2024-03-02T00:00:00Z"})),
            )
            .await;

        let dedup = Deduplicator::new(storage.clone());
        let outcome = dedup
            .deduplicate(
                "collection",
                &user_field(),
                &collection_policy(),
                UserId::from_raw(7),
            )
            .await
            .unwrap();

        assert_eq!(outcome.removed, 0);
    }

    #[tokio::test]
    async fn test_rerun_removes_nothing_further() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .insert(
                "collection",
                record(1, json!({"user": 7, "video": 42, "createdAt": "2024-03-01T00:00:00Z"})),
            )
            .await;
        storage
            .insert(
                "collection",
                record(2, json!({"user": 7, "video": 42, "createdAt": "2024-03-02T00:00:00Z"})),
            )
            .await;

        let dedup = Deduplicator::new(storage.clone());
        let first = dedup
            .deduplicate(
                "collection",
                &user_field(),
                &collection_policy(),
                UserId::from_raw(7),
            )
            .await
            .unwrap();
        let second = dedup
            .deduplicate(
                "collection",
                &user_field(),
                &collection_policy(),
                UserId::from_raw(7),
            )
            .await
            .unwrap();

        assert_eq!(first.removed, 1);
        assert_eq!(second.removed, 0);
    }
}
