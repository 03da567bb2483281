//! Storage contract consumed by the engine.
//!
//! The host data layer owns the actual persistence; the engine only consumes
//! this contract. Each call is atomic at the storage layer, but there is no
//! transaction spanning calls, which is why every engine operation must stay
//! idempotent.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use reelo_core::RecordId;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::{ReconcileError, Result};
use crate::record::{is_assigned, references, relation_ids, Record};

// ============================================================================
// Query Types
// ============================================================================

/// The engine's query vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every record of the type.
    All,
    /// Records whose field references the id, in any relation representation.
    References { field: String, id: RecordId },
    /// Records whose field references nothing (null, absent, empty).
    Unassigned { field: String },
    /// Records whose field is assigned but references something other than
    /// the id.
    Misassigned { field: String, id: RecordId },
}

impl Filter {
    /// References filter.
    #[must_use]
    pub fn references(field: impl Into<String>, id: RecordId) -> Self {
        Self::References {
            field: field.into(),
            id,
        }
    }

    /// Unassigned filter.
    #[must_use]
    pub fn unassigned(field: impl Into<String>) -> Self {
        Self::Unassigned {
            field: field.into(),
        }
    }

    /// Misassigned filter.
    #[must_use]
    pub fn misassigned(field: impl Into<String>, id: RecordId) -> Self {
        Self::Misassigned {
            field: field.into(),
            id,
        }
    }

    /// Evaluate the filter against one record.
    ///
    /// Backends are free to translate filters into native queries; this is
    /// the reference semantics they must reproduce.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::References { field, id } => {
                record.get(field).is_some_and(|v| references(v, *id))
            }
            Self::Unassigned { field } => !record.get(field).is_some_and(is_assigned),
            Self::Misassigned { field, id } => record.get(field).is_some_and(|v| {
                let ids = relation_ids(v);
                !ids.is_empty() && ids.iter().any(|r| r != id)
            }),
        }
    }
}

/// A set of attribute writes applied to one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch(Map<String, Value>);

impl Patch {
    /// Empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute write.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.0.insert(field.into(), value);
        self
    }

    /// The attribute writes.
    #[must_use]
    pub fn entries(&self) -> &Map<String, Value> {
        &self.0
    }
}

// ============================================================================
// Storage Trait
// ============================================================================

/// Query/command capability of the host data layer.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch records matching the filter.
    async fn find(&self, record_type: &str, filter: &Filter) -> Result<Vec<Record>>;

    /// Count records matching the filter.
    async fn count(&self, record_type: &str, filter: &Filter) -> Result<u64>;

    /// Apply a patch to one record, returning its new state.
    async fn update(&self, record_type: &str, id: RecordId, patch: Patch) -> Result<Record>;

    /// Delete one record.
    async fn delete(&self, record_type: &str, id: RecordId) -> Result<()>;

    /// Idempotently link `target` into the multi-valued relation `field` of
    /// the given record. Returns whether a new link was created.
    ///
    /// This is a semantic upsert on the join relation. Whether the adapter
    /// issues a conflict-ignoring insert or a higher-level connect call is
    /// its own business; both must converge on the same state and callers
    /// cannot tell which path was taken.
    async fn connect(
        &self,
        record_type: &str,
        id: RecordId,
        field: &str,
        target: RecordId,
    ) -> Result<bool>;
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// In-memory storage backend for testing and embedding.
///
/// Tables iterate in key order, so reads are deterministic.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: Arc<RwLock<HashMap<String, BTreeMap<i64, Record>>>>,
}

impl InMemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one record.
    pub async fn insert(&self, record_type: &str, record: Record) {
        let mut tables = self.tables.write().await;
        tables
            .entry(record_type.to_string())
            .or_default()
            .insert(record.id.as_raw(), record);
    }

    /// Fetch one record by id.
    pub async fn get(&self, record_type: &str, id: RecordId) -> Option<Record> {
        let tables = self.tables.read().await;
        tables
            .get(record_type)
            .and_then(|table| table.get(&id.as_raw()))
            .cloned()
    }

    /// Number of records of a type.
    pub async fn len(&self, record_type: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(record_type).map_or(0, BTreeMap::len)
    }

    /// Whether a type holds no records.
    pub async fn is_empty(&self, record_type: &str) -> bool {
        self.len(record_type).await == 0
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn find(&self, record_type: &str, filter: &Filter) -> Result<Vec<Record>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(record_type)
            .map(|table| {
                table
                    .values()
                    .filter(|r| filter.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, record_type: &str, filter: &Filter) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(record_type)
            .map(|table| table.values().filter(|r| filter.matches(r)).count() as u64)
            .unwrap_or(0))
    }

    async fn update(&self, record_type: &str, id: RecordId, patch: Patch) -> Result<Record> {
        let mut tables = self.tables.write().await;
        let record = tables
            .get_mut(record_type)
            .and_then(|table| table.get_mut(&id.as_raw()))
            .ok_or_else(|| ReconcileError::RecordNotFound {
                record_type: record_type.to_string(),
                id,
            })?;

        for (field, value) in patch.entries() {
            record.attrs.insert(field.clone(), value.clone());
        }
        Ok(record.clone())
    }

    async fn delete(&self, record_type: &str, id: RecordId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let removed = tables
            .get_mut(record_type)
            .and_then(|table| table.remove(&id.as_raw()));
        match removed {
            Some(_) => Ok(()),
            None => Err(ReconcileError::RecordNotFound {
                record_type: record_type.to_string(),
                id,
            }),
        }
    }

    async fn connect(
        &self,
        record_type: &str,
        id: RecordId,
        field: &str,
        target: RecordId,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let record = tables
            .get_mut(record_type)
            .and_then(|table| table.get_mut(&id.as_raw()))
            .ok_or_else(|| ReconcileError::RecordNotFound {
                record_type: record_type.to_string(),
                id,
            })?;

        let existing = record.get(field).map(relation_ids).unwrap_or_default();
        if existing.contains(&target) {
            return Ok(false);
        }

        let mut linked: Vec<Value> =
            existing.iter().map(|r| Value::from(r.as_raw())).collect();
        linked.push(Value::from(target.as_raw()));
        record.attrs.insert(field.to_string(), Value::Array(linked));
        Ok(true)
    }
}
