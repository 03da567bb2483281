//! Record-type schemas and the registry contract.
//!
//! The engine never touches the host's native metadata representation. An
//! adapter produces these value types once per run; everything downstream
//! operates on them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::EngineConfig;
use crate::error::Result;

// ============================================================================
// Domain Types
// ============================================================================

/// How a field stores its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Plain value (string, number, boolean, ...).
    Scalar,
    /// Reference to records of another type.
    Relation,
}

/// How many targets a relation field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// Metadata for one field of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Whether the field is a scalar or a relation.
    pub kind: FieldKind,
    /// Record type the relation points at, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_target: Option<String>,
    /// Relation cardinality, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
}

impl FieldDescriptor {
    /// Describe a scalar field.
    #[must_use]
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar,
            relation_target: None,
            cardinality: None,
        }
    }

    /// Describe a relation field.
    #[must_use]
    pub fn relation(
        name: impl Into<String>,
        target: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Relation,
            relation_target: Some(target.into()),
            cardinality: Some(cardinality),
        }
    }
}

/// Immutable snapshot of one record type's definition.
///
/// Owned by the host; read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTypeSchema {
    /// Record type name.
    pub name: String,
    /// Field metadata.
    pub fields: Vec<FieldDescriptor>,
}

impl RecordTypeSchema {
    /// Create a schema snapshot.
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// ============================================================================
// Registry Trait
// ============================================================================

/// Read-only view of all registered record-type definitions.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// List every registered record type, excluding internal/administrative
    /// types by name-prefix convention.
    async fn list_record_types(&self) -> Result<Vec<RecordTypeSchema>>;
}

// ============================================================================
// In-Memory Registry
// ============================================================================

/// In-memory schema registry for testing and embedding.
#[derive(Debug, Default)]
pub struct InMemorySchemaRegistry {
    schemas: Arc<RwLock<Vec<RecordTypeSchema>>>,
    internal_prefixes: Vec<String>,
}

impl InMemorySchemaRegistry {
    /// Create a registry with the default internal prefixes.
    #[must_use]
    pub fn new(schemas: Vec<RecordTypeSchema>) -> Self {
        Self::with_internal_prefixes(schemas, EngineConfig::default().internal_type_prefixes)
    }

    /// Create a registry with custom internal prefixes.
    #[must_use]
    pub fn with_internal_prefixes(
        schemas: Vec<RecordTypeSchema>,
        internal_prefixes: Vec<String>,
    ) -> Self {
        Self {
            schemas: Arc::new(RwLock::new(schemas)),
            internal_prefixes,
        }
    }

    /// Register an additional record type.
    pub async fn register(&self, schema: RecordTypeSchema) {
        self.schemas.write().await.push(schema);
    }
}

#[async_trait]
impl SchemaRegistry for InMemorySchemaRegistry {
    async fn list_record_types(&self) -> Result<Vec<RecordTypeSchema>> {
        let schemas = self.schemas.read().await;
        Ok(schemas
            .iter()
            .filter(|s| {
                !self
                    .internal_prefixes
                    .iter()
                    .any(|prefix| s.name.starts_with(prefix.as_str()))
            })
            .cloned()
            .collect())
    }
}
