//! Records and relation-value normalization.
//!
//! The host hands back schemaless records: a relation attribute may hold a
//! raw id, a populated sub-object, or an array of either, depending on how
//! the row was written and whether the query populated it. Everything that
//! compares identities goes through the helpers here first.

use chrono::{DateTime, Utc};
use reelo_core::RecordId;
use serde_json::{Map, Value};

/// One instance of a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Store key.
    pub id: RecordId,
    /// Schemaless attribute map.
    pub attrs: Map<String, Value>,
}

impl Record {
    /// Create a record from its store key and attributes.
    #[must_use]
    pub fn new(id: RecordId, attrs: Map<String, Value>) -> Self {
        Self { id, attrs }
    }

    /// Get an attribute value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attrs.get(field)
    }

    /// Parse a timestamp attribute.
    ///
    /// Accepts RFC 3339 strings and millisecond epoch numbers, the two
    /// shapes the host emits.
    #[must_use]
    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        match self.attrs.get(field)? {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
            _ => None,
        }
    }
}

/// Normalize any relation representation to the ids it references.
///
/// Total: unexpected shapes contribute nothing.
#[must_use]
pub fn relation_ids(value: &Value) -> Vec<RecordId> {
    match value {
        Value::Number(n) => n.as_i64().map(RecordId::from_raw).into_iter().collect(),
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .map(RecordId::from_raw)
            .into_iter()
            .collect(),
        Value::Object(map) => map
            .get("id")
            .map(relation_ids)
            .unwrap_or_default(),
        Value::Array(items) => items.iter().flat_map(relation_ids).collect(),
        _ => Vec::new(),
    }
}

/// Whether a relation value references the given id, in any representation.
#[must_use]
pub fn references(value: &Value, id: RecordId) -> bool {
    relation_ids(value).contains(&id)
}

/// Whether a relation value references anything at all.
///
/// Null, absent-style junk, and empty arrays are all unassigned.
#[must_use]
pub fn is_assigned(value: &Value) -> bool {
    !relation_ids(value).is_empty()
}
