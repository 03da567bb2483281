//! Bulk reference rewriting.
//!
//! Redirects one user-reference field of one record type from a source
//! identity to a target identity. A failure on one record never aborts the
//! rest of the type.

use std::sync::Arc;

use reelo_core::{RecordId, UserId};
use serde::Serialize;
use serde_json::Value;

use crate::detect::UserReferenceField;
use crate::error::Result;
use crate::record::{references, relation_ids, Record};
use crate::storage::{Filter, Patch, Storage};

/// Counters for one rewrite pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewriteOutcome {
    /// Records successfully redirected.
    pub updated: u64,
    /// Records whose update failed.
    pub failed: u64,
}

/// Redirects user references from a source identity to a target identity.
pub struct ReferenceRewriter {
    storage: Arc<dyn Storage>,
}

impl ReferenceRewriter {
    /// Create a rewriter over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Redirect every record of `record_type` whose `field` references
    /// `from` so that it references `to` instead.
    ///
    /// Single-valued fields are overwritten; multi-valued fields replace the
    /// occurrence of `from` within the array, collapsing any duplicate of
    /// `to` that the replacement would create. Per-record failures are
    /// logged and counted; processing continues.
    pub async fn rewrite(
        &self,
        record_type: &str,
        field: &UserReferenceField,
        from: UserId,
        to: UserId,
    ) -> Result<RewriteOutcome> {
        let mut outcome = RewriteOutcome::default();
        if from == to {
            return Ok(outcome);
        }

        let filter = Filter::references(&field.name, RecordId::from(from));
        let records = self.storage.find(record_type, &filter).await?;

        for record in records {
            match self
                .rewrite_record(record_type, &record, &field.name, from, to)
                .await
            {
                Ok(true) => outcome.updated += 1,
                Ok(false) => {}
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        record_type = %record_type,
                        record_id = %record.id,
                        error = %e,
                        "Failed to redirect user reference"
                    );
                }
            }
        }

        tracing::debug!(
            record_type = %record_type,
            field = %field.name,
            from = %from,
            to = %to,
            updated = outcome.updated,
            failed = outcome.failed,
            "Rewrote user references"
        );
        Ok(outcome)
    }

    async fn rewrite_record(
        &self,
        record_type: &str,
        record: &Record,
        field: &str,
        from: UserId,
        to: UserId,
    ) -> Result<bool> {
        let Some(value) = record.get(field) else {
            return Ok(false);
        };
        let Some(redirected) = redirect_value(value, from.into(), to.into()) else {
            return Ok(false);
        };

        self.storage
            .update(record_type, record.id, Patch::new().set(field, redirected))
            .await?;
        Ok(true)
    }
}

/// Compute the replacement value for a field, or `None` when the value does
/// not reference `from`.
///
/// Preserves single- versus multi-valued shape. Replaced entries collapse to
/// the raw-id representation.
fn redirect_value(value: &Value, from: RecordId, to: RecordId) -> Option<Value> {
    if !references(value, from) {
        return None;
    }

    match value {
        Value::Array(items) => {
            let mut redirected = Vec::with_capacity(items.len());
            let mut target_seen = false;
            for item in items {
                let ids = relation_ids(item);
                let is_from = ids.len() == 1 && ids[0] == from;
                let is_to = ids.len() == 1 && ids[0] == to;
                if is_from || is_to {
                    // Replace the occurrence in place, but never leave two
                    // entries for the target identity.
                    if !target_seen {
                        target_seen = true;
                        redirected.push(Value::from(to.as_raw()));
                    }
                } else {
                    redirected.push(item.clone());
                }
            }
            Some(Value::Array(redirected))
        }
        _ => Some(Value::from(to.as_raw())),
    }
}
