//! Orphaned and stray record cleanup.

use std::sync::Arc;

use reelo_core::{RecordId, UserId};
use serde::Serialize;

use crate::error::Result;
use crate::record::Record;
use crate::storage::{Filter, Storage};

/// Counters for one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanOutcome {
    /// Records deleted.
    pub removed: u64,
    /// Records whose deletion failed.
    pub failed: u64,
}

/// Removes records whose user reference is missing or points away from the
/// canonical identity.
pub struct OrphanCleaner {
    storage: Arc<dyn Storage>,
}

impl OrphanCleaner {
    /// Create a cleaner over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Delete every record whose `field` references nobody.
    ///
    /// Idempotent: a second run matches zero records.
    pub async fn clean_unassigned(&self, record_type: &str, field: &str) -> Result<CleanOutcome> {
        let records = self
            .storage
            .find(record_type, &Filter::unassigned(field))
            .await?;
        self.delete_all(record_type, &records, "unassigned").await
    }

    /// Delete every record whose `field` is assigned but references an
    /// identity other than `canonical`.
    ///
    /// This is deliberate single-identity canonicalization: stray records
    /// are removed, not reassigned. Do not point this at a store that is
    /// meant to keep more than one live identity.
    pub async fn clean_misassigned(
        &self,
        record_type: &str,
        field: &str,
        canonical: UserId,
    ) -> Result<CleanOutcome> {
        let records = self
            .storage
            .find(
                record_type,
                &Filter::misassigned(field, RecordId::from(canonical)),
            )
            .await?;
        self.delete_all(record_type, &records, "misassigned").await
    }

    async fn delete_all(
        &self,
        record_type: &str,
        records: &[Record],
        reason: &str,
    ) -> Result<CleanOutcome> {
        let mut outcome = CleanOutcome::default();
        for record in records {
            match self.storage.delete(record_type, record.id).await {
                Ok(()) => {
                    outcome.removed += 1;
                    tracing::debug!(
                        record_type = %record_type,
                        record_id = %record.id,
                        reason = %reason,
                        "Removed orphaned record"
                    );
                }
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        record_type = %record_type,
                        record_id = %record.id,
                        reason = %reason,
                        error = %e,
                        "Failed to remove orphaned record"
                    );
                }
            }
        }
        Ok(outcome)
    }
}
