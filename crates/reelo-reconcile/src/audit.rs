//! Post-merge validation audit.
//!
//! An independent, read-only pass over the store. It recomputes correctness
//! counts from raw records rather than trusting the merge report, so it
//! catches whatever the orchestrator's continue-on-error policy left behind.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use reelo_core::{RecordId, UserId};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::detect::detect_user_fields;
use crate::error::{ReconcileError, Result};
use crate::record::relation_ids;
use crate::report::{AuditTypeReport, ValidationReport};
use crate::schema::SchemaRegistry;
use crate::storage::{Filter, Storage};

/// Read-only auditor of the consolidated state.
pub struct ValidationAuditor {
    storage: Arc<dyn Storage>,
    registry: Arc<dyn SchemaRegistry>,
    config: EngineConfig,
}

impl ValidationAuditor {
    /// Create an auditor with default host conventions.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, registry: Arc<dyn SchemaRegistry>) -> Self {
        Self::with_config(storage, registry, EngineConfig::default())
    }

    /// Create an auditor with custom host conventions.
    #[must_use]
    pub fn with_config(
        storage: Arc<dyn Storage>,
        registry: Arc<dyn SchemaRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            registry,
            config,
        }
    }

    /// Classify every user reference in scope against `canonical`.
    ///
    /// Per record type with at least one user-reference field, each record's
    /// field value is counted as correct (references exactly the canonical
    /// identity), incorrect (references some other identity), or unassigned
    /// (references nobody). Never mutates state.
    pub async fn audit(&self, canonical: UserId) -> Result<ValidationReport> {
        let registered = self.registry.list_record_types().await?;
        let scope: Vec<_> = registered
            .into_iter()
            .filter(|s| {
                s.name != self.config.user_record_type && s.name != self.config.role_record_type
            })
            .collect();
        if scope.is_empty() {
            return Err(ReconcileError::EmptyScope);
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let canonical_ref = RecordId::from(canonical);

        let mut record_types: BTreeMap<String, AuditTypeReport> = BTreeMap::new();
        for schema in &scope {
            let fields = detect_user_fields(schema, &self.config.user_record_type);
            if fields.is_empty() {
                continue;
            }

            let records = self.storage.find(&schema.name, &Filter::All).await?;
            let mut entry = AuditTypeReport::default();
            for record in &records {
                for field in &fields {
                    let ids = record.get(&field.name).map(relation_ids).unwrap_or_default();
                    if ids.is_empty() {
                        entry.unassigned += 1;
                    } else if ids.iter().all(|id| *id == canonical_ref) {
                        entry.correct += 1;
                    } else {
                        entry.incorrect += 1;
                    }
                }
            }
            record_types.insert(schema.name.clone(), entry);
        }

        let total_correct = record_types.values().map(|r| r.correct).sum::<u64>();
        let total_incorrect = record_types.values().map(|r| r.incorrect).sum::<u64>();
        let total_unassigned = record_types.values().map(|r| r.unassigned).sum::<u64>();
        let classified = total_correct + total_incorrect + total_unassigned;
        let success_rate = if classified == 0 {
            1.0
        } else {
            total_correct as f64 / classified as f64
        };
        let success = total_incorrect == 0;

        let finished_at = Utc::now();
        tracing::info!(
            run_id = %run_id,
            canonical = %canonical,
            correct = total_correct,
            incorrect = total_incorrect,
            unassigned = total_unassigned,
            success = success,
            "Finished validation audit"
        );

        Ok(ValidationReport {
            run_id,
            canonical_identity: canonical,
            record_types,
            total_correct,
            total_incorrect,
            total_unassigned,
            success_rate,
            success,
            started_at,
            finished_at,
        })
    }
}
