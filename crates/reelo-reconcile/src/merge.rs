//! Merge orchestration.
//!
//! Drives the rewriter, deduplicator, orphan cleaner, and role linker across
//! every record type in scope. The orchestrator has no per-record-type
//! logic beyond looking up an optional deduplication policy; record types
//! added to the host schema are picked up automatically.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use reelo_core::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dedup::{DeduplicationPolicy, Deduplicator};
use crate::detect::detect_user_fields;
use crate::error::{ReconcileError, Result};
use crate::orphan::OrphanCleaner;
use crate::report::{CleanupReport, CleanupTypeReport, MergeReport, MergeTypeReport};
use crate::rewrite::ReferenceRewriter;
use crate::roles::{RoleLinkOutcome, RoleLinker};
use crate::schema::{RecordTypeSchema, SchemaRegistry};
use crate::storage::Storage;

/// Request to fold source identities into one canonical identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Identities being folded away.
    pub source_identities: Vec<UserId>,
    /// The surviving identity.
    pub canonical_identity: UserId,
    /// Record types to process. Empty means every registered record type
    /// except the user and role types themselves.
    #[serde(default)]
    pub record_type_scope: Vec<String>,
}

impl MergeRequest {
    /// Request with the default scope.
    #[must_use]
    pub fn new(source_identities: Vec<UserId>, canonical_identity: UserId) -> Self {
        Self {
            source_identities,
            canonical_identity,
            record_type_scope: Vec::new(),
        }
    }
}

/// Drives a full consolidation run and aggregates the report.
pub struct MergeOrchestrator {
    registry: Arc<dyn SchemaRegistry>,
    config: EngineConfig,
    policies: HashMap<String, DeduplicationPolicy>,
    rewriter: ReferenceRewriter,
    deduplicator: Deduplicator,
    cleaner: OrphanCleaner,
    linker: RoleLinker,
}

impl MergeOrchestrator {
    /// Create an orchestrator with default host conventions.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, registry: Arc<dyn SchemaRegistry>) -> Self {
        Self::with_config(storage, registry, EngineConfig::default())
    }

    /// Create an orchestrator with custom host conventions.
    #[must_use]
    pub fn with_config(
        storage: Arc<dyn Storage>,
        registry: Arc<dyn SchemaRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            rewriter: ReferenceRewriter::new(storage.clone()),
            deduplicator: Deduplicator::with_config(storage.clone(), config.clone()),
            cleaner: OrphanCleaner::new(storage.clone()),
            linker: RoleLinker::with_config(storage, config.clone()),
            config,
            policies: HashMap::new(),
        }
    }

    /// Register a deduplication policy for one record type.
    #[must_use]
    pub fn with_policy(
        mut self,
        record_type: impl Into<String>,
        policy: DeduplicationPolicy,
    ) -> Self {
        self.policies.insert(record_type.into(), policy);
        self
    }

    /// Fold every source identity's data into the canonical identity.
    ///
    /// Per record type in scope: detect user-reference fields, redirect each
    /// field away from every source identity, then deduplicate if a policy
    /// is registered. Afterwards the canonical identity is linked to every
    /// role. A storage failure covering a whole record type marks that
    /// type's entry failed and the run moves on; the run itself always
    /// produces a report once setup validation has passed.
    pub async fn merge(&self, request: &MergeRequest) -> Result<MergeReport> {
        Self::validate_request(request)?;
        let scope = self.resolve_scope(&request.record_type_scope).await?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(
            run_id = %run_id,
            canonical = %request.canonical_identity,
            sources = request.source_identities.len(),
            record_types = scope.len(),
            "Starting identity merge run"
        );

        let mut record_types: BTreeMap<String, MergeTypeReport> = BTreeMap::new();
        for schema in &scope {
            let entry = match self.merge_record_type(schema, request).await {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::error!(
                        run_id = %run_id,
                        record_type = %schema.name,
                        error = %e,
                        "Record type failed during merge"
                    );
                    MergeTypeReport {
                        error: Some(e.to_string()),
                        ..Default::default()
                    }
                }
            };
            record_types.insert(schema.name.clone(), entry);
        }

        let roles = match self.linker.ensure_role_links(request.canonical_identity).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Role link repair failed");
                RoleLinkOutcome {
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };

        let total_updated = record_types.values().map(|r| r.updated).sum();
        let total_removed = record_types.values().map(|r| r.removed).sum();
        let total_failed = record_types.values().map(|r| r.failed).sum::<u64>() + roles.failed;
        let success = total_failed == 0
            && roles.error.is_none()
            && record_types.values().all(|r| r.error.is_none());

        let finished_at = Utc::now();
        tracing::info!(
            run_id = %run_id,
            updated = total_updated,
            removed = total_removed,
            failed = total_failed,
            success = success,
            "Finished identity merge run"
        );

        Ok(MergeReport {
            run_id,
            canonical_identity: request.canonical_identity,
            record_types,
            roles,
            total_updated,
            total_removed,
            total_failed,
            success,
            started_at,
            finished_at,
        })
    }

    /// Sweep orphaned and stray records across the default scope.
    ///
    /// Per record type, per detected user-reference field: remove records
    /// referencing nobody, then records referencing an identity other than
    /// `canonical`. Same error containment as [`merge`](Self::merge).
    pub async fn cleanup(&self, canonical: UserId) -> Result<CleanupReport> {
        let scope = self.resolve_scope(&[]).await?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(
            run_id = %run_id,
            canonical = %canonical,
            record_types = scope.len(),
            "Starting orphan cleanup run"
        );

        let mut record_types: BTreeMap<String, CleanupTypeReport> = BTreeMap::new();
        for schema in &scope {
            let entry = match self.cleanup_record_type(schema, canonical).await {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::error!(
                        run_id = %run_id,
                        record_type = %schema.name,
                        error = %e,
                        "Record type failed during cleanup"
                    );
                    CleanupTypeReport {
                        error: Some(e.to_string()),
                        ..Default::default()
                    }
                }
            };
            record_types.insert(schema.name.clone(), entry);
        }

        let total_removed = record_types
            .values()
            .map(|r| r.unassigned_removed + r.misassigned_removed)
            .sum();
        let total_failed = record_types.values().map(|r| r.failed).sum();
        let success =
            total_failed == 0 && record_types.values().all(|r| r.error.is_none());

        let finished_at = Utc::now();
        tracing::info!(
            run_id = %run_id,
            removed = total_removed,
            failed = total_failed,
            success = success,
            "Finished orphan cleanup run"
        );

        Ok(CleanupReport {
            run_id,
            canonical_identity: canonical,
            record_types,
            total_removed,
            total_failed,
            success,
            started_at,
            finished_at,
        })
    }

    async fn merge_record_type(
        &self,
        schema: &RecordTypeSchema,
        request: &MergeRequest,
    ) -> Result<MergeTypeReport> {
        let fields = detect_user_fields(schema, &self.config.user_record_type);
        let mut entry = MergeTypeReport::default();
        if fields.is_empty() {
            return Ok(entry);
        }

        for field in &fields {
            for source in &request.source_identities {
                let outcome = self
                    .rewriter
                    .rewrite(&schema.name, field, *source, request.canonical_identity)
                    .await?;
                entry.updated += outcome.updated;
                entry.failed += outcome.failed;
            }
        }

        if let Some(policy) = self.policies.get(&schema.name) {
            // Duplicates are anchored on the record's owning user, so a
            // single-valued field wins over a members-style one.
            let anchor = fields.iter().find(|f| !f.multi_valued).unwrap_or(&fields[0]);
            let outcome = self
                .deduplicator
                .deduplicate(&schema.name, anchor, policy, request.canonical_identity)
                .await?;
            entry.removed += outcome.removed;
            entry.failed += outcome.failed;
        }

        Ok(entry)
    }

    async fn cleanup_record_type(
        &self,
        schema: &RecordTypeSchema,
        canonical: UserId,
    ) -> Result<CleanupTypeReport> {
        let fields = detect_user_fields(schema, &self.config.user_record_type);
        let mut entry = CleanupTypeReport::default();

        for field in &fields {
            let unassigned = self.cleaner.clean_unassigned(&schema.name, &field.name).await?;
            entry.unassigned_removed += unassigned.removed;
            entry.failed += unassigned.failed;

            let misassigned = self
                .cleaner
                .clean_misassigned(&schema.name, &field.name, canonical)
                .await?;
            entry.misassigned_removed += misassigned.removed;
            entry.failed += misassigned.failed;
        }

        Ok(entry)
    }

    fn validate_request(request: &MergeRequest) -> Result<()> {
        if request.source_identities.is_empty() {
            return Err(ReconcileError::NoSourceIdentities);
        }
        if request
            .source_identities
            .contains(&request.canonical_identity)
        {
            return Err(ReconcileError::CanonicalIsSource(request.canonical_identity));
        }
        Ok(())
    }

    /// Resolve the record types a run covers.
    ///
    /// An empty scope expands to every registered record type minus the
    /// user and role types. An explicit scope is taken verbatim and must
    /// resolve completely.
    async fn resolve_scope(&self, scope: &[String]) -> Result<Vec<RecordTypeSchema>> {
        let registered = self.registry.list_record_types().await?;

        let resolved: Vec<RecordTypeSchema> = if scope.is_empty() {
            registered
                .into_iter()
                .filter(|s| {
                    s.name != self.config.user_record_type
                        && s.name != self.config.role_record_type
                })
                .collect()
        } else {
            scope
                .iter()
                .map(|name| {
                    registered
                        .iter()
                        .find(|s| &s.name == name)
                        .cloned()
                        .ok_or_else(|| ReconcileError::UnknownRecordType(name.clone()))
                })
                .collect::<Result<_>>()?
        };

        if resolved.is_empty() {
            return Err(ReconcileError::EmptyScope);
        }
        Ok(resolved)
    }
}
