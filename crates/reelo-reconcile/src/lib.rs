//! Identity consolidation and data reconciliation for the reelo content
//! store.
//!
//! The content store accumulates duplicate user identities (repeat sign-ups,
//! imported test accounts) whose videos, likes, collections, and watch
//! history end up scattered across several user records. This crate folds
//! those identities into one canonical identity and reconciles everything
//! that references them, without knowing the record types ahead of time.
//!
//! # Components
//!
//! - [`schema`] - record-type snapshots and the [`SchemaRegistry`] contract
//! - [`detect`] - pure classification of user-reference fields
//! - [`storage`] - the [`Storage`] contract the host data layer implements
//! - [`rewrite`] - bulk redirection of references between identities
//! - [`dedup`] - duplicate resolution with per-type tie-break policies
//! - [`orphan`] - removal of unassigned and stray records
//! - [`roles`] - idempotent role membership repair
//! - [`merge`] - the [`MergeOrchestrator`] driving a full run
//! - [`audit`] - the read-only [`ValidationAuditor`]
//!
//! # Guarantees
//!
//! Every routine is idempotent: re-running a consolidated state is a no-op,
//! which is also the recovery story, since nothing provides a transaction
//! across record types. Per-record failures are logged and counted, never
//! fatal; a run that starts always returns a report.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use reelo_core::UserId;
//! use reelo_reconcile::{
//!     Cardinality, DeduplicationPolicy, FieldDescriptor, InMemorySchemaRegistry,
//!     InMemoryStorage, MergeOrchestrator, MergeRequest, RecordTypeSchema, TieBreak,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> reelo_reconcile::Result<()> {
//! let storage = Arc::new(InMemoryStorage::new());
//! let registry = Arc::new(InMemorySchemaRegistry::new(vec![RecordTypeSchema::new(
//!     "collection",
//!     vec![
//!         FieldDescriptor::relation("user", "user", Cardinality::One),
//!         FieldDescriptor::relation("video", "video", Cardinality::One),
//!     ],
//! )]));
//!
//! let orchestrator = MergeOrchestrator::new(storage, registry).with_policy(
//!     "collection",
//!     DeduplicationPolicy::new(["user", "video"], TieBreak::KeepEarliestCreated),
//! );
//!
//! let request = MergeRequest::new(vec![UserId::from_raw(9)], UserId::from_raw(7));
//! let report = orchestrator.merge(&request).await?;
//! assert!(report.success);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod dedup;
pub mod detect;
pub mod error;
pub mod merge;
pub mod orphan;
pub mod record;
pub mod report;
pub mod rewrite;
pub mod roles;
pub mod schema;
pub mod storage;

// Re-export commonly used types
pub use audit::ValidationAuditor;
pub use config::EngineConfig;
pub use dedup::{DedupOutcome, DeduplicationPolicy, Deduplicator, TieBreak};
pub use detect::{detect_user_fields, UserReferenceField, USER_FIELD_NAMES};
pub use error::{ReconcileError, Result};
pub use merge::{MergeOrchestrator, MergeRequest};
pub use orphan::{CleanOutcome, OrphanCleaner};
pub use record::{is_assigned, references, relation_ids, Record};
pub use report::{
    AuditTypeReport, CleanupReport, CleanupTypeReport, MergeReport, MergeTypeReport,
    ValidationReport,
};
pub use rewrite::{ReferenceRewriter, RewriteOutcome};
pub use roles::{RoleLinkOutcome, RoleLinker};
pub use schema::{
    Cardinality, FieldDescriptor, FieldKind, InMemorySchemaRegistry, RecordTypeSchema,
    SchemaRegistry,
};
pub use storage::{Filter, InMemoryStorage, Patch, Storage};
