//! Run reports.
//!
//! Every maintenance routine returns one of these plain JSON-serializable
//! objects; the invoking harness prints them verbatim. Record types are
//! keyed through a `BTreeMap` so serialized output is stable across runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reelo_core::UserId;
use serde::Serialize;
use uuid::Uuid;

use crate::roles::RoleLinkOutcome;

/// Per-record-type counters for a merge run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeTypeReport {
    /// References redirected to the canonical identity.
    pub updated: u64,
    /// Duplicate records removed.
    pub removed: u64,
    /// Per-record operations that failed.
    pub failed: u64,
    /// Set when the whole record type failed before per-record work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated result of one merge run.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Identity everything was folded into.
    pub canonical_identity: UserId,
    /// Per-record-type counters.
    pub record_types: BTreeMap<String, MergeTypeReport>,
    /// Role-link repair result.
    pub roles: RoleLinkOutcome,
    /// Total references redirected.
    pub total_updated: u64,
    /// Total duplicates removed.
    pub total_removed: u64,
    /// Total failed operations.
    pub total_failed: u64,
    /// Whether the run completed without any failure.
    pub success: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

/// Per-record-type counters for a cleanup run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupTypeReport {
    /// Records removed for referencing nobody.
    pub unassigned_removed: u64,
    /// Records removed for referencing a non-canonical identity.
    pub misassigned_removed: u64,
    /// Per-record deletions that failed.
    pub failed: u64,
    /// Set when the whole record type failed before per-record work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated result of one cleanup run.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Identity records were canonicalized against.
    pub canonical_identity: UserId,
    /// Per-record-type counters.
    pub record_types: BTreeMap<String, CleanupTypeReport>,
    /// Total records removed.
    pub total_removed: u64,
    /// Total failed operations.
    pub total_failed: u64,
    /// Whether the run completed without any failure.
    pub success: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

/// Per-record-type classification counts from the audit.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AuditTypeReport {
    /// Field values referencing exactly the canonical identity.
    pub correct: u64,
    /// Field values referencing some other identity.
    pub incorrect: u64,
    /// Field values referencing nobody.
    pub unassigned: u64,
}

/// Aggregated result of one validation audit.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Identity audited against.
    pub canonical_identity: UserId,
    /// Per-record-type classification counts.
    pub record_types: BTreeMap<String, AuditTypeReport>,
    /// Total correct classifications.
    pub total_correct: u64,
    /// Total incorrect classifications.
    pub total_incorrect: u64,
    /// Total unassigned classifications.
    pub total_unassigned: u64,
    /// `correct / (correct + incorrect + unassigned)`, 1.0 on an empty store.
    pub success_rate: f64,
    /// Whether no incorrect reference remains.
    pub success: bool,
    /// When the audit started.
    pub started_at: DateTime<Utc>,
    /// When the audit finished.
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_type_report_skips_absent_error() {
        let entry = MergeTypeReport {
            updated: 3,
            ..Default::default()
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("error"));

        let failed = MergeTypeReport {
            error: Some("storage down".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("storage down"));
    }

    #[test]
    fn test_record_type_keys_serialize_in_stable_order() {
        let mut record_types = BTreeMap::new();
        record_types.insert("video".to_string(), MergeTypeReport::default());
        record_types.insert("collection".to_string(), MergeTypeReport::default());
        record_types.insert("like".to_string(), MergeTypeReport::default());

        let report = MergeReport {
            run_id: Uuid::nil(),
            canonical_identity: UserId::from_raw(7),
            record_types,
            roles: RoleLinkOutcome::default(),
            total_updated: 0,
            total_removed: 0,
            total_failed: 0,
            success: true,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        let json = serde_json::to_string(&report).unwrap();
        let collection = json.find("collection").unwrap();
        let like = json.find("\"like\"").unwrap();
        let video = json.find("video").unwrap();
        assert!(collection < like && like < video);
    }
}
