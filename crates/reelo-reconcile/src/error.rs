//! Engine error types.

use reelo_core::{RecordId, UserId};
use thiserror::Error;

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Errors that can occur during reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Storage backend failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record addressed by id was not present in the store.
    #[error("Record not found in {record_type}: {id}")]
    RecordNotFound {
        record_type: String,
        id: RecordId,
    },

    /// A merge request listed no source identities.
    #[error("Merge request has no source identities")]
    NoSourceIdentities,

    /// The canonical identity also appears in the source list.
    #[error("Canonical identity {0} is listed as a merge source")]
    CanonicalIsSource(UserId),

    /// An explicit scope named a record type the registry does not know.
    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),

    /// No record types remained after scope resolution.
    #[error("No record types in scope")]
    EmptyScope,
}
