//! Role membership repair.
//!
//! After a merge the canonical identity must be reachable from every role.
//! The link write is a semantic upsert on the role/user join relation, so
//! repeated runs add nothing.

use std::sync::Arc;

use reelo_core::{RecordId, UserId};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::storage::{Filter, Storage};

/// Counters for one role-link pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleLinkOutcome {
    /// Join rows newly created.
    pub linked: u64,
    /// Roles already linked to the identity.
    pub already_linked: u64,
    /// Roles whose link write failed.
    pub failed: u64,
    /// Set when the role listing itself failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ensures the canonical identity is linked to every role.
pub struct RoleLinker {
    storage: Arc<dyn Storage>,
    config: EngineConfig,
}

impl RoleLinker {
    /// Create a linker with default host conventions.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_config(storage, EngineConfig::default())
    }

    /// Create a linker with custom host conventions.
    #[must_use]
    pub fn with_config(storage: Arc<dyn Storage>, config: EngineConfig) -> Self {
        Self { storage, config }
    }

    /// Link `canonical` to every role record.
    ///
    /// The storage adapter owns the upsert mechanics; from here a link write
    /// either creates the join row or confirms it already exists. Failures
    /// on one role are logged and counted, the rest proceed.
    pub async fn ensure_role_links(&self, canonical: UserId) -> Result<RoleLinkOutcome> {
        let roles = self
            .storage
            .find(&self.config.role_record_type, &Filter::All)
            .await?;

        let mut outcome = RoleLinkOutcome::default();
        for role in roles {
            match self
                .storage
                .connect(
                    &self.config.role_record_type,
                    role.id,
                    &self.config.role_users_field,
                    RecordId::from(canonical),
                )
                .await
            {
                Ok(true) => {
                    outcome.linked += 1;
                    tracing::info!(
                        role_id = %role.id,
                        user_id = %canonical,
                        "Linked canonical identity to role"
                    );
                }
                Ok(false) => outcome.already_linked += 1,
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        role_id = %role.id,
                        user_id = %canonical,
                        error = %e,
                        "Failed to link canonical identity to role"
                    );
                }
            }
        }

        Ok(outcome)
    }
}
