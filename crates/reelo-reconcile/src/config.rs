//! Engine configuration.
//!
//! Host naming conventions the engine needs to know: which record types hold
//! users and roles, how the role side of the role/user join is spelled, which
//! record-type name prefixes are internal, and where the host keeps its
//! bookkeeping timestamps.

use serde::{Deserialize, Serialize};

/// Naming conventions of the host content store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Record type holding user identities.
    #[serde(default = "default_user_record_type")]
    pub user_record_type: String,
    /// Record type holding roles.
    #[serde(default = "default_role_record_type")]
    pub role_record_type: String,
    /// Multi-valued field on a role record linking its users.
    #[serde(default = "default_role_users_field")]
    pub role_users_field: String,
    /// Name prefixes marking internal/administrative record types.
    #[serde(default = "default_internal_type_prefixes")]
    pub internal_type_prefixes: Vec<String>,
    /// Attribute carrying the record creation timestamp.
    #[serde(default = "default_created_at_field")]
    pub created_at_field: String,
    /// Attribute carrying the record last-modified timestamp.
    #[serde(default = "default_updated_at_field")]
    pub updated_at_field: String,
}

fn default_user_record_type() -> String {
    "user".to_string()
}

fn default_role_record_type() -> String {
    "role".to_string()
}

fn default_role_users_field() -> String {
    "users".to_string()
}

fn default_internal_type_prefixes() -> Vec<String> {
    vec!["admin::".to_string(), "system::".to_string()]
}

fn default_created_at_field() -> String {
    "createdAt".to_string()
}

fn default_updated_at_field() -> String {
    "updatedAt".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_record_type: default_user_record_type(),
            role_record_type: default_role_record_type(),
            role_users_field: default_role_users_field(),
            internal_type_prefixes: default_internal_type_prefixes(),
            created_at_field: default_created_at_field(),
            updated_at_field: default_updated_at_field(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.user_record_type, "user");
        assert_eq!(config.role_record_type, "role");
        assert_eq!(config.role_users_field, "users");
        assert_eq!(config.created_at_field, "createdAt");
        assert_eq!(config.updated_at_field, "updatedAt");
        assert!(config.internal_type_prefixes.contains(&"admin::".to_string()));
    }

    #[test]
    fn test_empty_json_yields_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.user_record_type, "user");
        assert_eq!(config.updated_at_field, "updatedAt");
    }

    #[test]
    fn test_partial_json_overrides() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"user_record_type": "member"}"#).unwrap();
        assert_eq!(config.user_record_type, "member");
        assert_eq!(config.role_record_type, "role");
    }
}
