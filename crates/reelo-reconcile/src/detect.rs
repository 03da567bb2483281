//! User-reference field detection.
//!
//! Pure classification over a schema snapshot. Every other component leans
//! on this: a field missed here silently escapes the merge, so both
//! detection rules run on every field and their results are unioned.

use serde::Serialize;

use crate::schema::{Cardinality, FieldKind, RecordTypeSchema};

/// Field names conventionally holding a user reference even when the schema
/// does not type them as relations.
pub const USER_FIELD_NAMES: [&str; 5] = ["user", "users", "owner", "creator", "author"];

/// A field classified as referencing the user record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserReferenceField {
    /// Field name.
    pub name: String,
    /// Whether the schema declares the field as multi-valued.
    pub multi_valued: bool,
}

/// Classify the fields of one record type.
///
/// Deterministic and total: never fails, returns an empty list when nothing
/// matches. A field qualifies when it is a relation targeting
/// `user_record_type`, or when its name matches [`USER_FIELD_NAMES`];
/// results are de-duplicated by field name.
#[must_use]
pub fn detect_user_fields(
    schema: &RecordTypeSchema,
    user_record_type: &str,
) -> Vec<UserReferenceField> {
    let mut detected: Vec<UserReferenceField> = Vec::new();

    for field in &schema.fields {
        let typed_relation = field.kind == FieldKind::Relation
            && field.relation_target.as_deref() == Some(user_record_type);
        let conventional_name = USER_FIELD_NAMES.contains(&field.name.as_str());

        if !typed_relation && !conventional_name {
            continue;
        }
        if detected.iter().any(|d| d.name == field.name) {
            continue;
        }

        detected.push(UserReferenceField {
            name: field.name.clone(),
            multi_valued: field.cardinality == Some(Cardinality::Many),
        });
    }

    detected
}
