//! Strongly Typed Identifiers
//!
//! This module provides type-safe identifier types for reelo. The content
//! store hands out numeric primary keys; using the newtype pattern, these
//! types prevent accidental misuse of different ID types at compile time.
//!
//! # Example
//!
//! ```
//! use reelo_core::{RecordId, UserId};
//!
//! let user = UserId::from_raw(7);
//! let record = RecordId::from_raw(42);
//!
//! // Type safety: cannot pass RecordId where UserId is expected
//! fn requires_user(id: UserId) -> String {
//!     id.to_string()
//! }
//!
//! let result = requires_user(user);
//! // requires_user(record); // This would not compile!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying integer parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a strongly-typed ID type
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an ID from a raw store key.
            #[must_use]
            pub const fn from_raw(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the underlying store key.
            #[must_use]
            pub const fn as_raw(self) -> i64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.parse::<i64>().map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    message: e.to_string(),
                })
            }
        }
    };
}

define_id!(
    /// Strongly typed identifier for user records.
    ///
    /// A merge run folds one or more of these (the source identities) into a
    /// single surviving one (the canonical identity).
    UserId
);

define_id!(
    /// Strongly typed identifier for role records.
    RoleId
);

define_id!(
    /// Strongly typed identifier for an arbitrary content record.
    ///
    /// `RecordId` is ordered so that duplicate resolution can break exact
    /// timestamp ties deterministically (lowest id wins).
    RecordId
);

impl From<UserId> for RecordId {
    /// A user identity viewed as a plain record reference.
    fn from(id: UserId) -> Self {
        Self(id.0)
    }
}

impl From<RoleId> for RecordId {
    /// A role identity viewed as a plain record reference.
    fn from(id: RoleId) -> Self {
        Self(id.0)
    }
}
