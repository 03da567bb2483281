//! Shared kernel for the reelo platform crates.
//!
//! Provides the strongly typed identifier newtypes used across the content
//! store and its maintenance tooling.

pub mod ids;

pub use ids::{ParseIdError, RecordId, RoleId, UserId};
