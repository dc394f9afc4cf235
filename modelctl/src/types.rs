//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`OrganizationId`]: Owning tenant identifier
//! - [`UserId`]: User account identifier
//! - [`ModelId`]: Predictive model identifier
//! - [`RunResultId`]: Execution run identifier
//! - [`AccessTokenId`]: Execution credential identifier

use uuid::Uuid;

// Type aliases for IDs
pub type OrganizationId = Uuid;
pub type UserId = Uuid;
pub type ModelId = Uuid;
pub type RunResultId = Uuid;
pub type AccessTokenId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}
