//! Repository implementations for database access.
//!
//! Each repository wraps a SQLx connection or transaction, provides
//! strongly-typed operations, and returns domain models from
//! [`crate::db::models`]. Mutable entities implement the [`Repository`]
//! trait; append-only tables (run results, the audit log) and the derived
//! snapshot row expose only the operations their write models permit.

pub mod access_tokens;
pub mod audit;
pub mod models;
pub mod organizations;
pub mod repository;
pub mod runs;
pub mod snapshots;
pub mod users;

pub use access_tokens::AccessTokens;
pub use audit::AuditLog;
pub use models::Models;
pub use organizations::Organizations;
pub use repository::Repository;
pub use runs::RunResults;
pub use snapshots::Snapshots;
pub use users::Users;
