//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx over SQLite,
//! following the repository pattern: handlers encapsulate queries, models
//! mirror table rows, and [`errors::DbError`] classifies failures the
//! application can react to.
//!
//! Repositories are constructed from a connection or transaction, never a
//! pool, so multi-statement operations (most importantly the analytics
//! recompute) stay atomic:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let mut models = Models::new(&mut tx);
//! // ... operations ...
//! tx.commit().await?;
//! ```
//!
//! Migrations live in `migrations/` and are embedded through
//! [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
