//! Database record structures matching table schemas.

pub mod access_tokens;
pub mod audit;
pub mod models;
pub mod organizations;
pub mod runs;
pub mod snapshots;
pub mod users;
