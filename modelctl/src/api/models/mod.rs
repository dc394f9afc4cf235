//! Request/response data structures for API communication.

pub mod access_tokens;
pub mod models;
pub mod predict;
pub mod runs;
pub mod users;
