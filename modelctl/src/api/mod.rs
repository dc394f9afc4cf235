//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Two surfaces are exposed:
//!
//! - **Management** (`/admin/api/v1/*`): model upload and metadata, operator
//!   test runs and ground-truth back-fill, access-token lifecycle.
//!   Authenticated via the trusted proxy header.
//! - **Execution** (`/api/v1/*`): `describe` and `execute`, authenticated by
//!   per-(user, model) access tokens and guarded by a per-source quota.
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! Interactive documentation is served at `/docs` when the server is running.

pub mod handlers;
pub mod models;
