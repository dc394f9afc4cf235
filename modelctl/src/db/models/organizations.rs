use crate::types::OrganizationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database request for creating an organization
#[derive(Debug, Clone)]
pub struct OrganizationCreateDBRequest {
    pub name: String,
}

/// Database response for an organization
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrganizationDBResponse {
    pub id: OrganizationId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
