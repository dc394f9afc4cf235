//! Database models for execution access tokens.

use crate::types::{AccessTokenId, ModelId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Access-token lifecycle state. Tokens are granted `inactive` and only gain
/// a secret on activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Inactive,
    Active,
}

/// Database request for granting a new access token
#[derive(Debug, Clone)]
pub struct AccessTokenCreateDBRequest {
    pub model_id: ModelId,
    pub user_id: UserId,
    pub name: Option<String>,
}

/// Database request for updating an access token's metadata
#[derive(Debug, Clone, Default)]
pub struct AccessTokenUpdateDBRequest {
    pub name: Option<String>,
}

/// Database response for an access token. The secret hash is deliberately
/// absent: it only surfaces through the dedicated credential lookup.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessTokenDBResponse {
    pub id: AccessTokenId,
    pub model_id: ModelId,
    pub user_id: UserId,
    pub name: Option<String>,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
}

/// Credential-resolution view of a token, including the stored hash so the
/// caller can finish with a constant-time comparison.
#[derive(Debug, Clone)]
pub struct AccessTokenCredentialDBResponse {
    pub id: AccessTokenId,
    pub model_id: ModelId,
    pub user_id: UserId,
    pub status: TokenStatus,
    pub secret_hash: String,
}
