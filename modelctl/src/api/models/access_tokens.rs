//! API models for access tokens.

use crate::db::models::access_tokens::{AccessTokenDBResponse, TokenStatus};
use crate::types::{AccessTokenId, ModelId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Grant request binding a user to a model.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AccessTokenCreate {
    #[schema(value_type = Uuid)]
    pub user_id: UserId,
    #[schema(value_type = Uuid)]
    pub model_id: ModelId,
    pub name: Option<String>,
}

/// An access token as listed by the management API. Never contains secret
/// material.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessTokenResponse {
    #[schema(value_type = Uuid)]
    pub id: AccessTokenId,
    #[schema(value_type = Uuid)]
    pub model_id: ModelId,
    #[schema(value_type = Uuid)]
    pub user_id: UserId,
    pub name: Option<String>,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
}

impl From<AccessTokenDBResponse> for AccessTokenResponse {
    fn from(token: AccessTokenDBResponse) -> Self {
        Self {
            id: token.id,
            model_id: token.model_id,
            user_id: token.user_id,
            name: token.name,
            status: token.status,
            created_at: token.created_at,
            activated_at: token.activated_at,
        }
    }
}

/// Activation response carrying the plaintext secret.
///
/// This is the only time the secret is ever returned; afterwards only its
/// hash exists server-side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessTokenActivatedResponse {
    #[serde(flatten)]
    pub token: AccessTokenResponse,
    pub secret: String,
}
