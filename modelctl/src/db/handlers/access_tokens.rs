use std::collections::HashMap;

use crate::db::errors::{DbError, Result};
use crate::db::handlers::repository::Repository;
use crate::db::models::access_tokens::{
    AccessTokenCreateDBRequest, AccessTokenCredentialDBResponse, AccessTokenDBResponse, AccessTokenUpdateDBRequest,
};
use crate::types::{AccessTokenId, ModelId, OrganizationId, UserId, abbrev_uuid};
use chrono::Utc;
use sqlx::{FromRow, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing access tokens
#[derive(Debug, Clone)]
pub struct AccessTokenFilter {
    pub skip: i64,
    pub limit: i64,
    pub organization_id: Option<OrganizationId>,
    pub model_id: Option<ModelId>,
    pub user_id: Option<UserId>,
}

// Columns selected everywhere the secret hash must not travel
const TOKEN_COLUMNS: &str = "id, model_id, user_id, name, status, created_at, activated_at";

#[derive(Debug, Clone, FromRow)]
struct CredentialRow {
    pub id: AccessTokenId,
    pub model_id: ModelId,
    pub user_id: UserId,
    pub status: crate::db::models::access_tokens::TokenStatus,
    pub secret_hash: String,
}

pub struct AccessTokens<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for AccessTokens<'c> {
    type CreateRequest = AccessTokenCreateDBRequest;
    type UpdateRequest = AccessTokenUpdateDBRequest;
    type Response = AccessTokenDBResponse;
    type Id = AccessTokenId;
    type Filter = AccessTokenFilter;

    #[instrument(skip(self, request), fields(model_id = %abbrev_uuid(&request.model_id), user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let token = sqlx::query_as::<_, AccessTokenDBResponse>(&format!(
            r#"
            INSERT INTO access_tokens (id, model_id, user_id, name, status, created_at)
            VALUES (?, ?, ?, ?, 'inactive', ?)
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(request.model_id)
        .bind(request.user_id)
        .bind(&request.name)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(token)
    }

    #[instrument(skip(self), fields(token_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let token = sqlx::query_as::<_, AccessTokenDBResponse>(&format!("SELECT {TOKEN_COLUMNS} FROM access_tokens WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(token)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        // SQLite has no array binds; the id sets here are small
        let mut responses = HashMap::new();
        for id in ids {
            if let Some(token) = self.get_by_id(id).await? {
                responses.insert(id, token);
            }
        }
        Ok(responses)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let tokens = sqlx::query_as::<_, AccessTokenDBResponse>(
            r#"
            SELECT t.id, t.model_id, t.user_id, t.name, t.status, t.created_at, t.activated_at
            FROM access_tokens t
            INNER JOIN users u ON t.user_id = u.id
            WHERE (?1 IS NULL OR u.organization_id = ?1)
              AND (?2 IS NULL OR t.model_id = ?2)
              AND (?3 IS NULL OR t.user_id = ?3)
            ORDER BY t.created_at DESC
            LIMIT ?4 OFFSET ?5
            "#,
        )
        .bind(filter.organization_id)
        .bind(filter.model_id)
        .bind(filter.user_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(tokens)
    }

    #[instrument(skip(self), fields(token_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE id = ?")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(token_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let token = sqlx::query_as::<_, AccessTokenDBResponse>(&format!(
            r#"
            UPDATE access_tokens
            SET name = COALESCE(?2, name)
            WHERE id = ?1
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(token)
    }
}

impl<'c> AccessTokens<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Move a token to `active`, storing the hash of its freshly generated
    /// secret. Re-activation rotates the secret: the previous hash is
    /// overwritten and the old plaintext stops resolving.
    #[instrument(skip(self, secret_hash), fields(token_id = %abbrev_uuid(&id)), err)]
    pub async fn activate(&mut self, id: AccessTokenId, secret_hash: &str) -> Result<AccessTokenDBResponse> {
        let token = sqlx::query_as::<_, AccessTokenDBResponse>(&format!(
            r#"
            UPDATE access_tokens
            SET status = 'active', secret_hash = ?2, activated_at = ?3
            WHERE id = ?1
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(secret_hash)
        .bind(Utc::now())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(token)
    }

    /// Indexed lookup by secret hash for credential resolution. Callers must
    /// finish with a constant-time comparison of the returned hash.
    #[instrument(skip_all, err)]
    pub async fn find_credential_by_hash(&mut self, secret_hash: &str) -> Result<Option<AccessTokenCredentialDBResponse>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, model_id, user_id, status, secret_hash FROM access_tokens WHERE secret_hash = ?",
        )
        .bind(secret_hash)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(row.map(|row| AccessTokenCredentialDBResponse {
            id: row.id,
            model_id: row.model_id,
            user_id: row.user_id,
            status: row.status,
            secret_hash: row.secret_hash,
        }))
    }
}
