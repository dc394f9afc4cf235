//! Execution credential lifecycle: grant, activate, list, revoke.
//!
//! Tokens are granted `inactive` with no secret. Activation generates the
//! secret, returns the plaintext exactly once, and stores only its hash.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::instrument;

use crate::{
    AppState,
    api::models::{
        access_tokens::{AccessTokenActivatedResponse, AccessTokenCreate, AccessTokenResponse},
        users::CurrentUser,
    },
    auth::require_admin,
    crypto::{generate_token_secret, hash_token_secret},
    db::errors::DbError,
    db::handlers::{AccessTokens, Models, Repository, Users, access_tokens::AccessTokenFilter},
    db::models::access_tokens::{AccessTokenCreateDBRequest, AccessTokenDBResponse},
    errors::{Error, Result},
    types::AccessTokenId,
};

fn token_not_found(id: AccessTokenId) -> Error {
    Error::NotFound {
        resource: "Access token".to_string(),
        id: id.to_string(),
    }
}

/// Fetch a token scoped to the caller's organization, resolved through the
/// granted user's tenancy.
async fn find_org_token(state: &AppState, id: AccessTokenId, user: &CurrentUser) -> Result<AccessTokenDBResponse> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let token = AccessTokens::new(&mut conn).get_by_id(id).await?.ok_or_else(|| token_not_found(id))?;
    let owner = Users::new(&mut conn).get_by_id(token.user_id).await?;

    match owner {
        Some(owner) if owner.organization_id == user.organization_id => Ok(token),
        _ => Err(token_not_found(id)),
    }
}

/// Grant a (user, model) execution credential.
#[utoipa::path(
    post,
    path = "/access-tokens",
    tag = "access_tokens",
    summary = "Grant access token",
    request_body = AccessTokenCreate,
    responses(
        (status = 201, description = "Token granted, inactive", body = AccessTokenResponse),
        (status = 400, description = "Unknown user or model"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
    ),
    security(("X-Modelctl-User" = []))
)]
#[instrument(skip_all, fields(user = %current_user.email))]
pub async fn grant_access_token(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<AccessTokenCreate>,
) -> Result<(StatusCode, Json<AccessTokenResponse>)> {
    require_admin(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;

    // Both sides of the binding must exist inside the caller's organization
    let grantee = Users::new(&mut conn).get_by_id(request.user_id).await?;
    if !grantee.is_some_and(|u| u.organization_id == current_user.organization_id) {
        return Err(Error::BadRequest {
            message: "Unknown user for access grant".to_string(),
        });
    }
    let model = Models::new(&mut conn).get_by_id(request.model_id).await?;
    if !model.is_some_and(|m| m.organization_id == current_user.organization_id) {
        return Err(Error::BadRequest {
            message: "Unknown model for access grant".to_string(),
        });
    }

    let token = AccessTokens::new(&mut conn)
        .create(&AccessTokenCreateDBRequest {
            model_id: request.model_id,
            user_id: request.user_id,
            name: request.name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(AccessTokenResponse::from(token))))
}

/// List the organization's access tokens. Secrets never appear here.
#[utoipa::path(
    get,
    path = "/access-tokens",
    tag = "access_tokens",
    summary = "List access tokens",
    responses(
        (status = 200, description = "Tokens granted within the organization", body = Vec<AccessTokenResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Modelctl-User" = []))
)]
#[instrument(skip_all, fields(user = %current_user.email))]
pub async fn list_access_tokens(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<Vec<AccessTokenResponse>>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let tokens = AccessTokens::new(&mut conn)
        .list(&AccessTokenFilter {
            skip: 0,
            limit: 500,
            organization_id: Some(current_user.organization_id),
            model_id: None,
            user_id: None,
        })
        .await?;

    Ok(Json(tokens.into_iter().map(AccessTokenResponse::from).collect()))
}

/// Activate a token, generating its secret.
///
/// The plaintext secret is returned in this response and never again;
/// re-activating rotates it.
#[utoipa::path(
    post,
    path = "/access-tokens/{id}/activate",
    tag = "access_tokens",
    summary = "Activate access token",
    params(("id" = uuid::Uuid, Path, description = "Token ID")),
    responses(
        (status = 200, description = "Activated token with its one-time secret", body = AccessTokenActivatedResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Token not found"),
    ),
    security(("X-Modelctl-User" = []))
)]
#[instrument(skip_all, fields(user = %current_user.email))]
pub async fn activate_access_token(
    State(state): State<AppState>,
    Path(id): Path<AccessTokenId>,
    current_user: CurrentUser,
) -> Result<Json<AccessTokenActivatedResponse>> {
    require_admin(&current_user)?;
    find_org_token(&state, id, &current_user).await?;

    let secret = generate_token_secret();
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let token = AccessTokens::new(&mut conn).activate(id, &hash_token_secret(&secret)).await?;

    Ok(Json(AccessTokenActivatedResponse {
        token: AccessTokenResponse::from(token),
        secret,
    }))
}

/// Revoke a token. Takes effect immediately; the secret stops resolving.
#[utoipa::path(
    delete,
    path = "/access-tokens/{id}",
    tag = "access_tokens",
    summary = "Revoke access token",
    params(("id" = uuid::Uuid, Path, description = "Token ID")),
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Token not found"),
    ),
    security(("X-Modelctl-User" = []))
)]
#[instrument(skip_all, fields(user = %current_user.email))]
pub async fn revoke_access_token(
    State(state): State<AppState>,
    Path(id): Path<AccessTokenId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    require_admin(&current_user)?;
    find_org_token(&state, id, &current_user).await?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    if !AccessTokens::new(&mut conn).delete(id).await? {
        return Err(token_not_found(id));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::resolve_access_token;
    use crate::test_utils::{create_test_model, create_test_org, create_test_server, create_test_state, create_test_user};
    use serde_json::{Value, json};
    use sqlx::SqlitePool;

    #[sqlx::test]
    async fn test_grant_activate_revoke_lifecycle(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let admin = create_test_user(&pool, org.id, true).await;
        let grantee = create_test_user(&pool, org.id, false).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;

        let state = create_test_state(pool.clone()).await;
        let server = create_test_server(&state);

        let granted = server
            .post("/admin/api/v1/access-tokens")
            .add_header("x-modelctl-user", &admin.email)
            .json(&json!({"user_id": grantee.id, "model_id": model.id, "name": "field laptop"}))
            .await;
        granted.assert_status(StatusCode::CREATED);
        let body: Value = granted.json();
        assert_eq!(body["status"], json!("inactive"));
        let token_id = body["id"].as_str().unwrap().to_string();

        let activated = server
            .post(&format!("/admin/api/v1/access-tokens/{token_id}/activate"))
            .add_header("x-modelctl-user", &admin.email)
            .await;
        activated.assert_status_ok();
        let body: Value = activated.json();
        assert_eq!(body["status"], json!("active"));
        let secret = body["secret"].as_str().unwrap().to_string();
        assert!(secret.starts_with("mct-"));

        // The freshly issued secret resolves to the bound model
        let resolved = resolve_access_token(&pool, Some(&secret)).await.unwrap().unwrap();
        assert_eq!(resolved.model_id, model.id);

        // The listing never carries secret material
        let listed = server
            .get("/admin/api/v1/access-tokens")
            .add_header("x-modelctl-user", &admin.email)
            .await;
        listed.assert_status_ok();
        let body: Value = listed.json();
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert!(body[0].get("secret").is_none());
        assert!(body[0].get("secret_hash").is_none());

        let revoked = server
            .delete(&format!("/admin/api/v1/access-tokens/{token_id}"))
            .add_header("x-modelctl-user", &admin.email)
            .await;
        revoked.assert_status(StatusCode::NO_CONTENT);

        // Revocation takes effect immediately
        assert!(resolve_access_token(&pool, Some(&secret)).await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn test_grant_requires_admin(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let operator = create_test_user(&pool, org.id, false).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;

        let state = create_test_state(pool.clone()).await;
        let server = create_test_server(&state);

        let response = server
            .post("/admin/api/v1/access-tokens")
            .add_header("x-modelctl-user", &operator.email)
            .json(&json!({"user_id": operator.id, "model_id": model.id}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    async fn test_grant_rejects_cross_tenant_bindings(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let admin = create_test_user(&pool, org.id, true).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;

        let other_org = create_test_org(&pool).await;
        let outsider = create_test_user(&pool, other_org.id, false).await;
        let foreign_model = create_test_model(&pool, other_org.id, &["flow"]).await;

        let state = create_test_state(pool.clone()).await;
        let server = create_test_server(&state);

        let foreign_user = server
            .post("/admin/api/v1/access-tokens")
            .add_header("x-modelctl-user", &admin.email)
            .json(&json!({"user_id": outsider.id, "model_id": model.id}))
            .await;
        foreign_user.assert_status(StatusCode::BAD_REQUEST);

        let local_user = create_test_user(&pool, org.id, false).await;
        let foreign = server
            .post("/admin/api/v1/access-tokens")
            .add_header("x-modelctl-user", &admin.email)
            .json(&json!({"user_id": local_user.id, "model_id": foreign_model.id}))
            .await;
        foreign.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    async fn test_activation_is_tenant_scoped(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let admin = create_test_user(&pool, org.id, true).await;
        let grantee = create_test_user(&pool, org.id, false).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;

        let other_org = create_test_org(&pool).await;
        let outsider_admin = create_test_user(&pool, other_org.id, true).await;

        let state = create_test_state(pool.clone()).await;
        let server = create_test_server(&state);

        let granted = server
            .post("/admin/api/v1/access-tokens")
            .add_header("x-modelctl-user", &admin.email)
            .json(&json!({"user_id": grantee.id, "model_id": model.id}))
            .await;
        let token_id = granted.json::<Value>()["id"].as_str().unwrap().to_string();

        let response = server
            .post(&format!("/admin/api/v1/access-tokens/{token_id}/activate"))
            .add_header("x-modelctl-user", &outsider_admin.email)
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
