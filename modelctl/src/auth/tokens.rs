//! Access-token resolution for the public execution API.

use sqlx::SqlitePool;
use tracing::{instrument, trace};

use crate::crypto::{constant_time_eq, hash_token_secret};
use crate::db::errors::DbError;
use crate::db::handlers::AccessTokens;
use crate::db::models::access_tokens::TokenStatus;
use crate::errors::Result;
use crate::types::{AccessTokenId, ModelId, UserId};

/// Header carrying the token secret on public API calls.
pub const ACCESS_TOKEN_HEADER: &str = "X-Access-Token";

/// A successfully resolved execution credential.
#[derive(Debug, Clone)]
pub struct ResolvedToken {
    pub id: AccessTokenId,
    pub model_id: ModelId,
    pub user_id: UserId,
}

/// Resolve a presented secret to its token, or `None` for any miss.
///
/// The lookup hashes the presented secret and fetches by the indexed hash
/// column, then re-checks the stored digest with a constant-time comparison
/// so the equality itself cannot leak timing. Inactive rows never resolve.
#[instrument(skip_all, err)]
pub async fn resolve_access_token(db: &SqlitePool, presented: Option<&str>) -> Result<Option<ResolvedToken>> {
    let Some(presented) = presented else {
        trace!("no access token header supplied");
        return Ok(None);
    };

    let computed = hash_token_secret(presented);

    let mut conn = db.acquire().await.map_err(DbError::from)?;
    let credential = AccessTokens::new(&mut conn).find_credential_by_hash(&computed).await?;

    let Some(credential) = credential else {
        return Ok(None);
    };

    if !constant_time_eq(credential.secret_hash.as_bytes(), computed.as_bytes()) {
        return Ok(None);
    }
    if credential.status != TokenStatus::Active {
        return Ok(None);
    }

    Ok(Some(ResolvedToken {
        id: credential.id,
        model_id: credential.model_id,
        user_id: credential.user_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_model, create_test_org, create_test_user, grant_activated_token};
    use sqlx::SqlitePool;

    #[sqlx::test]
    async fn test_valid_secret_resolves(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let user = create_test_user(&pool, org.id, false).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;
        let (token, secret) = grant_activated_token(&pool, model.id, user.id).await;

        let resolved = resolve_access_token(&pool, Some(&secret)).await.unwrap().unwrap();
        assert_eq!(resolved.id, token.id);
        assert_eq!(resolved.model_id, model.id);
        assert_eq!(resolved.user_id, user.id);
    }

    #[sqlx::test]
    async fn test_missing_and_bogus_secrets_do_not_resolve(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let user = create_test_user(&pool, org.id, false).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;
        let _ = grant_activated_token(&pool, model.id, user.id).await;

        assert!(resolve_access_token(&pool, None).await.unwrap().is_none());
        assert!(resolve_access_token(&pool, Some("mct-not-a-real-secret")).await.unwrap().is_none());
    }
}
