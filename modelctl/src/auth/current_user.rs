use crate::{
    AppState,
    api::models::users::CurrentUser,
    db::errors::DbError,
    db::handlers::Users,
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{instrument, trace};

/// Extract operator identity from the trusted proxy header.
///
/// The deployment model mirrors SSO-proxy authentication: the fronting proxy
/// terminates the session and forwards the authenticated email in a header
/// (`auth.proxy_header_name`, default `X-Modelctl-User`). Unknown emails are
/// rejected; provisioning happens out of band.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let header_name = &state.config.auth.proxy_header_name;
        let user_email = match parts.headers.get(header_name).and_then(|h| h.to_str().ok()) {
            Some(email) => email,
            None => {
                trace!("No proxy auth header found in request");
                return Err(Error::Unauthorized { message: None });
            }
        };

        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        let user = Users::new(&mut conn).get_user_by_email(user_email).await?;

        match user {
            Some(user) => Ok(CurrentUser::from(user)),
            None => {
                trace!(email = %user_email, "proxy header names an unknown user");
                Err(Error::Unauthorized { message: None })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_org, create_test_state, create_test_user};
    use axum::extract::FromRequestParts as _;
    use sqlx::SqlitePool;

    fn parts_with_header(name: &str, value: &str) -> Parts {
        let request = axum::http::Request::builder()
            .uri("http://localhost/test")
            .header(name, value)
            .body(())
            .unwrap();
        let (parts, _body) = request.into_parts();
        parts
    }

    #[sqlx::test]
    async fn test_existing_user_extraction(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let user = create_test_user(&pool, org.id, true).await;
        let state = create_test_state(pool).await;

        let mut parts = parts_with_header("x-modelctl-user", &user.email);
        let current = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(current.email, user.email);
        assert!(current.is_admin);
    }

    #[sqlx::test]
    async fn test_unknown_user_is_unauthorized(pool: SqlitePool) {
        let state = create_test_state(pool).await;

        let mut parts = parts_with_header("x-modelctl-user", "ghost@example.com");
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_missing_header_is_unauthorized(pool: SqlitePool) {
        let state = create_test_state(pool).await;

        let request = axum::http::Request::builder().uri("http://localhost/test").body(()).unwrap();
        let (mut parts, _body) = request.into_parts();
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
