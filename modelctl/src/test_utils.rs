//! Test utilities: seeded entities, a stubbed runner, and servers wired the
//! way [`crate::Application`] wires them.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum_test::TestServer;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::{Config, RateLimitConfig, StorageConfig};
use crate::crypto::{generate_token_secret, hash_token_secret};
use crate::db::handlers::{AccessTokens, Models, Organizations, Repository, Users};
use crate::db::models::access_tokens::{AccessTokenCreateDBRequest, AccessTokenDBResponse};
use crate::db::models::models::{ModelCreateDBRequest, ModelDBResponse, ModelUpdateDBRequest};
use crate::db::models::organizations::{OrganizationCreateDBRequest, OrganizationDBResponse};
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse};
use crate::limits::FixedWindowLimiter;
use crate::runner::{ModelRunner, RunOutcome};
use crate::types::{ModelId, OrganizationId, UserId};
use crate::{AppState, build_router};

/// Runner double: returns a canned outcome and records every invocation.
pub struct StubRunner {
    outcome: RunOutcome,
    calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl StubRunner {
    pub fn completing(stdout: &str) -> Arc<Self> {
        Self::with_outcome(RunOutcome::Completed {
            stdout: stdout.to_string(),
        })
    }

    pub fn failing(detail: &str) -> Arc<Self> {
        Self::with_outcome(RunOutcome::Failed {
            detail: detail.to_string(),
        })
    }

    pub fn timing_out() -> Arc<Self> {
        Self::with_outcome(RunOutcome::TimedOut)
    }

    fn with_outcome(outcome: RunOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Recorded invocations as (artifact path, positional arguments).
    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ModelRunner for StubRunner {
    async fn run(&self, artifact: &Path, arguments: &[String]) -> RunOutcome {
        self.calls.lock().unwrap().push((artifact.to_path_buf(), arguments.to_vec()));
        self.outcome.clone()
    }
}

/// Config pointed at a per-process scratch directory, with a quota high
/// enough that ordinary tests never trip the rate gate.
pub fn create_test_config() -> Config {
    Config {
        storage: StorageConfig {
            artifact_root: std::env::temp_dir().join(format!("modelctl-test-artifacts-{}", std::process::id())),
        },
        rate_limit: RateLimitConfig {
            requests_per_window: 1_000,
            window: Duration::from_secs(60),
        },
        ..Config::default()
    }
}

pub async fn create_test_state(pool: SqlitePool) -> AppState {
    create_test_state_with(pool, create_test_config(), StubRunner::completing("42.0")).await
}

pub async fn create_test_state_with(pool: SqlitePool, config: Config, runner: Arc<dyn ModelRunner>) -> AppState {
    tokio::fs::create_dir_all(&config.storage.artifact_root)
        .await
        .expect("Failed to create test artifact root");

    AppState::builder()
        .db(pool)
        .limiter(Arc::new(FixedWindowLimiter::new(&config.rate_limit)))
        .config(config)
        .runner(runner)
        .build()
}

pub fn create_test_server(state: &AppState) -> TestServer {
    let router = build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

pub async fn create_test_org(pool: &SqlitePool) -> OrganizationDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Organizations::new(&mut conn)
        .create(&OrganizationCreateDBRequest {
            name: format!("org-{}", Uuid::new_v4().simple()),
        })
        .await
        .expect("Failed to create test organization")
}

pub async fn create_test_user(pool: &SqlitePool, organization_id: OrganizationId, is_admin: bool) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            organization_id,
            email: format!("user-{}@example.com", Uuid::new_v4().simple()),
            display_name: Some("Test User".to_string()),
            is_admin,
        })
        .await
        .expect("Failed to create test user")
}

/// Create a model with the given declared parameters and a staged artifact
/// path, ready to be executed through a stub runner.
pub async fn create_test_model(pool: &SqlitePool, organization_id: OrganizationId, parameters: &[&str]) -> ModelDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut repo = Models::new(&mut conn);

    let model = repo
        .create(&ModelCreateDBRequest {
            organization_id,
            name: format!("model-{}", Uuid::new_v4().simple()),
            description: Some("Test model".to_string()),
            model_type: Some("random_forest".to_string()),
            required_parameters: parameters.iter().map(|p| p.to_string()).collect(),
            target: Some("target".to_string()),
            declared_accuracy: None,
            last_trained_on: None,
        })
        .await
        .expect("Failed to create test model");

    repo.update(
        model.id,
        &ModelUpdateDBRequest {
            artifact_path: Some(format!("{organization_id}/models/{}/model.joblib", model.id)),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to stage test artifact path")
}

/// Grant and activate a token for (model, user), returning the token row and
/// the plaintext secret.
pub async fn grant_activated_token(pool: &SqlitePool, model_id: ModelId, user_id: UserId) -> (AccessTokenDBResponse, String) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut repo = AccessTokens::new(&mut conn);

    let token = repo
        .create(&AccessTokenCreateDBRequest {
            model_id,
            user_id,
            name: None,
        })
        .await
        .expect("Failed to grant test token");

    let secret = generate_token_secret();
    let token = repo
        .activate(token.id, &hash_token_secret(&secret))
        .await
        .expect("Failed to activate test token");

    (token, secret)
}
