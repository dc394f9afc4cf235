//! # modelctl: Control Layer for Predictive Model Execution
//!
//! `modelctl` lets organizations upload trained predictive models, execute
//! them against sandboxed inputs, and track run-time accuracy as ground
//! truth arrives. It provides a RESTful management API for model upload,
//! operator test runs, and execution-credential lifecycle, plus a small
//! access-gated execution API for external callers such as field sensors
//! and downstream control systems.
//!
//! ## Overview
//!
//! Deployed predictive models (soft sensors, regressors over telemetry)
//! drift, and the teams operating them need to know by how much. `modelctl`
//! executes an uploaded model artifact inside a disposable, resource-capped
//! container, records every run as an immutable row, and incrementally
//! recomputes a per-model accuracy snapshot (MAE, MSE, RMSE, R², MAPE-based
//! accuracy) as actual values are back-filled against past predictions.
//!
//! ### Request Flow
//!
//! The application serves two distinct surfaces.
//!
//! #### Execution API (`/api/v1/*`)
//!
//! External callers authenticate with a per-(user, model) access token in
//! the `X-Access-Token` header. A request passes a per-source rate gate and
//! credential resolution before anything else happens; `execute` then
//! validates the supplied parameters against the model's declared parameter
//! list, runs the artifact in a container with the values passed
//! positionally, records the run, recomputes the analytics snapshot, and
//! returns the prediction. `describe` returns model metadata and the latest
//! run-time accuracy without executing anything. Every call, including
//! rejected ones, is appended to an audit log.
//!
//! #### Management API (`/admin/api/v1/*`)
//!
//! Operators are identified by a trusted proxy header (the deployment sits
//! behind an SSO-terminating proxy). Handlers follow RESTful conventions
//! over the repository layer: model upload (multipart, artifact staged on
//! local disk), metadata and lifecycle edits, operator test runs with
//! optional immediate ground truth, ground-truth back-fill for recorded
//! runs, and access-token grant/activate/revoke.
//!
//! ### Core Components
//!
//! The **execution runner** ([`runner`]) stages a private copy of the model
//! artifact into a scratch directory and launches the prediction image with
//! the scratch area as its only (read-only) mount, bounded by a wall-clock
//! timeout with guaranteed teardown.
//!
//! The **analytics engine** ([`analytics`]) normalizes heterogeneously
//! encoded stored values, partitions runs into evaluated/failed/pending,
//! and upserts one fully derived snapshot row per model inside a
//! transaction.
//!
//! The **database layer** ([`db`]) uses the repository pattern over SQLx
//! and SQLite; the service is self-contained and needs no external
//! database.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use modelctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = modelctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     modelctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod analytics;
pub mod api;
pub mod auth;
pub mod config;
mod crypto;
pub mod db;
pub mod errors;
pub mod limits;
mod openapi;
pub mod runner;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, patch, post},
};
use bon::Builder;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;

use crate::db::handlers::{Organizations, Repository, Users};
use crate::db::models::organizations::OrganizationCreateDBRequest;
use crate::db::models::users::UserCreateDBRequest;
use crate::limits::{FixedWindowLimiter, RateCounter};
use crate::openapi::ApiDoc;
use crate::runner::{DockerRunner, ModelRunner};

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `db`: SQLite connection pool for application data
/// - `config`: Application configuration loaded from file/environment
/// - `runner`: Container-backed model execution, swappable in tests
/// - `limiter`: Per-source request quota for the execution API
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub runner: Arc<dyn ModelRunner>,
    pub limiter: Arc<dyn RateCounter>,
}

/// Get the modelctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial organization and admin user if they do not exist.
///
/// Idempotent; called on every startup so a fresh database is immediately
/// usable through the trusted proxy header.
#[instrument(skip_all)]
pub async fn ensure_initial_records(config: &Config, db: &SqlitePool) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;

    let existing = Organizations::new(&mut tx).get_by_name(&config.organization_name).await?;
    let organization = match existing {
        Some(organization) => organization,
        None => {
            info!(name = %config.organization_name, "Creating initial organization");
            Organizations::new(&mut tx)
                .create(&OrganizationCreateDBRequest {
                    name: config.organization_name.clone(),
                })
                .await?
        }
    };

    let mut users = Users::new(&mut tx);
    if users.get_user_by_email(&config.admin_email).await?.is_none() {
        info!(email = %config.admin_email, "Creating initial admin user");
        users
            .create(&UserCreateDBRequest {
                organization_id: organization.id,
                email: config.admin_email.clone(),
                display_name: None,
                is_admin: true,
            })
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    if config.cors_allowed_origins.iter().any(|origin| origin == "*") {
        return Ok(CorsLayer::new().allow_origin(tower_http::cors::Any));
    }

    let mut origins = Vec::new();
    for origin in &config.cors_allowed_origins {
        origins.push(origin.parse::<HeaderValue>()?);
    }

    Ok(CorsLayer::new().allow_origin(origins))
}

/// Build the application router with all endpoints and middleware.
///
/// - Management API nested at `/admin/api/v1`
/// - Execution API nested at `/api/v1`
/// - Interactive API docs at `/docs`, health probe at `/healthz`
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let admin_routes = Router::new()
        .route(
            "/models",
            get(api::handlers::models::list_models).post(api::handlers::models::upload_model),
        )
        .route(
            "/models/{id}",
            get(api::handlers::models::get_model).patch(api::handlers::models::update_model),
        )
        .route("/models/{id}/run", post(api::handlers::runs::run_model))
        .route("/runs/{id}/actual", patch(api::handlers::runs::set_run_actual))
        .route(
            "/access-tokens",
            get(api::handlers::access_tokens::list_access_tokens).post(api::handlers::access_tokens::grant_access_token),
        )
        .route(
            "/access-tokens/{id}/activate",
            post(api::handlers::access_tokens::activate_access_token),
        )
        .route("/access-tokens/{id}", delete(api::handlers::access_tokens::revoke_access_token))
        .with_state(state.clone());

    let execution_routes = Router::new()
        .route("/describe", get(api::handlers::predict::describe_model))
        .route("/execute", post(api::handlers::predict::execute_prediction))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/admin/api/v1", admin_routes)
        .nest("/api/v1", execution_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;

    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects the database, runs
///    migrations, seeds the initial records, and builds the router
/// 2. **Serve**: [`Application::serve`] binds the TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: SqlitePool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting model control layer with configuration: {:#?}", config);

        let options = SqliteConnectOptions::from_str(&config.database.url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect_with(options)
            .await?;

        migrator().run(&pool).await?;
        ensure_initial_records(&config, &pool).await?;
        tokio::fs::create_dir_all(&config.storage.artifact_root).await?;

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .runner(Arc::new(DockerRunner::new(config.execution.clone())))
            .limiter(Arc::new(FixedWindowLimiter::new(&config.rate_limit)))
            .build();
        let router = build_router(&state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Model control layer listening on http://{bind_addr}");

        axum::serve(listener, self.router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
