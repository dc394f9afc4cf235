//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The configuration file path defaults to `config.yaml` but can
//! be specified via `-f` flag or `MODELCTL_CONFIG` environment variable.
//!
//! Sources are merged in the following order (later sources override earlier
//! ones):
//!
//! 1. Built-in defaults
//! 2. **YAML config file** (default: `config.yaml`, missing file is fine)
//! 3. **Environment variables** prefixed with `MODELCTL_`; nested fields use
//!    double underscores, e.g. `MODELCTL_EXECUTION__TIMEOUT=45s`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "MODELCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Name of the organization seeded on first startup
    pub organization_name: String,
    /// Email address of the initial admin user (created on first startup)
    pub admin_email: String,
    /// Authentication configuration for the management API
    pub auth: AuthConfig,
    /// Model artifact storage
    pub storage: StorageConfig,
    /// Container execution settings
    pub execution: ExecutionConfig,
    /// Public API request quota
    pub rate_limit: RateLimitConfig,
    /// CORS allowed origins for the management API ("*" for any)
    pub cors_allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database: DatabaseConfig::default(),
            organization_name: "Default Organization".to_string(),
            admin_email: "admin@localhost".to_string(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            execution: ExecutionConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors_allowed_origins: vec![],
        }
    }
}

/// SQLite connection settings. The database file is created on first start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection URL, e.g. `sqlite://modelctl.db`
    pub url: String,
    /// Maximum number of pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://modelctl.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Management API authentication.
///
/// The service expects to sit behind an SSO-terminating proxy that forwards
/// the authenticated operator email in a trusted header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Header carrying the authenticated operator email
    pub proxy_header_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            proxy_header_name: "X-Modelctl-User".to_string(),
        }
    }
}

/// Model artifact storage layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Root directory for uploaded artifacts; models are stored under
    /// `<root>/<organization_id>/models/<model_id>/<filename>`.
    pub artifact_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            artifact_root: PathBuf::from("./data/artifacts"),
        }
    }
}

/// Container execution settings for the prediction runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Container runtime binary
    pub docker_binary: String,
    /// Image holding the prediction runtime
    pub image: String,
    /// Command executed inside the image, before the positional parameters
    pub command: Vec<String>,
    /// Wall-clock bound for one run; the container is torn down on expiry
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Container memory cap (docker `--memory` syntax), if any
    pub memory_limit: Option<String>,
    /// Container CPU cap (docker `--cpus` syntax), if any
    pub cpu_limit: Option<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            docker_binary: "docker".to_string(),
            image: "run_prediction_image".to_string(),
            command: vec!["python".to_string(), "run_prediction.py".to_string()],
            timeout: Duration::from_secs(30),
            memory_limit: Some("512m".to_string()),
            cpu_limit: Some("1.0".to_string()),
        }
    }
}

/// Public API request quota, keyed by source address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Requests allowed per window per source
    pub requests_per_window: u32,
    /// Window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 2,
            window: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from defaults, YAML file, and environment.
    pub fn load(args: &Args) -> anyhow::Result<Config> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("MODELCTL_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.rate_limit.requests_per_window == 0 {
            anyhow::bail!("rate_limit.requests_per_window must be at least 1");
        }
        if self.execution.timeout.is_zero() {
            anyhow::bail!("execution.timeout must be non-zero");
        }
        if self.execution.image.trim().is_empty() {
            anyhow::bail!("execution.image must be set");
        }
        if self.storage.artifact_root.as_os_str().is_empty() {
            anyhow::bail!("storage.artifact_root must be set");
        }
        Ok(())
    }
}
