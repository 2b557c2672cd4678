use std::time::Duration;

use account_hub_core::validation::{CHECK_TIMEOUT, TEST_CHECK_TIMEOUT};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Record store URL (default: a SQLite file under `./data`).
    pub database_url: String,
    /// Maximum pooled database connections (default: `10`).
    pub db_max_connections: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                  |
    /// |------------------------|------------------------------------------|
    /// | `HOST`                 | `0.0.0.0`                                |
    /// | `PORT`                 | `8080`                                   |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`                  |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                                     |
    /// | `DATABASE_URL`         | `sqlite://./data/accounts.db?mode=rwc`   |
    /// | `DB_MAX_OPEN_CONNS`    | `10`                                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/accounts.db?mode=rwc".into());

        let db_max_connections: u32 = std::env::var("DB_MAX_OPEN_CONNS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("DB_MAX_OPEN_CONNS must be a valid u32");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url,
            db_max_connections,
        }
    }
}

/// Settings for check-script execution.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Root of the per-category virtual environments.
    pub venv_base_dir: String,
    /// Launcher for the ephemeral interpreter.
    pub uv_bin: String,
    /// Limit for one record's check during a run.
    pub check_timeout: Duration,
    /// Limit for an ad-hoc script test.
    pub test_timeout: Duration,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            venv_base_dir: "./data/venvs".to_string(),
            uv_bin: "uv".to_string(),
            check_timeout: CHECK_TIMEOUT,
            test_timeout: TEST_CHECK_TIMEOUT,
        }
    }
}

impl ValidationConfig {
    /// Load from environment variables, falling back to [`Default`].
    ///
    /// | Env Var                   | Default        |
    /// |---------------------------|----------------|
    /// | `VENV_BASE_DIR`           | `./data/venvs` |
    /// | `UV_BIN`                  | `uv`           |
    /// | `CHECK_TIMEOUT_SECS`      | `60`           |
    /// | `TEST_CHECK_TIMEOUT_SECS` | `30`           |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let venv_base_dir = std::env::var("VENV_BASE_DIR").unwrap_or(defaults.venv_base_dir);
        let uv_bin = std::env::var("UV_BIN").unwrap_or(defaults.uv_bin);

        let check_timeout = std::env::var("CHECK_TIMEOUT_SECS")
            .ok()
            .map(|v| {
                v.parse()
                    .map(Duration::from_secs)
                    .expect("CHECK_TIMEOUT_SECS must be a valid u64")
            })
            .unwrap_or(defaults.check_timeout);

        let test_timeout = std::env::var("TEST_CHECK_TIMEOUT_SECS")
            .ok()
            .map(|v| {
                v.parse()
                    .map(Duration::from_secs)
                    .expect("TEST_CHECK_TIMEOUT_SECS must be a valid u64")
            })
            .unwrap_or(defaults.test_timeout);

        Self {
            venv_base_dir,
            uv_bin,
            check_timeout,
            test_timeout,
        }
    }
}
