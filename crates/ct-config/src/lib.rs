//! # ct-config
//! candi-tab/crates/ct-config/src/lib.rs
//!
//! Layered runtime configuration: built-in defaults, then an optional
//! `candi-tab.toml`, then `CANDI_TAB__SECTION__KEY` environment variables.
//!
//! Call [`load_env_file`] before installing the tracing subscriber so that
//! `RUST_LOG` from `.env` takes effect, then [`AppConfig::load`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "CANDI_TAB";
pub const CONFIG_FILE: &str = "candi-tab";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `settings.json` and `accessToken.json`.
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub api_base: String,
    pub debounce_ms: u64,
    pub startup_grace_ms: u64,
    pub request_timeout_secs: u64,
    pub file_name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Takes precedence over a stored credential.
    #[serde(default, deserialize_with = "optional_secret")]
    pub access_token: Option<SecretString>,
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()).map(SecretString::from))
}

/// Loads `.env` from the working directory or its parents into the process
/// environment. Returns the file used, if any. Existing variables win.
pub fn load_env_file() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// Loads a specific env file. `None` when it is missing or malformed.
pub fn load_env_file_from(path: &Path) -> Option<PathBuf> {
    dotenvy::from_path(path).ok().map(|()| path.to_path_buf())
}

impl AppConfig {
    /// Layers `candi-tab.toml` and the environment over the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        debug!(file = CONFIG_FILE, prefix = ENV_PREFIX, "loading configuration");
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name(CONFIG_FILE).required(false))
                .add_source(Environment::with_prefix(ENV_PREFIX).separator("__")),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let config: AppConfig = Self::with_defaults(builder)?.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(builder
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("storage.data_dir", "./data")?
            .set_default("sync.api_base", "https://api.github.com")?
            .set_default("sync.debounce_ms", 1000)?
            .set_default("sync.startup_grace_ms", 1000)?
            .set_default("sync.request_timeout_secs", 30)?
            .set_default("sync.file_name", "candi-tab-settings.json")?
            .set_default("sync.description", "candi-tab settings")?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.file_name.trim().is_empty() {
            return Err(ConfigError::Invalid("sync.file_name must not be empty".into()));
        }
        if self.sync.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync.request_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}
