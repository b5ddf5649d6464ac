//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PWA_SW_*)
//! 2. TOML config file (if PWA_SW_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;
mod worker;

pub use validation::ConfigError;
pub use worker::{
    DEFAULT_CACHE_NAME, DEFAULT_MANIFEST, DEFAULT_OFFLINE_PATH, ResourceManifest, WorkerConfig,
};

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PWA_SW_*)
/// 2. TOML config file (if PWA_SW_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin the application is served from; manifest paths resolve against it.
    ///
    /// Set via PWA_SW_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Version tag naming the current cache namespace.
    ///
    /// Set via PWA_SW_CACHE_NAME environment variable. Bumping it
    /// invalidates every entry cached under the previous name.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Root-relative paths pre-cached at install.
    ///
    /// Set via PWA_SW_MANIFEST as an array, e.g. `["/", "/offline.html"]`.
    #[serde(default)]
    pub manifest: ResourceManifest,

    /// Page served to failed navigations. Must appear in `manifest`.
    ///
    /// Set via PWA_SW_OFFLINE_PATH environment variable.
    #[serde(default = "default_offline_path")]
    pub offline_path: String,

    /// Activate a new version as soon as it installs. When false it waits
    /// until the clients of the current version are released.
    ///
    /// Set via PWA_SW_SKIP_WAITING environment variable.
    #[serde(default = "default_skip_waiting")]
    pub skip_waiting: bool,

    /// Path to SQLite cache database.
    ///
    /// Set via PWA_SW_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via PWA_SW_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via PWA_SW_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via PWA_SW_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects to follow.
    ///
    /// Set via PWA_SW_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_cache_name() -> String {
    DEFAULT_CACHE_NAME.into()
}

fn default_offline_path() -> String {
    DEFAULT_OFFLINE_PATH.into()
}

fn default_skip_waiting() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pwa-sw-cache.sqlite")
}

fn default_user_agent() -> String {
    "pwa-sw/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_name: default_cache_name(),
            manifest: ResourceManifest::default(),
            offline_path: default_offline_path(),
            skip_waiting: default_skip_waiting(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PWA_SW_`
    /// 2. TOML file from `PWA_SW_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PWA_SW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PWA_SW_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(figment)
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Engine configuration for the current version.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin, cache name, manifest
    /// or offline path cannot form a worker configuration.
    pub fn worker_config(&self) -> Result<WorkerConfig, ConfigError> {
        WorkerConfig::new(self.origin_url()?, &self.cache_name, self.manifest.clone(), &self.offline_path)
            .map(|config| config.with_skip_waiting(self.skip_waiting))
            .map_err(|e| ConfigError::Invalid { field: "worker".into(), reason: e.to_string() })
    }
}
