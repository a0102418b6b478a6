//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::warn;

use crate::{AppError, Result};

/// Subprocess proxy configuration: how to launch the standalone MCP server.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProxyConfig {
    /// Binary used to launch the proxied MCP server.
    #[serde(default = "default_proxy_command")]
    pub command: String,
    /// Arguments passed to the server binary.
    #[serde(default = "default_proxy_args")]
    pub args: Vec<String>,
    /// Rewrite `rwx` CLI sub-command mentions in proxied tool output into
    /// the equivalent locally-registered tool names.
    #[serde(default)]
    pub rewrite_references: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            command: default_proxy_command(),
            args: default_proxy_args(),
            rewrite_references: false,
        }
    }
}

fn default_proxy_command() -> String {
    "rwx".into()
}

fn default_proxy_args() -> Vec<String> {
    vec!["mcp".into(), "serve".into()]
}

/// Gate controlling which downloaded logs are cached.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Cache only ids the cloud API confirms as completed runs; a failed
    /// check (e.g. the id is a task id) silently skips caching.
    CompletedRunsOnly,
    /// Cache every downloaded log regardless of run state.
    Always,
    /// Never cache.
    Never,
}

/// Log download cache settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LogCacheConfig {
    /// Seconds a cached log stays valid.
    #[serde(default = "default_log_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Which ids are eligible for caching.
    #[serde(default = "default_cache_policy")]
    pub policy: CachePolicy,
}

impl Default for LogCacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_log_ttl_seconds(),
            policy: default_cache_policy(),
        }
    }
}

fn default_log_ttl_seconds() -> u64 {
    1800
}

fn default_cache_policy() -> CachePolicy {
    CachePolicy::CompletedRunsOnly
}

/// Honeycomb dataset coordinates used by the run-analysis tools.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HoneycombConfig {
    /// Dataset slug queried for CI/CD pipeline spans.
    #[serde(default = "default_honeycomb_dataset")]
    pub dataset: String,
    /// Environment slug.
    #[serde(default = "default_honeycomb_environment")]
    pub environment: String,
}

impl Default for HoneycombConfig {
    fn default() -> Self {
        Self {
            dataset: default_honeycomb_dataset(),
            environment: default_honeycomb_environment(),
        }
    }
}

fn default_honeycomb_dataset() -> String {
    "rwx".into()
}

fn default_honeycomb_environment() -> String {
    "test".into()
}

fn default_workflow_path() -> String {
    ".rwx/ci.yml".into()
}

fn default_cloud_base_url() -> String {
    "https://cloud.rwx.com/mint/api".into()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// RWX organization slug used when building run URLs.
    pub org: String,
    /// Workflow definition path launched and filtered on by the CI tools.
    #[serde(default = "default_workflow_path")]
    pub workflow_path: String,
    /// Base URL of the RWX cloud API.
    #[serde(default = "default_cloud_base_url")]
    pub cloud_base_url: String,
    /// Subprocess proxy settings.
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Log download cache settings.
    #[serde(default)]
    pub log_cache: LogCacheConfig,
    /// Honeycomb dataset coordinates.
    #[serde(default)]
    pub honeycomb: HoneycombConfig,
}

impl Default for GlobalConfig {
    /// Defaults matching the original deployment: the `curri` organization
    /// and `.rwx/ci.yml`. Used when no config file is supplied.
    fn default() -> Self {
        Self {
            org: "curri".into(),
            workflow_path: default_workflow_path(),
            cloud_base_url: default_cloud_base_url(),
            proxy: ProxyConfig::default(),
            log_cache: LogCacheConfig::default(),
            honeycomb: HoneycombConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// URL of a run in the RWX cloud UI.
    #[must_use]
    pub fn run_url(&self, run_id: &str) -> String {
        format!("https://cloud.rwx.com/mint/{}/runs/{run_id}", self.org)
    }

    fn validate(&self) -> Result<()> {
        if self.org.trim().is_empty() {
            return Err(AppError::Config("org must not be empty".into()));
        }

        if self.proxy.command.trim().is_empty() {
            return Err(AppError::Config("proxy.command must not be empty".into()));
        }

        if self.log_cache.ttl_seconds == 0 && self.log_cache.policy != CachePolicy::Never {
            return Err(AppError::Config(
                "log_cache.ttl_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

// ── Access token ─────────────────────────────────────────────────────────────

/// Session-owned RWX access token slot.
///
/// The token is loaded once at startup and mutated only through
/// [`AccessToken::set`] (the `set_rwx_access_token` tool). The ambient
/// process environment is never re-read after startup.
#[derive(Debug, Clone, Default)]
pub struct AccessToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl AccessToken {
    /// Create an empty token slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot pre-seeded with a token. Used in tests.
    #[must_use]
    pub fn with_value(token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(token.into()))),
        }
    }

    /// Current token, if one has been configured.
    pub async fn get(&self) -> Option<String> {
        self.inner.read().await.clone()
    }

    /// Replace the stored token.
    pub async fn set(&self, token: impl Into<String>) {
        *self.inner.write().await = Some(token.into());
    }

    /// Whether a token is currently configured.
    pub async fn is_set(&self) -> bool {
        self.inner.read().await.is_some()
    }
}

/// Load the RWX access token from OS keychain with env-var fallback.
///
/// Tries the `rwx-bridge` keyring service first, then the
/// `RWX_ACCESS_TOKEN` environment variable. An absent token is not an
/// error — token-requiring tools elicit one at call time.
pub async fn load_access_token() -> AccessToken {
    let keychain_result = tokio::task::spawn_blocking(|| {
        keyring::Entry::new("rwx-bridge", "rwx_access_token")
            .and_then(|entry| entry.get_password())
    })
    .await;

    match keychain_result {
        Ok(Ok(value)) if !value.is_empty() => return AccessToken::with_value(value),
        Ok(Ok(_)) => {
            warn!("keychain entry for rwx_access_token is empty, trying env var");
        }
        Ok(Err(err)) => {
            warn!(?err, "keychain lookup failed, trying env var");
        }
        Err(err) => {
            warn!(%err, "keychain task panicked, trying env var");
        }
    }

    match env::var("RWX_ACCESS_TOKEN") {
        Ok(value) if !value.is_empty() => AccessToken::with_value(value),
        _ => AccessToken::new(),
    }
}
