//! classquiz configuration and store factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use classquiz_core::monitor::MonitorConfig;
use classquiz_core::session::SessionConfig;
use classquiz_core::statistics::DEFAULT_PASS_THRESHOLD;

use crate::http::{HttpResultStore, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};

/// Connection settings for the LMS backend.
///
/// Note: Custom Debug impl masks the API token to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token; may reference environment variables as `${VAR}`.
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Reject a second attempt by the same taker on the same quiz.
    #[serde(default = "default_true")]
    pub single_attempt: bool,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .field("single_attempt", &self.single_attempt)
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            timeout_secs: default_timeout(),
            single_attempt: true,
        }
    }
}

/// Session and refresh timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_session_budget")]
    pub session_budget_secs: u64,
    #[serde(default = "default_auto_advance")]
    pub auto_advance_ms: u64,
    #[serde(default = "default_countdown")]
    pub auto_submit_countdown_secs: u32,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            session_budget_secs: default_session_budget(),
            auto_advance_ms: default_auto_advance(),
            auto_submit_countdown_secs: default_countdown(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

/// Top-level classquiz configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassquizConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    /// Minimum score counted as a pass.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: u8,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_true() -> bool {
    true
}
fn default_session_budget() -> u64 {
    1800
}
fn default_auto_advance() -> u64 {
    500
}
fn default_countdown() -> u32 {
    3
}
fn default_refresh_interval() -> u64 {
    10
}
fn default_pass_threshold() -> u8 {
    DEFAULT_PASS_THRESHOLD
}

impl Default for ClassquizConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            timing: TimingConfig::default(),
            pass_threshold: default_pass_threshold(),
        }
    }
}

impl ClassquizConfig {
    /// Timings for a taker's session.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            time_budget: Duration::from_secs(self.timing.session_budget_secs),
            auto_advance_delay: Duration::from_millis(self.timing.auto_advance_ms),
            auto_submit_countdown: self.timing.auto_submit_countdown_secs,
        }
    }

    /// Settings for a results viewer.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            // A zero period would make the refresh interval panic.
            refresh_interval: Duration::from_secs(self.timing.refresh_interval_secs.max(1)),
            pass_threshold: self.pass_threshold,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are inserted verbatim and never expanded again.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + end];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order:
/// 1. `classquiz.toml` in the current directory
/// 2. `~/.config/classquiz/config.toml`
///
/// Environment variable overrides: `CLASSQUIZ_BASE_URL`, `CLASSQUIZ_API_TOKEN`.
pub fn load_config_from(path: Option<&Path>) -> Result<ClassquizConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("classquiz.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ClassquizConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ClassquizConfig::default(),
    };

    if let Ok(url) = std::env::var("CLASSQUIZ_BASE_URL") {
        config.backend.base_url = url;
    }
    if let Ok(token) = std::env::var("CLASSQUIZ_API_TOKEN") {
        config.backend.api_token = Some(token);
    }

    config.backend.base_url = resolve_env_vars(&config.backend.base_url);
    config.backend.api_token = config
        .backend
        .api_token
        .as_deref()
        .map(resolve_env_vars)
        .filter(|t| !t.is_empty());

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("classquiz"))
}

/// Create the HTTP result store described by the backend settings.
pub fn create_store(config: &BackendConfig) -> Result<Arc<HttpResultStore>> {
    let store = HttpResultStore::new(&config.base_url, config.timeout_secs)?
        .with_api_token(config.api_token.clone())
        .with_single_attempt(config.single_attempt);
    Ok(Arc::new(store))
}
