//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.docent/config.json`) and environment.
//! Every key is optional; a missing file means defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Document-QA backend location and request options.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Conversation controller behavior.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Durable local storage (session identifier).
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Backend base URL and timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL of the backend (default "http://127.0.0.1:8000"). Overridden by DOCENT_BACKEND_URL env.
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Per-request timeout in seconds. When absent, requests run until the backend answers or the connection fails.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            timeout_secs: None,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

/// Conversation controller options.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationConfig {
    /// When true, a failed ask also removes the "Thinking..." placeholder from the reasoning log.
    /// Default false: the placeholder stays until the next successful answer.
    #[serde(default)]
    pub clear_placeholder_on_error: bool,
}

/// Storage location for the session identifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Storage file. Relative paths are resolved against the config file's parent. Default: `storage.json` next to the config file.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Resolve the backend base URL: env DOCENT_BACKEND_URL overrides config. Trailing slashes are trimmed.
pub fn resolve_backend_url(config: &Config) -> String {
    std::env::var("DOCENT_BACKEND_URL")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .unwrap_or_else(|| config.backend.base_url.trim().to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("DOCENT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".docent").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Resolve the storage file: `storage.path` if set (relative paths resolved against the config file's parent), otherwise `storage.json` next to the config file.
pub fn resolve_storage_path(config: &Config, config_path: &Path) -> PathBuf {
    let config_parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match &config.storage.path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                config_parent.join(p)
            }
        }
        _ => config_parent.join("storage.json"),
    }
}

/// Load config from the given path (or DOCENT_CONFIG_PATH / default). Missing file => default config.
/// Returns the config and the path that was used (for resolving the storage file).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
