//! Profile setup: create `~/.docent`, and open the config, session identity and backend
//! client that every front end starts from.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::backend::BackendClient;
use crate::config::{self, Config};
use crate::conversation::Conversation;
use crate::session::SessionIdentity;
use crate::storage::FileStore;

/// Create the config directory and a default `config.json` (`{}`) if they do not exist.
/// Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}

/// Everything a front end needs to start a conversation.
pub struct Profile {
    pub config: Config,
    pub config_path: PathBuf,
    pub storage_path: PathBuf,
    pub identity: SessionIdentity,
    pub backend: BackendClient,
}

impl Profile {
    /// Load config (missing file => defaults), resolve the session identity from the
    /// storage file, and build the backend client.
    pub fn open(config_path: Option<PathBuf>) -> Result<Self> {
        let (config, config_path) = config::load_config(config_path)?;
        let storage_path = config::resolve_storage_path(&config, &config_path);
        let identity = SessionIdentity::resolve(&FileStore::new(&storage_path));
        let backend = BackendClient::from_config(&config).context("building backend client")?;
        log::debug!(
            "profile: backend {}, session {}, storage {}",
            backend.base_url(),
            identity.id(),
            storage_path.display()
        );
        Ok(Self {
            config,
            config_path,
            storage_path,
            identity,
            backend,
        })
    }

    /// A fresh conversation bound to this profile's session.
    pub fn conversation(&self) -> Conversation {
        Conversation::new(Some(&self.identity), self.config.conversation)
    }
}
