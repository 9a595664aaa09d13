use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::github::auth::resolve_fallback_token;
use crate::domain::config::Config;

/// JSON-file backed settings.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Config {
        self.load_with(resolve_fallback_token)
    }

    /// Reads the config file. `fallback_token` is consulted only when the file
    /// is absent or unusable.
    pub fn load_with(&self, fallback_token: impl FnOnce() -> Option<String>) -> Config {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no config file, using fallback token");
                return Config::with_token(fallback_token());
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read config, using defaults");
                return Config::with_token(fallback_token());
            }
        };
        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to parse config, using defaults");
                Config::with_token(fallback_token())
            }
        }
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(config).context("failed to encode config")?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("could not save settings to {}", self.path.display()))?;
        info!(path = %self.path.display(), "config saved");
        Ok(())
    }
}
