//! Per-protocol configuration loaded from YAML.
//!
//! The file maps protocol names to settings bags:
//!
//! ```yaml
//! protocols:
//!   ssh:
//!     port: 2222
//!     key_file: ~/.ssh/id_ed25519
//!   hdfs:
//!     replication: 3
//! ```
//!
//! The configuration is read once at startup and is read-only afterwards.
//! A missing implicit file is an empty configuration, never an error.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, TransferError};
use crate::model::TransferOptions;

/// Environment variable naming an alternative configuration file.
pub const CONFIG_ENV_VAR: &str = "COPYWAY_CONFIG";

/// Default file name, looked up in the home directory.
pub const DEFAULT_CONFIG_FILE: &str = ".copyway.yml";

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    protocols: Option<HashMap<String, Option<TransferOptions>>>,
}

/// Stored settings bags, keyed by protocol name.
#[derive(Debug, Clone, Default)]
pub struct ProtocolConfig {
    protocols: HashMap<String, TransferOptions>,
    path: Option<PathBuf>,
}

impl ProtocolConfig {
    /// A configuration with no stored settings.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the configuration.
    ///
    /// An explicit path must exist. Otherwise `$COPYWAY_CONFIG` is tried, then
    /// `~/.copyway.yml`; if neither exists the configuration is empty.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(TransferError::configuration(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::empty()),
        }
    }

    /// Load from a file; a missing file yields an empty configuration.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file, using empty settings");
            return Ok(Self::empty());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            TransferError::configuration(format!(
                "Error loading configuration {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_yaml_str(&content).map_err(|e| {
            TransferError::configuration(format!(
                "Error loading configuration {}: {}",
                path.display(),
                e.message()
            ))
        })?;
        config.path = Some(path.to_path_buf());
        debug!(path = %path.display(), protocols = config.protocols.len(), "configuration loaded");
        Ok(config)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::empty());
        }

        let raw: Option<RawConfig> = serde_yaml::from_str(content)
            .map_err(|e| TransferError::configuration(e.to_string()))?;

        let protocols = raw
            .and_then(|raw| raw.protocols)
            .unwrap_or_default()
            .into_iter()
            .map(|(name, settings)| (name, settings.unwrap_or_default()))
            .collect();

        Ok(ProtocolConfig {
            protocols,
            path: None,
        })
    }

    /// The stored settings for a protocol, or an empty bag.
    pub fn settings_for(&self, protocol: &str) -> TransferOptions {
        self.protocols.get(protocol).cloned().unwrap_or_default()
    }

    /// The file this configuration was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn default_config_path() -> Option<PathBuf> {
    if let Ok(value) = std::env::var(CONFIG_ENV_VAR) {
        if !value.is_empty() {
            return Some(PathBuf::from(value));
        }
    }
    dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_FILE))
}
