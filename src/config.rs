//! Runtime configuration
//!
//! Everything here has a default, so a missing configuration file is not an
//! error. The file is TOML:
//!
//! ```toml
//! settings_key = "ChangeWindowParams_Settings"
//! store_dir = "/home/user/.local/share/winparams"
//!
//! [categories]
//! menus = ["contextmenu_"]
//! ```

use crate::error::{Error, Result};
use crate::hooks::CategoryRules;
use crate::store::DEFAULT_SETTINGS_KEY;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides [`Config::store_dir`]
pub const STORE_DIR_ENV: &str = "WINPARAMS_STORE_DIR";

/// Library and CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage key of the settings document
    pub settings_key: String,
    /// Directory of the file-backed settings store
    pub store_dir: Option<PathBuf>,
    /// Target-name prefixes used to classify windows
    pub categories: CategoryRules,
    /// User agent shown in the `useragent` description
    pub user_agent: Option<String>,
    /// Overlay keys of the host; values are stored and sent as the key
    pub vr_overlay_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings_key: DEFAULT_SETTINGS_KEY.to_string(),
            store_dir: None,
            categories: CategoryRules::default(),
            user_agent: None,
            vr_overlay_keys: vec![
                "valve.steam.gamepadui.main".to_string(),
                "valve.steam.desktop".to_string(),
            ],
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("winparams")
            .join("config.toml")
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration
    ///
    /// An explicit `path` must exist and parse. Without one, the default
    /// location is tried and defaults are used when it is missing or
    /// malformed. The store directory environment variable wins over both.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("failed to read {}: {}", path.display(), e))
                })?;
                info!("Loading configuration from: {:?}", path);
                Self::from_toml(&content)?
            }
            None => Self::load_default_location(),
        };

        if let Some(dir) = std::env::var_os(STORE_DIR_ENV) {
            config.store_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }

    fn load_default_location() -> Self {
        let path = Self::default_path();
        if !path.exists() {
            return Self::default();
        }

        info!("Loading configuration from: {:?}", path);
        match std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(e.to_string()))
            .and_then(|content| Self::from_toml(&content))
        {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Directory of the file-backed settings store
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("winparams")
        })
    }
}
