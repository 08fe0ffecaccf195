//! Settings for the vCloud CPI
//!
//! The settings file is YAML:
//!
//! ```yaml
//! url: https://vcd.example.com
//! user: admin@my-org
//! password: secret
//! entities:
//!   organization: my-org
//!   virtual_datacenter: my-vdc
//!   vapp_catalog: vapps
//!   media_catalog: media
//!   control:
//!     wait_max: 400
//!     retry_delay: 500
//! ```

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable pointing directly at a settings file
pub const CONFIG_ENV: &str = "VCLOUD_CPI_CONFIG";

const CANDIDATES: [&str; 2] = ["cpi.yml", ".cpi.yml"];

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the vCloud Director endpoint
    pub url: String,

    /// Login name in `user@organization` form
    pub user: String,

    pub password: String,

    pub entities: Entities,
}

/// Names of the remote entities the client resolves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    pub organization: String,
    pub virtual_datacenter: String,
    pub vapp_catalog: String,
    pub media_catalog: String,

    #[serde(default)]
    pub media_storage_profile: Option<String>,

    /// Polling and retry knobs. A missing section is the same as an empty one.
    #[serde(default)]
    pub control: Option<ControlSettings>,
}

/// Raw control section; every field is optional and defaulted by the client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSettings {
    /// Seconds to wait for a task before giving up
    pub wait_max: Option<u64>,
    /// Seconds between task polls
    pub wait_delay: Option<u64>,
    /// Attempts per request for transient failures
    pub retry_max: Option<u32>,
    /// Milliseconds between attempts
    pub retry_delay: Option<u64>,
    /// Seconds a session cookie stays valid
    pub cookie_timeout: Option<u64>,
}

impl Settings {
    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::InvalidSettings {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        settings.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings from the first discovered settings file
    pub fn discover() -> Result<Self> {
        Self::load(find_settings_file()?)
    }

    /// Control section, or an empty one when absent
    pub fn control(&self) -> ControlSettings {
        self.entities.control.clone().unwrap_or_default()
    }

    /// Login principal as sent to the session endpoint (`user@org`)
    pub fn login_principal(&self) -> String {
        if self.user.contains('@') {
            self.user.clone()
        } else {
            format!("{}@{}", self.user, self.entities.organization)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingSetting("url"));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::MissingSetting("user"));
        }
        if self.entities.organization.trim().is_empty() {
            return Err(ConfigError::MissingSetting("entities.organization"));
        }
        if self.entities.virtual_datacenter.trim().is_empty() {
            return Err(ConfigError::MissingSetting("entities.virtual_datacenter"));
        }
        Ok(())
    }
}

/// Global config directory (`~/.config/vcloud-cpi`)
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("vcloud-cpi");
    Ok(config_dir)
}

/// Find the settings file
///
/// Search order:
/// 1. `VCLOUD_CPI_CONFIG` (direct path)
/// 2. current directory: cpi.yml, .cpi.yml
/// 3. ~/.config/vcloud-cpi/cpi.yml
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points at a missing file: {}", CONFIG_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join("cpi.yml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}
