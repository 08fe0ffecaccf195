use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Settings file not found. Looked in:\n\
        - current directory: cpi.yml, .cpi.yml\n\
        - ~/.config/vcloud-cpi/cpi.yml\n\
        Set VCLOUD_CPI_CONFIG to point at a file directly"
    )]
    SettingsFileNotFound,

    #[error("Invalid settings in {path}: {message}")]
    InvalidSettings { path: PathBuf, message: String },

    #[error("Missing setting: {0}")]
    MissingSetting(&'static str),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
