//! CPI error types

use thiserror::Error;
use vcloud_client::ClientError;
use vcloud_config::ConfigError;
use vcloud_steps::{PipelineError, StepError};

#[derive(Error, Debug)]
pub enum CpiError {
    #[error("`{0}' is not implemented by VCloud")]
    Unsupported(String),

    #[error("Invalid arguments for {method}: {message}")]
    InvalidArguments { method: String, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl CpiError {
    /// Error type reported back to the caller
    pub fn kind(&self) -> &'static str {
        match self {
            CpiError::Unsupported(_) => "Bosh::Clouds::NotImplemented",
            CpiError::InvalidArguments { .. } | CpiError::InvalidRequest(_) => "InvalidCall",
            _ => "Bosh::Clouds::CloudError",
        }
    }

    /// Whether the caller may repeat the same call
    pub fn ok_to_retry(&self) -> bool {
        match self {
            CpiError::Client(e) => e.is_transient(),
            CpiError::Pipeline(e) => e.client_error().is_some_and(ClientError::is_transient),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CpiError>;
