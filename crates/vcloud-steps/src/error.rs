//! Step and pipeline error types

use thiserror::Error;
use vcloud_client::ClientError;

/// Errors raised by a single step
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("{entity} has no {link} link")]
    MissingLink { entity: String, link: &'static str },

    #[error("Unexpected state for {key}: {message}")]
    State { key: String, message: String },

    #[error("{0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, StepError>;

/// A rollback that did not go through
#[derive(Debug)]
pub struct RollbackFailure {
    pub step: String,
    pub error: StepError,
}

/// Pipeline run that stopped at `step`
///
/// `source` is the error that stopped the run; rollback failures never
/// replace it.
#[derive(Error, Debug)]
#[error("{pipeline}: step {step} failed: {source}")]
pub struct PipelineError {
    pub pipeline: String,
    pub step: String,
    pub source: StepError,
    pub rollback_failures: Vec<RollbackFailure>,
}

impl PipelineError {
    /// Whether every completed step was undone
    pub fn rolled_back_cleanly(&self) -> bool {
        self.rollback_failures.is_empty()
    }

    /// Client error behind the failure, if that is what stopped the run
    pub fn client_error(&self) -> Option<&ClientError> {
        match &self.source {
            StepError::Client(e) => Some(e),
            _ => None,
        }
    }
}
