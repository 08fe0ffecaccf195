//! Multi-step vCloud mutations with compensating rollback
//!
//! A [`Pipeline`] runs [`Step`]s in order against one client. Each step
//! records its undo handle in the run's [`StateBag`]; when a step fails the
//! steps before it are rolled back in reverse and the original failure is
//! returned as a [`PipelineError`].

pub mod error;
pub mod pipeline;
pub mod state;
pub mod steps;

// Re-exports
pub use error::{PipelineError, Result, RollbackFailure, StepError};
pub use pipeline::{Pipeline, Step};
pub use state::StateBag;
pub use steps::{AddCatalogItem, AttachDisk, CreateDisk, DetachDisk, DiskPlacement};
