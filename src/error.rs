//! Error taxonomy for the preprocessing pipeline.
//!
//! Every variant is fatal to the *current participant only*: the orchestrator
//! catches it at the task boundary, marks the participant `Failed`, and keeps
//! processing the rest of the batch. Quality-based exclusion is deliberately
//! NOT an error — see [`crate::pipeline::Outcome::Excluded`].

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The stimulus channel produced an unexpected number of distinct event
    /// codes. We can only interpret recordings with 3 (no pause marker) or
    /// 4 distinct codes; anything else means a corrupt stimulus track.
    #[error("expected 3 or 4 distinct event codes, found {distinct}")]
    EventClassification { distinct: usize },

    /// A required per-participant input file is absent.
    #[error("missing required input file: {0}")]
    MissingInput(PathBuf),

    /// A named channel does not exist in the recording.
    #[error("channel {0:?} not found in recording")]
    UnknownChannel(String),

    /// Array dimensions do not line up (corrupt artifact or decomposition
    /// that was fitted on a different channel set).
    #[error("shape mismatch: {0}")]
    Shape(String),

    /// Reading or writing a stage artifact failed.
    #[error("stage store: {0}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
