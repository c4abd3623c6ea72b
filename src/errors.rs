// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::engine::{StageName, TargetId};

#[derive(Error, Debug)]
pub enum StagedagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Stage '{0}' is already registered")]
    DuplicateStageName(StageName),

    #[error("Unknown stage '{name}' referenced by {referenced_by}")]
    UnknownStageReference {
        name: StageName,
        referenced_by: String,
    },

    #[error("Cycle detected in stage dependencies: {}", .0.join(" -> "))]
    CyclicDependency(Vec<StageName>),

    #[error("Invalid target hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("No stages left to run after applying stage filters")]
    EmptyPlan,

    #[error("Stage '{stage}' read outputs of '{requested}', which is not listed in its required stages")]
    UndeclaredDependency {
        stage: StageName,
        requested: StageName,
    },

    #[error("No output of stage '{stage}' for target '{target}'")]
    InputNotFound { stage: StageName, target: TargetId },

    #[error("Missing input for target '{target}' in stage '{stage}': {reason}")]
    MissingInput {
        stage: StageName,
        target: TargetId,
        reason: String,
    },

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StagedagError {
    /// Whether the error should abort the run.
    ///
    /// `EmptyPlan` is a warning: the caller may treat it as a successful no-op.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StagedagError::EmptyPlan)
    }
}

/// Failure reported synchronously by a [`JobSubmitter`](crate::exec::JobSubmitter).
///
/// Recorded against a single (stage, target) pair; never retried here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("submission of '{job}' failed: {message}")]
pub struct SubmissionError {
    pub job: String,
    pub message: String,
}

impl SubmissionError {
    pub fn new(job: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            message: message.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StagedagError>;
