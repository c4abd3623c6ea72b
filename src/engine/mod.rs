// src/engine/mod.rs

//! Execution planner for stagedag.
//!
//! This module ties together:
//! - the resolved [`ExecutionPlan`](crate::dag::ExecutionPlan)
//! - the reuse oracle, which decides what can be taken from storage
//! - the job submitter, which receives the work that has to run
//!
//! The per-(stage, target) decisions live in [`executor`]; bookkeeping of
//! outcomes and outputs in [`state`]; [`workflow`] is the facade used by the
//! binary and by library callers.

use std::fmt;

/// Canonical stage name type used throughout the crate.
pub type StageName = String;

/// Canonical target identifier type used throughout the crate.
pub type TargetId = String;

/// Terminal state of one (stage, target) pair.
///
/// Every pair starts out pending and ends in exactly one of these; there are
/// no retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Outputs already existed; nothing was submitted.
    Reused,
    /// Jobs were submitted.
    Queued,
    /// The target lacked input and was dropped from the rest of the run.
    SkippedMissingInput,
    /// Submission failed, or an upstream target failed.
    Failed(String),
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }

    /// `true` when downstream stages can read this target's outputs.
    pub fn has_outputs(&self) -> bool {
        matches!(self, StageOutcome::Reused | StageOutcome::Queued)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageOutcome::Reused => "reused",
            StageOutcome::Queued => "queued",
            StageOutcome::SkippedMissingInput => "skipped (missing input)",
            StageOutcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.as_str()),
        }
    }
}

pub mod executor;
pub mod state;
pub mod workflow;

pub use executor::Executor;
pub use state::{ExecutionReport, OutcomeSummary, RunState};
pub use workflow::Workflow;
