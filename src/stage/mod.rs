// src/stage/mod.rs

//! Stage declarations.
//!
//! - [`Stage`] is the trait every stage implements.
//! - [`registry`] holds the declared stages and validates their edges.
//! - [`input`] / [`output`] carry data between dependent stages.
//! - [`command`] implements stages declared in the config file as command
//!   templates.

pub mod command;
pub mod input;
pub mod output;
pub mod registry;

use std::fmt::Debug;

use crate::engine::StageName;
use crate::errors::Result;
use crate::exec::CommandSpec;
use crate::target::Target;
use crate::types::Granularity;

pub use command::CommandStage;
pub use input::StageInput;
pub use output::{OutputData, OutputsByStage, StageOutput};
pub use registry::StageRegistry;

/// What a stage wants submitted for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobRequest {
    /// Locators the commands will produce.
    pub outputs: OutputData,
    /// Submitted in order; each becomes one job.
    pub commands: Vec<CommandSpec>,
}

impl JobRequest {
    pub fn new(outputs: impl Into<OutputData>) -> Self {
        Self {
            outputs: outputs.into(),
            commands: Vec::new(),
        }
    }

    pub fn with_command(mut self, command: CommandSpec) -> Self {
        self.commands.push(command);
        self
    }
}

/// A named unit of declared work.
///
/// Implementations must be immutable: the registry shares them for the life
/// of the process.
pub trait Stage: Send + Sync + Debug {
    /// Unique stage name.
    fn name(&self) -> &str;

    /// Granularity of the targets this stage runs on.
    fn granularity(&self) -> Granularity;

    /// Names of the stages whose outputs this stage reads.
    fn required_stages(&self) -> &[StageName];

    /// Locators the stage produces for `target`. Used both to decide reuse
    /// and as the outputs of a reused target.
    fn expected_outputs(&self, target: &Target) -> OutputData;

    /// Describe the jobs that process `target`.
    ///
    /// Return `Ok(None)` when there is no applicable work for the target (for
    /// example its input data is missing). Errors are fatal for the run.
    fn queue_jobs(&self, target: &Target, inputs: &StageInput<'_>) -> Result<Option<JobRequest>>;
}
