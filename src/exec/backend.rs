// src/exec/backend.rs

//! Pluggable submission backend abstraction.
//!
//! The execution planner talks to a `JobSubmitter` instead of a concrete
//! batch system. Production code can plug in a real scheduler client; the
//! binary ships with [`DryRunSubmitter`] and
//! [`ScriptSubmitter`](super::ScriptSubmitter), and tests provide their own
//! recording implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use tracing::info;

use crate::errors::SubmissionError;
use crate::target::Target;

/// Opaque identifier of a submitted job, used to express job dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of work described by a stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// Short job name, unique within the (stage, target) pair.
    pub name: String,
    /// Shell script body.
    pub script: String,
    /// Free-form attributes forwarded to the backend (labels, resources).
    pub attributes: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Everything a backend needs to submit one command.
#[derive(Debug, Clone)]
pub struct SubmitRequest<'a> {
    pub run_id: &'a str,
    pub workflow: &'a str,
    pub stage: &'a str,
    pub target: &'a Target,
    pub command: &'a CommandSpec,
    /// Upstream output locators the command reads.
    pub inputs: &'a [PathBuf],
    /// Jobs that must finish before this one starts.
    pub depends_on: &'a [JobHandle],
}

impl SubmitRequest<'_> {
    /// Human readable job name: `<stage>/<target>/<command>`.
    pub fn job_name(&self) -> String {
        format!("{}/{}/{}", self.stage, self.target.id, self.command.name)
    }

    /// Attributes of the target merged with the command's own attributes.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = self.target.job_attributes();
        attrs.insert("stage".to_string(), self.stage.to_string());
        attrs.extend(
            self.command
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        attrs
    }
}

/// Trait abstracting how jobs are submitted.
///
/// Submission is fire-and-forget: the implementation returns a handle or
/// fails synchronously. Retries are the backend's business.
pub trait JobSubmitter: Send {
    fn submit(&mut self, request: &SubmitRequest<'_>) -> Result<JobHandle, SubmissionError>;
}

/// Backend that only logs what would be submitted.
#[derive(Debug, Default)]
pub struct DryRunSubmitter {
    submitted: Vec<String>,
}

impl DryRunSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Job names in submission order.
    pub fn submitted(&self) -> &[String] {
        &self.submitted
    }
}

impl JobSubmitter for DryRunSubmitter {
    fn submit(&mut self, request: &SubmitRequest<'_>) -> Result<JobHandle, SubmissionError> {
        let name = request.job_name();
        info!(
            job = %name,
            run_id = %request.run_id,
            depends_on = request.depends_on.len(),
            "dry-run: would submit job"
        );
        let handle = JobHandle::new(format!("dry-run-{}", self.submitted.len() + 1));
        self.submitted.push(name);
        Ok(handle)
    }
}
