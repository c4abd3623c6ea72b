use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use stagedag::errors::SubmissionError;
use stagedag::exec::{JobHandle, JobSubmitter, SubmitRequest};

/// One recorded submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedJob {
    pub stage: String,
    pub target: String,
    pub command: String,
    pub script: String,
    pub handle: JobHandle,
    pub inputs: Vec<PathBuf>,
    pub depends_on: Vec<JobHandle>,
}

/// A fake submitter that:
/// - records every submission it accepts
/// - fails submissions for the (stage, target) pairs it was told to fail.
#[derive(Debug, Clone, Default)]
pub struct FakeSubmitter {
    submitted: Arc<Mutex<Vec<SubmittedJob>>>,
    failing: HashSet<(String, String)>,
}

impl FakeSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject submissions for `target` in `stage`.
    pub fn fail_for(mut self, stage: &str, target: &str) -> Self {
        self.failing.insert((stage.to_string(), target.to_string()));
        self
    }

    pub fn submitted(&self) -> Vec<SubmittedJob> {
        self.submitted.lock().unwrap().clone()
    }

    /// Targets submitted for `stage`, in submission order.
    pub fn targets_of(&self, stage: &str) -> Vec<String> {
        self.submitted()
            .into_iter()
            .filter(|j| j.stage == stage)
            .map(|j| j.target)
            .collect()
    }

    pub fn job(&self, stage: &str, target: &str) -> Option<SubmittedJob> {
        self.submitted()
            .into_iter()
            .find(|j| j.stage == stage && j.target == target)
    }
}

impl JobSubmitter for FakeSubmitter {
    fn submit(&mut self, request: &SubmitRequest<'_>) -> Result<JobHandle, SubmissionError> {
        let key = (request.stage.to_string(), request.target.id.clone());
        if self.failing.contains(&key) {
            return Err(SubmissionError::new(request.job_name(), "rejected by fake submitter"));
        }

        let mut guard = self.submitted.lock().unwrap();
        let handle = JobHandle::new(format!("job-{}", guard.len() + 1));
        guard.push(SubmittedJob {
            stage: request.stage.to_string(),
            target: request.target.id.clone(),
            command: request.command.name.clone(),
            script: request.command.script.clone(),
            handle: handle.clone(),
            inputs: request.inputs.to_vec(),
            depends_on: request.depends_on.to_vec(),
        });
        Ok(handle)
    }
}
