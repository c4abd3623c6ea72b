// src/exec/script.rs

//! Backend that writes one shell script per job.
//!
//! Scripts land in `<work_dir>/<run_id>/<stage>/<target>/<command>.sh`. The
//! returned handle is derived from the script contents, so resubmitting an
//! identical job yields the same handle.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::SubmissionError;
use crate::exec::backend::{JobHandle, JobSubmitter, SubmitRequest};
use crate::storage::Storage;

#[derive(Debug)]
pub struct ScriptSubmitter {
    storage: Arc<dyn Storage>,
    work_dir: PathBuf,
    written: Vec<PathBuf>,
}

impl ScriptSubmitter {
    pub fn new(storage: Arc<dyn Storage>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            work_dir: work_dir.into(),
            written: Vec::new(),
        }
    }

    /// Scripts written so far, in submission order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn script_path(&self, request: &SubmitRequest<'_>) -> PathBuf {
        self.work_dir
            .join(request.run_id)
            .join(request.stage)
            .join(&request.target.id)
            .join(format!("{}.sh", request.command.name))
    }
}

/// Render the full script: header with job metadata, then the command body.
fn render_script(request: &SubmitRequest<'_>) -> String {
    let mut header = vec![
        format!("# workflow: {}", request.workflow),
        format!("# run_id: {}", request.run_id),
        format!("# job: {}", request.job_name()),
    ];
    header.extend(
        request
            .attributes()
            .into_iter()
            .map(|(key, value)| format!("# attr {key}={value}")),
    );
    header.extend(request.depends_on.iter().map(|dep| format!("# depends_on: {dep}")));
    header.extend(
        request
            .inputs
            .iter()
            .map(|input| format!("# input: {}", input.display())),
    );

    format!(
        "#!/usr/bin/env bash\nset -euo pipefail\n\n{}\n\n{}\n",
        header.join("\n"),
        request.command.script.trim_end()
    )
}

fn handle_for(stage: &str, script: &str) -> JobHandle {
    let digest = blake3::hash(script.as_bytes()).to_hex();
    JobHandle::new(format!("{stage}-{}", &digest.as_str()[..12]))
}

impl JobSubmitter for ScriptSubmitter {
    fn submit(&mut self, request: &SubmitRequest<'_>) -> Result<JobHandle, SubmissionError> {
        let script = render_script(request);
        let path = self.script_path(request);

        self.storage
            .write(&path, script.as_bytes())
            .map_err(|e| SubmissionError::new(request.job_name(), format!("{e:#}")))?;

        let handle = handle_for(request.stage, &script);
        info!(
            job = %request.job_name(),
            handle = %handle,
            script = %path.display(),
            "wrote job script"
        );
        debug!(job = %request.job_name(), depends_on = ?request.depends_on, "job dependencies");
        self.written.push(path);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_depends_only_on_stage_and_script() {
        let a = handle_for("Align", "echo hi");
        let b = handle_for("Align", "echo hi");
        let c = handle_for("Align", "echo bye");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("Align-"));
    }
}
