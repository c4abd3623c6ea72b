// src/engine/executor.rs

//! Walks an execution plan and decides, per (stage, target), whether to reuse,
//! queue, skip or fail.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::model::{WorkflowOptions, lists_stage};
use crate::dag::{ExecutionPlan, PlannedStage};
use crate::engine::state::{RunState, UpstreamStatus};
use crate::engine::{ExecutionReport, StageOutcome};
use crate::errors::{Result, StagedagError};
use crate::exec::{JobHandle, JobSubmitter, SubmitRequest};
use crate::reuse::ReuseOracle;
use crate::stage::{Stage, StageInput, StageOutput, StageRegistry};
use crate::target::{Cohort, Target};

/// Name recorded against failures of the up-front input check.
const INPUT_CHECK: &str = "input check";

/// One execution pass.
///
/// Works on its own copy of the cohort: targets dropped for missing input
/// are deactivated there and never leak into later passes.
pub struct Executor<'a> {
    registry: &'a StageRegistry,
    options: &'a WorkflowOptions,
    oracle: &'a ReuseOracle,
    submitter: &'a mut dyn JobSubmitter,
    run_id: &'a str,
    workflow: &'a str,
    cohort: Cohort,
    state: RunState,
}

impl<'a> Executor<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: &'a StageRegistry,
        cohort: &Cohort,
        options: &'a WorkflowOptions,
        oracle: &'a ReuseOracle,
        submitter: &'a mut dyn JobSubmitter,
        run_id: &'a str,
        workflow: &'a str,
    ) -> Self {
        Self {
            registry,
            options,
            oracle,
            submitter,
            run_id,
            workflow,
            cohort: cohort.clone(),
            state: RunState::new(),
        }
    }

    /// Execute the whole plan.
    ///
    /// Returns an error only for fatal conditions: structural errors raised
    /// by a stage, or missing input when skipping is not allowed. Submission
    /// failures are recorded per target.
    pub fn run(mut self, plan: &ExecutionPlan) -> Result<ExecutionReport> {
        if self.options.check_inputs {
            self.check_inputs()?;
        }
        for planned in &plan.prerequisites {
            self.resolve_prerequisite(planned)?;
        }
        for planned in &plan.stages {
            self.run_stage(planned)?;
        }

        let report = self.state.into_report();
        let summary = report.summary();
        info!(
            run_id = %self.run_id,
            reused = summary.reused,
            queued = summary.queued,
            skipped = summary.skipped,
            failed = summary.failed,
            "execution pass finished"
        );
        Ok(report)
    }

    /// Apply the missing-input policy to every active sample whose input is
    /// absent.
    fn check_inputs(&mut self) -> Result<()> {
        let missing: Vec<(String, String)> = self
            .cohort
            .samples(true)
            .into_iter()
            .filter_map(|s| match &s.input {
                None => Some((s.id.clone(), "no input declared".to_string())),
                Some(path) if !self.oracle.exists(path) => {
                    Some((s.id.clone(), format!("input {} does not exist", path.display())))
                }
                Some(_) => None,
            })
            .collect();

        for (sample, reason) in missing {
            self.handle_missing(INPUT_CHECK, &sample, reason, false)?;
        }
        Ok(())
    }

    /// Take outputs of a filtered-out stage from storage.
    fn resolve_prerequisite(&mut self, planned: &PlannedStage) -> Result<()> {
        let stage = self.stage(&planned.stage)?;
        let name = stage.name();
        let trusted = lists_stage(&self.options.assume_outputs_exist_for_stages, name)
            || !self.options.check_expected_outputs;

        for id in &planned.targets {
            let Some(target) = self.active_target(id) else {
                continue;
            };
            let data = stage.expected_outputs(&target);

            if trusted || self.oracle.outputs_exist(&target, stage.as_ref()) {
                self.state.record_output(StageOutput::reused(name, id, data));
                continue;
            }

            let first_missing = self
                .oracle
                .first_missing(&target, stage.as_ref())
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "no outputs declared".to_string());
            let reason = format!("outputs of skipped stage '{name}' not found: {first_missing}");

            if self.options.skip_samples_with_missing_input {
                self.handle_missing(name, id, reason, true)?;
            } else if lists_stage(&self.options.allow_missing_outputs_for_stages, name) {
                warn!(stage = %name, target = %id, missing = %first_missing, "using missing outputs of skipped stage");
                self.state.record_output(StageOutput::reused(name, id, data));
            } else {
                return Err(StagedagError::MissingInput {
                    stage: name.to_string(),
                    target: id.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }

    fn run_stage(&mut self, planned: &PlannedStage) -> Result<()> {
        let stage = self.stage(&planned.stage)?;
        debug!(stage = %stage.name(), targets = planned.targets.len(), "processing stage");

        for id in &planned.targets {
            let Some(target) = self.active_target(id) else {
                debug!(stage = %stage.name(), target = %id, "target no longer active");
                continue;
            };
            self.run_target(stage.as_ref(), &target, planned.is_forced(id))?;
        }
        Ok(())
    }

    fn run_target(&mut self, stage: &dyn Stage, target: &Target, forced: bool) -> Result<()> {
        let name = stage.name();

        match self
            .state
            .upstream_status(self.registry, &self.cohort, stage, &target.id)
        {
            UpstreamStatus::Ready => {}
            UpstreamStatus::Blocked {
                stage: upstream,
                target: upstream_target,
            } => {
                self.state.record_outcome(
                    name,
                    &target.id,
                    StageOutcome::Failed(format!(
                        "upstream stage '{upstream}' failed for '{upstream_target}'"
                    )),
                );
                return Ok(());
            }
            UpstreamStatus::Missing {
                stage: upstream,
                target: upstream_target,
            } => {
                let reason =
                    format!("no output of stage '{upstream}' for '{upstream_target}'");
                return self.handle_missing(name, &target.id, reason, true);
            }
        }

        if forced {
            debug!(stage = %name, target = %target.id, "forced; existing outputs ignored");
        } else if self.options.check_expected_outputs && self.oracle.can_reuse(target, stage) {
            let data = stage.expected_outputs(target);
            self.state
                .record_output(StageOutput::reused(name, &target.id, data));
            return Ok(());
        }

        let input = StageInput::new(
            name,
            stage.required_stages(),
            &self.cohort,
            self.state.outputs(),
        );
        let Some(request) = stage.queue_jobs(target, &input)? else {
            return self.handle_missing(name, &target.id, "no applicable work".to_string(), true);
        };
        let inputs: Vec<PathBuf> = input.locators_for(target);
        let mut depends_on: Vec<JobHandle> = input.jobs_for(target);
        depends_on.sort();
        depends_on.dedup();

        let mut jobs = Vec::with_capacity(request.commands.len());
        for command in &request.commands {
            let submit = SubmitRequest {
                run_id: self.run_id,
                workflow: self.workflow,
                stage: name,
                target,
                command,
                inputs: &inputs,
                depends_on: &depends_on,
            };
            match self.submitter.submit(&submit) {
                Ok(handle) => {
                    debug!(stage = %name, target = %target.id, job = %handle, "job submitted");
                    jobs.push(handle.clone());
                    // Later commands of the same request run after earlier ones.
                    depends_on.push(handle);
                }
                Err(err) => {
                    warn!(stage = %name, target = %target.id, error = %err, "job submission failed");
                    self.state
                        .record_outcome(name, &target.id, StageOutcome::Failed(err.to_string()));
                    return Ok(());
                }
            }
        }

        self.state.record_output(StageOutput::queued(
            name,
            &target.id,
            request.outputs,
            jobs,
        ));
        Ok(())
    }

    /// Missing-input policy: drop the target when allowed, fail the run
    /// otherwise.
    fn handle_missing(
        &mut self,
        stage: &str,
        target: &str,
        reason: String,
        record: bool,
    ) -> Result<()> {
        if !self.options.skip_samples_with_missing_input {
            return Err(StagedagError::MissingInput {
                stage: stage.to_string(),
                target: target.to_string(),
                reason,
            });
        }
        warn!(stage = %stage, target = %target, reason = %reason, "skipping target with missing input");
        if record {
            self.state
                .record_outcome(stage, target, StageOutcome::SkippedMissingInput);
        }
        self.cohort.deactivate(target);
        self.state.exclude(target);
        Ok(())
    }

    fn stage(&self, name: &str) -> Result<Arc<dyn Stage>> {
        self.registry
            .get(name)
            .cloned()
            .ok_or_else(|| StagedagError::UnknownStageReference {
                name: name.to_string(),
                referenced_by: "the execution plan".to_string(),
            })
    }

    /// Owned copy of a target if it is still effectively active.
    fn active_target(&self, id: &str) -> Option<Target> {
        if self.cohort.is_active(id) {
            self.cohort.get(id).cloned()
        } else {
            None
        }
    }
}
