// src/engine/state.rs

//! Per-run bookkeeping of outcomes and recorded outputs.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::engine::{StageName, StageOutcome, TargetId};
use crate::stage::{OutputsByStage, Stage, StageOutput, StageRegistry};
use crate::target::Cohort;

/// Result of looking at the upstream targets of a (stage, target) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamStatus {
    /// Every related upstream target has outputs.
    Ready,
    /// A related upstream target failed.
    Blocked { stage: StageName, target: TargetId },
    /// A related upstream target has no outputs, or there is no related
    /// upstream target at all.
    Missing { stage: StageName, target: TargetId },
}

/// Mutable state of one execution pass.
#[derive(Debug, Default)]
pub struct RunState {
    outcomes: BTreeMap<StageName, BTreeMap<TargetId, StageOutcome>>,
    outputs: OutputsByStage,
    excluded: Vec<TargetId>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outputs(&self) -> &OutputsByStage {
        &self.outputs
    }

    pub fn outcome(&self, stage: &str, target: &str) -> Option<&StageOutcome> {
        self.outcomes.get(stage)?.get(target)
    }

    /// Record a reused or queued output.
    pub fn record_output(&mut self, output: StageOutput) {
        let outcome = if output.reused {
            StageOutcome::Reused
        } else {
            StageOutcome::Queued
        };
        info!(
            stage = %output.stage,
            target = %output.target,
            outcome = %outcome,
            outputs = %output.data,
            "stage planned for target"
        );
        self.set_outcome(&output.stage, &output.target, outcome);
        self.outputs
            .entry(output.stage.clone())
            .or_default()
            .insert(output.target.clone(), output);
    }

    /// Record an outcome that produces no outputs.
    pub fn record_outcome(&mut self, stage: &str, target: &str, outcome: StageOutcome) {
        info!(stage = %stage, target = %target, outcome = %outcome, "stage planned for target");
        self.set_outcome(stage, target, outcome);
    }

    fn set_outcome(&mut self, stage: &str, target: &str, outcome: StageOutcome) {
        self.outcomes
            .entry(stage.to_string())
            .or_default()
            .insert(target.to_string(), outcome);
    }

    /// Remember that a target was dropped for missing input.
    pub fn exclude(&mut self, target: &str) {
        if !self.excluded.iter().any(|t| t == target) {
            self.excluded.push(target.to_string());
        }
    }

    /// Check the upstream targets `stage` reads for `target`.
    ///
    /// Failures win over missing outputs, so a target behind a failed
    /// upstream is reported as blocked even if another upstream is missing.
    ///
    /// A finer upstream only needs outputs for some of its related targets:
    /// samples the upstream stage was not run on (per-stage `skip`/`only`)
    /// are simply not read. It is missing when none of them has outputs.
    pub fn upstream_status(
        &self,
        registry: &StageRegistry,
        cohort: &Cohort,
        stage: &dyn Stage,
        target: &str,
    ) -> UpstreamStatus {
        let mut missing = None;
        for dep in stage.required_stages() {
            let Some(upstream) = registry.get(dep) else {
                continue;
            };
            let finer = stage.granularity().contains(upstream.granularity());
            let related = cohort.related_targets(target, upstream.granularity());
            if related.is_empty() && missing.is_none() {
                missing = Some((dep.clone(), target.to_string()));
            }

            let mut first_without = None;
            let mut any_with = false;
            for r in related {
                let outcome = self.outcome(dep, &r);
                if outcome.is_some_and(StageOutcome::is_failed) {
                    debug!(stage = %stage.name(), target = %target, upstream = %dep, upstream_target = %r, "blocked by upstream failure");
                    return UpstreamStatus::Blocked {
                        stage: dep.clone(),
                        target: r,
                    };
                }
                if outcome.is_some_and(StageOutcome::has_outputs) {
                    any_with = true;
                } else if first_without.is_none() {
                    first_without = Some(r);
                }
            }

            if let Some(r) = first_without {
                if finer && any_with {
                    debug!(stage = %stage.name(), target = %target, upstream = %dep, upstream_target = %r, "upstream target not run; not read");
                } else if missing.is_none() {
                    missing = Some((dep.clone(), r));
                }
            }
        }
        match missing {
            Some((stage, target)) => UpstreamStatus::Missing { stage, target },
            None => UpstreamStatus::Ready,
        }
    }

    pub fn into_report(self) -> ExecutionReport {
        ExecutionReport {
            outcomes: self.outcomes,
            outputs: self.outputs,
            excluded: self.excluded,
        }
    }
}

/// Counts of outcomes across a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeSummary {
    pub reused: usize,
    pub queued: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of an execution pass.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    outcomes: BTreeMap<StageName, BTreeMap<TargetId, StageOutcome>>,
    outputs: OutputsByStage,
    excluded: Vec<TargetId>,
}

impl ExecutionReport {
    pub fn outcome(&self, stage: &str, target: &str) -> Option<&StageOutcome> {
        self.outcomes.get(stage)?.get(target)
    }

    /// Outcomes of one stage keyed by target.
    pub fn outcomes_of(&self, stage: &str) -> Option<&BTreeMap<TargetId, StageOutcome>> {
        self.outcomes.get(stage)
    }

    /// Every outcome as `(stage, target, outcome)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &StageOutcome)> {
        self.outcomes.iter().flat_map(|(stage, by_target)| {
            by_target
                .iter()
                .map(move |(target, outcome)| (stage.as_str(), target.as_str(), outcome))
        })
    }

    pub fn output(&self, stage: &str, target: &str) -> Option<&StageOutput> {
        self.outputs.get(stage)?.get(target)
    }

    pub fn outputs(&self) -> &OutputsByStage {
        &self.outputs
    }

    /// Targets dropped for missing input, in the order they were dropped.
    pub fn excluded_targets(&self) -> &[TargetId] {
        &self.excluded
    }

    pub fn failures(&self) -> Vec<(&str, &str, &str)> {
        self.iter()
            .filter_map(|(stage, target, outcome)| match outcome {
                StageOutcome::Failed(reason) => Some((stage, target, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.iter().any(|(_, _, o)| o.is_failed())
    }

    pub fn summary(&self) -> OutcomeSummary {
        let mut summary = OutcomeSummary::default();
        for (_, _, outcome) in self.iter() {
            match outcome {
                StageOutcome::Reused => summary.reused += 1,
                StageOutcome::Queued => summary.queued += 1,
                StageOutcome::SkippedMissingInput => summary.skipped += 1,
                StageOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }
}
