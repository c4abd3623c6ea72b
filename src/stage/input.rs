// src/stage/input.rs

//! Read-only view over upstream outputs handed to `Stage::queue_jobs`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::engine::{StageName, TargetId};
use crate::errors::{Result, StagedagError};
use crate::exec::JobHandle;
use crate::stage::output::{OutputsByStage, StageOutput};
use crate::target::{Cohort, Target};

/// Upstream outputs visible to one stage.
///
/// Only stages listed in the consumer's required stages can be read, and only
/// outputs of effectively active targets are exposed: a target dropped for
/// missing input earlier in the run is invisible downstream.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    stage: &'a str,
    required: &'a [StageName],
    cohort: &'a Cohort,
    outputs: &'a OutputsByStage,
}

impl<'a> StageInput<'a> {
    pub fn new(
        stage: &'a str,
        required: &'a [StageName],
        cohort: &'a Cohort,
        outputs: &'a OutputsByStage,
    ) -> Self {
        Self {
            stage,
            required,
            cohort,
            outputs,
        }
    }

    /// Name of the consuming stage.
    pub fn stage(&self) -> &str {
        self.stage
    }

    pub fn cohort(&self) -> &'a Cohort {
        self.cohort
    }

    /// All visible outputs of a required stage, keyed by target id.
    pub fn outputs_by_target(&self, stage: &str) -> Result<BTreeMap<&'a str, &'a StageOutput>> {
        self.ensure_declared(stage)?;
        let by_target = match self.outputs.get(stage) {
            Some(m) => m,
            None => return Ok(BTreeMap::new()),
        };
        Ok(by_target
            .iter()
            .filter(|(id, _)| self.cohort.is_active(id))
            .map(|(id, out)| (id.as_str(), out))
            .collect())
    }

    /// Output of a required stage for one target.
    pub fn output(&self, stage: &str, target: &str) -> Result<&'a StageOutput> {
        self.ensure_declared(stage)?;
        self.outputs
            .get(stage)
            .and_then(|m| m.get(target))
            .filter(|_| self.cohort.is_active(target))
            .ok_or_else(|| StagedagError::InputNotFound {
                stage: stage.to_string(),
                target: target.to_string(),
            })
    }

    /// Single (or keyed) locator produced by `stage` for `target`.
    pub fn as_path(&self, stage: &str, target: &str, key: Option<&str>) -> Result<&'a Path> {
        self.output(stage, target)?
            .data
            .path(key)
            .ok_or_else(|| StagedagError::InputNotFound {
                stage: stage.to_string(),
                target: format!("{target} (key {})", key.unwrap_or("<single>")),
            })
    }

    /// Single (or keyed) locator of every visible target of `stage`.
    pub fn paths_by_target(
        &self,
        stage: &str,
        key: Option<&str>,
    ) -> Result<BTreeMap<TargetId, PathBuf>> {
        let mut paths = BTreeMap::new();
        for (id, out) in self.outputs_by_target(stage)? {
            let path = out.data.path(key).ok_or_else(|| StagedagError::InputNotFound {
                stage: stage.to_string(),
                target: format!("{id} (key {})", key.unwrap_or("<single>")),
            })?;
            paths.insert(id.to_string(), path.to_path_buf());
        }
        Ok(paths)
    }

    /// Outputs of `stage` that belong to `target` (itself, its ancestor or its
    /// samples, depending on the stage's granularity).
    pub fn related_outputs(&self, stage: &str, target: &Target) -> Result<Vec<&'a StageOutput>> {
        let by_target = self.outputs_by_target(stage)?;
        let granularity = match by_target
            .values()
            .next()
            .and_then(|o| self.cohort.get(&o.target))
        {
            Some(t) => t.granularity(),
            None => return Ok(Vec::new()),
        };
        Ok(self
            .cohort
            .related_targets(&target.id, granularity)
            .iter()
            .filter_map(|id| by_target.get(id.as_str()).copied())
            .collect())
    }

    /// Every upstream locator belonging to `target`, across required stages.
    pub fn locators_for(&self, target: &Target) -> Vec<PathBuf> {
        self.all_related(target)
            .into_iter()
            .flat_map(|o| o.data.paths().into_iter().map(Path::to_path_buf))
            .collect()
    }

    /// Jobs the work for `target` must wait on.
    pub fn jobs_for(&self, target: &Target) -> Vec<JobHandle> {
        self.all_related(target)
            .into_iter()
            .flat_map(|o| o.jobs.iter().cloned())
            .collect()
    }

    fn all_related(&self, target: &Target) -> Vec<&'a StageOutput> {
        self.required
            .iter()
            .filter_map(|s| self.related_outputs(s, target).ok())
            .flatten()
            .collect()
    }

    fn ensure_declared(&self, stage: &str) -> Result<()> {
        if self.required.iter().any(|r| r == stage) {
            Ok(())
        } else {
            Err(StagedagError::UndeclaredDependency {
                stage: self.stage.to_string(),
                requested: stage.to_string(),
            })
        }
    }
}
