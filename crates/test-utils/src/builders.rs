#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use stagedag::config::{StageTargets, WorkflowOptions};
use stagedag::engine::StageName;
use stagedag::errors::Result;
use stagedag::exec::CommandSpec;
use stagedag::stage::{JobRequest, OutputData, Stage, StageInput, StageRegistry};
use stagedag::target::{Cohort, Target};
use stagedag::types::Granularity;

/// Builder for a [`Cohort`]: datasets first, then their samples.
pub struct CohortBuilder {
    cohort: Cohort,
    current_dataset: Option<String>,
}

impl CohortBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            cohort: Cohort::new(id),
            current_dataset: None,
        }
    }

    /// Add a dataset; following `sample` calls add to it.
    pub fn dataset(mut self, name: &str) -> Self {
        self.cohort
            .add_dataset(name)
            .expect("Failed to add dataset in builder");
        self.current_dataset = Some(name.to_string());
        self
    }

    pub fn sample(mut self, id: &str) -> Self {
        let dataset = self.dataset_name();
        self.cohort
            .add_sample(&dataset, id)
            .expect("Failed to add sample in builder");
        self
    }

    /// Sample with input `in/<id>.fq`.
    pub fn sample_with_input(mut self, id: &str) -> Self {
        let dataset = self.dataset_name();
        let target = self
            .cohort
            .add_sample(&dataset, id)
            .expect("Failed to add sample in builder");
        target.input = Some(PathBuf::from(format!("in/{id}.fq")));
        self
    }

    fn dataset_name(&self) -> String {
        self.current_dataset
            .clone()
            .expect("call dataset() before sample()")
    }

    pub fn build(self) -> Cohort {
        self.cohort
    }
}

/// Simple stage for tests.
///
/// Expected outputs are `<root>/<stage>/<id>` (or one locator per key under
/// that directory); the submitted command is `run <stage> <id>`.
#[derive(Debug, Clone)]
pub struct TestStage {
    name: StageName,
    granularity: Granularity,
    required: Vec<StageName>,
    root: PathBuf,
    keys: Vec<String>,
    requires_input: bool,
    commands: usize,
    reads: Vec<StageName>,
}

impl Stage for TestStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn granularity(&self) -> Granularity {
        self.granularity
    }

    fn required_stages(&self) -> &[StageName] {
        &self.required
    }

    fn expected_outputs(&self, target: &Target) -> OutputData {
        let base = self.root.join(&self.name).join(&target.id);
        if self.keys.is_empty() {
            return OutputData::Path(base);
        }
        OutputData::Map(
            self.keys
                .iter()
                .map(|k| (k.clone(), base.join(k)))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn queue_jobs(&self, target: &Target, inputs: &StageInput<'_>) -> Result<Option<JobRequest>> {
        if self.requires_input && target.input.is_none() {
            return Ok(None);
        }
        for stage in &self.reads {
            inputs.outputs_by_target(stage)?;
        }
        let mut request = JobRequest::new(self.expected_outputs(target));
        for i in 0..self.commands {
            request = request.with_command(CommandSpec::new(
                format!("{}-{i}", self.name.to_lowercase()),
                format!("run {} {}", self.name, target.id),
            ));
        }
        Ok(Some(request))
    }
}

/// Builder for [`TestStage`].
pub struct StageBuilder {
    stage: TestStage,
}

impl StageBuilder {
    pub fn new(name: &str, granularity: Granularity) -> Self {
        Self {
            stage: TestStage {
                name: name.to_string(),
                granularity,
                required: Vec::new(),
                root: PathBuf::from("out"),
                keys: Vec::new(),
                requires_input: false,
                commands: 1,
                reads: Vec::new(),
            },
        }
    }

    pub fn sample(name: &str) -> Self {
        Self::new(name, Granularity::Sample)
    }

    pub fn dataset(name: &str) -> Self {
        Self::new(name, Granularity::Dataset)
    }

    pub fn cohort(name: &str) -> Self {
        Self::new(name, Granularity::Cohort)
    }

    pub fn requires(mut self, dep: &str) -> Self {
        self.stage.required.push(dep.to_string());
        self
    }

    pub fn output_key(mut self, key: &str) -> Self {
        self.stage.keys.push(key.to_string());
        self
    }

    pub fn requires_input(mut self) -> Self {
        self.stage.requires_input = true;
        self
    }

    pub fn commands(mut self, n: usize) -> Self {
        self.stage.commands = n;
        self
    }

    /// Read outputs of `stage` from `queue_jobs`, declared or not.
    pub fn reads(mut self, stage: &str) -> Self {
        self.stage.reads.push(stage.to_string());
        self
    }

    pub fn build(self) -> Arc<dyn Stage> {
        Arc::new(self.stage)
    }
}

/// Registry from stages, panicking on invalid graphs.
pub fn registry(stages: Vec<Arc<dyn Stage>>) -> StageRegistry {
    StageRegistry::from_stages(stages).expect("Failed to build valid registry from builder")
}

/// Builder for [`WorkflowOptions`].
pub struct OptionsBuilder {
    options: WorkflowOptions,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: WorkflowOptions {
                run_id: Some("test-run".to_string()),
                ..WorkflowOptions::default()
            },
        }
    }

    pub fn first_stages(mut self, list: &[&str]) -> Self {
        self.options.first_stages = names(list);
        self
    }

    pub fn last_stages(mut self, list: &[&str]) -> Self {
        self.options.last_stages = names(list);
        self
    }

    pub fn only_stages(mut self, list: &[&str]) -> Self {
        self.options.only_stages = names(list);
        self
    }

    pub fn skip_stages(mut self, list: &[&str]) -> Self {
        self.options.skip_stages = names(list);
        self
    }

    pub fn force_stages(mut self, list: &[&str]) -> Self {
        self.options.force_stages = names(list);
        self
    }

    pub fn assume_outputs_exist_for(mut self, list: &[&str]) -> Self {
        self.options.assume_outputs_exist_for_stages = names(list);
        self
    }

    pub fn allow_missing_outputs_for(mut self, list: &[&str]) -> Self {
        self.options.allow_missing_outputs_for_stages = names(list);
        self
    }

    pub fn check_inputs(mut self, val: bool) -> Self {
        self.options.check_inputs = val;
        self
    }

    pub fn check_intermediates(mut self, val: bool) -> Self {
        self.options.check_intermediates = val;
        self
    }

    pub fn check_expected_outputs(mut self, val: bool) -> Self {
        self.options.check_expected_outputs = val;
        self
    }

    pub fn skip_missing_input(mut self, val: bool) -> Self {
        self.options.skip_samples_with_missing_input = val;
        self
    }

    pub fn skip_targets(mut self, list: &[&str]) -> Self {
        self.options.skip_targets = names(list);
        self
    }

    pub fn only_targets(mut self, list: &[&str]) -> Self {
        self.options.only_targets = names(list);
        self
    }

    pub fn only_datasets(mut self, list: &[&str]) -> Self {
        self.options.only_datasets = names(list);
        self
    }

    pub fn force_targets(mut self, list: &[&str]) -> Self {
        self.options.force_targets = names(list);
        self
    }

    pub fn stage_targets(mut self, stage: &str, targets: StageTargets) -> Self {
        self.options.stage_targets.insert(stage.to_string(), targets);
        self
    }

    pub fn build(self) -> WorkflowOptions {
        self.options
    }
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
