// src/engine/workflow.rs

//! Facade bundling everything a run needs.

use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use tracing::{debug, info};

use crate::config::model::{ConfigFile, WorkflowOptions};
use crate::dag::{ExecutionPlan, Resolver};
use crate::engine::{ExecutionReport, Executor};
use crate::errors::Result;
use crate::exec::JobSubmitter;
use crate::reuse::ReuseOracle;
use crate::stage::command::{CommandStage, TemplateContext};
use crate::stage::{Stage, StageRegistry};
use crate::storage::Storage;
use crate::target::{Cohort, TargetFilter};

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("Invalid slug pattern"));

/// Lowercase `name` and collapse every run of other characters into `-`.
pub fn slugify(name: &str) -> String {
    NON_SLUG
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// `<unix seconds>-<first 8 hex digits of blake3(seed)>`.
pub fn generate_run_id(seed: &str) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let digest = blake3::hash(seed.as_bytes()).to_hex();
    format!("{secs}-{}", &digest.as_str()[..8])
}

/// Registry, cohort, options and storage for one workflow.
///
/// The global `skip_targets`, `only_targets` and `only_datasets` lists are
/// applied to the cohort when the workflow is built.
#[derive(Debug)]
pub struct Workflow {
    name: String,
    run_id: String,
    registry: StageRegistry,
    cohort: Cohort,
    options: WorkflowOptions,
    storage: Arc<dyn Storage>,
}

impl Workflow {
    pub fn new(
        registry: StageRegistry,
        mut cohort: Cohort,
        options: WorkflowOptions,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let filter = TargetFilter {
            include: options.only_targets.iter().cloned().collect(),
            exclude: options.skip_targets.iter().cloned().collect(),
            datasets: options.only_datasets.iter().cloned().collect(),
            ..TargetFilter::default()
        };
        if !filter.is_empty() {
            cohort.apply_filter(&filter);
        }

        let name = slugify(&options.name);
        let run_id = options.run_id.clone().unwrap_or_else(|| {
            let seed: Vec<&str> = registry.names().collect();
            generate_run_id(&format!("{name}:{}", seed.join(",")))
        });

        info!(
            workflow = %name,
            run_id = %run_id,
            stages = registry.len(),
            samples = cohort.samples(true).len(),
            "workflow initialised"
        );

        Self {
            name,
            run_id,
            registry,
            cohort,
            options,
            storage,
        }
    }

    /// Build the workflow described by a validated configuration.
    pub fn from_config(cfg: &ConfigFile, storage: Arc<dyn Storage>) -> Result<Self> {
        let mut options = cfg.workflow.clone();
        let run_id = options
            .run_id
            .clone()
            .unwrap_or_else(|| generate_run_id(&cfg.digest()));
        options.run_id = Some(run_id.clone());

        let context = TemplateContext {
            cohort: cfg.cohort.id.clone(),
            prefix: options.output_prefix.clone(),
            run_id,
        };
        let stages = cfg.stages.iter().map(|s| {
            debug!(stage = %s.name, level = %s.level, "building command stage");
            Arc::new(CommandStage::from_config(s, context.clone())) as Arc<dyn Stage>
        });
        let registry = StageRegistry::from_stages(stages)?;
        let cohort = cfg.cohort.build()?;

        Ok(Self::new(registry, cohort, options, storage))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub fn cohort(&self) -> &Cohort {
        &self.cohort
    }

    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    /// Mutable options, e.g. for command-line overrides before planning.
    pub fn options_mut(&mut self) -> &mut WorkflowOptions {
        &mut self.options
    }

    /// Resolve the plan for `requested` final stages; all stages when empty.
    pub fn plan<S: AsRef<str>>(&self, requested: &[S]) -> Result<ExecutionPlan> {
        Resolver::new(&self.registry, &self.cohort, &self.options).resolve(requested)
    }

    /// Walk `plan`, submitting work through `submitter`.
    pub fn execute(
        &self,
        plan: &ExecutionPlan,
        submitter: &mut dyn JobSubmitter,
    ) -> Result<ExecutionReport> {
        let oracle = ReuseOracle::new(Arc::clone(&self.storage), self.options.check_intermediates);
        Executor::new(
            &self.registry,
            &self.cohort,
            &self.options,
            &oracle,
            submitter,
            &self.run_id,
            &self.name,
        )
        .run(plan)
    }

    /// `plan` followed by `execute`.
    pub fn run<S: AsRef<str>>(
        &self,
        requested: &[S],
        submitter: &mut dyn JobSubmitter,
    ) -> Result<ExecutionReport> {
        let plan = self.plan(requested)?;
        self.execute(&plan, submitter)
    }
}
