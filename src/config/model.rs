// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::settings::Settings;
use crate::errors::Result;
use crate::target::Cohort;
use crate::types::Granularity;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [workflow]
/// name = "germline"
/// output_prefix = "out"
/// skip_stages = ["Align"]
///
/// [cohort]
/// id = "COH1"
///
/// [[cohort.dataset]]
/// name = "DS1"
///
/// [[cohort.dataset.sample]]
/// id = "S1"
/// input = "data/S1.fastq"
///
/// [[stage]]
/// name = "Align"
/// level = "sample"
/// output = "{prefix}/align/{id}.cram"
/// cmd = "align {input} > {output}"
/// ```
///
/// Stages are an array so that their declaration order, used to break
/// ordering ties, survives parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub workflow: WorkflowOptions,

    #[serde(default)]
    pub cohort: CohortSection,

    /// All stages from `[[stage]]`, in declaration order.
    #[serde(default, rename = "stage")]
    pub stages: Vec<StageConfig>,
}

/// Validated configuration.
///
/// Built from a [`RawConfigFile`] through `TryFrom`, which checks stage
/// references, acyclicity, templates and the cohort tree.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub workflow: WorkflowOptions,
    pub cohort: CohortSection,
    pub stages: Vec<StageConfig>,
    settings: Settings,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, settings: Settings) -> Self {
        Self {
            workflow: raw.workflow,
            cohort: raw.cohort,
            stages: raw.stages,
            settings,
        }
    }

    /// Key-path access to the configuration, defaults included.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Stable digest of the effective configuration.
    pub fn digest(&self) -> String {
        self.settings.digest()
    }

    pub fn stage(&self, name: &str) -> Option<&StageConfig> {
        self.stages.iter().find(|s| s.name == name)
    }
}

/// `[workflow]` section: planning options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowOptions {
    /// Workflow name; slugified before being handed to submitters.
    pub name: String,

    /// Fixed run id. Generated per run when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Root for `{prefix}` in output templates.
    pub output_prefix: PathBuf,

    /// Where the script submitter writes job scripts.
    pub work_dir: PathBuf,

    /// Stages positioned before the earliest of these are not run.
    pub first_stages: Vec<String>,
    /// Stages positioned after the latest of these are not run.
    pub last_stages: Vec<String>,
    /// If non-empty, only these stages are run.
    pub only_stages: Vec<String>,
    /// These stages are not run.
    pub skip_stages: Vec<String>,

    /// Check that every active sample's input exists before planning.
    pub check_inputs: bool,
    /// Allow reuse of existing outputs at all.
    pub check_intermediates: bool,
    /// Check expected outputs of planned stages and reuse them when present.
    pub check_expected_outputs: bool,
    /// Drop targets with missing inputs instead of failing the run.
    pub skip_samples_with_missing_input: bool,

    /// Stages run for every target, existing outputs or not.
    pub force_stages: Vec<String>,
    /// Skipped stages whose outputs are trusted without a storage check.
    pub assume_outputs_exist_for_stages: Vec<String>,
    /// Skipped stages whose missing outputs are tolerated.
    pub allow_missing_outputs_for_stages: Vec<String>,

    /// Targets deactivated for the whole run.
    pub skip_targets: Vec<String>,
    /// If non-empty, only these samples (or samples of these datasets) stay
    /// active.
    pub only_targets: Vec<String>,
    /// If non-empty, only samples of these datasets stay active.
    pub only_datasets: Vec<String>,
    /// Targets forced in every stage.
    pub force_targets: Vec<String>,

    /// Per-stage target overrides, keyed by stage name.
    pub stage_targets: BTreeMap<String, StageTargets>,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            name: "stagedag".to_string(),
            run_id: None,
            output_prefix: PathBuf::from("output"),
            work_dir: PathBuf::from("work"),
            first_stages: Vec::new(),
            last_stages: Vec::new(),
            only_stages: Vec::new(),
            skip_stages: Vec::new(),
            check_inputs: false,
            check_intermediates: true,
            check_expected_outputs: true,
            skip_samples_with_missing_input: false,
            force_stages: Vec::new(),
            assume_outputs_exist_for_stages: Vec::new(),
            allow_missing_outputs_for_stages: Vec::new(),
            skip_targets: Vec::new(),
            only_targets: Vec::new(),
            only_datasets: Vec::new(),
            force_targets: Vec::new(),
            stage_targets: BTreeMap::new(),
        }
    }
}

impl WorkflowOptions {
    /// Overrides for `stage`, if any. Keys match case-insensitively.
    pub fn targets_for(&self, stage: &str) -> Option<&StageTargets> {
        self.stage_targets.get(stage).or_else(|| {
            self.stage_targets
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(stage))
                .map(|(_, v)| v)
        })
    }

    /// Stage-name lists that must reference registered stages, with the key
    /// they came from.
    pub fn stage_references(&self) -> Vec<(&'static str, &[String])> {
        vec![
            ("workflow.first_stages", self.first_stages.as_slice()),
            ("workflow.last_stages", self.last_stages.as_slice()),
            ("workflow.only_stages", self.only_stages.as_slice()),
            ("workflow.skip_stages", self.skip_stages.as_slice()),
            ("workflow.force_stages", self.force_stages.as_slice()),
            (
                "workflow.assume_outputs_exist_for_stages",
                self.assume_outputs_exist_for_stages.as_slice(),
            ),
            (
                "workflow.allow_missing_outputs_for_stages",
                self.allow_missing_outputs_for_stages.as_slice(),
            ),
        ]
    }
}

/// `[workflow.stage_targets.<Stage>]`: per-stage target selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageTargets {
    pub skip: Vec<String>,
    pub only: Vec<String>,
    pub force: Vec<String>,
}

/// `[cohort]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CohortSection {
    #[serde(default = "default_cohort_id")]
    pub id: String,

    #[serde(default, rename = "dataset")]
    pub datasets: Vec<DatasetConfig>,
}

fn default_cohort_id() -> String {
    "cohort".to_string()
}

impl CohortSection {
    /// Build the target tree described by this section.
    pub fn build(&self) -> Result<Cohort> {
        let mut cohort = Cohort::new(self.id.clone());
        for dataset in &self.datasets {
            cohort.add_dataset(dataset.name.clone())?;
            for sample in &dataset.samples {
                let target = cohort.add_sample(&dataset.name, sample.id.clone())?;
                target.external_id = sample.external_id.clone();
                target.input = sample.input.clone();
            }
        }
        Ok(cohort)
    }
}

impl Default for CohortSection {
    fn default() -> Self {
        Self {
            id: default_cohort_id(),
            datasets: Vec::new(),
        }
    }
}

/// `[[cohort.dataset]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub name: String,

    #[serde(default, rename = "sample")]
    pub samples: Vec<SampleConfig>,
}

/// `[[cohort.dataset.sample]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SampleConfig {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Raw input consumed by the first stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
}

/// `[[stage]]` entry: a stage implemented by a command template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    pub name: String,

    /// `"sample"`, `"dataset"` or `"cohort"`.
    pub level: Granularity,

    /// Stages whose outputs this one reads.
    #[serde(default)]
    pub required: Vec<String>,

    /// Single output locator template. Mutually exclusive with `outputs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Keyed output locator templates.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,

    /// Script template.
    pub cmd: String,

    /// Samples without an input locator have no work for this stage.
    #[serde(default)]
    pub requires_input: bool,
}

/// Case-insensitive membership of a stage name in a configured list.
pub fn lists_stage(names: &[String], stage: &str) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(stage))
}
