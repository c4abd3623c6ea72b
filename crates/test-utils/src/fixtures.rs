#![allow(dead_code)]

use std::sync::Arc;

use stagedag::config::WorkflowOptions;
use stagedag::engine::Workflow;
use stagedag::stage::Stage;
use stagedag::storage::MockStorage;
use stagedag::target::Cohort;

use crate::builders::{registry, CohortBuilder, StageBuilder};

/// `COH` / `DS1` / `S1`, `S2`, `S3`, every sample with an input.
pub fn three_sample_cohort() -> Cohort {
    CohortBuilder::new("COH")
        .dataset("DS1")
        .sample_with_input("S1")
        .sample_with_input("S2")
        .sample_with_input("S3")
        .build()
}

/// `COH` / `DS1` (`S1`, `S2`) and `DS2` (`S3`), every sample with an input.
pub fn two_dataset_cohort() -> Cohort {
    CohortBuilder::new("COH")
        .dataset("DS1")
        .sample_with_input("S1")
        .sample_with_input("S2")
        .dataset("DS2")
        .sample_with_input("S3")
        .build()
}

/// Align (sample) -> DatasetQc (dataset) -> Report (sample).
pub fn dataset_qc_stages() -> Vec<Arc<dyn Stage>> {
    vec![
        StageBuilder::sample("Align").requires_input().build(),
        StageBuilder::dataset("DatasetQc").requires("Align").build(),
        StageBuilder::sample("Report").requires("DatasetQc").build(),
    ]
}

/// [`dataset_qc_stages`] over [`two_dataset_cohort`].
pub fn dataset_qc_workflow(storage: &MockStorage, options: WorkflowOptions) -> Workflow {
    Workflow::new(
        registry(dataset_qc_stages()),
        two_dataset_cohort(),
        options,
        Arc::new(storage.clone()),
    )
}

/// Align (sample) -> Genotype (sample) -> JointCalling (cohort).
pub fn germline_stages() -> Vec<Arc<dyn Stage>> {
    vec![
        StageBuilder::sample("Align").requires_input().build(),
        StageBuilder::sample("Genotype").requires("Align").build(),
        StageBuilder::cohort("JointCalling").requires("Genotype").build(),
    ]
}

/// Germline workflow over [`three_sample_cohort`].
pub fn germline_workflow(storage: &MockStorage, options: WorkflowOptions) -> Workflow {
    germline_workflow_with(three_sample_cohort(), storage, options)
}

pub fn germline_workflow_with(
    cohort: Cohort,
    storage: &MockStorage,
    options: WorkflowOptions,
) -> Workflow {
    Workflow::new(
        registry(germline_stages()),
        cohort,
        options,
        Arc::new(storage.clone()),
    )
}
