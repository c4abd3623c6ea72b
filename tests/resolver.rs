mod common;
use crate::common::{init_tracing, TestResult};

use stagedag::config::StageTargets;
use stagedag::errors::StagedagError;
use stagedag::storage::MockStorage;
use stagedag::types::Granularity;
use stagedag_test_utils::builders::OptionsBuilder;
use stagedag_test_utils::fixtures::germline_workflow;

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn requesting_the_final_stage_plans_the_whole_chain_in_order() -> TestResult {
    init_tracing();

    let wf = germline_workflow(&MockStorage::new(), OptionsBuilder::new().build());
    let plan = wf.plan(&["JointCalling"])?;
    assert_eq!(plan, wf.plan::<&str>(&[])?);

    assert_eq!(plan.stage_names(), vec!["Align", "Genotype", "JointCalling"]);
    assert!(plan.prerequisites.is_empty());

    let align = plan.get("Align").unwrap();
    assert_eq!(align.granularity, Granularity::Sample);
    assert_eq!(align.targets, ids(&["S1", "S2", "S3"]));
    assert_eq!(plan.get("Genotype").unwrap().targets.len(), 3);
    assert_eq!(plan.get("JointCalling").unwrap().targets, ids(&["COH"]));
    Ok(())
}

#[test]
fn requesting_a_stage_pulls_in_its_requirements_only() -> TestResult {
    init_tracing();

    let wf = germline_workflow(&MockStorage::new(), OptionsBuilder::new().build());
    let plan = wf.plan(&["genotype"])?;

    assert_eq!(plan.stage_names(), vec!["Align", "Genotype"]);
    Ok(())
}

#[test]
fn only_stages_keeps_the_stage_and_reads_its_direct_requirements() -> TestResult {
    init_tracing();

    let options = OptionsBuilder::new().only_stages(&["JointCalling"]).build();
    let wf = germline_workflow(&MockStorage::new(), options);
    let plan = wf.plan::<&str>(&[])?;

    assert_eq!(plan.stage_names(), vec!["JointCalling"]);
    // Align is not read by JointCalling, so it is not a prerequisite.
    assert_eq!(plan.prerequisite_names(), vec!["Genotype"]);
    Ok(())
}

#[test]
fn skipped_stage_becomes_a_prerequisite() -> TestResult {
    init_tracing();

    let options = OptionsBuilder::new().skip_stages(&["align"]).build();
    let wf = germline_workflow(&MockStorage::new(), options);
    let plan = wf.plan::<&str>(&[])?;

    assert_eq!(plan.stage_names(), vec!["Genotype", "JointCalling"]);
    assert_eq!(plan.prerequisite_names(), vec!["Align"]);
    assert_eq!(plan.prerequisites[0].targets.len(), 3);
    Ok(())
}

#[test]
fn first_and_last_stages_cut_the_order() -> TestResult {
    init_tracing();

    let storage = MockStorage::new();

    let wf = germline_workflow(&storage, OptionsBuilder::new().first_stages(&["Genotype"]).build());
    let plan = wf.plan::<&str>(&[])?;
    assert_eq!(plan.stage_names(), vec!["Genotype", "JointCalling"]);
    assert_eq!(plan.prerequisite_names(), vec!["Align"]);

    let wf = germline_workflow(&storage, OptionsBuilder::new().last_stages(&["Genotype"]).build());
    let plan = wf.plan::<&str>(&[])?;
    assert_eq!(plan.stage_names(), vec!["Align", "Genotype"]);
    assert!(plan.prerequisites.is_empty());

    let options = OptionsBuilder::new()
        .first_stages(&["Genotype"])
        .last_stages(&["Genotype"])
        .build();
    let wf = germline_workflow(&storage, options);
    let plan = wf.plan::<&str>(&[])?;
    assert_eq!(plan.stage_names(), vec!["Genotype"]);
    Ok(())
}

#[test]
fn first_stage_outside_the_requested_closure_is_ignored() -> TestResult {
    init_tracing();

    let options = OptionsBuilder::new().first_stages(&["JointCalling"]).build();
    let wf = germline_workflow(&MockStorage::new(), options);
    let plan = wf.plan(&["Align"])?;

    assert_eq!(plan.stage_names(), vec!["Align"]);
    Ok(())
}

#[test]
fn unknown_stage_in_filter_is_an_error() {
    init_tracing();

    let options = OptionsBuilder::new().only_stages(&["Trim"]).build();
    let wf = germline_workflow(&MockStorage::new(), options);

    match wf.plan::<&str>(&[]) {
        Err(StagedagError::UnknownStageReference {
            name,
            referenced_by,
        }) => {
            assert_eq!(name, "Trim");
            assert_eq!(referenced_by, "workflow.only_stages");
        }
        other => panic!("Expected UnknownStageReference, got: {:?}", other),
    }
}

#[test]
fn unknown_requested_stage_is_an_error() {
    init_tracing();

    let wf = germline_workflow(&MockStorage::new(), OptionsBuilder::new().build());
    match wf.plan(&["Trim"]) {
        Err(StagedagError::UnknownStageReference { name, .. }) => assert_eq!(name, "Trim"),
        other => panic!("Expected UnknownStageReference, got: {:?}", other),
    }
}

#[test]
fn filters_removing_everything_give_a_non_fatal_empty_plan() {
    init_tracing();

    let options = OptionsBuilder::new()
        .skip_stages(&["Align", "Genotype", "JointCalling"])
        .build();
    let wf = germline_workflow(&MockStorage::new(), options);

    match wf.plan::<&str>(&[]) {
        Err(err @ StagedagError::EmptyPlan) => assert!(!err.is_fatal()),
        other => panic!("Expected EmptyPlan, got: {:?}", other),
    }
}

#[test]
fn per_stage_target_overrides_select_and_force_targets() -> TestResult {
    init_tracing();

    let options = OptionsBuilder::new()
        .stage_targets(
            "Genotype",
            StageTargets {
                skip: ids(&["S2"]),
                force: ids(&["S3"]),
                ..StageTargets::default()
            },
        )
        .stage_targets(
            "align",
            StageTargets {
                only: ids(&["S1"]),
                ..StageTargets::default()
            },
        )
        .build();
    let wf = germline_workflow(&MockStorage::new(), options);
    let plan = wf.plan::<&str>(&[])?;

    assert_eq!(plan.get("Align").unwrap().targets, ids(&["S1"]));

    let genotype = plan.get("Genotype").unwrap();
    assert_eq!(genotype.targets, ids(&["S1", "S3"]));
    assert!(genotype.is_forced("S3"));
    assert!(!genotype.is_forced("S1"));
    Ok(())
}

#[test]
fn force_stages_and_force_targets_mark_targets_forced() -> TestResult {
    init_tracing();

    let options = OptionsBuilder::new()
        .force_stages(&["Align"])
        .force_targets(&["DS1"])
        .build();
    let wf = germline_workflow(&MockStorage::new(), options);
    let plan = wf.plan::<&str>(&[])?;

    assert_eq!(plan.get("Align").unwrap().forced.len(), 3);
    // Listing the dataset forces every sample in it.
    assert_eq!(plan.get("Genotype").unwrap().forced.len(), 3);
    assert!(plan.get("JointCalling").unwrap().forced.is_empty());
    Ok(())
}

#[test]
fn global_target_filters_deactivate_samples() -> TestResult {
    init_tracing();

    let storage = MockStorage::new();

    let wf = germline_workflow(&storage, OptionsBuilder::new().skip_targets(&["S2"]).build());
    let plan = wf.plan::<&str>(&[])?;
    assert_eq!(plan.get("Align").unwrap().targets, ids(&["S1", "S3"]));
    assert_eq!(plan.get("JointCalling").unwrap().targets, ids(&["COH"]));

    let wf = germline_workflow(&storage, OptionsBuilder::new().only_targets(&["S1"]).build());
    let plan = wf.plan::<&str>(&[])?;
    assert_eq!(plan.get("Genotype").unwrap().targets, ids(&["S1"]));
    Ok(())
}

#[test]
fn plan_renders_existing_and_numbered_stages() -> TestResult {
    init_tracing();

    let options = OptionsBuilder::new().skip_stages(&["Align"]).build();
    let wf = germline_workflow(&MockStorage::new(), options);
    let rendered = wf.plan::<&str>(&[])?.to_string();

    assert!(rendered.contains("[existing] Align (sample, 3 targets)"), "{rendered}");
    assert!(rendered.contains("1. Genotype (sample, 3 targets)"), "{rendered}");
    assert!(rendered.contains("2. JointCalling (cohort, 1 targets)"), "{rendered}");
    Ok(())
}
