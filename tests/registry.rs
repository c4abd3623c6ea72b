mod common;
use crate::common::{init_tracing, TestResult};

use stagedag::errors::StagedagError;
use stagedag::stage::StageRegistry;
use stagedag_test_utils::builders::StageBuilder;

#[test]
fn duplicate_stage_name_is_rejected() {
    init_tracing();

    let mut registry = StageRegistry::new();
    registry
        .register_arc(StageBuilder::sample("Align").build())
        .unwrap();

    match registry.register_arc(StageBuilder::dataset("Align").build()) {
        Err(StagedagError::DuplicateStageName(name)) => assert_eq!(name, "Align"),
        other => panic!("Expected DuplicateStageName, got: {:?}", other),
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn unknown_required_stage_is_reported_with_its_referrer() {
    init_tracing();

    let result = StageRegistry::from_stages(vec![
        StageBuilder::sample("Genotype").requires("Align").build(),
    ]);

    match result {
        Err(StagedagError::UnknownStageReference {
            name,
            referenced_by,
        }) => {
            assert_eq!(name, "Align");
            assert!(referenced_by.contains("Genotype"), "{referenced_by}");
        }
        other => panic!("Expected UnknownStageReference, got: {:?}", other),
    }
}

#[test]
fn forward_references_are_allowed_while_registering() -> TestResult {
    init_tracing();

    let mut registry = StageRegistry::new();
    registry.register_arc(StageBuilder::cohort("JointCalling").requires("Genotype").build())?;
    registry.register_arc(StageBuilder::sample("Genotype").requires("Align").build())?;
    registry.register_arc(StageBuilder::sample("Align").build())?;

    registry.validate()?;
    Ok(())
}

#[test]
fn cycle_is_detected_regardless_of_registration_order() {
    init_tracing();

    let orders = [["A", "B", "C"], ["C", "B", "A"], ["B", "C", "A"]];
    for order in orders {
        let stages = order
            .iter()
            .map(|name| {
                let dep = match *name {
                    "A" => "C",
                    "B" => "A",
                    _ => "B",
                };
                StageBuilder::sample(name).requires(dep).build()
            })
            .collect::<Vec<_>>();

        match StageRegistry::from_stages(stages) {
            Err(StagedagError::CyclicDependency(cycle)) => {
                assert_eq!(cycle.len(), 4, "cycle {:?}", cycle);
                assert_eq!(cycle.first(), cycle.last());
                for name in ["A", "B", "C"] {
                    assert!(cycle.iter().any(|c| c == name), "{name} missing from {cycle:?}");
                }
            }
            other => panic!("Expected CyclicDependency for {:?}, got: {:?}", order, other),
        }
    }
}

#[test]
fn self_dependency_is_a_cycle() {
    init_tracing();

    let result = StageRegistry::from_stages(vec![StageBuilder::sample("Loop").requires("Loop").build()]);
    match result {
        Err(StagedagError::CyclicDependency(cycle)) => {
            assert_eq!(cycle, vec!["Loop".to_string(), "Loop".to_string()]);
        }
        other => panic!("Expected CyclicDependency, got: {:?}", other),
    }
}

#[test]
fn diamond_is_not_a_cycle() -> TestResult {
    init_tracing();

    // Align -> {Genotype, Coverage} -> Report
    let registry = StageRegistry::from_stages(vec![
        StageBuilder::sample("Align").build(),
        StageBuilder::sample("Genotype").requires("Align").build(),
        StageBuilder::sample("Coverage").requires("Align").build(),
        StageBuilder::cohort("Report")
            .requires("Genotype")
            .requires("Coverage")
            .build(),
    ])?;

    let deps: Vec<String> = registry
        .resolve_dependencies("Report")?
        .iter()
        .map(|s| s.name().to_string())
        .collect();

    assert_eq!(deps.len(), 3);
    assert_eq!(deps[0], "Align");
    assert!(deps.contains(&"Genotype".to_string()));
    assert!(deps.contains(&"Coverage".to_string()));
    Ok(())
}

#[test]
fn resolve_dependencies_lists_requirements_first_and_excludes_the_stage() -> TestResult {
    init_tracing();

    let registry = StageRegistry::from_stages(vec![
        StageBuilder::cohort("JointCalling").requires("Genotype").build(),
        StageBuilder::sample("Genotype").requires("Align").build(),
        StageBuilder::sample("Align").build(),
    ])?;

    let deps: Vec<String> = registry
        .resolve_dependencies("JointCalling")?
        .iter()
        .map(|s| s.name().to_string())
        .collect();
    assert_eq!(deps, vec!["Align".to_string(), "Genotype".to_string()]);

    assert!(registry.resolve_dependencies("Align")?.is_empty());
    Ok(())
}

#[test]
fn lookup_by_name_is_case_insensitive_but_returns_the_declared_name() -> TestResult {
    init_tracing();

    let registry = StageRegistry::from_stages(vec![StageBuilder::sample("JointCalling").build()])?;

    assert_eq!(registry.find("jointcalling"), Some("JointCalling"));
    assert_eq!(registry.find("JOINTCALLING"), Some("JointCalling"));
    assert_eq!(registry.find("Joint"), None);
    assert!(registry.get("jointcalling").is_none());
    assert_eq!(registry.position("JointCalling"), Some(0));
    Ok(())
}
