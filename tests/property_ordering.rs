use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use proptest::prelude::*;
use stagedag::engine::Workflow;
use stagedag::stage::{Stage, StageRegistry};
use stagedag::storage::MockStorage;
use stagedag_test_utils::builders::{OptionsBuilder, StageBuilder};
use stagedag_test_utils::fixtures::three_sample_cohort;

/// Requirements per stage index: stage `i` only requires stages `< i`, so the
/// graph is acyclic.
fn dag_strategy(max_stages: usize) -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    (1..=max_stages).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        if i == 0 {
                            BTreeSet::new()
                        } else {
                            picks.into_iter().map(|p| p % i).collect()
                        }
                    })
                    .collect()
            },
        )
    })
}

/// The DAG plus the order in which its stages are registered.
fn registration_strategy() -> impl Strategy<Value = (Vec<BTreeSet<usize>>, Vec<usize>)> {
    dag_strategy(8).prop_flat_map(|deps| {
        let order: Vec<usize> = (0..deps.len()).collect();
        (Just(deps), Just(order).prop_shuffle())
    })
}

fn stage_name(i: usize) -> String {
    format!("stage_{i}")
}

fn build_workflow(deps: &[BTreeSet<usize>], order: &[usize]) -> Workflow {
    let stages: Vec<Arc<dyn Stage>> = order
        .iter()
        .map(|&i| {
            deps[i]
                .iter()
                .fold(StageBuilder::sample(&stage_name(i)), |b, &d| {
                    b.requires(&stage_name(d))
                })
                .build()
        })
        .collect();
    let registry = StageRegistry::from_stages(stages).expect("acyclic by construction");
    Workflow::new(
        registry,
        three_sample_cohort(),
        OptionsBuilder::new().build(),
        Arc::new(MockStorage::new()),
    )
}

proptest! {
    #[test]
    fn every_stage_is_planned_after_its_requirements((deps, order) in registration_strategy()) {
        let wf = build_workflow(&deps, &order);
        let plan = wf.plan::<&str>(&[]).expect("plan");

        let names = plan.stage_names();
        prop_assert_eq!(names.len(), deps.len());

        let position: HashMap<&str, usize> =
            names.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        for (i, required) in deps.iter().enumerate() {
            let own = position[stage_name(i).as_str()];
            for &d in required {
                prop_assert!(
                    position[stage_name(d).as_str()] < own,
                    "{} planned before its requirement {}",
                    stage_name(i),
                    stage_name(d)
                );
            }
        }
    }

    #[test]
    fn requesting_a_stage_plans_exactly_its_closure(
        (deps, order) in registration_strategy(),
        pick in any::<usize>(),
    ) {
        let wf = build_workflow(&deps, &order);
        let requested = stage_name(pick % deps.len());
        let plan = wf.plan(&[requested.as_str()]).expect("plan");

        let mut expected = BTreeSet::new();
        let mut stack = vec![pick % deps.len()];
        while let Some(i) = stack.pop() {
            if expected.insert(stage_name(i)) {
                stack.extend(deps[i].iter().copied());
            }
        }

        let planned: BTreeSet<String> =
            plan.stage_names().into_iter().map(str::to_string).collect();
        prop_assert_eq!(planned, expected);
        prop_assert_eq!(plan.stage_names().last().copied(), Some(requested.as_str()));
    }

    #[test]
    fn plan_does_not_depend_on_repeated_resolution((deps, order) in registration_strategy()) {
        let wf = build_workflow(&deps, &order);
        let first = wf.plan::<&str>(&[]).expect("plan");
        let second = wf.plan::<&str>(&[]).expect("plan");
        prop_assert_eq!(first, second);
    }
}
