// src/dag/resolver.rs

//! Turns requested stages into an ordered, filtered [`ExecutionPlan`].

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, info, warn};

use crate::config::model::{WorkflowOptions, lists_stage};
use crate::dag::graph::StageGraph;
use crate::dag::plan::{ExecutionPlan, PlannedStage};
use crate::engine::{StageName, TargetId};
use crate::errors::{Result, StagedagError};
use crate::stage::StageRegistry;
use crate::target::{Cohort, TargetFilter};

/// Graph resolver over a registry and a cohort.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    registry: &'a StageRegistry,
    cohort: &'a Cohort,
    options: &'a WorkflowOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a StageRegistry, cohort: &'a Cohort, options: &'a WorkflowOptions) -> Self {
        Self {
            registry,
            cohort,
            options,
        }
    }

    /// Build the plan for `requested` final stages (all stages when empty).
    ///
    /// Fails with [`StagedagError::EmptyPlan`] when the filters leave nothing
    /// to run.
    pub fn resolve<S: AsRef<str>>(&self, requested: &[S]) -> Result<ExecutionPlan> {
        self.registry.validate()?;

        let requested = self.canonical_names(requested.iter().map(AsRef::as_ref), "the request")?;
        let roots: Vec<StageName> = if requested.is_empty() {
            self.registry.names().map(str::to_string).collect()
        } else {
            requested
        };

        let closure = self.closure(&roots)?;
        let graph = StageGraph::from_registry(self.registry, closure.iter().map(String::as_str));
        let order = graph.topological_order()?;
        debug!(stages = ?order, "topological order of required stages");

        let kept = self.apply_filters(&order)?;
        if kept.is_empty() {
            warn!(requested = ?roots, "stage filters removed every stage");
            return Err(StagedagError::EmptyPlan);
        }

        let stages = kept
            .iter()
            .map(|n| self.plan_stage(n))
            .collect::<Result<Vec<_>>>()?;

        let prerequisites = order
            .iter()
            .filter(|n| !kept.contains(n))
            .filter(|n| {
                kept.iter()
                    .any(|k| graph.dependencies_of(k).contains(&n.as_str()))
            })
            .map(|n| self.plan_stage(n))
            .collect::<Result<Vec<_>>>()?;

        info!(
            stages = ?kept,
            prerequisites = ?prerequisites.iter().map(|p| p.stage.as_str()).collect::<Vec<_>>(),
            "execution plan resolved"
        );

        Ok(ExecutionPlan {
            stages,
            prerequisites,
        })
    }

    /// Requested stages plus everything they transitively require.
    fn closure(&self, roots: &[StageName]) -> Result<Vec<StageName>> {
        let mut seen = HashSet::new();
        let mut closure = Vec::new();
        for root in roots {
            let deps = self.registry.resolve_dependencies(root)?;
            let names = deps
                .iter()
                .map(|s| s.name().to_string())
                .chain(std::iter::once(root.clone()));
            for name in names {
                if seen.insert(name.clone()) {
                    closure.push(name);
                }
            }
        }
        Ok(closure)
    }

    /// first/last cut, then `only` intersection, then `skip` subtraction.
    fn apply_filters(&self, order: &[StageName]) -> Result<Vec<StageName>> {
        let opts = self.options;
        let first = self.canonical_names(opts.first_stages.iter().map(String::as_str), "workflow.first_stages")?;
        let last = self.canonical_names(opts.last_stages.iter().map(String::as_str), "workflow.last_stages")?;
        let only = self.canonical_names(opts.only_stages.iter().map(String::as_str), "workflow.only_stages")?;
        let skip = self.canonical_names(opts.skip_stages.iter().map(String::as_str), "workflow.skip_stages")?;

        let position = |name: &StageName| order.iter().position(|o| o == name);

        let mut start = 0;
        if !first.is_empty() {
            match first.iter().filter_map(position).min() {
                Some(p) => start = p,
                None => warn!(first_stages = ?first, "no first stage is part of the plan; ignoring"),
            }
        }
        let mut end = order.len();
        if !last.is_empty() {
            match last.iter().filter_map(position).max() {
                Some(p) => end = p + 1,
                None => warn!(last_stages = ?last, "no last stage is part of the plan; ignoring"),
            }
        }

        let mut kept: Vec<StageName> = Vec::new();
        for (i, name) in order.iter().enumerate() {
            let reason = if i < start {
                Some("before first stage")
            } else if i >= end {
                Some("after last stage")
            } else if !only.is_empty() && !only.contains(name) {
                Some("not in only_stages")
            } else if skip.contains(name) {
                Some("in skip_stages")
            } else {
                None
            };
            match reason {
                Some(reason) => debug!(stage = %name, reason, "stage filtered out"),
                None => kept.push(name.clone()),
            }
        }
        Ok(kept)
    }

    fn plan_stage(&self, name: &str) -> Result<PlannedStage> {
        let granularity = self
            .registry
            .get(name)
            .map(|s| s.granularity())
            .ok_or_else(|| StagedagError::UnknownStageReference {
                name: name.to_string(),
                referenced_by: "the execution plan".to_string(),
            })?;
        let overrides = self.options.targets_for(name).cloned().unwrap_or_default();

        let filter = TargetFilter {
            include: overrides.only.iter().cloned().collect(),
            exclude: overrides.skip.iter().cloned().collect(),
            ..TargetFilter::default()
        };
        let targets: Vec<TargetId> = self
            .cohort
            .select(granularity, &filter)
            .into_iter()
            .map(|t| t.id.clone())
            .collect();

        let forced: BTreeSet<TargetId> = if lists_stage(&self.options.force_stages, name) {
            targets.iter().cloned().collect()
        } else {
            let force = TargetFilter {
                include: self
                    .options
                    .force_targets
                    .iter()
                    .chain(overrides.force.iter())
                    .cloned()
                    .collect(),
                ..TargetFilter::default()
            };
            if force.include.is_empty() {
                BTreeSet::new()
            } else {
                targets
                    .iter()
                    .filter(|id| {
                        self.cohort
                            .get(id)
                            .is_some_and(|t| self.cohort.accepts(t, &force))
                    })
                    .cloned()
                    .collect()
            }
        };

        debug!(
            stage = %name,
            level = %granularity,
            targets = targets.len(),
            forced = forced.len(),
            "planned stage targets"
        );

        Ok(PlannedStage {
            stage: name.to_string(),
            granularity,
            targets,
            forced,
        })
    }

    fn canonical_names<'n, I>(&self, names: I, source: &str) -> Result<Vec<StageName>>
    where
        I: IntoIterator<Item = &'n str>,
    {
        names
            .into_iter()
            .map(|n| {
                self.registry
                    .find(n)
                    .map(str::to_string)
                    .ok_or_else(|| StagedagError::UnknownStageReference {
                        name: n.to_string(),
                        referenced_by: source.to_string(),
                    })
            })
            .collect()
    }
}
