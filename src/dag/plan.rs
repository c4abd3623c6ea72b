// src/dag/plan.rs

//! Execution plan produced by the resolver.

use std::collections::BTreeSet;
use std::fmt;

use crate::engine::{StageName, TargetId};
use crate::types::Granularity;

/// One stage of the plan with the targets it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStage {
    pub stage: StageName,
    pub granularity: Granularity,
    /// Targets in cohort order.
    pub targets: Vec<TargetId>,
    /// Targets that run regardless of existing outputs.
    pub forced: BTreeSet<TargetId>,
}

impl PlannedStage {
    pub fn is_forced(&self, target: &str) -> bool {
        self.forced.contains(target)
    }
}

/// Ordered, filtered plan. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Stages to run, dependencies first.
    pub stages: Vec<PlannedStage>,
    /// Filtered-out stages whose existing outputs feed planned stages.
    pub prerequisites: Vec<PlannedStage>,
}

impl ExecutionPlan {
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.stage.as_str()).collect()
    }

    pub fn prerequisite_names(&self) -> Vec<&str> {
        self.prerequisites.iter().map(|s| s.stage.as_str()).collect()
    }

    pub fn get(&self, stage: &str) -> Option<&PlannedStage> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.prerequisites {
            writeln!(
                f,
                "  [existing] {} ({}, {} targets)",
                p.stage,
                p.granularity,
                p.targets.len()
            )?;
        }
        for (i, s) in self.stages.iter().enumerate() {
            write!(
                f,
                "  {}. {} ({}, {} targets)",
                i + 1,
                s.stage,
                s.granularity,
                s.targets.len()
            )?;
            if !s.forced.is_empty() {
                write!(f, " forced: {:?}", s.forced)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
