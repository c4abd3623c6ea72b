// src/dag/mod.rs

//! Stage graph resolution.
//!
//! - [`graph`] holds the dependency graph of the stages involved in a run and
//!   orders it topologically.
//! - [`resolver`] computes the closure of the requested stages, applies the
//!   stage filters and assigns targets to every stage.
//! - [`plan`] defines the resulting [`ExecutionPlan`].

pub mod graph;
pub mod plan;
pub mod resolver;

pub use graph::StageGraph;
pub use plan::{ExecutionPlan, PlannedStage};
pub use resolver::Resolver;
