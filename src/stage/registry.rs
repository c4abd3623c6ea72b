// src/stage/registry.rs

//! Registry of declared stages.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::engine::StageName;
use crate::errors::{Result, StagedagError};
use crate::stage::Stage;

/// Declared stages in declaration order.
///
/// Requirements may reference stages registered later; [`validate`] checks
/// that every reference resolves and that the graph is acyclic.
///
/// [`validate`]: StageRegistry::validate
#[derive(Debug, Default, Clone)]
pub struct StageRegistry {
    stages: Vec<Arc<dyn Stage>>,
    index: HashMap<StageName, usize>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register all stages, then validate the resulting graph.
    pub fn from_stages<I>(stages: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn Stage>>,
    {
        let mut registry = Self::new();
        for stage in stages {
            registry.register_arc(stage)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    pub fn register<S: Stage + 'static>(&mut self, stage: S) -> Result<()> {
        self.register_arc(Arc::new(stage))
    }

    pub fn register_arc(&mut self, stage: Arc<dyn Stage>) -> Result<()> {
        let name = stage.name().to_string();
        if self.index.contains_key(&name) {
            return Err(StagedagError::DuplicateStageName(name));
        }
        debug!(
            stage = %name,
            level = %stage.granularity(),
            required = ?stage.required_stages(),
            "registered stage"
        );
        self.index.insert(name, self.stages.len());
        self.stages.push(stage);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Stage>> {
        self.index.get(name).map(|&i| &self.stages[i])
    }

    /// Declaration position of a stage.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Canonical name of a stage, matched case-insensitively.
    pub fn find(&self, name: &str) -> Option<&str> {
        if let Some(&i) = self.index.get(name) {
            return Some(self.stages[i].name());
        }
        let lower = name.to_lowercase();
        self.stages
            .iter()
            .map(|s| s.name())
            .find(|n| n.to_lowercase() == lower)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name())
    }

    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Check that all required-stage references resolve and there is no cycle.
    pub fn validate(&self) -> Result<()> {
        for stage in &self.stages {
            for dep in stage.required_stages() {
                if !self.index.contains_key(dep) {
                    return Err(StagedagError::UnknownStageReference {
                        name: dep.clone(),
                        referenced_by: format!("stage '{}'", stage.name()),
                    });
                }
            }
        }

        let mut done = HashSet::new();
        for stage in &self.stages {
            let mut path = Vec::new();
            let mut order = Vec::new();
            self.visit(stage.name(), &mut path, &mut done, &mut order)?;
        }
        Ok(())
    }

    /// Transitive requirements of `name` (excluding itself), dependencies
    /// first.
    pub fn resolve_dependencies(&self, name: &str) -> Result<Vec<Arc<dyn Stage>>> {
        let mut path = Vec::new();
        let mut done = HashSet::new();
        let mut order = Vec::new();
        self.visit(name, &mut path, &mut done, &mut order)?;

        Ok(order
            .into_iter()
            .filter(|n| n != name)
            .filter_map(|n| self.get(&n).cloned())
            .collect())
    }

    /// Depth-first walk over required-stage edges.
    ///
    /// `path` holds the stages on the current branch: meeting one of them
    /// again is a cycle. `done` holds fully explored stages, so a stage
    /// reachable through two branches (a diamond) is visited once and is not
    /// reported as a cycle. Stages are appended to `order` after their
    /// requirements.
    fn visit(
        &self,
        name: &str,
        path: &mut Vec<StageName>,
        done: &mut HashSet<StageName>,
        order: &mut Vec<StageName>,
    ) -> Result<()> {
        if let Some(start) = path.iter().position(|p| p == name) {
            let mut cycle: Vec<StageName> = path[start..].to_vec();
            cycle.push(name.to_string());
            return Err(StagedagError::CyclicDependency(cycle));
        }
        if done.contains(name) {
            return Ok(());
        }

        let stage = self
            .get(name)
            .ok_or_else(|| StagedagError::UnknownStageReference {
                name: name.to_string(),
                referenced_by: match path.last() {
                    Some(parent) => format!("stage '{parent}'"),
                    None => "the request".to_string(),
                },
            })?;

        path.push(name.to_string());
        for dep in stage.required_stages() {
            self.visit(dep, path, done, order)?;
        }
        path.pop();

        done.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }
}
