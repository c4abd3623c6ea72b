// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::engine::StageName;
use crate::errors::{Result, StagedagError};
use crate::stage::StageRegistry;

/// Dependency graph over a subset of the registered stages.
///
/// Edge direction: dependency -> dependent. Node weights are stage names;
/// each node also remembers the stage's declaration position, used to break
/// ordering ties.
#[derive(Debug, Clone)]
pub struct StageGraph {
    graph: DiGraph<StageName, ()>,
    nodes: HashMap<StageName, NodeIndex>,
    positions: HashMap<NodeIndex, usize>,
}

impl StageGraph {
    /// Build the graph induced by `stages`.
    ///
    /// Requirements outside `stages` are ignored; names that are not
    /// registered are skipped.
    pub fn from_registry<'a, I>(registry: &StageRegistry, stages: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        let mut positions = HashMap::new();

        for name in stages {
            if nodes.contains_key(name) {
                continue;
            }
            if let Some(pos) = registry.position(name) {
                let idx = graph.add_node(name.to_string());
                nodes.insert(name.to_string(), idx);
                positions.insert(idx, pos);
            }
        }

        let names: Vec<StageName> = nodes.keys().cloned().collect();
        for name in names {
            let Some(stage) = registry.get(&name) else {
                continue;
            };
            for dep in stage.required_stages() {
                if let (Some(&from), Some(&to)) = (nodes.get(dep), nodes.get(&name)) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        Self {
            graph,
            nodes,
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Immediate dependencies of a stage within the graph.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Immediate dependents of a stage within the graph.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
        out.sort_by_key(|n| self.positions.get(n).copied().unwrap_or(usize::MAX));
        out.into_iter().map(|n| self.graph[n].as_str()).collect()
    }

    /// Kahn's algorithm; among stages that are ready at the same time the one
    /// declared first comes first.
    pub fn topological_order(&self) -> Result<Vec<StageName>> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| {
                let deg = self
                    .graph
                    .neighbors_directed(n, Direction::Incoming)
                    .count();
                (n, deg)
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<(usize, NodeIndex)>> = in_degree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&n, _)| Reverse((self.position(n), n)))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, node))) = ready.pop() {
            order.push(self.graph[node].clone());
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(deg) = in_degree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(Reverse((self.position(next), next)));
                    }
                }
            }
        }

        if order.len() != self.graph.node_count() {
            let mut stuck: Vec<(usize, StageName)> = in_degree
                .iter()
                .filter(|&(_, &deg)| deg > 0)
                .map(|(&n, _)| (self.position(n), self.graph[n].clone()))
                .collect();
            stuck.sort();
            return Err(StagedagError::CyclicDependency(
                stuck.into_iter().map(|(_, name)| name).collect(),
            ));
        }

        Ok(order)
    }

    fn position(&self, node: NodeIndex) -> usize {
        self.positions.get(&node).copied().unwrap_or(usize::MAX)
    }
}
