// src/target/cohort.rs

//! Containment tree of targets: one cohort, its datasets, their samples.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::engine::TargetId;
use crate::errors::{Result, StagedagError};
use crate::target::{Target, TargetKind};
use crate::types::Granularity;

/// Which targets to keep when selecting from a [`Cohort`].
///
/// A target matches an id set when its own id, its external id, or the id of
/// any of its ancestors is in the set, so listing a dataset covers all of its
/// samples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFilter {
    /// If non-empty, only matching targets are kept.
    pub include: BTreeSet<String>,
    /// Matching targets are dropped.
    pub exclude: BTreeSet<String>,
    /// If non-empty, only targets inside one of these datasets are kept.
    pub datasets: BTreeSet<String>,
    /// If set, only the target with this id or external id is kept.
    pub name: Option<String>,
}

impl TargetFilter {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
            && self.exclude.is_empty()
            && self.datasets.is_empty()
            && self.name.is_none()
    }
}

/// Arena holding the target tree.
///
/// Invariant: every non-cohort target has exactly one parent, which is
/// registered before it and has the next coarser granularity. This keeps the
/// containment a strict tree.
#[derive(Debug, Clone)]
pub struct Cohort {
    id: TargetId,
    targets: HashMap<TargetId, Target>,
    /// Children in insertion order.
    children: HashMap<TargetId, Vec<TargetId>>,
}

impl Cohort {
    pub fn new(id: impl Into<TargetId>) -> Self {
        let id = id.into();
        let mut targets = HashMap::new();
        targets.insert(id.clone(), Target::cohort(id.clone()));
        let mut children = HashMap::new();
        children.insert(id.clone(), Vec::new());
        Self {
            id,
            targets,
            children,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The cohort itself as a target.
    pub fn as_target(&self) -> &Target {
        // The root is inserted in `new` and never removed.
        &self.targets[&self.id]
    }

    pub fn add_dataset(&mut self, name: impl Into<TargetId>) -> Result<&mut Target> {
        let target = Target::dataset(name, self.id.clone());
        self.insert(target)
    }

    pub fn add_sample(
        &mut self,
        dataset: &str,
        id: impl Into<TargetId>,
    ) -> Result<&mut Target> {
        self.insert(Target::sample(id, dataset))
    }

    /// Insert a target under its declared parent.
    ///
    /// Fails with [`StagedagError::InvalidHierarchy`] if the id is taken (the
    /// target would get a second parent), the parent is unknown, or the parent
    /// is not of the next coarser granularity.
    pub fn insert(&mut self, target: Target) -> Result<&mut Target> {
        if let Some(existing) = self.targets.get(&target.id) {
            return Err(StagedagError::InvalidHierarchy(format!(
                "target '{}' is already registered as {}",
                target.id, existing
            )));
        }

        let parent_id = match target.parent_id() {
            Some(p) => p.to_string(),
            None => {
                return Err(StagedagError::InvalidHierarchy(format!(
                    "cohort '{}' cannot be added under cohort '{}'",
                    target.id, self.id
                )));
            }
        };

        let expected = match target.kind {
            TargetKind::Sample { .. } => Granularity::Dataset,
            TargetKind::Dataset { .. } => Granularity::Cohort,
            TargetKind::Cohort => unreachable!("cohort has no parent"),
        };

        match self.targets.get(&parent_id) {
            Some(parent) if parent.granularity() == expected => {}
            Some(parent) => {
                return Err(StagedagError::InvalidHierarchy(format!(
                    "{} cannot contain {} '{}'",
                    parent,
                    target.granularity(),
                    target.id
                )));
            }
            None => {
                return Err(StagedagError::InvalidHierarchy(format!(
                    "parent '{}' of {} '{}' does not exist",
                    parent_id,
                    target.granularity(),
                    target.id
                )));
            }
        }

        let id = target.id.clone();
        debug!(target = %id, parent = %parent_id, "adding target to cohort");
        self.children.entry(parent_id).or_default().push(id.clone());
        self.children.insert(id.clone(), Vec::new());
        Ok(self.targets.entry(id).or_insert(target))
    }

    pub fn get(&self, id: &str) -> Option<&Target> {
        self.targets.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Target> {
        self.targets.get_mut(id)
    }

    /// Direct children in insertion order (e.g. dataset → its samples).
    pub fn children_of(&self, id: &str) -> Vec<&Target> {
        self.children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.targets.get(c)).collect())
            .unwrap_or_default()
    }

    pub fn parent_of(&self, id: &str) -> Option<&Target> {
        let target = self.targets.get(id)?;
        self.targets.get(target.parent_id()?)
    }

    /// The target itself or its ancestor at `granularity`.
    pub fn ancestor_at(&self, id: &str, granularity: Granularity) -> Option<&Target> {
        let mut current = self.targets.get(id)?;
        loop {
            if current.granularity() == granularity {
                return Some(current);
            }
            current = self.parent_of(&current.id)?;
        }
    }

    /// Effective activity: the target and all of its ancestors are active.
    pub fn is_active(&self, id: &str) -> bool {
        let mut current = match self.targets.get(id) {
            Some(t) => t,
            None => return false,
        };
        loop {
            if !current.active {
                return false;
            }
            match self.parent_of(&current.id) {
                Some(parent) => current = parent,
                None => return true,
            }
        }
    }

    /// Mark a target inactive. Returns `true` if it was active before.
    pub fn deactivate(&mut self, id: &str) -> bool {
        match self.targets.get_mut(id) {
            Some(t) if t.active => {
                t.active = false;
                info!(target = %id, "target deactivated");
                true
            }
            _ => false,
        }
    }

    pub fn datasets(&self, only_active: bool) -> Vec<&Target> {
        self.children_of(&self.id)
            .into_iter()
            .filter(|d| !only_active || d.active)
            .collect()
    }

    pub fn samples(&self, only_active: bool) -> Vec<&Target> {
        self.datasets(only_active)
            .into_iter()
            .flat_map(|d| self.children_of(&d.id))
            .filter(|s| !only_active || s.active)
            .collect()
    }

    /// Ids of samples contained in (or equal to) the given target.
    pub fn sample_ids_of(&self, id: &str, only_active: bool) -> Vec<TargetId> {
        let target = match self.targets.get(id) {
            Some(t) => t,
            None => return Vec::new(),
        };
        match target.granularity() {
            Granularity::Sample => {
                if !only_active || self.is_active(id) {
                    vec![target.id.clone()]
                } else {
                    Vec::new()
                }
            }
            Granularity::Dataset => self
                .children_of(id)
                .into_iter()
                .filter(|s| !only_active || self.is_active(&s.id))
                .map(|s| s.id.clone())
                .collect(),
            Granularity::Cohort => self
                .samples(only_active)
                .into_iter()
                .map(|s| s.id.clone())
                .collect(),
        }
    }

    /// Targets a stage of `granularity` can be applied to.
    ///
    /// Datasets without (active) samples, and a cohort without (active)
    /// samples, have nothing to process and are left out.
    pub fn targets_at(&self, granularity: Granularity, only_active: bool) -> Vec<&Target> {
        match granularity {
            Granularity::Sample => self.samples(only_active),
            Granularity::Dataset => self
                .datasets(only_active)
                .into_iter()
                .filter(|d| !self.sample_ids_of(&d.id, only_active).is_empty())
                .collect(),
            Granularity::Cohort => {
                if only_active && (!self.as_target().active || self.samples(true).is_empty()) {
                    Vec::new()
                } else {
                    vec![self.as_target()]
                }
            }
        }
    }

    /// Targets of `granularity` whose outputs a stage running on `id` reads.
    ///
    /// - same granularity: the target itself
    /// - coarser: its ancestor
    /// - finer: its effectively active descendants that have work to do
    pub fn related_targets(&self, id: &str, granularity: Granularity) -> Vec<TargetId> {
        let target = match self.targets.get(id) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let own = target.granularity();

        if own == granularity {
            vec![target.id.clone()]
        } else if granularity.contains(own) {
            self.ancestor_at(id, granularity)
                .map(|a| vec![a.id.clone()])
                .unwrap_or_default()
        } else {
            self.targets_at(granularity, true)
                .into_iter()
                .filter(|d| {
                    self.ancestor_at(&d.id, own)
                        .is_some_and(|a| a.id == target.id)
                })
                .map(|d| d.id.clone())
                .collect()
        }
    }

    /// Active targets of `granularity` accepted by `filter`.
    pub fn select(&self, granularity: Granularity, filter: &TargetFilter) -> Vec<&Target> {
        self.targets_at(granularity, true)
            .into_iter()
            .filter(|t| self.accepts(t, filter))
            .collect()
    }

    /// Whether `filter` keeps `target`.
    pub fn accepts(&self, target: &Target, filter: &TargetFilter) -> bool {
        if !filter.include.is_empty() && !self.matches_any(target, &filter.include) {
            return false;
        }
        if self.matches_any(target, &filter.exclude) {
            return false;
        }
        if !filter.datasets.is_empty() {
            let in_dataset = self
                .ancestor_at(&target.id, Granularity::Dataset)
                .is_some_and(|d| filter.datasets.contains(&d.id));
            if !in_dataset && target.granularity() != Granularity::Cohort {
                return false;
            }
        }
        if let Some(name) = &filter.name {
            if !target.is_named(name) {
                return false;
            }
        }
        true
    }

    /// Apply the global skip/only lists by deactivating targets.
    ///
    /// `exclude` deactivates any matching dataset or sample; `include` (when
    /// non-empty) deactivates every sample it does not match; `datasets`
    /// (when non-empty) deactivates every dataset it does not name.
    pub fn apply_filter(&mut self, filter: &TargetFilter) {
        let mut to_deactivate: Vec<TargetId> = Vec::new();

        for dataset in self.datasets(false) {
            let unlisted = !filter.datasets.is_empty() && !filter.datasets.contains(&dataset.id);
            if unlisted || filter.exclude.contains(&dataset.id) {
                to_deactivate.push(dataset.id.clone());
            }
        }

        for sample in self.samples(false) {
            if !filter.include.is_empty() && !self.matches_any(sample, &filter.include) {
                to_deactivate.push(sample.id.clone());
            } else if self.matches_any(sample, &filter.exclude) {
                to_deactivate.push(sample.id.clone());
            }
        }

        for id in to_deactivate {
            self.deactivate(&id);
        }
    }

    fn matches_any(&self, target: &Target, ids: &BTreeSet<String>) -> bool {
        if ids.is_empty() {
            return false;
        }
        let mut current = Some(target);
        while let Some(t) = current {
            if ids.contains(&t.id) {
                return true;
            }
            if let Some(ext) = &t.external_id {
                if ids.contains(ext) {
                    return true;
                }
            }
            current = self.parent_of(&t.id);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cohort() -> Cohort {
        let mut cohort = Cohort::new("COH");
        cohort.add_dataset("DS1").unwrap();
        cohort.add_dataset("DS2").unwrap();
        cohort.add_sample("DS1", "S1").unwrap().external_id = Some("NA12878".to_string());
        cohort.add_sample("DS1", "S2").unwrap();
        cohort.add_sample("DS2", "S3").unwrap();
        cohort
    }

    fn ids(targets: Vec<&Target>) -> Vec<&str> {
        targets.into_iter().map(|t| t.id.as_str()).collect()
    }

    fn set(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn children_keep_insertion_order_and_parents_resolve() {
        let cohort = cohort();

        assert_eq!(ids(cohort.children_of("COH")), vec!["DS1", "DS2"]);
        assert_eq!(ids(cohort.children_of("DS1")), vec!["S1", "S2"]);
        assert!(cohort.children_of("S1").is_empty());
        assert!(cohort.children_of("nope").is_empty());

        assert_eq!(cohort.parent_of("S3").map(|t| t.id.as_str()), Some("DS2"));
        assert_eq!(cohort.parent_of("DS1").map(|t| t.id.as_str()), Some("COH"));
        assert!(cohort.parent_of("COH").is_none());
    }

    #[test]
    fn insert_rejects_unknown_parents_and_wrong_levels() {
        let mut cohort = cohort();

        match cohort.add_sample("DS9", "S9") {
            Err(StagedagError::InvalidHierarchy(msg)) => assert!(msg.contains("'DS9'"), "{msg}"),
            other => panic!("Expected InvalidHierarchy, got: {:?}", other),
        }
        // A sample cannot sit under another sample.
        match cohort.insert(Target::sample("S9", "S1")) {
            Err(StagedagError::InvalidHierarchy(msg)) => assert!(msg.contains("S9"), "{msg}"),
            other => panic!("Expected InvalidHierarchy, got: {:?}", other),
        }
        match cohort.insert(Target::dataset("DS9", "DS1")) {
            Err(StagedagError::InvalidHierarchy(_)) => {}
            other => panic!("Expected InvalidHierarchy, got: {:?}", other),
        }
        match cohort.insert(Target::cohort("OTHER")) {
            Err(StagedagError::InvalidHierarchy(_)) => {}
            other => panic!("Expected InvalidHierarchy, got: {:?}", other),
        }
        // A dataset id cannot be reused for a sample.
        match cohort.add_sample("DS2", "DS1") {
            Err(StagedagError::InvalidHierarchy(_)) => {}
            other => panic!("Expected InvalidHierarchy, got: {:?}", other),
        }

        assert!(cohort.get("S9").is_none());
        assert_eq!(ids(cohort.children_of("S1")), Vec::<&str>::new());
        assert_eq!(cohort.samples(false).len(), 3);
    }

    #[test]
    fn select_filters_by_name_and_containing_dataset() {
        let cohort = cohort();

        let by_name = TargetFilter {
            name: Some("NA12878".to_string()),
            ..TargetFilter::default()
        };
        assert_eq!(ids(cohort.select(Granularity::Sample, &by_name)), vec!["S1"]);

        let by_dataset = TargetFilter {
            datasets: set(&["DS2"]),
            ..TargetFilter::default()
        };
        assert_eq!(ids(cohort.select(Granularity::Sample, &by_dataset)), vec!["S3"]);
        assert_eq!(ids(cohort.select(Granularity::Dataset, &by_dataset)), vec!["DS2"]);
        // The cohort is not inside any dataset and is never dropped by one.
        assert_eq!(ids(cohort.select(Granularity::Cohort, &by_dataset)), vec!["COH"]);

        let both = TargetFilter {
            include: set(&["DS1"]),
            exclude: set(&["S2"]),
            ..TargetFilter::default()
        };
        assert_eq!(ids(cohort.select(Granularity::Sample, &both)), vec!["S1"]);
        assert!(!both.is_empty());
        assert!(TargetFilter::default().is_empty());
    }

    #[test]
    fn dataset_filter_deactivates_unlisted_datasets() {
        let mut cohort = cohort();
        cohort.apply_filter(&TargetFilter {
            datasets: set(&["DS1"]),
            ..TargetFilter::default()
        });

        assert!(!cohort.is_active("DS2"));
        // Samples inherit inactivity from their dataset.
        assert!(!cohort.is_active("S3"));
        assert_eq!(cohort.sample_ids_of("COH", true), vec!["S1", "S2"]);
        assert_eq!(ids(cohort.targets_at(Granularity::Dataset, true)), vec!["DS1"]);
    }

    #[test]
    fn related_targets_walk_both_directions() {
        let mut cohort = cohort();

        assert_eq!(cohort.related_targets("S3", Granularity::Dataset), vec!["DS2"]);
        assert_eq!(cohort.related_targets("S3", Granularity::Cohort), vec!["COH"]);
        assert_eq!(cohort.related_targets("DS1", Granularity::Sample), vec!["S1", "S2"]);
        assert_eq!(cohort.related_targets("COH", Granularity::Dataset), vec!["DS1", "DS2"]);

        cohort.deactivate("S3");
        // DS2 has no active samples left, so nothing reads it.
        assert_eq!(cohort.related_targets("COH", Granularity::Dataset), vec!["DS1"]);
        assert!(cohort.related_targets("DS2", Granularity::Sample).is_empty());
    }
}
