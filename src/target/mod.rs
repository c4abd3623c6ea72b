// src/target/mod.rs

//! Targets that stages operate on.
//!
//! - [`Target`] is a closed tagged variant over the three granularities.
//! - [`cohort`] holds the containment tree (cohort → datasets → samples)
//!   and the filtering helpers used by the resolver and executor.

pub mod cohort;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::engine::TargetId;
use crate::types::Granularity;

pub use cohort::{Cohort, TargetFilter};

/// Per-variant containment data. Parents are referenced by id only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    Sample { dataset: TargetId },
    Dataset { cohort: TargetId },
    Cohort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: TargetId,
    pub kind: TargetKind,
    /// Inactive targets stay in the tree but are never planned.
    pub active: bool,
    /// Identifier used by the people who sent the data (samples only).
    pub external_id: Option<String>,
    /// Raw input consumed by the first stage (samples only).
    pub input: Option<PathBuf>,
}

impl Target {
    pub fn sample(id: impl Into<TargetId>, dataset: impl Into<TargetId>) -> Self {
        Self::new(
            id.into(),
            TargetKind::Sample {
                dataset: dataset.into(),
            },
        )
    }

    pub fn dataset(id: impl Into<TargetId>, cohort: impl Into<TargetId>) -> Self {
        Self::new(
            id.into(),
            TargetKind::Dataset {
                cohort: cohort.into(),
            },
        )
    }

    pub fn cohort(id: impl Into<TargetId>) -> Self {
        Self::new(id.into(), TargetKind::Cohort)
    }

    fn new(id: TargetId, kind: TargetKind) -> Self {
        Self {
            id,
            kind,
            active: true,
            external_id: None,
            input: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn granularity(&self) -> Granularity {
        match self.kind {
            TargetKind::Sample { .. } => Granularity::Sample,
            TargetKind::Dataset { .. } => Granularity::Dataset,
            TargetKind::Cohort => Granularity::Cohort,
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        match &self.kind {
            TargetKind::Sample { dataset } => Some(dataset),
            TargetKind::Dataset { cohort } => Some(cohort),
            TargetKind::Cohort => None,
        }
    }

    /// `true` if `name` is this target's id or external id.
    pub fn is_named(&self, name: &str) -> bool {
        self.id == name || self.external_id.as_deref() == Some(name)
    }

    /// Attributes attached to every job submitted for this target.
    pub fn job_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        match &self.kind {
            TargetKind::Sample { dataset } => {
                attrs.insert("sample".to_string(), self.id.clone());
                attrs.insert("dataset".to_string(), dataset.clone());
                if let Some(ext) = &self.external_id {
                    attrs.insert("external_id".to_string(), ext.clone());
                }
            }
            TargetKind::Dataset { .. } => {
                attrs.insert("dataset".to_string(), self.id.clone());
            }
            TargetKind::Cohort => {
                attrs.insert("cohort".to_string(), self.id.clone());
            }
        }
        attrs
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.granularity(), self.id)?;
        if !self.active {
            f.write_str(" [inactive]")?;
        }
        Ok(())
    }
}
