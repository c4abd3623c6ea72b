// src/stage/output.rs

//! Output records produced by planning a stage for a target.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::engine::{StageName, TargetId};
use crate::exec::JobHandle;

/// Recorded outputs of a run, indexed by stage name and then target id.
pub type OutputsByStage = BTreeMap<StageName, BTreeMap<TargetId, StageOutput>>;

/// Locator(s) a stage produces for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputData {
    #[default]
    None,
    Path(PathBuf),
    Map(BTreeMap<String, PathBuf>),
}

impl OutputData {
    pub fn is_empty(&self) -> bool {
        match self {
            OutputData::None => true,
            OutputData::Path(_) => false,
            OutputData::Map(m) => m.is_empty(),
        }
    }

    /// The only locator: a plain path, or a map holding exactly one entry.
    pub fn single(&self) -> Option<&Path> {
        match self {
            OutputData::Path(p) => Some(p),
            OutputData::Map(m) if m.len() == 1 => m.values().next().map(PathBuf::as_path),
            _ => None,
        }
    }

    /// A keyed locator from a map output.
    pub fn get(&self, key: &str) -> Option<&Path> {
        match self {
            OutputData::Map(m) => m.get(key).map(PathBuf::as_path),
            _ => None,
        }
    }

    /// `get(key)` when a key is given, `single()` otherwise.
    pub fn path(&self, key: Option<&str>) -> Option<&Path> {
        match key {
            Some(k) => self.get(k),
            None => self.single(),
        }
    }

    /// Every locator, in key order for maps.
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            OutputData::None => Vec::new(),
            OutputData::Path(p) => vec![p.as_path()],
            OutputData::Map(m) => m.values().map(PathBuf::as_path).collect(),
        }
    }
}

impl From<PathBuf> for OutputData {
    fn from(path: PathBuf) -> Self {
        OutputData::Path(path)
    }
}

impl From<BTreeMap<String, PathBuf>> for OutputData {
    fn from(map: BTreeMap<String, PathBuf>) -> Self {
        OutputData::Map(map)
    }
}

impl fmt::Display for OutputData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputData::None => f.write_str("-"),
            OutputData::Path(p) => write!(f, "{}", p.display()),
            OutputData::Map(m) => {
                let parts: Vec<String> = m
                    .iter()
                    .map(|(k, v)| format!("{k}={}", v.display()))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

/// Result of planning one stage for one target.
///
/// Downstream stages read these through a
/// [`StageInput`](crate::stage::StageInput).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput {
    pub stage: StageName,
    pub target: TargetId,
    pub data: OutputData,
    /// Handles of the jobs that will produce `data`. Empty when reused.
    pub jobs: Vec<JobHandle>,
    /// `true` when `data` already existed and nothing was queued.
    pub reused: bool,
}

impl StageOutput {
    pub fn queued(
        stage: impl Into<StageName>,
        target: impl Into<TargetId>,
        data: OutputData,
        jobs: Vec<JobHandle>,
    ) -> Self {
        Self {
            stage: stage.into(),
            target: target.into(),
            data,
            jobs,
            reused: false,
        }
    }

    pub fn reused(
        stage: impl Into<StageName>,
        target: impl Into<TargetId>,
        data: OutputData,
    ) -> Self {
        Self {
            stage: stage.into(),
            target: target.into(),
            data,
            jobs: Vec::new(),
            reused: true,
        }
    }
}
