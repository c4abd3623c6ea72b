// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Granularity a stage operates on.
///
/// Ordered from finest to coarsest: a `Dataset` contains `Sample`s and the
/// `Cohort` contains every `Dataset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Sample,
    Dataset,
    Cohort,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Sample => "sample",
            Granularity::Dataset => "dataset",
            Granularity::Cohort => "cohort",
        }
    }

    /// `true` if `self` strictly contains targets of `other`.
    pub fn contains(&self, other: Granularity) -> bool {
        *self > other
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sample" => Ok(Granularity::Sample),
            "dataset" => Ok(Granularity::Dataset),
            "cohort" => Ok(Granularity::Cohort),
            other => Err(format!(
                "invalid stage level: {other} (expected \"sample\", \"dataset\" or \"cohort\")"
            )),
        }
    }
}
