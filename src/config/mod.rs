// src/config/mod.rs

//! Configuration loading and validation for stagedag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load and layer config files from disk (`loader.rs`).
//! - Validate stage references, acyclicity, templates and the cohort tree
//!   (`validate.rs`).
//! - Expose the effective tree by key path (`settings.rs`).

pub mod loader;
pub mod model;
pub mod settings;
pub mod validate;

pub use loader::{default_config_paths, load_and_validate, load_from_path, load_from_str, load_layered};
pub use model::{
    CohortSection, ConfigFile, DatasetConfig, RawConfigFile, SampleConfig, StageConfig,
    StageTargets, WorkflowOptions,
};
pub use settings::Settings;
