// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::config::settings::Settings;
use crate::errors::{Result, StagedagError};
use crate::stage::command::check_templates;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::StagedagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let settings = Settings::from_serializable(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, settings))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_stages(cfg)?;
    validate_stage_names(cfg)?;
    validate_stage_dependencies(cfg)?;
    validate_dag(cfg)?;
    validate_workflow_references(cfg)?;
    validate_templates(cfg)?;
    validate_cohort(cfg)?;
    Ok(())
}

fn ensure_has_stages(cfg: &RawConfigFile) -> Result<()> {
    if cfg.stages.is_empty() {
        return Err(StagedagError::ConfigError(
            "config must contain at least one [[stage]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_stage_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for stage in &cfg.stages {
        if stage.name.trim().is_empty() {
            return Err(StagedagError::ConfigError(
                "[[stage]] entries must have a non-empty name".to_string(),
            ));
        }
        if !seen.insert(stage.name.as_str()) {
            return Err(StagedagError::DuplicateStageName(stage.name.clone()));
        }
    }
    Ok(())
}

fn validate_stage_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for stage in &cfg.stages {
        for dep in &stage.required {
            if !cfg.stages.iter().any(|s| &s.name == dep) {
                return Err(StagedagError::UnknownStageReference {
                    name: dep.clone(),
                    referenced_by: format!("stage '{}'", stage.name),
                });
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> stage
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for stage in &cfg.stages {
        graph.add_node(stage.name.as_str());
    }
    for stage in &cfg.stages {
        for dep in &stage.required {
            graph.add_edge(dep.as_str(), stage.name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            let mut members: Vec<String> = tarjan_scc(&graph)
                .into_iter()
                .find(|component| component.contains(&node))
                .unwrap_or_else(|| vec![node])
                .into_iter()
                .map(str::to_string)
                .collect();
            members.sort();
            if let Some(first) = members.first().cloned() {
                members.push(first);
            }
            Err(StagedagError::CyclicDependency(members))
        }
    }
}

fn validate_workflow_references(cfg: &RawConfigFile) -> Result<()> {
    let known = |name: &str| {
        cfg.stages
            .iter()
            .any(|s| s.name.eq_ignore_ascii_case(name))
    };

    for (key, names) in cfg.workflow.stage_references() {
        for name in names {
            if !known(name) {
                return Err(StagedagError::UnknownStageReference {
                    name: name.clone(),
                    referenced_by: format!("'{key}'"),
                });
            }
        }
    }
    for name in cfg.workflow.stage_targets.keys() {
        if !known(name) {
            return Err(StagedagError::UnknownStageReference {
                name: name.clone(),
                referenced_by: "'workflow.stage_targets'".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_templates(cfg: &RawConfigFile) -> Result<()> {
    for stage in &cfg.stages {
        check_templates(stage)?;
    }
    Ok(())
}

fn validate_cohort(cfg: &RawConfigFile) -> Result<()> {
    cfg.cohort.build().map(|_| ())
}
