// src/stage/command.rs

//! Stages declared in the configuration as command templates.
//!
//! Templates use `{placeholder}` markers. Shell parameter expansions such as
//! `${HOME}` are left untouched.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::config::model::StageConfig;
use crate::engine::StageName;
use crate::errors::{Result, StagedagError};
use crate::exec::CommandSpec;
use crate::stage::{JobRequest, OutputData, Stage, StageInput};
use crate::target::{Target, TargetKind};
use crate::types::Granularity;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\$?)\{([A-Za-z0-9_.\-]+)\}").expect("Invalid placeholder pattern")
});

/// Placeholder names used in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(template)
        .filter(|c| c.get(1).is_none_or(|m| m.as_str().is_empty()))
        .filter_map(|c| c.get(2).map(|m| m.as_str()))
        .collect()
}

/// Replace every known placeholder; unknown ones are kept verbatim.
pub fn render<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            if caps.get(1).is_some_and(|m| !m.is_empty()) {
                return whole.to_string();
            }
            caps.get(2)
                .and_then(|m| lookup(m.as_str()))
                .unwrap_or_else(|| whole.to_string())
        })
        .into_owned()
}

/// Check that every placeholder in the stage's templates can be rendered.
pub fn check_templates(cfg: &StageConfig) -> Result<()> {
    if cfg.output.is_some() && !cfg.outputs.is_empty() {
        return Err(StagedagError::ConfigError(format!(
            "stage '{}' sets both `output` and `outputs`",
            cfg.name
        )));
    }

    for template in cfg.output.iter().chain(cfg.outputs.values()) {
        for name in placeholders(template) {
            if !is_target_placeholder(name, cfg.level) {
                return Err(bad_placeholder(cfg, name, "output"));
            }
        }
    }

    for name in placeholders(&cfg.cmd) {
        let ok = is_target_placeholder(name, cfg.level)
            || match name.split_once('.') {
                None => match name {
                    "input" => cfg.level == Granularity::Sample,
                    "output" => cfg.output.is_some() || cfg.outputs.len() == 1,
                    _ => false,
                },
                Some(("output", key)) => cfg.outputs.contains_key(key),
                Some(("inputs", rest)) => {
                    let stage = rest.split_once('.').map_or(rest, |(s, _)| s);
                    cfg.required.iter().any(|r| r == stage)
                }
                Some(_) => false,
            };
        if !ok {
            return Err(bad_placeholder(cfg, name, "cmd"));
        }
    }
    Ok(())
}

fn is_target_placeholder(name: &str, level: Granularity) -> bool {
    match name {
        "id" | "cohort" | "prefix" | "run_id" => true,
        "dataset" => level != Granularity::Cohort,
        _ => false,
    }
}

fn bad_placeholder(cfg: &StageConfig, name: &str, field: &str) -> StagedagError {
    StagedagError::ConfigError(format!(
        "stage '{}' uses unknown placeholder '{{{name}}}' in `{field}`",
        cfg.name
    ))
}

/// Values shared by every template of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    pub cohort: String,
    pub prefix: PathBuf,
    pub run_id: String,
}

/// A stage whose outputs and script come from templates.
#[derive(Debug, Clone)]
pub struct CommandStage {
    name: StageName,
    granularity: Granularity,
    required: Vec<StageName>,
    output: Option<String>,
    outputs: BTreeMap<String, String>,
    cmd: String,
    requires_input: bool,
    context: TemplateContext,
}

impl CommandStage {
    pub fn new(
        name: impl Into<StageName>,
        granularity: Granularity,
        cmd: impl Into<String>,
        context: TemplateContext,
    ) -> Self {
        Self {
            name: name.into(),
            granularity,
            required: Vec::new(),
            output: None,
            outputs: BTreeMap::new(),
            cmd: cmd.into(),
            requires_input: false,
            context,
        }
    }

    pub fn from_config(cfg: &StageConfig, context: TemplateContext) -> Self {
        Self {
            name: cfg.name.clone(),
            granularity: cfg.level,
            required: cfg.required.clone(),
            output: cfg.output.clone(),
            outputs: cfg.outputs.clone(),
            cmd: cfg.cmd.clone(),
            requires_input: cfg.requires_input,
            context,
        }
    }

    pub fn requires(mut self, stage: impl Into<StageName>) -> Self {
        self.required.push(stage.into());
        self
    }

    pub fn with_output(mut self, template: impl Into<String>) -> Self {
        self.output = Some(template.into());
        self
    }

    pub fn with_keyed_output(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), template.into());
        self
    }

    pub fn requires_input(mut self, requires_input: bool) -> Self {
        self.requires_input = requires_input;
        self
    }

    fn target_value(&self, target: &Target, name: &str) -> Option<String> {
        match name {
            "id" => Some(target.id.clone()),
            "dataset" => match &target.kind {
                TargetKind::Sample { dataset } => Some(dataset.clone()),
                TargetKind::Dataset { .. } => Some(target.id.clone()),
                TargetKind::Cohort => None,
            },
            "cohort" => Some(self.context.cohort.clone()),
            "prefix" => Some(self.context.prefix.display().to_string()),
            "run_id" => Some(self.context.run_id.clone()),
            _ => None,
        }
    }

    fn render_locator(&self, template: &str, target: &Target) -> PathBuf {
        PathBuf::from(render(template, |name| self.target_value(target, name)))
    }

    /// Value for a `cmd`-only placeholder.
    fn command_value(
        &self,
        name: &str,
        target: &Target,
        outputs: &OutputData,
        inputs: &StageInput<'_>,
    ) -> Result<Option<String>> {
        if let Some(value) = self.target_value(target, name) {
            return Ok(Some(value));
        }
        let value = match name.split_once('.') {
            None if name == "input" => target.input.as_ref().map(|p| p.display().to_string()),
            None if name == "output" => outputs.single().map(|p| p.display().to_string()),
            Some(("output", key)) => outputs.get(key).map(|p| p.display().to_string()),
            Some(("inputs", rest)) => {
                let (stage, key) = match rest.split_once('.') {
                    Some((stage, key)) => (stage, Some(key)),
                    None => (rest, None),
                };
                let related = inputs.related_outputs(stage, target)?;
                let mut paths = Vec::with_capacity(related.len());
                for out in related {
                    let path = out.data.path(key).ok_or_else(|| StagedagError::InputNotFound {
                        stage: stage.to_string(),
                        target: format!("{} (key {})", out.target, key.unwrap_or("<single>")),
                    })?;
                    paths.push(path.display().to_string());
                }
                Some(paths.join(" "))
            }
            _ => None,
        };
        Ok(value)
    }
}

impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn granularity(&self) -> Granularity {
        self.granularity
    }

    fn required_stages(&self) -> &[StageName] {
        &self.required
    }

    fn expected_outputs(&self, target: &Target) -> OutputData {
        if let Some(template) = &self.output {
            return OutputData::Path(self.render_locator(template, target));
        }
        if self.outputs.is_empty() {
            return OutputData::None;
        }
        OutputData::Map(
            self.outputs
                .iter()
                .map(|(key, template)| (key.clone(), self.render_locator(template, target)))
                .collect(),
        )
    }

    fn queue_jobs(&self, target: &Target, inputs: &StageInput<'_>) -> Result<Option<JobRequest>> {
        let needs_input = self.requires_input || placeholders(&self.cmd).contains(&"input");
        if needs_input && target.granularity() == Granularity::Sample && target.input.is_none() {
            return Ok(None);
        }

        let outputs = self.expected_outputs(target);

        let mut values: BTreeMap<&str, String> = BTreeMap::new();
        for name in placeholders(&self.cmd) {
            if let Some(value) = self.command_value(name, target, &outputs, inputs)? {
                values.insert(name, value);
            }
        }
        let script = render(&self.cmd, |name| values.get(name).cloned());

        let command = CommandSpec::new(self.name.to_lowercase(), script)
            .with_attribute("level", self.granularity.as_str());
        Ok(Some(JobRequest::new(outputs).with_command(command)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_config(cmd: &str) -> StageConfig {
        StageConfig {
            name: "Genotype".to_string(),
            level: Granularity::Sample,
            required: vec!["Align".to_string()],
            output: Some("{prefix}/gvcf/{id}.g.vcf.gz".to_string()),
            outputs: BTreeMap::new(),
            cmd: cmd.to_string(),
            requires_input: false,
        }
    }

    #[test]
    fn shell_expansions_are_not_placeholders() {
        assert_eq!(placeholders("echo ${HOME} {id} $x"), vec!["id"]);
        let out = render("echo ${HOME} {id} {nope}", |n| {
            (n == "id").then(|| "S1".to_string())
        });
        assert_eq!(out, "echo ${HOME} S1 {nope}");
    }

    #[test]
    fn accepts_declared_inputs_and_outputs() {
        let cfg = stage_config("call {inputs.Align} > {output} # {dataset} {run_id}");
        assert!(check_templates(&cfg).is_ok());
    }

    #[test]
    fn rejects_undeclared_stage_input() {
        let cfg = stage_config("call {inputs.Trim}");
        let err = check_templates(&cfg).unwrap_err();
        assert!(err.to_string().contains("inputs.Trim"), "{err}");
    }

    #[test]
    fn rejects_dataset_placeholder_on_cohort_stage() {
        let mut cfg = stage_config("joint {cohort}");
        cfg.level = Granularity::Cohort;
        cfg.output = Some("{prefix}/{dataset}.vcf".to_string());
        assert!(check_templates(&cfg).is_err());
    }

    #[test]
    fn expected_outputs_render_target_fields() {
        let ctx = TemplateContext {
            cohort: "COH".to_string(),
            prefix: PathBuf::from("out"),
            run_id: "r1".to_string(),
        };
        let stage = CommandStage::new("Align", Granularity::Sample, "align", ctx)
            .with_keyed_output("cram", "{prefix}/{cohort}/{dataset}/{id}.cram")
            .with_keyed_output("crai", "{prefix}/{cohort}/{dataset}/{id}.cram.crai");
        let target = Target::sample("S1", "DS1");
        let out = stage.expected_outputs(&target);
        assert_eq!(
            out.get("cram"),
            Some(PathBuf::from("out/COH/DS1/S1.cram").as_path())
        );
        assert_eq!(out.paths().len(), 2);
    }
}
