// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod reuse;
pub mod stage;
pub mod storage;
pub mod target;
pub mod types;

use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_paths, load_layered};
use crate::dag::ExecutionPlan;
use crate::engine::{ExecutionReport, Workflow};
use crate::exec::ScriptSubmitter;
use crate::storage::{LocalStorage, Storage};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - layered config loading
/// - command-line stage filter overrides
/// - planning, then either a dry-run print or submission through the
///   script backend
pub fn run(args: CliArgs) -> Result<()> {
    let paths = if args.config.is_empty() {
        default_config_paths()
    } else {
        args.config.clone()
    };
    let cfg = load_layered(&paths)?;

    let storage: Arc<dyn Storage> = Arc::new(LocalStorage);
    let mut workflow = Workflow::from_config(&cfg, Arc::clone(&storage))?;
    apply_cli_overrides(&args, &mut workflow);

    let plan = match workflow.plan(&args.stages) {
        Ok(plan) => plan,
        Err(err) if !err.is_fatal() => {
            warn!(error = %err, "nothing to do");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    if args.dry_run {
        print_dry_run(&workflow, &plan);
        return Ok(());
    }

    let mut submitter = ScriptSubmitter::new(storage, workflow.options().work_dir.clone());
    let report = workflow.execute(&plan, &mut submitter)?;
    print_report(&workflow, &report);

    let failures = report.failures();
    if !failures.is_empty() {
        bail!("{} (stage, target) pair(s) failed", failures.len());
    }
    Ok(())
}

/// Command-line stage filters replace the configured ones.
fn apply_cli_overrides(args: &CliArgs, workflow: &mut Workflow) {
    let options = workflow.options_mut();
    let overrides = [
        (&args.first_stages, &mut options.first_stages),
        (&args.last_stages, &mut options.last_stages),
        (&args.only_stages, &mut options.only_stages),
        (&args.skip_stages, &mut options.skip_stages),
    ];
    for (cli, configured) in overrides {
        if !cli.is_empty() {
            *configured = cli.clone();
        }
    }
}

/// Simple dry-run output: print the ordered plan and its targets.
fn print_dry_run(workflow: &Workflow, plan: &ExecutionPlan) {
    println!("stagedag dry-run");
    println!("  workflow = {}", workflow.name());
    println!("  run_id = {}", workflow.run_id());
    println!();

    println!("stages ({}):", plan.len());
    print!("{plan}");
    for planned in &plan.stages {
        println!("  - {}: {}", planned.stage, planned.targets.join(", "));
    }

    debug!("dry-run complete (no submission)");
}

fn print_report(workflow: &Workflow, report: &ExecutionReport) {
    let summary = report.summary();
    println!(
        "{} ({}): {} reused, {} queued, {} skipped, {} failed",
        workflow.name(),
        workflow.run_id(),
        summary.reused,
        summary.queued,
        summary.skipped,
        summary.failed
    );
    for target in report.excluded_targets() {
        println!("  excluded: {target}");
    }
    for (stage, target, reason) in report.failures() {
        println!("  failed: {stage}/{target}: {reason}");
    }
}
