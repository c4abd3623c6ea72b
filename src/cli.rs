// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `stagedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stagedag",
    version,
    about = "Plan and submit multi-level workflow stages, reusing existing outputs.",
    long_about = None
)]
pub struct CliArgs {
    /// Final stages to run. Everything they require is planned too.
    ///
    /// Default: every declared stage.
    #[arg(value_name = "STAGE")]
    pub stages: Vec<String>,

    /// Path to a config file (TOML). Repeat to layer files; later files
    /// override earlier ones.
    ///
    /// Default: `STAGEDAG_CONFIG`, or `Stagedag.toml` in the current
    /// working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Vec<PathBuf>,

    /// Skip stages positioned before this one.
    #[arg(long = "first-stage", value_name = "NAME")]
    pub first_stages: Vec<String>,

    /// Skip stages positioned after this one.
    #[arg(long = "last-stage", value_name = "NAME")]
    pub last_stages: Vec<String>,

    /// Run only this stage (repeatable).
    #[arg(long = "only-stage", value_name = "NAME")]
    pub only_stages: Vec<String>,

    /// Do not run this stage (repeatable).
    #[arg(long = "skip-stage", value_name = "NAME")]
    pub skip_stages: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STAGEDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse, validate and print the plan without checking storage or
    /// submitting anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_filters_and_layers_are_collected() {
        let args = CliArgs::try_parse_from([
            "stagedag",
            "JointCalling",
            "--config",
            "base.toml",
            "--config",
            "site.toml",
            "--skip-stage",
            "Align",
            "--skip-stage",
            "Genotype",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(args.stages, vec!["JointCalling"]);
        assert_eq!(args.config.len(), 2);
        assert_eq!(args.skip_stages, vec!["Align", "Genotype"]);
        assert!(args.only_stages.is_empty());
        assert!(args.dry_run);
        assert!(args.log_level.is_none());
    }
}
