// src/logging.rs

//! Logging setup for `stagedag` using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from, in order:
//! 1. `--log-level` CLI flag, applied to every target
//! 2. `STAGEDAG_LOG`, read as `EnvFilter` directives, so
//!    `STAGEDAG_LOG=info,stagedag::engine=debug` narrows debug output to the
//!    executor
//! 3. `info`
//!
//! Logs go to STDERR; stdout only carries the plan and the run summary.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable read when no `--log-level` is given.
pub const LOG_ENV_VAR: &str = "STAGEDAG_LOG";

const DEFAULT_DIRECTIVES: &str = "info";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to install the tracing subscriber")
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    let directives = directives(cli_level, env);
    EnvFilter::try_new(directives)
        .with_context(|| format!("invalid log filter '{directives}' (from {LOG_ENV_VAR})"))
}

/// Directive string for the chosen source. Blank env values are ignored.
fn directives(cli_level: Option<LogLevel>, env: Option<&str>) -> &str {
    match (cli_level, env.map(str::trim)) {
        (Some(level), _) => level_directive(level),
        (None, Some(env)) if !env.is_empty() => env,
        _ => DEFAULT_DIRECTIVES,
    }
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_wins_over_the_environment() {
        assert_eq!(directives(Some(LogLevel::Debug), Some("warn")), "debug");
        assert_eq!(directives(None, Some(" stagedag::engine=trace ")), "stagedag::engine=trace");
        assert_eq!(directives(None, Some("  ")), "info");
        assert_eq!(directives(None, None), "info");
    }

    #[test]
    fn bad_env_directives_are_reported() {
        assert!(build_filter(None, Some("info,stagedag::engine=debug")).is_ok());
        let err = build_filter(None, Some("stagedag=loud")).unwrap_err();
        assert!(format!("{err:#}").contains(LOG_ENV_VAR), "{err:#}");
    }
}
