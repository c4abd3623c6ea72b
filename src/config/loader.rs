// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::config::settings::Settings;
use crate::errors::{Result, StagedagError};

/// Environment variable naming the config file(s) to load, separated by the
/// platform path separator.
pub const CONFIG_ENV_VAR: &str = "STAGEDAG_CONFIG";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    load_layered(&[path.as_ref().to_path_buf()])
}

/// Load several configuration files, later ones deep-merged over earlier
/// ones, then validate the result.
///
/// Tables merge key by key; arrays and scalars from a later file replace the
/// earlier value, so `[[stage]]` lists are never concatenated.
pub fn load_layered(paths: &[PathBuf]) -> Result<ConfigFile> {
    if paths.is_empty() {
        return Err(StagedagError::ConfigError(
            "no configuration file given".to_string(),
        ));
    }

    let mut settings = Settings::default();
    for path in paths {
        debug!(path = %path.display(), "loading config layer");
        let contents = fs::read_to_string(path)?;
        let layer: toml::Value = toml::from_str(&contents)?;
        settings.merge(layer);
    }

    let raw: RawConfigFile = settings.root().clone().try_into()?;
    ConfigFile::try_from(raw)
}

/// Parse and validate configuration text.
pub fn load_from_str(contents: &str) -> Result<ConfigFile> {
    let raw: RawConfigFile = toml::from_str(contents)?;
    ConfigFile::try_from(raw)
}

/// Config files to load when none is given on the command line.
///
/// `STAGEDAG_CONFIG` wins when set (several paths may be listed); otherwise
/// `Stagedag.toml` in the current working directory.
pub fn default_config_paths() -> Vec<PathBuf> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(value) if !value.is_empty() => std::env::split_paths(&value).collect(),
        _ => vec![PathBuf::from("Stagedag.toml")],
    }
}
