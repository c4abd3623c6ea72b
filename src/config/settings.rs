// src/config/settings.rs

//! Key-path access to the effective configuration tree.

use serde::Serialize;
use serde::de::DeserializeOwned;
use toml::Value;
use toml::map::Map;

use crate::errors::{Result, StagedagError};

/// Configuration provider over a TOML value tree.
///
/// Keys are dot-separated paths from the root table, e.g.
/// `"workflow.check_inputs"` or `"workflow.stage_targets.Align.skip"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    root: Value,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: Value::Table(Map::new()),
        }
    }
}

impl Settings {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// Settings holding the serialised form of `value`.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        let root = Value::try_from(value)
            .map_err(|e| StagedagError::ConfigError(format!("cannot serialise settings: {e}")))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Value at `key_path`, if present.
    pub fn get(&self, key_path: &str) -> Option<&Value> {
        key_path
            .split('.')
            .filter(|k| !k.is_empty())
            .try_fold(&self.root, |value, key| value.as_table()?.get(key))
    }

    /// Value at `key_path` deserialised into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key_path: &str) -> Result<Option<T>> {
        match self.get(key_path) {
            None => Ok(None),
            Some(value) => value.clone().try_into().map(Some).map_err(|e| {
                StagedagError::ConfigError(format!("invalid value for '{key_path}': {e}"))
            }),
        }
    }

    pub fn get_bool(&self, key_path: &str) -> Option<bool> {
        self.get(key_path).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key_path: &str) -> Option<&str> {
        self.get(key_path).and_then(Value::as_str)
    }

    /// Deep-merge `overlay` over these settings: tables merge key by key,
    /// anything else is replaced.
    pub fn merge(&mut self, overlay: Value) {
        merge_values(&mut self.root, overlay);
    }

    /// Hex digest of the rendered tree.
    pub fn digest(&self) -> String {
        let rendered = toml::to_string(&self.root).unwrap_or_else(|_| format!("{:?}", self.root));
        blake3::hash(rendered.as_bytes()).to_hex().to_string()
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base), Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Value {
        toml::from_str(s).expect("valid toml")
    }

    #[test]
    fn get_walks_nested_tables() {
        let settings = Settings::new(parse(
            r#"
[workflow]
check_inputs = true

[workflow.stage_targets.Align]
skip = ["S1"]
"#,
        ));
        assert_eq!(settings.get_bool("workflow.check_inputs"), Some(true));
        assert_eq!(
            settings
                .get_as::<Vec<String>>("workflow.stage_targets.Align.skip")
                .unwrap(),
            Some(vec!["S1".to_string()])
        );
        assert!(settings.get("workflow.nope").is_none());
        assert!(settings.get("workflow.check_inputs.deeper").is_none());
    }

    #[test]
    fn merge_replaces_leaves_and_keeps_siblings() {
        let mut settings = Settings::new(parse(
            r#"
[workflow]
name = "base"
check_inputs = false
skip_stages = ["A", "B"]
"#,
        ));
        settings.merge(parse(
            r#"
[workflow]
check_inputs = true
skip_stages = ["C"]
"#,
        ));
        assert_eq!(settings.get_str("workflow.name"), Some("base"));
        assert_eq!(settings.get_bool("workflow.check_inputs"), Some(true));
        assert_eq!(
            settings.get_as::<Vec<String>>("workflow.skip_stages").unwrap(),
            Some(vec!["C".to_string()])
        );
    }
}
