// src/config/loader.rs
//! Layered TOML configuration loader with environment overrides

use crate::config::constants::env;
use crate::config::{validate_trial_config, BatchConfig, TrialConfig};
use crate::error::{PrepError, PrepResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads trial configuration from one or more TOML files.
///
/// Files are deep-merged in order, later files winning. Environment variables
/// prefixed with `EMG_PREP_` are applied last; `__` separates nested keys, so
/// `EMG_PREP_INTERVAL_POLICY__BOUNDARY=closed` sets `interval_policy.boundary`.
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    overrides: Vec<(String, String)>,
}

impl ConfigLoader {
    /// Loader for a single file, picking up overrides from the process environment
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_paths(vec![path.into()]).with_overrides(unicode_vars(std::env::vars_os()))
    }

    /// Loader over layered files, without environment overrides
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            overrides: Vec::new(),
        }
    }

    /// Use these `(NAME, value)` pairs as environment overrides
    pub fn with_overrides<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.overrides = vars
            .into_iter()
            .filter(|(key, _)| key.starts_with(env::PREFIX))
            .collect();
        self
    }

    /// Load and validate a single-trial configuration
    pub fn load_trial_config(&self) -> PrepResult<TrialConfig> {
        let mut merged = self.load_and_merge()?;
        self.apply_overrides(&mut merged);

        let config: TrialConfig = merged.try_into()?;
        validate_trial_config(&config)?;
        Ok(config)
    }

    /// Load and validate a batch file of `[[trial]]` tables.
    ///
    /// Overrides apply to every trial.
    pub fn load_batch(&self) -> PrepResult<Vec<TrialConfig>> {
        let merged = self.load_and_merge()?;
        let mut batch: toml::Value = merged;

        if let Some(toml::Value::Array(trials)) = batch.get_mut("trial") {
            for trial in trials.iter_mut() {
                self.apply_overrides(trial);
            }
        }

        let batch: BatchConfig = batch.try_into()?;
        for config in &batch.trials {
            validate_trial_config(config)?;
        }
        Ok(batch.trials)
    }

    fn load_and_merge(&self) -> PrepResult<toml::Value> {
        if self.config_paths.is_empty() {
            return Err(PrepError::config("config_paths", "no configuration file given"));
        }

        let mut merged = toml::Value::Table(toml::value::Table::new());
        for path in &self.config_paths {
            let file_config = load_config_file(path)?;
            debug!(path = %path.display(), "merging configuration file");
            merge_toml_values(&mut merged, file_config);
        }
        Ok(merged)
    }

    fn apply_overrides(&self, config: &mut toml::Value) {
        for (key, value) in &self.overrides {
            let Some(stripped) = key.strip_prefix(env::PREFIX) else {
                continue;
            };
            let config_key = stripped.to_lowercase().replace("__", ".");
            debug!(key = %config_key, "applying environment override");
            set_nested_value(config, &config_key, parse_env_value(value));
        }
    }
}

fn load_config_file(path: &Path) -> PrepResult<toml::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
    Ok(toml::from_str(&content)?)
}

fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(&key) {
                    merge_toml_values(base_value, value);
                } else {
                    base_table.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn parse_env_value(value: &str) -> toml::Value {
    if let Ok(int_val) = value.parse::<i64>() {
        toml::Value::Integer(int_val)
    } else if let Ok(float_val) = value.parse::<f64>() {
        toml::Value::Float(float_val)
    } else if let Ok(bool_val) = value.parse::<bool>() {
        toml::Value::Boolean(bool_val)
    } else {
        toml::Value::String(value.to_string())
    }
}

fn set_nested_value(config: &mut toml::Value, path: &str, value: toml::Value) {
    let mut parts = path.split('.').peekable();
    let mut current = config;

    while let Some(part) = parts.next() {
        let toml::Value::Table(table) = current else {
            return;
        };
        if parts.peek().is_none() {
            table.insert(part.to_string(), value);
            return;
        }
        current = table
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
    }
}

/// Environment pairs that are valid Unicode; anything else is skipped
fn unicode_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}
