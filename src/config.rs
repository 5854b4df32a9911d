//! Run-wide settings
//!
//! The settings a host passes into a run, with environment-variable
//! overrides and optional YAML file loading.

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::context::CultureSettings;

/// Environment variable prefix
const ENV_PREFIX: &str = "GAUNTLET";

/// Settings governing one test run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Halt sibling execution after the first failing child
    pub stop_on_error: bool,

    /// Maximum concurrent workers for independent sub-runs
    pub level_of_parallelism: usize,

    /// Timeout applied to cases that do not carry their own, in ms
    pub default_timeout_ms: Option<u64>,

    /// Culture settings propagated to every test
    pub culture: CultureSettings,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            stop_on_error: false,
            level_of_parallelism: num_cpus::get(),
            default_timeout_ms: None,
            culture: CultureSettings::default(),
        }
    }
}

impl RunSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    pub fn with_parallelism(mut self, level_of_parallelism: usize) -> Self {
        self.level_of_parallelism = level_of_parallelism;
        self
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = Some(timeout_ms);
        self
    }

    /// Load settings from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// Defaults overlaid with any `GAUNTLET_*` environment variables
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Overlay `GAUNTLET_*` environment variables onto these settings
    pub fn apply_env(mut self) -> Self {
        if let Some(stop_on_error) = get_env_bool("STOP_ON_ERROR") {
            self.stop_on_error = stop_on_error;
        }
        if let Some(parallelism) = get_env_parse("PARALLELISM") {
            self.level_of_parallelism = parallelism;
        }
        if let Some(timeout_ms) = get_env_parse("TIMEOUT_MS") {
            self.default_timeout_ms = Some(timeout_ms);
        }
        if let Some(culture) = get_env("CULTURE") {
            self.culture.culture = Some(culture);
        }
        if let Some(ui_culture) = get_env("UI_CULTURE") {
            self.culture.ui_culture = Some(ui_culture);
        }
        self
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get and parse environment variable with prefix
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|value| value.parse().ok())
}

/// Get boolean environment variable ("1", "true", "yes", "on")
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
