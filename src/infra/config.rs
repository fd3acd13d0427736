// src/infra/config.rs - Configuration loading (TOML)

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::settings::SmartRecurrenceSettings;
use crate::infra::errors::CadenceError;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub smart_recurrence: SmartRecurrenceSettings,

    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Zone for rules whose task and rule text name none.
    #[serde(default = "default_tz_name")]
    pub default_timezone: String,
    /// Zone the learner uses to bucket completions into calendar days.
    #[serde(default = "default_tz_name")]
    pub learner_timezone: String,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_tz_name(),
            learner_timezone: default_tz_name(),
        }
    }
}

impl EvaluatorConfig {
    pub fn default_tz(&self) -> Result<Tz, CadenceError> {
        parse_tz(&self.default_timezone)
    }

    pub fn learner_tz(&self) -> Result<Tz, CadenceError> {
        parse_tz(&self.learner_timezone)
    }
}

fn parse_tz(name: &str) -> Result<Tz, CadenceError> {
    name.trim()
        .parse()
        .map_err(|_| CadenceError::Config(format!("unknown timezone '{name}'")))
}

fn default_tz_name() -> String {
    "UTC".into()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Overrides the backend's default file location.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub tasks_file: Option<PathBuf>,
}

impl StorageConfig {
    pub fn state_path(&self) -> PathBuf {
        match (&self.path, self.backend) {
            (Some(path), _) => path.clone(),
            (None, StorageBackend::Sqlite) => paths::db_path(),
            (None, _) => paths::learner_state_path(),
        }
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.tasks_file.clone().unwrap_or_else(paths::tasks_file_path)
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
