// src/infra/paths.rs - XDG-compliant path management
//
// All paths respect the CADENCE_HOME environment variable for isolation.
// When CADENCE_HOME is set, config and data live under that directory.
// When unset, config uses ~/.cadence/ and data uses XDG_DATA_HOME/cadence.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Returns the CADENCE_HOME override, if set.
fn cadence_home() -> Option<PathBuf> {
    std::env::var_os("CADENCE_HOME").map(PathBuf::from)
}

/// Configuration directory: $CADENCE_HOME/ or ~/.cadence/
pub fn config_dir() -> PathBuf {
    if let Some(home) = cadence_home() {
        return home;
    }
    dirs_home().join(".cadence")
}

/// Data directory: $CADENCE_HOME/data/ or ~/.local/share/cadence/
pub fn data_dir() -> PathBuf {
    if let Some(home) = cadence_home() {
        return home.join("data");
    }
    ProjectDirs::from("", "", "cadence")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .unwrap_or_else(|| config_dir().join("data"))
}

/// Home directory, or the working directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default task definitions file
pub fn tasks_file_path() -> PathBuf {
    config_dir().join("tasks.toml")
}

/// Learner state as JSON
pub fn learner_state_path() -> PathBuf {
    data_dir().join("learner-state.json")
}

/// Learner state as SQLite
pub fn db_path() -> PathBuf {
    data_dir().join("cadence.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_live_under_their_dirs() {
        assert!(config_file_path().starts_with(config_dir()));
        assert!(tasks_file_path().starts_with(config_dir()));
        assert!(learner_state_path().starts_with(data_dir()));
        assert_eq!(db_path().file_name().unwrap(), "cadence.db");
    }
}
