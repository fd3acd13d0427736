// src/learner/store.rs - Persistence backends for learner state
//
// The learner treats its state as one opaque blob. Backends only need to
// load, save and clear that blob.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::types::PatternLearnerState;
use crate::infra::errors::Result;

pub trait LearnerStore: Send + Sync {
    /// Missing state is not an error: it yields the default.
    fn load(&self) -> Result<PatternLearnerState>;
    fn save(&self, state: &PatternLearnerState) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Keeps state in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryLearnerStore {
    state: Mutex<Option<PatternLearnerState>>,
}

impl MemoryLearnerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LearnerStore for MemoryLearnerStore {
    fn load(&self) -> Result<PatternLearnerState> {
        let guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone().unwrap_or_default())
    }

    fn save(&self, state: &PatternLearnerState) -> Result<()> {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(state.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
        Ok(())
    }
}

/// Pretty-printed JSON file, written atomically (temp file + rename).
#[derive(Debug, Clone)]
pub struct JsonFileLearnerStore {
    path: PathBuf,
}

impl JsonFileLearnerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "learner-state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl LearnerStore for JsonFileLearnerStore {
    fn load(&self) -> Result<PatternLearnerState> {
        if !self.path.exists() {
            return Ok(PatternLearnerState::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(PatternLearnerState::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, state: &PatternLearnerState) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        info!("Saved learner state for {} task(s) to {}", state.tasks.len(), self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Single-row SQLite table holding the state as JSON text.
pub struct SqliteLearnerStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS learner_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    state TEXT NOT NULL,
    updated_at TEXT NOT NULL
);";

impl SqliteLearnerStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl LearnerStore for SqliteLearnerStore {
    fn load(&self) -> Result<PatternLearnerState> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let json: Option<String> = conn
            .query_row("SELECT state FROM learner_state WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(PatternLearnerState::default()),
        }
    }

    fn save(&self, state: &PatternLearnerState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO learner_state (id, version, state, updated_at) VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET version = ?1, state = ?2, updated_at = ?3",
            params![state.version, json, now],
        )?;
        info!("Saved learner state for {} task(s) to SQLite", state.tasks.len());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute("DELETE FROM learner_state", [])?;
        Ok(())
    }
}
