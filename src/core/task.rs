// src/core/task.rs - Task model and the task lookup seam

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recurring task as seen by the learner and the rule evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// IANA zone name used when the rule and frequency carry none.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub frequency: Frequency,
}

/// Recurrence settings attached to a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frequency {
    /// RFC 5545 RRULE text.
    #[serde(default)]
    pub rrule: Option<String>,
    /// Explicit series start; overrides any DTSTART inside the rule text.
    #[serde(default)]
    pub dtstart: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timezone: Option<String>,
    /// Fixed wall-clock time ("HH:MM") stamped onto every occurrence.
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub when_done: bool,
}

/// How the next occurrence is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Reschedule relative to the completion time.
    WhenDone,
    /// Keep the original schedule.
    Fixed,
}

impl Task {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            enabled: true,
            timezone: None,
            created_at: Utc::now(),
            frequency: Frequency::default(),
        }
    }

    pub fn with_rule(mut self, rrule: impl Into<String>) -> Self {
        self.frequency.rrule = Some(rrule.into());
        self
    }

    pub fn rule_text(&self) -> Option<&str> {
        self.frequency
            .rrule
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn schedule_mode(&self) -> ScheduleMode {
        if self.frequency.when_done {
            ScheduleMode::WhenDone
        } else {
            ScheduleMode::Fixed
        }
    }
}

fn default_true() -> bool {
    true
}

/// Resolves task ids to tasks. Implemented by whatever owns task storage.
#[cfg_attr(test, mockall::automock)]
pub trait TaskLookup: Send + Sync {
    fn get_task(&self, id: &str) -> Option<Task>;
}

/// Map-backed lookup, used by the CLI and in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTasks {
    tasks: HashMap<String, Task>,
}

impl InMemoryTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: Task) {
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl FromIterator<Task> for InMemoryTasks {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        let mut tasks = Self::new();
        for task in iter {
            tasks.insert(task);
        }
        tasks
    }
}

impl TaskLookup for InMemoryTasks {
    fn get_task(&self, id: &str) -> Option<Task> {
        self.tasks.get(id).cloned()
    }
}
