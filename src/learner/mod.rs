// src/learner/mod.rs - Pattern learner: completion history to suggested rules

pub mod classify;
pub mod store;
pub mod types;

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::core::settings::SettingsSource;
use crate::core::task::TaskLookup;
use crate::infra::errors::{CadenceError, Result};
use store::LearnerStore;
use types::{CompletionEvent, FeedbackEntry, PatternLearnerState, Suggestion};

/// Learns recurrence rules from completion history.
///
/// State lives in memory and is flushed only by [`PatternLearner::save`].
/// Every mutation holds the state lock for its whole read-modify-write, so
/// concurrent callers on one task never lose updates.
pub struct PatternLearner {
    store: Arc<dyn LearnerStore>,
    tasks: Arc<dyn TaskLookup>,
    settings: SettingsSource,
    timezone: Tz,
    state: Mutex<PatternLearnerState>,
}

impl PatternLearner {
    pub fn new(
        store: Arc<dyn LearnerStore>,
        tasks: Arc<dyn TaskLookup>,
        settings: SettingsSource,
    ) -> Self {
        Self {
            store,
            tasks,
            settings,
            timezone: Tz::UTC,
            state: Mutex::new(PatternLearnerState::default()),
        }
    }

    /// Zone used to decide which calendar day a completion falls on.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn load(&self) -> Result<()> {
        let loaded = self.store.load()?;
        info!("Loaded learner state ({} task(s))", loaded.tasks.len());
        *self.lock() = loaded;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let snapshot = self.snapshot();
        self.store.save(&snapshot)
    }

    pub fn record_completion(&self, task_id: &str, timestamp: DateTime<Utc>) -> Result<()> {
        self.require_task(task_id)?;
        self.lock()
            .tasks
            .entry(task_id.to_string())
            .or_default()
            .completions
            .push(timestamp);
        Ok(())
    }

    pub fn record(&self, event: CompletionEvent) -> Result<()> {
        self.record_completion(&event.task_id, event.timestamp)
    }

    /// Classify the task's history. `None` covers every non-error outcome:
    /// unknown or disabled task, learning off, too little data, no confident
    /// cadence, or a top candidate the user already rejected.
    pub fn analyze_task(&self, task_id: &str) -> Option<Suggestion> {
        let task = self.tasks.get_task(task_id)?;
        if !task.enabled {
            debug!("Task '{}' is disabled, skipping analysis", task_id);
            return None;
        }

        let settings = (self.settings)();
        if !settings.enabled {
            return None;
        }

        let record = self.lock().tasks.get(task_id).cloned().unwrap_or_default();
        if record.completions.len() < settings.min_completions() {
            debug!(
                "Task '{}' has {} completion(s), need {}",
                task_id,
                record.completions.len(),
                settings.min_completions()
            );
            return None;
        }

        let days = classify::covered_days(&record.completions, self.timezone);
        let best = classify::best_candidate(
            classify::candidates(&days),
            settings.effective_threshold(),
        )?;

        let suggestion = Suggestion::new(best.evidence, best.confidence);
        let id = Self::suggestion_id(&suggestion);
        if record.is_rejected(&id) {
            debug!("Suggestion {} for task '{}' was rejected before", id, task_id);
            return None;
        }
        Some(suggestion)
    }

    /// Identity of a suggestion, derived from its evidence alone.
    pub fn suggestion_id(suggestion: &Suggestion) -> String {
        suggestion.id()
    }

    pub fn accept_suggestion(&self, task_id: &str, suggestion_id: &str) -> Result<()> {
        self.push_feedback(task_id, suggestion_id, true)
    }

    pub fn reject_suggestion(&self, task_id: &str, suggestion_id: &str) -> Result<()> {
        self.push_feedback(task_id, suggestion_id, false)
    }

    /// With auto-adjust on, accept whatever [`Self::analyze_task`] proposes.
    /// The caller still installs the returned rule onto the task.
    pub fn auto_adjust(&self, task_id: &str) -> Result<Option<Suggestion>> {
        self.require_task(task_id)?;
        let settings = (self.settings)();
        if !settings.enabled || !settings.auto_adjust {
            return Ok(None);
        }
        let Some(suggestion) = self.analyze_task(task_id) else {
            return Ok(None);
        };
        self.accept_suggestion(task_id, &suggestion.id())?;
        info!("Auto-accepted '{}' for task '{}'", suggestion.suggested_rrule, task_id);
        Ok(Some(suggestion))
    }

    pub fn completions(&self, task_id: &str) -> Vec<DateTime<Utc>> {
        self.lock()
            .tasks
            .get(task_id)
            .map(|r| r.completions.clone())
            .unwrap_or_default()
    }

    pub fn feedback(&self, task_id: &str) -> Vec<FeedbackEntry> {
        self.lock()
            .tasks
            .get(task_id)
            .map(|r| r.feedback.clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> PatternLearnerState {
        self.lock().clone()
    }

    /// Forget everything, in memory and in the store.
    pub fn reset(&self) -> Result<()> {
        self.store.clear()?;
        *self.lock() = PatternLearnerState::default();
        Ok(())
    }

    fn push_feedback(&self, task_id: &str, suggestion_id: &str, accepted: bool) -> Result<()> {
        self.require_task(task_id)?;
        self.lock()
            .tasks
            .entry(task_id.to_string())
            .or_default()
            .feedback
            .push(FeedbackEntry {
                suggestion_id: suggestion_id.to_string(),
                accepted,
                timestamp: Utc::now(),
            });
        Ok(())
    }

    fn require_task(&self, task_id: &str) -> Result<()> {
        match self.tasks.get_task(task_id) {
            Some(_) => Ok(()),
            None => Err(CadenceError::unknown_task(task_id)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PatternLearnerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::settings::{fixed_settings, SmartRecurrenceSettings};
    use crate::core::task::{MockTaskLookup, Task};
    use crate::learner::store::MemoryLearnerStore;
    use chrono::Duration;

    fn lookup_with(tasks: Vec<Task>) -> MockTaskLookup {
        let mut mock = MockTaskLookup::new();
        mock.expect_get_task()
            .returning(move |id: &str| tasks.iter().find(|t| t.id == id).cloned());
        mock
    }

    fn learner(tasks: MockTaskLookup, settings: SmartRecurrenceSettings) -> PatternLearner {
        PatternLearner::new(
            Arc::new(MemoryLearnerStore::new()),
            Arc::new(tasks),
            fixed_settings(settings),
        )
    }

    fn start() -> DateTime<Utc> {
        "2026-01-05T08:00:00Z".parse().unwrap()
    }

    fn record_daily(l: &PatternLearner, task_id: &str, days: i64) {
        for i in 0..days {
            l.record_completion(task_id, start() + Duration::days(i)).unwrap();
        }
    }

    #[test]
    fn test_record_unknown_task_fails_fast() {
        let mut mock = MockTaskLookup::new();
        mock.expect_get_task()
            .withf(|id: &str| id == "ghost")
            .times(1)
            .returning(|_| None);
        let l = learner(mock, SmartRecurrenceSettings::default());
        let err = l.record_completion("ghost", start()).unwrap_err();
        assert!(matches!(err, CadenceError::UnknownTask { .. }));
        assert!(l.completions("ghost").is_empty());
    }

    #[test]
    fn test_analyze_unknown_task_is_none() {
        let l = learner(lookup_with(vec![]), SmartRecurrenceSettings::default());
        assert!(l.analyze_task("ghost").is_none());
    }

    #[test]
    fn test_disabled_task_is_none() {
        let mut task = Task::new("t1");
        task.enabled = false;
        let l = learner(lookup_with(vec![task]), SmartRecurrenceSettings::default());
        record_daily(&l, "t1", 10);
        assert!(l.analyze_task("t1").is_none());
    }

    #[test]
    fn test_learning_disabled_is_none() {
        let settings = SmartRecurrenceSettings {
            enabled: false,
            ..Default::default()
        };
        let l = learner(lookup_with(vec![Task::new("t1")]), settings);
        record_daily(&l, "t1", 10);
        assert!(l.analyze_task("t1").is_none());
    }

    #[test]
    fn test_below_min_completions_is_none() {
        let l = learner(lookup_with(vec![Task::new("t1")]), SmartRecurrenceSettings::default());
        record_daily(&l, "t1", 4);
        assert!(l.analyze_task("t1").is_none());
        l.record_completion("t1", start() + Duration::days(4)).unwrap();
        assert!(l.analyze_task("t1").is_some());
    }

    #[test]
    fn test_analyze_does_not_mutate_history() {
        let l = learner(lookup_with(vec![Task::new("t1")]), SmartRecurrenceSettings::default());
        record_daily(&l, "t1", 7);
        let before = l.snapshot();
        let _ = l.analyze_task("t1");
        let _ = l.analyze_task("t1");
        assert_eq!(l.snapshot(), before);
    }

    #[test]
    fn test_settings_read_fresh_each_call() {
        let enabled = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let flag = enabled.clone();
        let source: SettingsSource = Arc::new(move || SmartRecurrenceSettings {
            enabled: flag.load(std::sync::atomic::Ordering::SeqCst),
            ..Default::default()
        });
        let l = PatternLearner::new(
            Arc::new(MemoryLearnerStore::new()),
            Arc::new(lookup_with(vec![Task::new("t1")])),
            source,
        );
        record_daily(&l, "t1", 7);
        assert!(l.analyze_task("t1").is_some());
        enabled.store(false, std::sync::atomic::Ordering::SeqCst);
        assert!(l.analyze_task("t1").is_none());
    }

    #[test]
    fn test_reject_suppresses() {
        let l = learner(lookup_with(vec![Task::new("t1")]), SmartRecurrenceSettings::default());
        record_daily(&l, "t1", 7);
        let s = l.analyze_task("t1").unwrap();
        l.reject_suggestion("t1", &PatternLearner::suggestion_id(&s))
            .unwrap();
        assert!(l.analyze_task("t1").is_none());
        assert!(l.analyze_task("t1").is_none());
    }

    #[test]
    fn test_feedback_unknown_task_fails() {
        let l = learner(lookup_with(vec![]), SmartRecurrenceSettings::default());
        assert!(l.accept_suggestion("ghost", "sugg-1").is_err());
        assert!(l.reject_suggestion("ghost", "sugg-1").is_err());
    }

    #[test]
    fn test_auto_adjust_off_by_default() {
        let l = learner(lookup_with(vec![Task::new("t1")]), SmartRecurrenceSettings::default());
        record_daily(&l, "t1", 7);
        assert!(l.auto_adjust("t1").unwrap().is_none());
        assert!(l.feedback("t1").is_empty());
    }

    #[test]
    fn test_auto_adjust_accepts() {
        let settings = SmartRecurrenceSettings {
            auto_adjust: true,
            ..Default::default()
        };
        let l = learner(lookup_with(vec![Task::new("t1")]), settings);
        record_daily(&l, "t1", 7);
        let s = l.auto_adjust("t1").unwrap().unwrap();
        let feedback = l.feedback("t1");
        assert_eq!(feedback.len(), 1);
        assert!(feedback[0].accepted);
        assert_eq!(feedback[0].suggestion_id, s.id());
    }

    #[test]
    fn test_concurrent_updates_on_one_task_are_not_lost() {
        let tasks: crate::core::task::InMemoryTasks = std::iter::once(Task::new("t1")).collect();
        let l = Arc::new(PatternLearner::new(
            Arc::new(MemoryLearnerStore::new()),
            Arc::new(tasks),
            fixed_settings(SmartRecurrenceSettings::default()),
        ));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let l = Arc::clone(&l);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        l.record_completion("t1", start() + Duration::minutes(worker * 1000 + i))
                            .unwrap();
                        l.reject_suggestion("t1", &format!("sugg-{worker}-{i}"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(l.completions("t1").len(), 1600);
        assert_eq!(l.feedback("t1").len(), 1600);
    }

    #[test]
    fn test_record_completion_event() {
        let l = learner(lookup_with(vec![Task::new("t1")]), SmartRecurrenceSettings::default());
        l.record(CompletionEvent {
            task_id: "t1".into(),
            timestamp: start(),
        })
        .unwrap();
        assert_eq!(l.completions("t1"), vec![start()]);

        let ghost = CompletionEvent {
            task_id: "ghost".into(),
            timestamp: start(),
        };
        assert!(l.record(ghost).is_err());
    }

    #[test]
    fn test_save_load_reset() {
        let store = Arc::new(MemoryLearnerStore::new());
        let tasks: Arc<dyn TaskLookup> = Arc::new(lookup_with(vec![Task::new("t1")]));
        let settings = fixed_settings(SmartRecurrenceSettings::default());

        let l = PatternLearner::new(store.clone(), tasks.clone(), settings.clone());
        record_daily(&l, "t1", 3);
        l.save().unwrap();

        let fresh = PatternLearner::new(store.clone(), tasks, settings);
        assert!(fresh.completions("t1").is_empty());
        fresh.load().unwrap();
        assert_eq!(fresh.completions("t1").len(), 3);

        fresh.reset().unwrap();
        assert!(fresh.snapshot().tasks.is_empty());
        assert!(store.load().unwrap().tasks.is_empty());
    }
}
