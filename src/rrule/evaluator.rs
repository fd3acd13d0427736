// src/rrule/evaluator.rs - Occurrence queries over task rules
//
// Every entry point degrades to None / empty / false on a bad or missing rule
// and logs the fault with the task id. Nothing here returns an error to the
// caller. Parsed schedules are cached per task, rule text, start and zone.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, NaiveTime, SubsecRound, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;

use super::describe::describe;
use super::expand::Schedule;
use super::parser::{parse_rule, RuleError};
use super::types::{localize, RecurrenceRule};
use crate::core::task::{ScheduleMode, Task};

/// Why a rule failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum RuleViolation {
    #[error("{0}")]
    Syntax(String),

    #[error("RRULE has expired (UNTIL date is in the past)")]
    Expired,

    #[error("RRULE is exhausted (COUNT fully consumed)")]
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RuleViolation>,
}

impl RuleValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn invalid(violation: RuleViolation) -> Self {
        Self {
            valid: false,
            error: Some(violation),
        }
    }
}

#[derive(Error, Debug)]
enum EvalError {
    #[error("task has no recurrence rule")]
    MissingRule,

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("date cannot be placed in {}", .0.name())]
    InvalidStart(Tz),
}

/// Everything that feeds a cached schedule: a change to any of these must
/// miss the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    task_id: String,
    rule: String,
    dtstart: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    frequency_zone: Option<String>,
    task_zone: Option<String>,
}

impl CacheKey {
    fn new(task: &Task, rule: &str) -> Self {
        Self {
            task_id: task.id.clone(),
            rule: rule.to_string(),
            dtstart: task.frequency.dtstart,
            created_at: task.created_at,
            frequency_zone: task.frequency.timezone.clone(),
            task_zone: task.timezone.clone(),
        }
    }
}

pub struct RuleEvaluator {
    default_tz: Tz,
    cache: RwLock<HashMap<CacheKey, Arc<Schedule>>>,
}

impl Default for RuleEvaluator {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl RuleEvaluator {
    /// `default_tz` applies when neither the rule nor the task names a zone.
    pub fn new(default_tz: Tz) -> Self {
        Self {
            default_tz,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_timezone(&self) -> Tz {
        self.default_tz
    }

    /// First occurrence strictly after `from`, with the task's fixed time applied.
    pub fn next_occurrence(&self, task: &Task, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if task.rule_text().is_none() {
            tracing::warn!("Task '{}' has no recurrence rule", task.id);
            return None;
        }

        let result = self.schedule_for(task).map(|schedule| {
            let base = base_date(task, from);
            match fixed_time(task) {
                Some(time) => next_with_fixed_time(&schedule, base, time),
                None => schedule.after(base, false).map(|occ| occ.with_timezone(&Utc)),
            }
        });

        match result {
            Ok(next) => next,
            Err(e) => {
                tracing::error!("Failed to get next occurrence for task '{}': {e}", task.id);
                None
            }
        }
    }

    /// Occurrences in `[from, to]`, ascending, with the task's fixed time applied.
    pub fn occurrences_between(
        &self,
        task: &Task,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>> {
        if task.rule_text().is_none() {
            tracing::warn!("Task '{}' has no recurrence rule", task.id);
            return Vec::new();
        }

        match self.schedule_for(task) {
            Ok(schedule) => match fixed_time(task) {
                None => schedule
                    .between(from, to, true)
                    .into_iter()
                    .map(|occ| occ.with_timezone(&Utc))
                    .collect(),
                Some(time) => {
                    // Moving the time of day can cross either bound.
                    let margin = Duration::days(2);
                    let lo = from
                        .checked_sub_signed(margin)
                        .unwrap_or(DateTime::<Utc>::MIN_UTC);
                    let hi = to
                        .checked_add_signed(margin)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC);
                    let mut out: Vec<DateTime<Utc>> = schedule
                        .between(lo, hi, true)
                        .into_iter()
                        .map(|occ| with_time(occ, time).with_timezone(&Utc))
                        .filter(|occ| *occ >= from && *occ <= to)
                        .collect();
                    out.sort();
                    out.dedup();
                    out
                }
            },
            Err(e) => {
                tracing::error!(
                    "Failed to get occurrences for task '{}' between {} and {}: {e}",
                    task.id,
                    from.to_rfc3339(),
                    to.to_rfc3339()
                );
                Vec::new()
            }
        }
    }

    /// Whether the rule fires at any time on the local calendar day holding
    /// `date`. The fixed-time override plays no part.
    pub fn is_occurrence_on(&self, task: &Task, date: DateTime<Utc>) -> bool {
        if task.rule_text().is_none() {
            tracing::warn!("Task '{}' has no recurrence rule", task.id);
            return false;
        }

        let result = self.schedule_for(task).and_then(|schedule| {
            let tz = schedule.timezone();
            let day = date.with_timezone(&tz).date_naive();
            let start = day
                .and_hms_opt(0, 0, 0)
                .and_then(|midnight| localize(tz, midnight))
                .ok_or(EvalError::InvalidStart(tz))?;
            let end = day
                .succ_opt()
                .and_then(|next| next.and_hms_opt(0, 0, 0))
                .and_then(|midnight| localize(tz, midnight))
                .ok_or(EvalError::InvalidStart(tz))?
                - Duration::milliseconds(1);
            Ok(!schedule
                .between(start.with_timezone(&Utc), end.with_timezone(&Utc), true)
                .is_empty())
        });

        match result {
            Ok(hit) => hit,
            Err(e) => {
                tracing::error!(
                    "Failed to check occurrence on {} for task '{}': {e}",
                    date.to_rfc3339(),
                    task.id
                );
                false
            }
        }
    }

    pub fn validate_rrule(&self, text: &str) -> RuleValidation {
        self.validate_rrule_at(text, Utc::now())
    }

    /// Validate against an explicit clock.
    pub fn validate_rrule_at(&self, text: &str, now: DateTime<Utc>) -> RuleValidation {
        let rule = match parse_rule(text) {
            Ok(rule) => rule,
            Err(e) => return RuleValidation::invalid(RuleViolation::Syntax(e.to_string())),
        };

        let tz = rule.zone().unwrap_or(self.default_tz);
        let start = rule
            .dtstart
            .and_then(|d| d.resolve(tz))
            .unwrap_or_else(|| now.with_timezone(&tz));
        let schedule = Schedule::new(rule, start);

        if schedule.after(now, true).is_none() {
            if schedule.until().is_some_and(|until| until < now) {
                return RuleValidation::invalid(RuleViolation::Expired);
            }
            if schedule.rule().count.is_some() {
                return RuleValidation::invalid(RuleViolation::Exhausted);
            }
        }

        RuleValidation::ok()
    }

    /// Human-readable rule text; the input comes back unchanged if it won't parse.
    pub fn to_natural_language(&self, text: &str) -> String {
        match parse_rule(text) {
            Ok(rule) => describe(&rule),
            Err(e) => {
                tracing::warn!("Failed to describe RRULE '{text}': {e}");
                text.to_string()
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn cache_size(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn schedule_for(&self, task: &Task) -> Result<Arc<Schedule>, EvalError> {
        let text = task.rule_text().ok_or(EvalError::MissingRule)?;
        let key = CacheKey::new(task, text);

        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(hit));
        }

        let rule = parse_rule(text)?;
        let tz = self.resolve_zone(task, &rule)?;
        let start = resolve_start(task, &rule, tz)?;
        let schedule = Arc::new(Schedule::new(rule, start));

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&schedule));
        Ok(schedule)
    }

    /// Rule TZID, then the frequency's zone, then the task's, then the default.
    fn resolve_zone(&self, task: &Task, rule: &RecurrenceRule) -> Result<Tz, EvalError> {
        if let Some(tz) = rule.zone() {
            return Ok(tz);
        }
        let named = task
            .frequency
            .timezone
            .as_deref()
            .or(task.timezone.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty());
        match named {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| EvalError::UnknownTimezone(name.to_string())),
            None => Ok(self.default_tz),
        }
    }
}

/// Frequency dtstart, then the rule's DTSTART, then the task's creation time.
fn resolve_start(task: &Task, rule: &RecurrenceRule, tz: Tz) -> Result<DateTime<Tz>, EvalError> {
    let start = match (task.frequency.dtstart, rule.dtstart) {
        (Some(explicit), _) => explicit.with_timezone(&tz),
        (None, Some(from_rule)) => from_rule.resolve(tz).ok_or(EvalError::InvalidStart(tz))?,
        (None, None) => task.created_at.with_timezone(&tz),
    };
    Ok(start.trunc_subsecs(0))
}

/// Reference point for the next occurrence.
///
/// Both modes currently anchor on `from`: a when-done caller passes the
/// completion time and a fixed-schedule caller passes the due time.
fn base_date(task: &Task, from: DateTime<Utc>) -> DateTime<Utc> {
    match task.schedule_mode() {
        ScheduleMode::WhenDone => from,
        ScheduleMode::Fixed => from,
    }
}

/// The task's "HH:MM" override, if present and well-formed.
fn fixed_time(task: &Task) -> Option<NaiveTime> {
    let raw = task.frequency.time.as_deref()?;
    match NaiveTime::parse_from_str(raw.trim(), "%H:%M") {
        Ok(time) => Some(time),
        Err(e) => {
            tracing::warn!("Ignoring fixed time '{raw}' on task '{}': {e}", task.id);
            None
        }
    }
}

fn with_time(occ: DateTime<Tz>, time: NaiveTime) -> DateTime<Tz> {
    localize(occ.timezone(), occ.date_naive().and_time(time)).unwrap_or(occ)
}

/// Earliest occurrence whose overridden time lands strictly after `from`.
fn next_with_fixed_time(
    schedule: &Schedule,
    from: DateTime<Utc>,
    time: NaiveTime,
) -> Option<DateTime<Utc>> {
    // The override stays on the occurrence's local day, so two days back is
    // far enough to catch an earlier occurrence pushed past `from`.
    let mut cursor = from
        .checked_sub_signed(Duration::days(2))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    while let Some(occ) = schedule.after(cursor, false) {
        let shifted = with_time(occ, time).with_timezone(&Utc);
        if shifted > from {
            return Some(shifted);
        }
        cursor = occ.with_timezone(&Utc);
    }
    None
}
