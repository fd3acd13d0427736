// src/learner/types.rs - Learner state and suggestion types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::rrule::types::{parse_weekday_code, sorted_weekdays, weekday_code};
use crate::rrule::{Freq, RecurrenceRule};

pub const STATE_VERSION: u32 = 1;

/// One observed completion of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
}

/// A recorded accept or reject of a suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    pub suggestion_id: String,
    pub accepted: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLearningRecord {
    /// Insertion order, never re-sorted.
    #[serde(default)]
    pub completions: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub feedback: Vec<FeedbackEntry>,
}

impl TaskLearningRecord {
    pub fn is_rejected(&self, suggestion_id: &str) -> bool {
        self.feedback
            .iter()
            .any(|f| !f.accepted && f.suggestion_id == suggestion_id)
    }
}

/// Everything the learner persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternLearnerState {
    pub version: u32,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskLearningRecord>,
}

impl Default for PatternLearnerState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            tasks: BTreeMap::new(),
        }
    }
}

/// The facts behind a suggestion. The only input to its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "EvidenceRecord", try_from = "EvidenceRecord")]
pub enum Evidence {
    Daily { interval: u32 },
    Weekly { interval: u32, days: Vec<Weekday> },
    Monthly { interval: u32, day_of_month: u32 },
}

impl Evidence {
    pub fn frequency(&self) -> Freq {
        match self {
            Evidence::Daily { .. } => Freq::Daily,
            Evidence::Weekly { .. } => Freq::Weekly,
            Evidence::Monthly { .. } => Freq::Monthly,
        }
    }

    pub fn interval(&self) -> u32 {
        match self {
            Evidence::Daily { interval }
            | Evidence::Weekly { interval, .. }
            | Evidence::Monthly { interval, .. } => *interval,
        }
    }

    pub fn by_day(&self) -> Vec<Weekday> {
        match self {
            Evidence::Weekly { days, .. } => sorted_weekdays(days.iter().copied()),
            Evidence::Daily { .. } | Evidence::Monthly { .. } => Vec::new(),
        }
    }

    pub fn by_month_day(&self) -> Vec<u32> {
        match self {
            Evidence::Monthly { day_of_month, .. } => vec![*day_of_month],
            Evidence::Daily { .. } | Evidence::Weekly { .. } => Vec::new(),
        }
    }

    /// Higher is more specific; breaks confidence ties.
    pub fn specificity(&self) -> u8 {
        match self {
            Evidence::Daily { .. } => 0,
            Evidence::Weekly { .. } => 1,
            Evidence::Monthly { .. } => 2,
        }
    }

    pub fn to_rule(&self) -> RecurrenceRule {
        RecurrenceRule::new(self.frequency())
            .interval(self.interval())
            .by_day(self.by_day())
            .by_month_day(self.by_month_day())
    }

    /// Stable text form: frequency, interval, sorted BYDAY, sorted BYMONTHDAY.
    pub fn canonical(&self) -> String {
        let days: Vec<&str> = self.by_day().into_iter().map(weekday_code).collect();
        let month_days: Vec<String> = self.by_month_day().iter().map(u32::to_string).collect();
        format!(
            "freq={};interval={};byday={};bymonthday={}",
            self.frequency().as_str(),
            self.interval().max(1),
            days.join(","),
            month_days.join(",")
        )
    }

    /// Content hash of the canonical form; stable across processes.
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical().as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("sugg-{}", &digest[..16])
    }
}

/// Wire shape of [`Evidence`]: `{frequencyType, interval, byDay?, byMonthDay?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvidenceRecord {
    frequency_type: String,
    interval: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    by_day: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    by_month_day: Option<Vec<u32>>,
}

impl From<Evidence> for EvidenceRecord {
    fn from(evidence: Evidence) -> Self {
        let by_day = match &evidence {
            Evidence::Weekly { .. } => Some(
                evidence
                    .by_day()
                    .into_iter()
                    .map(|d| weekday_code(d).to_string())
                    .collect(),
            ),
            _ => None,
        };
        let by_month_day = match &evidence {
            Evidence::Monthly { .. } => Some(evidence.by_month_day()),
            _ => None,
        };
        Self {
            frequency_type: evidence.frequency().as_str().to_ascii_lowercase(),
            interval: evidence.interval(),
            by_day,
            by_month_day,
        }
    }
}

impl TryFrom<EvidenceRecord> for Evidence {
    type Error = String;

    fn try_from(record: EvidenceRecord) -> Result<Self, Self::Error> {
        let interval = record.interval.max(1);
        match record.frequency_type.to_ascii_lowercase().as_str() {
            "daily" => Ok(Evidence::Daily { interval }),
            "weekly" => {
                let days = record
                    .by_day
                    .unwrap_or_default()
                    .iter()
                    .map(|code| {
                        parse_weekday_code(code).ok_or_else(|| format!("bad weekday '{code}'"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Evidence::Weekly {
                    interval,
                    days: sorted_weekdays(days),
                })
            }
            "monthly" => match record.by_month_day.as_deref() {
                Some([day]) if (1..=31).contains(day) => Ok(Evidence::Monthly {
                    interval,
                    day_of_month: *day,
                }),
                _ => Err("monthly evidence needs exactly one day of month".into()),
            },
            other => Err(format!("unknown frequency type '{other}'")),
        }
    }
}

/// A proposed rule. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "suggestedRRule")]
    pub suggested_rrule: String,
    pub evidence: Evidence,
    pub confidence: f64,
}

impl Suggestion {
    pub fn new(evidence: Evidence, confidence: f64) -> Self {
        Self {
            suggested_rrule: evidence.to_rule().to_string(),
            evidence,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn id(&self) -> String {
        self.evidence.id()
    }
}
