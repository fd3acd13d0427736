// src/learner/classify.rs - Cadence detection over completion history
//
// Completions are first reduced to the set of local calendar days they fall
// on, so several completions on one day count once whatever the time of day.
// Each detector then scores one cadence shape against that set.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;

use super::types::Evidence;
use crate::rrule::types::sorted_weekdays;

/// Weeks or months a sparse cadence must span before it is considered.
const MIN_SPANS: i64 = 3;
const CONFIDENCE_EPSILON: f64 = 1e-9;

/// A scored cadence shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub evidence: Evidence,
    pub confidence: f64,
}

/// Local calendar days with at least one completion.
pub fn covered_days(completions: &[DateTime<Utc>], tz: Tz) -> BTreeSet<NaiveDate> {
    completions
        .iter()
        .map(|c| c.with_timezone(&tz).date_naive())
        .collect()
}

/// All shapes the history supports, unfiltered.
pub fn candidates(days: &BTreeSet<NaiveDate>) -> Vec<Candidate> {
    [detect_daily(days), detect_weekly(days), detect_monthly(days)]
        .into_iter()
        .flatten()
        .collect()
}

/// Highest confidence at or above `threshold`; ties go to the more specific shape.
pub fn best_candidate(candidates: Vec<Candidate>, threshold: f64) -> Option<Candidate> {
    candidates
        .into_iter()
        .filter(|c| c.confidence + CONFIDENCE_EPSILON >= threshold)
        .max_by(compare)
}

fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    if (a.confidence - b.confidence).abs() < CONFIDENCE_EPSILON {
        a.evidence.specificity().cmp(&b.evidence.specificity())
    } else {
        a.confidence.total_cmp(&b.confidence)
    }
}

/// Every N days, N being the most common gap between covered days.
pub fn detect_daily(days: &BTreeSet<NaiveDate>) -> Option<Candidate> {
    let first = *days.first()?;
    let last = *days.last()?;
    if days.len() < 2 {
        return None;
    }

    let gaps: Vec<i64> = days
        .iter()
        .zip(days.iter().skip(1))
        .map(|(a, b)| (*b - *a).num_days())
        .collect();
    let interval = modal(&gaps).unwrap_or(1).max(1);

    let span = (last - first).num_days();
    let slots = span / interval + 1;
    let on_grid = days
        .iter()
        .filter(|d| (**d - first).num_days() % interval == 0)
        .count() as i64;

    Some(Candidate {
        evidence: Evidence::Daily {
            interval: u32::try_from(interval).ok()?,
        },
        confidence: ratio(on_grid, slots),
    })
}

/// Fixed weekdays, each recurring in a majority of the spanned weeks.
pub fn detect_weekly(days: &BTreeSet<NaiveDate>) -> Option<Candidate> {
    let first_week = week_start(*days.first()?);
    let last_week = week_start(*days.last()?);
    let weeks_spanned = (last_week - first_week).num_weeks() + 1;
    if weeks_spanned < MIN_SPANS {
        return None;
    }

    let mut by_week: BTreeMap<NaiveDate, HashSet<Weekday>> = BTreeMap::new();
    for day in days {
        by_week
            .entry(week_start(*day))
            .or_default()
            .insert(day.weekday());
    }

    let mut weeks_per_day: HashMap<Weekday, i64> = HashMap::new();
    for weekdays in by_week.values() {
        for weekday in weekdays {
            *weeks_per_day.entry(*weekday).or_default() += 1;
        }
    }

    let qualifying = sorted_weekdays(
        weeks_per_day
            .iter()
            .filter(|(_, weeks)| **weeks * 2 > weeks_spanned)
            .map(|(day, _)| *day),
    );
    if qualifying.is_empty() || qualifying.len() == 7 {
        return None;
    }

    let on_pattern = days
        .iter()
        .filter(|d| qualifying.contains(&d.weekday()))
        .count();
    if on_pattern * 2 <= days.len() {
        return None;
    }

    let full_weeks = by_week
        .values()
        .filter(|weekdays| qualifying.iter().all(|d| weekdays.contains(d)))
        .count() as i64;

    Some(Candidate {
        evidence: Evidence::Weekly {
            interval: 1,
            days: qualifying,
        },
        confidence: ratio(full_weeks, weeks_spanned),
    })
}

/// One fixed day of the month, the most common one observed.
pub fn detect_monthly(days: &BTreeSet<NaiveDate>) -> Option<Candidate> {
    let first = *days.first()?;
    let last = *days.last()?;

    let month_days: Vec<i64> = days.iter().map(|d| i64::from(d.day())).collect();
    let anchor = u32::try_from(modal(&month_days)?).ok()?;

    let on_anchor = days.iter().filter(|d| d.day() == anchor).count();
    if on_anchor * 2 <= days.len() {
        return None;
    }

    let hit_months: BTreeSet<i64> = days
        .iter()
        .filter(|d| d.day() == anchor)
        .map(|d| month_index(*d))
        .collect();

    let eligible = (month_index(first)..=month_index(last))
        .filter(|m| {
            let year = i32::try_from(m.div_euclid(12)).ok();
            let month = u32::try_from(m.rem_euclid(12) + 1).ok();
            match (year, month) {
                (Some(y), Some(mo)) => NaiveDate::from_ymd_opt(y, mo, anchor).is_some(),
                _ => false,
            }
        })
        .count() as i64;
    if eligible < MIN_SPANS {
        return None;
    }

    Some(Candidate {
        evidence: Evidence::Monthly {
            interval: 1,
            day_of_month: anchor,
        },
        confidence: ratio(hit_months.len() as i64, eligible),
    })
}

/// Most frequent value; the smallest wins a tie.
fn modal(values: &[i64]) -> Option<i64> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(*v).or_default() += 1;
    }
    let max = *counts.values().max()?;
    counts
        .into_iter()
        .find(|(_, count)| *count == max)
        .map(|(value, _)| value)
}

fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

fn month_index(day: NaiveDate) -> i64 {
    i64::from(day.year()) * 12 + i64::from(day.month0())
}

fn ratio(hits: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (hits as f64 / total as f64).clamp(0.0, 1.0)
}
