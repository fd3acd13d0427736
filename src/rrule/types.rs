// src/rrule/types.rs - Recurrence rule model (RFC 5545 subset)

use std::fmt;

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

/// Supported `FREQ` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Freq {
    Daily,
    Weekly,
    Monthly,
}

impl Freq {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
        }
    }
}

/// A date-time as written in rule text, before a zone is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTime {
    /// Trailing `Z`.
    Utc(NaiveDateTime),
    /// `DTSTART;TZID=...`.
    Zoned(NaiveDateTime, Tz),
    /// No zone information; interpreted in the schedule's zone.
    Floating(NaiveDateTime),
}

impl RuleTime {
    pub fn resolve(&self, fallback: Tz) -> Option<DateTime<Tz>> {
        match *self {
            RuleTime::Utc(naive) => Some(Utc.from_utc_datetime(&naive).with_timezone(&fallback)),
            RuleTime::Zoned(naive, tz) => {
                localize(tz, naive).map(|dt| dt.with_timezone(&fallback))
            }
            RuleTime::Floating(naive) => localize(fallback, naive),
        }
    }

    pub fn zone(&self) -> Option<Tz> {
        match self {
            RuleTime::Zoned(_, tz) => Some(*tz),
            _ => None,
        }
    }
}

/// Map a wall-clock time into `tz`. Times in a DST gap move forward one
/// hour; ambiguous times take the earlier instant.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(early, _) => Some(early),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest(),
    }
}

/// A parsed recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub freq: Freq,
    pub interval: u32,
    pub by_day: Vec<Weekday>,
    pub by_month_day: Vec<u32>,
    pub count: Option<u32>,
    pub until: Option<RuleTime>,
    pub week_start: Weekday,
    pub dtstart: Option<RuleTime>,
}

impl RecurrenceRule {
    pub fn new(freq: Freq) -> Self {
        Self {
            freq,
            interval: 1,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            count: None,
            until: None,
            week_start: Weekday::Mon,
            dtstart: None,
        }
    }

    pub fn interval(mut self, interval: u32) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn by_day(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.by_day = sorted_weekdays(days);
        self
    }

    pub fn by_month_day(mut self, days: impl IntoIterator<Item = u32>) -> Self {
        let mut days: Vec<u32> = days.into_iter().collect();
        days.sort_unstable();
        days.dedup();
        self.by_month_day = days;
        self
    }

    /// Zone named by `DTSTART;TZID=...`, if any.
    pub fn zone(&self) -> Option<Tz> {
        self.dtstart.as_ref().and_then(RuleTime::zone)
    }
}

/// Renders the `RRULE` body only (no `DTSTART` line).
impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={};INTERVAL={}", self.freq.as_str(), self.interval)?;
        if !self.by_day.is_empty() {
            let codes: Vec<&str> = self.by_day.iter().map(|d| weekday_code(*d)).collect();
            write!(f, ";BYDAY={}", codes.join(","))?;
        }
        if !self.by_month_day.is_empty() {
            let days: Vec<String> = self.by_month_day.iter().map(u32::to_string).collect();
            write!(f, ";BYMONTHDAY={}", days.join(","))?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={count}")?;
        }
        if let Some(until) = &self.until {
            match until {
                RuleTime::Utc(naive) => write!(f, ";UNTIL={}Z", naive.format("%Y%m%dT%H%M%S"))?,
                RuleTime::Zoned(naive, _) | RuleTime::Floating(naive) => {
                    write!(f, ";UNTIL={}", naive.format("%Y%m%dT%H%M%S"))?
                }
            }
        }
        if self.week_start != Weekday::Mon {
            write!(f, ";WKST={}", weekday_code(self.week_start))?;
        }
        Ok(())
    }
}

pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

pub fn parse_weekday_code(code: &str) -> Option<Weekday> {
    match code.trim().to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Monday-first order, duplicates removed.
pub fn sorted_weekdays(days: impl IntoIterator<Item = Weekday>) -> Vec<Weekday> {
    let mut days: Vec<Weekday> = days.into_iter().collect();
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();
    days
}
