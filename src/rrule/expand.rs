// src/rrule/expand.rs - Occurrence expansion for a rule anchored at a start

use std::collections::VecDeque;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;

use super::types::{localize, Freq, RecurrenceRule};

/// Consecutive periods without a single candidate before expansion gives up.
const MAX_EMPTY_PERIODS: u32 = 5_000;

/// Upper bound on occurrences returned for one window, so an open-ended
/// window over an unbounded rule still terminates.
pub const MAX_WINDOW_OCCURRENCES: usize = 100_000;

/// A rule bound to a concrete start instant and zone.
#[derive(Debug, Clone)]
pub struct Schedule {
    rule: RecurrenceRule,
    start: DateTime<Tz>,
    until: Option<DateTime<Tz>>,
}

impl Schedule {
    /// Occurrences are generated in `start`'s zone at `start`'s wall-clock time.
    pub fn new(rule: RecurrenceRule, start: DateTime<Tz>) -> Self {
        let tz = start.timezone();
        let until = rule.until.as_ref().and_then(|u| u.resolve(tz));
        Self { rule, start, until }
    }

    pub fn rule(&self) -> &RecurrenceRule {
        &self.rule
    }

    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    pub fn timezone(&self) -> Tz {
        self.start.timezone()
    }

    pub fn until(&self) -> Option<DateTime<Tz>> {
        self.until
    }

    /// Every occurrence from the start of the series.
    pub fn iter(&self) -> Occurrences<'_> {
        Occurrences::new(self, 0)
    }

    /// Occurrences beginning near `not_before`. May yield a few earlier ones;
    /// callers filter.
    fn iter_near(&self, not_before: DateTime<Utc>) -> Occurrences<'_> {
        // COUNT needs every earlier occurrence to be counted.
        if self.rule.count.is_some() {
            return self.iter();
        }
        let local = not_before
            .with_timezone(&self.timezone())
            .date_naive()
            .max(self.start.date_naive());
        let period = self.period_index(local).saturating_sub(1).max(0);
        Occurrences::new(self, period)
    }

    /// First occurrence after `instant` (or at it when `inclusive`).
    pub fn after(&self, instant: DateTime<Utc>, inclusive: bool) -> Option<DateTime<Tz>> {
        self.iter_near(instant).find(|occ| {
            let occ = occ.with_timezone(&Utc);
            if inclusive {
                occ >= instant
            } else {
                occ > instant
            }
        })
    }

    /// Occurrences within `[from, to]` (or `(from, to)` when not inclusive),
    /// ascending and without duplicates.
    pub fn between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        inclusive: bool,
    ) -> Vec<DateTime<Tz>> {
        if from > to {
            return Vec::new();
        }

        let mut out: Vec<DateTime<Tz>> = self
            .iter_near(from)
            .map(|occ| (occ, occ.with_timezone(&Utc)))
            .skip_while(|(_, utc)| if inclusive { *utc < from } else { *utc <= from })
            .take_while(|(_, utc)| if inclusive { *utc <= to } else { *utc < to })
            .take(MAX_WINDOW_OCCURRENCES)
            .map(|(occ, _)| occ)
            .collect();
        out.dedup();
        out
    }

    fn period_index(&self, date: NaiveDate) -> i64 {
        let start = self.start.date_naive();
        let interval = i64::from(self.rule.interval);
        let raw = match self.rule.freq {
            Freq::Daily => (date - start).num_days(),
            Freq::Weekly => {
                let wkst = self.rule.week_start;
                (week_start(date, wkst) - week_start(start, wkst)).num_days() / 7
            }
            Freq::Monthly => month_index(date) - month_index(start),
        };
        raw.max(0) / interval
    }

    /// Candidate dates for one period, before the start/COUNT/UNTIL filters.
    /// `None` once the calendar runs out.
    fn period_dates(&self, period: i64) -> Option<Vec<NaiveDate>> {
        let start = self.start.date_naive();
        let step = period.checked_mul(i64::from(self.rule.interval))?;
        let by_day = &self.rule.by_day;
        let by_month_day = &self.rule.by_month_day;

        let dates = match self.rule.freq {
            Freq::Daily => {
                let day = start.checked_add_days(Days::new(u64::try_from(step).ok()?))?;
                vec![day]
            }
            Freq::Weekly => {
                let first = week_start(start, self.rule.week_start)
                    .checked_add_days(Days::new(u64::try_from(step.checked_mul(7)?).ok()?))?;
                let start_day = [start.weekday()];
                let wanted: &[Weekday] = if by_day.is_empty() {
                    &start_day
                } else {
                    by_day
                };
                (0..7)
                    .filter_map(|offset| first.checked_add_days(Days::new(offset)))
                    .filter(|d| wanted.contains(&d.weekday()))
                    .collect()
            }
            Freq::Monthly => {
                let index = month_index(start).checked_add(step)?;
                let year = i32::try_from(index.div_euclid(12)).ok()?;
                let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
                // Validates the year is representable.
                NaiveDate::from_ymd_opt(year, month, 1)?;

                if !by_month_day.is_empty() {
                    by_month_day
                        .iter()
                        .filter_map(|d| NaiveDate::from_ymd_opt(year, month, *d))
                        .collect()
                } else if !by_day.is_empty() {
                    (1..=31)
                        .filter_map(|d| NaiveDate::from_ymd_opt(year, month, d))
                        .collect()
                } else {
                    NaiveDate::from_ymd_opt(year, month, start.day())
                        .into_iter()
                        .collect()
                }
            }
        };

        Some(
            dates
                .into_iter()
                .filter(|d| by_day.is_empty() || by_day.contains(&d.weekday()))
                .filter(|d| by_month_day.is_empty() || by_month_day.contains(&d.day()))
                .collect(),
        )
    }
}

/// Lazily expands a schedule period by period.
pub struct Occurrences<'a> {
    schedule: &'a Schedule,
    period: i64,
    buffer: VecDeque<DateTime<Tz>>,
    emitted: u32,
    empty_run: u32,
    done: bool,
}

impl<'a> Occurrences<'a> {
    fn new(schedule: &'a Schedule, period: i64) -> Self {
        Self {
            schedule,
            period,
            buffer: VecDeque::new(),
            emitted: 0,
            empty_run: 0,
            done: false,
        }
    }

    fn fill(&mut self) {
        while self.buffer.is_empty() && !self.done {
            let Some(dates) = self.schedule.period_dates(self.period) else {
                self.done = true;
                return;
            };
            self.period += 1;

            let tz = self.schedule.timezone();
            let time = self.schedule.start.time();
            let start = self.schedule.start;
            let mut found: Vec<DateTime<Tz>> = dates
                .into_iter()
                .filter_map(|d| localize(tz, d.and_time(time)))
                .filter(|occ| *occ >= start)
                .collect();
            found.sort();

            if found.is_empty() {
                self.empty_run += 1;
                if self.empty_run > MAX_EMPTY_PERIODS {
                    self.done = true;
                }
            } else {
                self.empty_run = 0;
                self.buffer.extend(found);
            }
        }
    }
}

impl Iterator for Occurrences<'_> {
    type Item = DateTime<Tz>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fill();
        let occ = self.buffer.pop_front()?;

        let rule = &self.schedule.rule;
        let exhausted = rule.count.is_some_and(|count| self.emitted >= count);
        let expired = self.schedule.until.is_some_and(|until| occ > until);
        if exhausted || expired {
            self.done = true;
            self.buffer.clear();
            return None;
        }

        self.emitted += 1;
        Some(occ)
    }
}

fn week_start(date: NaiveDate, wkst: Weekday) -> NaiveDate {
    let back = (date.weekday().num_days_from_monday() + 7 - wkst.num_days_from_monday()) % 7;
    date.checked_sub_days(Days::new(u64::from(back)))
        .unwrap_or(NaiveDate::MIN)
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}
