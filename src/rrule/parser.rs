// src/rrule/parser.rs - RRULE text parsing
//
// Accepts a bare rule body ("FREQ=WEEKLY;BYDAY=MO"), an "RRULE:" line, or a
// multi-line block with a leading "DTSTART[;TZID=zone]:" line.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use thiserror::Error;

use super::types::{parse_weekday_code, sorted_weekdays, Freq, RecurrenceRule, RuleTime};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("RRULE string is required")]
    Empty,

    #[error("RRULE is missing FREQ")]
    MissingFreq,

    #[error("Unsupported FREQ '{0}' (expected DAILY, WEEKLY or MONTHLY)")]
    UnsupportedFreq(String),

    #[error("Invalid INTERVAL '{0}'")]
    InvalidInterval(String),

    #[error("Invalid COUNT '{0}'")]
    InvalidCount(String),

    #[error("Invalid weekday '{0}'")]
    InvalidWeekday(String),

    #[error("Invalid BYMONTHDAY '{0}' (expected 1-31)")]
    InvalidMonthDay(String),

    #[error("Invalid date-time '{0}'")]
    InvalidDate(String),

    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("Unsupported property '{0}'")]
    UnknownProperty(String),

    #[error("Property '{0}' given more than once")]
    DuplicateProperty(String),

    #[error("COUNT and UNTIL must not both be set")]
    CountWithUntil,

    #[error("Malformed rule part '{0}'")]
    Malformed(String),
}

impl FromStr for RecurrenceRule {
    type Err = RuleError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        parse_rule(text)
    }
}

pub fn parse_rule(text: &str) -> Result<RecurrenceRule, RuleError> {
    let mut dtstart = None;
    let mut body = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let upper = line.to_ascii_uppercase();
        if upper.starts_with("DTSTART") {
            if dtstart.is_some() {
                return Err(RuleError::DuplicateProperty("DTSTART".into()));
            }
            dtstart = Some(parse_dtstart(line)?);
        } else if upper.starts_with("RRULE:") {
            if body.is_some() {
                return Err(RuleError::DuplicateProperty("RRULE".into()));
            }
            body = Some(&line["RRULE:".len()..]);
        } else if upper.starts_with("FREQ=") || upper.contains(";FREQ=") {
            if body.is_some() {
                return Err(RuleError::DuplicateProperty("RRULE".into()));
            }
            body = Some(line);
        } else {
            return Err(RuleError::Malformed(line.to_string()));
        }
    }

    let Some(body) = body else {
        return Err(if dtstart.is_some() {
            RuleError::MissingFreq
        } else {
            RuleError::Empty
        });
    };

    let mut rule = parse_body(body)?;
    rule.dtstart = dtstart;
    Ok(rule)
}

fn parse_body(body: &str) -> Result<RecurrenceRule, RuleError> {
    let mut seen = HashSet::new();
    let mut freq = None;
    let mut interval = 1;
    let mut by_day = Vec::new();
    let mut by_month_day = Vec::new();
    let mut count = None;
    let mut until = None;
    let mut week_start = chrono::Weekday::Mon;

    for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| RuleError::Malformed(part.to_string()))?;
        let key = key.trim().to_ascii_uppercase();
        let value = value.trim();

        if !seen.insert(key.clone()) {
            return Err(RuleError::DuplicateProperty(key));
        }

        match key.as_str() {
            "FREQ" => {
                freq = Some(match value.to_ascii_uppercase().as_str() {
                    "DAILY" => Freq::Daily,
                    "WEEKLY" => Freq::Weekly,
                    "MONTHLY" => Freq::Monthly,
                    _ => return Err(RuleError::UnsupportedFreq(value.to_string())),
                });
            }
            "INTERVAL" => {
                interval = value
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| RuleError::InvalidInterval(value.to_string()))?;
            }
            "COUNT" => {
                count = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| RuleError::InvalidCount(value.to_string()))?,
                );
            }
            "UNTIL" => until = Some(parse_rule_time(value, None)?),
            "BYDAY" => {
                let days = value
                    .split(',')
                    .map(|code| {
                        parse_weekday_code(code)
                            .ok_or_else(|| RuleError::InvalidWeekday(code.trim().to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                by_day = sorted_weekdays(days);
            }
            "BYMONTHDAY" => {
                by_month_day = value
                    .split(',')
                    .map(|d| {
                        d.trim()
                            .parse::<u32>()
                            .ok()
                            .filter(|n| (1..=31).contains(n))
                            .ok_or_else(|| RuleError::InvalidMonthDay(d.trim().to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                by_month_day.sort_unstable();
                by_month_day.dedup();
            }
            "WKST" => {
                week_start = parse_weekday_code(value)
                    .ok_or_else(|| RuleError::InvalidWeekday(value.to_string()))?;
            }
            _ => return Err(RuleError::UnknownProperty(key)),
        }
    }

    let freq = freq.ok_or(RuleError::MissingFreq)?;
    if count.is_some() && until.is_some() {
        return Err(RuleError::CountWithUntil);
    }

    Ok(RecurrenceRule {
        freq,
        interval,
        by_day,
        by_month_day,
        count,
        until,
        week_start,
        dtstart: None,
    })
}

/// `DTSTART[;TZID=zone]:value`
fn parse_dtstart(line: &str) -> Result<RuleTime, RuleError> {
    let (head, value) = line
        .split_once(':')
        .ok_or_else(|| RuleError::Malformed(line.to_string()))?;

    let mut tz = None;
    for param in head.split(';').skip(1) {
        let (name, val) = param
            .split_once('=')
            .ok_or_else(|| RuleError::Malformed(param.to_string()))?;
        if name.trim().eq_ignore_ascii_case("TZID") {
            let zone: Tz = val
                .trim()
                .parse()
                .map_err(|_| RuleError::UnknownTimezone(val.trim().to_string()))?;
            tz = Some(zone);
        } else {
            return Err(RuleError::UnknownProperty(name.trim().to_ascii_uppercase()));
        }
    }

    parse_rule_time(value.trim(), tz)
}

fn parse_rule_time(value: &str, tz: Option<Tz>) -> Result<RuleTime, RuleError> {
    let invalid = || RuleError::InvalidDate(value.to_string());
    let (raw, is_utc) = match value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        Some(raw) => (raw, true),
        None => (value, false),
    };

    let naive = if raw.len() == 8 {
        NaiveDate::parse_from_str(raw, "%Y%m%d")
            .map_err(|_| invalid())?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(invalid)?
    } else {
        NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S").map_err(|_| invalid())?
    };

    Ok(match (is_utc, tz) {
        (true, _) => RuleTime::Utc(naive),
        (false, Some(tz)) => RuleTime::Zoned(naive, tz),
        (false, None) => RuleTime::Floating(naive),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn test_parse_bare_body() {
        let rule: RecurrenceRule = "FREQ=WEEKLY;BYDAY=FR,MO,WE".parse().unwrap();
        assert_eq!(rule.freq, Freq::Weekly);
        assert_eq!(rule.interval, 1);
        assert_eq!(rule.by_day, vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);
        assert!(rule.dtstart.is_none());
    }

    #[test]
    fn test_parse_rrule_prefix_and_dtstart_tzid() {
        let rule = parse_rule(
            "DTSTART;TZID=Europe/Paris:20260105T083000\nRRULE:FREQ=DAILY;INTERVAL=2;COUNT=10",
        )
        .unwrap();
        assert_eq!(rule.interval, 2);
        assert_eq!(rule.count, Some(10));
        let tz: Tz = "Europe/Paris".parse().unwrap();
        assert_eq!(rule.zone(), Some(tz));
        match rule.dtstart {
            Some(RuleTime::Zoned(naive, _)) => {
                assert_eq!(naive.format("%Y-%m-%d %H:%M").to_string(), "2026-01-05 08:30")
            }
            other => panic!("unexpected dtstart: {other:?}"),
        }
    }

    #[test]
    fn test_parse_until_forms() {
        let rule = parse_rule("FREQ=DAILY;UNTIL=20261231").unwrap();
        assert!(matches!(rule.until, Some(RuleTime::Floating(_))));
        let rule = parse_rule("FREQ=DAILY;UNTIL=20261231T235959Z").unwrap();
        assert!(matches!(rule.until, Some(RuleTime::Utc(_))));
    }

    #[test]
    fn test_parse_lowercase_keys() {
        let rule = parse_rule("freq=monthly;bymonthday=15,1,15").unwrap();
        assert_eq!(rule.freq, Freq::Monthly);
        assert_eq!(rule.by_month_day, vec![1, 15]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_rule(""), Err(RuleError::Empty));
        assert_eq!(parse_rule("INTERVAL=2"), Err(RuleError::Malformed("INTERVAL=2".into())));
        assert_eq!(parse_rule("RRULE:INTERVAL=2"), Err(RuleError::MissingFreq));
        assert_eq!(
            parse_rule("FREQ=YEARLY"),
            Err(RuleError::UnsupportedFreq("YEARLY".into()))
        );
        assert_eq!(
            parse_rule("FREQ=DAILY;INTERVAL=0"),
            Err(RuleError::InvalidInterval("0".into()))
        );
        assert_eq!(
            parse_rule("FREQ=WEEKLY;BYDAY=MO,XX"),
            Err(RuleError::InvalidWeekday("XX".into()))
        );
        assert_eq!(
            parse_rule("FREQ=MONTHLY;BYMONTHDAY=32"),
            Err(RuleError::InvalidMonthDay("32".into()))
        );
        assert_eq!(
            parse_rule("FREQ=DAILY;COUNT=2;UNTIL=20270101"),
            Err(RuleError::CountWithUntil)
        );
        assert_eq!(
            parse_rule("FREQ=DAILY;FREQ=WEEKLY"),
            Err(RuleError::DuplicateProperty("FREQ".into()))
        );
        assert_eq!(
            parse_rule("FREQ=DAILY;BYHOUR=9"),
            Err(RuleError::UnknownProperty("BYHOUR".into()))
        );
        assert_eq!(
            parse_rule("DTSTART;TZID=Mars/Olympus:20260101T000000\nRRULE:FREQ=DAILY"),
            Err(RuleError::UnknownTimezone("Mars/Olympus".into()))
        );
        assert_eq!(
            parse_rule("FREQ=DAILY;UNTIL=2026-01-01"),
            Err(RuleError::InvalidDate("2026-01-01".into()))
        );
    }

    #[test]
    fn test_count_zero_parses() {
        let rule = parse_rule("FREQ=DAILY;COUNT=0").unwrap();
        assert_eq!(rule.count, Some(0));
    }

    #[test]
    fn test_display_reparses() {
        let text = "FREQ=WEEKLY;INTERVAL=2;BYDAY=TU,TH;WKST=SU";
        let rule = parse_rule(text).unwrap();
        assert_eq!(rule.to_string(), text);
        assert_eq!(parse_rule(&rule.to_string()).unwrap(), rule);
    }
}
