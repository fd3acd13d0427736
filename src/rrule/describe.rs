// src/rrule/describe.rs - Human-readable rule descriptions

use chrono::Weekday;

use super::types::{Freq, RecurrenceRule, RuleTime};

const WORKWEEK: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

/// "every week on Monday, Wednesday and Friday", "every month on the 15th", ...
pub fn describe(rule: &RecurrenceRule) -> String {
    let mut text = match (rule.freq, rule.interval) {
        (Freq::Daily, 1) => "every day".to_string(),
        (Freq::Daily, n) => format!("every {n} days"),
        (Freq::Weekly, 1) => "every week".to_string(),
        (Freq::Weekly, n) => format!("every {n} weeks"),
        (Freq::Monthly, 1) => "every month".to_string(),
        (Freq::Monthly, n) => format!("every {n} months"),
    };

    let is_workweek = rule.by_day == WORKWEEK;
    if is_workweek && rule.interval == 1 && rule.freq != Freq::Monthly {
        text = "every weekday".to_string();
    } else if !rule.by_day.is_empty() {
        let names: Vec<String> = rule.by_day.iter().map(|d| weekday_name(*d).to_string()).collect();
        text.push_str(" on ");
        text.push_str(&join_list(&names));
    }

    if !rule.by_month_day.is_empty() {
        let days: Vec<String> = rule.by_month_day.iter().map(|d| ordinal(*d)).collect();
        text.push_str(if rule.by_day.is_empty() { " on the " } else { " falling on the " });
        text.push_str(&join_list(&days));
    }

    if let Some(count) = rule.count {
        if count == 1 {
            text.push_str(" for 1 time");
        } else {
            text.push_str(&format!(" for {count} times"));
        }
    }

    if let Some(until) = &rule.until {
        let naive = match until {
            RuleTime::Utc(n) | RuleTime::Zoned(n, _) | RuleTime::Floating(n) => n,
        };
        text.push_str(&format!(" until {}", naive.format("%B %-d, %Y")));
    }

    text
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

fn join_list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rrule::parser::parse_rule;

    fn text(rule: &str) -> String {
        describe(&parse_rule(rule).unwrap())
    }

    #[test]
    fn test_daily() {
        insta::assert_snapshot!(text("FREQ=DAILY"), @"every day");
        insta::assert_snapshot!(text("FREQ=DAILY;INTERVAL=3"), @"every 3 days");
    }

    #[test]
    fn test_weekly() {
        insta::assert_snapshot!(
            text("FREQ=WEEKLY;BYDAY=MO,WE,FR"),
            @"every week on Monday, Wednesday and Friday"
        );
        insta::assert_snapshot!(text("FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR"), @"every weekday");
        insta::assert_snapshot!(
            text("FREQ=WEEKLY;INTERVAL=2;BYDAY=SA"),
            @"every 2 weeks on Saturday"
        );
    }

    #[test]
    fn test_monthly() {
        insta::assert_snapshot!(text("FREQ=MONTHLY;BYMONTHDAY=15"), @"every month on the 15th");
        insta::assert_snapshot!(
            text("FREQ=MONTHLY;BYMONTHDAY=1,2,3,22"),
            @"every month on the 1st, 2nd, 3rd and 22nd"
        );
    }

    #[test]
    fn test_bounds() {
        insta::assert_snapshot!(text("FREQ=DAILY;COUNT=1"), @"every day for 1 time");
        insta::assert_snapshot!(
            text("FREQ=WEEKLY;UNTIL=20270131T000000Z"),
            @"every week until January 31, 2027"
        );
    }

    #[test]
    fn test_ordinal_teens() {
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(13), "13th");
        assert_eq!(ordinal(21), "21st");
        assert_eq!(ordinal(31), "31st");
    }
}
