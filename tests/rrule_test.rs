// tests/rrule_test.rs - Integration test: rule evaluation through the public API

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use pretty_assertions::assert_eq;

use cadence::core::task::Task;
use cadence::rrule::{RuleEvaluator, RuleViolation};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn task(rule: &str) -> Task {
    let mut task = Task::new("task-1").with_rule(rule);
    task.created_at = utc(2026, 1, 1, 9, 0);
    task
}

#[test]
fn test_next_is_strictly_after_from() {
    let evaluator = RuleEvaluator::default();
    let t = task("FREQ=DAILY");

    let on_occurrence = utc(2026, 1, 3, 9, 0);
    let next = evaluator.next_occurrence(&t, on_occurrence).unwrap();
    assert_eq!(next, utc(2026, 1, 4, 9, 0));

    let between = evaluator.next_occurrence(&t, utc(2026, 1, 3, 12, 0)).unwrap();
    assert_eq!(between, utc(2026, 1, 4, 9, 0));
}

#[test]
fn test_next_from_before_start() {
    let evaluator = RuleEvaluator::default();
    let t = task("FREQ=WEEKLY;BYDAY=MO,FR");
    let next = evaluator.next_occurrence(&t, utc(2025, 6, 1, 0, 0)).unwrap();
    // 2026-01-02 is the first Friday on or after the series start.
    assert_eq!(next, utc(2026, 1, 2, 9, 0));
}

#[test]
fn test_between_inclusive_ordered_unique() {
    let evaluator = RuleEvaluator::default();
    let t = task("FREQ=WEEKLY;BYDAY=MO,WE,FR");
    let from = utc(2026, 1, 5, 9, 0);
    let to = utc(2026, 1, 16, 9, 0);

    let found = evaluator.occurrences_between(&t, from, to);
    assert_eq!(found.first(), Some(&from));
    assert_eq!(found.last(), Some(&to));
    assert_eq!(found.len(), 6);
    assert!(found.windows(2).all(|w| w[0] < w[1]));
    assert!(found
        .iter()
        .all(|d| matches!(d.weekday(), Weekday::Mon | Weekday::Wed | Weekday::Fri)));
}

#[test]
fn test_missing_or_bad_rule_degrades() {
    let evaluator = RuleEvaluator::default();
    let mut no_rule = Task::new("bare");
    no_rule.created_at = utc(2026, 1, 1, 0, 0);
    let from = utc(2026, 2, 1, 0, 0);

    assert!(evaluator.next_occurrence(&no_rule, from).is_none());
    assert!(evaluator
        .occurrences_between(&no_rule, from, from + Duration::days(7))
        .is_empty());
    assert!(!evaluator.is_occurrence_on(&no_rule, from));

    let broken = task("FREQ=HOURLY");
    assert!(evaluator.next_occurrence(&broken, from).is_none());
    assert!(evaluator
        .occurrences_between(&broken, from, from + Duration::days(7))
        .is_empty());
    assert!(!evaluator.is_occurrence_on(&broken, from));
}

#[test]
fn test_is_occurrence_on_whole_day() {
    let evaluator = RuleEvaluator::default();
    let t = task("FREQ=MONTHLY;BYMONTHDAY=15");
    assert!(evaluator.is_occurrence_on(&t, utc(2026, 3, 15, 0, 0)));
    assert!(evaluator.is_occurrence_on(&t, utc(2026, 3, 15, 23, 59)));
    assert!(!evaluator.is_occurrence_on(&t, utc(2026, 3, 16, 9, 0)));
}

#[test]
fn test_fixed_time_does_not_affect_day_check() {
    let evaluator = RuleEvaluator::default();
    let mut t = task("FREQ=DAILY");
    t.frequency.time = Some("23:30".into());
    assert!(evaluator.is_occurrence_on(&t, utc(2026, 2, 2, 0, 0)));
    let next = evaluator.next_occurrence(&t, utc(2026, 2, 2, 0, 0)).unwrap();
    assert_eq!(next, utc(2026, 2, 2, 23, 30));
}

#[test]
fn test_validate_classifies() {
    let evaluator = RuleEvaluator::default();
    let now = utc(2026, 6, 1, 0, 0);

    let ok = evaluator.validate_rrule_at("FREQ=WEEKLY;BYDAY=MO", now);
    assert!(ok.valid);
    assert_eq!(ok.error, None);

    let expired = evaluator.validate_rrule_at("FREQ=DAILY;UNTIL=20260101T000000Z", now);
    assert!(!expired.valid);
    assert_eq!(expired.error, Some(RuleViolation::Expired));

    let exhausted = evaluator.validate_rrule_at("FREQ=DAILY;COUNT=0", now);
    assert!(!exhausted.valid);
    assert_eq!(exhausted.error, Some(RuleViolation::Exhausted));

    let used_up = evaluator.validate_rrule_at(
        "DTSTART:20260101T090000Z\nRRULE:FREQ=DAILY;COUNT=3",
        now,
    );
    assert_eq!(used_up.error, Some(RuleViolation::Exhausted));

    let garbage = evaluator.validate_rrule_at("EVERY=SOMETIMES", now);
    assert!(matches!(garbage.error, Some(RuleViolation::Syntax(_))));
}

#[test]
fn test_validate_uses_wall_clock() {
    let evaluator = RuleEvaluator::default();
    assert!(!evaluator.validate_rrule("FREQ=DAILY;UNTIL=20000101T000000Z").valid);
    assert!(evaluator.validate_rrule("FREQ=DAILY").valid);
}

#[test]
fn test_natural_language() {
    let evaluator = RuleEvaluator::default();
    assert_eq!(
        evaluator.to_natural_language("FREQ=WEEKLY;BYDAY=MO,WE,FR"),
        "every week on Monday, Wednesday and Friday"
    );
    assert_eq!(evaluator.to_natural_language("not a rule"), "not a rule");
}

#[test]
fn test_cache_is_stable_and_clearable() {
    let evaluator = RuleEvaluator::default();
    let t = task("FREQ=DAILY");
    let from = utc(2026, 3, 1, 0, 0);

    let first = evaluator.next_occurrence(&t, from);
    assert_eq!(evaluator.cache_size(), 1);
    for _ in 0..5 {
        assert_eq!(evaluator.next_occurrence(&t, from), first);
    }
    assert_eq!(evaluator.cache_size(), 1);

    let changed = task("FREQ=DAILY;INTERVAL=2");
    let _ = evaluator.next_occurrence(&changed, from);
    assert_eq!(evaluator.cache_size(), 2);

    evaluator.clear_cache();
    assert_eq!(evaluator.cache_size(), 0);
    assert_eq!(evaluator.next_occurrence(&t, from), first);
}

#[test]
fn test_task_timezone_keeps_wall_clock() {
    let evaluator = RuleEvaluator::default();
    let mut t = task("FREQ=WEEKLY;BYDAY=SA");
    t.timezone = Some("America/New_York".into());
    // Series starts 2026-01-01 04:00 New York time (09:00 UTC).
    let found = evaluator.occurrences_between(&t, utc(2026, 3, 1, 0, 0), utc(2026, 3, 15, 0, 0));
    // 2026-03-07 is before the DST switch, 2026-03-14 after it.
    assert_eq!(found, vec![utc(2026, 3, 7, 9, 0), utc(2026, 3, 14, 8, 0)]);
}

#[test]
fn test_explicit_dtstart_with_tzid() {
    let evaluator = RuleEvaluator::default();
    let t = task("DTSTART;TZID=Europe/Berlin:20260105T070000\nRRULE:FREQ=DAILY;COUNT=2");
    let found = evaluator.occurrences_between(&t, utc(2026, 1, 1, 0, 0), utc(2026, 12, 31, 0, 0));
    assert_eq!(found, vec![utc(2026, 1, 5, 6, 0), utc(2026, 1, 6, 6, 0)]);
    assert!(evaluator
        .next_occurrence(&t, utc(2026, 1, 6, 6, 0))
        .is_none());
}
