// src/cli/rule.rs - Rule evaluation subcommands

use chrono::{DateTime, Utc};

use super::tasks::TaskFile;
use super::{parse_instant, Context};
use crate::core::task::Task;
use crate::rrule::RuleEvaluator;

fn evaluator(ctx: &Context) -> anyhow::Result<RuleEvaluator> {
    Ok(RuleEvaluator::new(ctx.config.evaluator.default_tz()?))
}

/// The named task from the tasks file, optionally with its rule swapped out.
/// An ad-hoc `--rule` works even for ids the file doesn't know.
fn resolve_task(ctx: &Context, id: &str, rule: Option<&str>) -> anyhow::Result<Task> {
    let file = TaskFile::load(&ctx.tasks_path)?;
    let task = match (file.find(id), rule) {
        (Some(task), Some(rule)) => task.clone().with_rule(rule),
        (Some(task), None) => task.clone(),
        (None, Some(rule)) => Task::new(id).with_rule(rule),
        (None, None) => anyhow::bail!(
            "Unknown task '{}' (not in {})",
            id,
            ctx.tasks_path.display()
        ),
    };
    Ok(task)
}

fn print_instants(ctx: &Context, instants: &[DateTime<Utc>]) -> anyhow::Result<()> {
    if ctx.json {
        let list: Vec<String> = instants.iter().map(|i| i.to_rfc3339()).collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else if instants.is_empty() {
        println!("No occurrences.");
    } else {
        for instant in instants {
            println!("{}", instant.to_rfc3339());
        }
    }
    Ok(())
}

pub fn run_next(
    ctx: &Context,
    task_id: &str,
    from: Option<&str>,
    count: usize,
    rule: Option<&str>,
) -> anyhow::Result<()> {
    let task = resolve_task(ctx, task_id, rule)?;
    let evaluator = evaluator(ctx)?;
    let mut cursor = match from {
        Some(text) => parse_instant(text)?,
        None => Utc::now(),
    };

    let mut found = Vec::with_capacity(count);
    while found.len() < count {
        let Some(next) = evaluator.next_occurrence(&task, cursor) else {
            break;
        };
        found.push(next);
        cursor = next;
    }
    print_instants(ctx, &found)
}

pub fn run_between(
    ctx: &Context,
    task_id: &str,
    from: &str,
    to: &str,
    rule: Option<&str>,
) -> anyhow::Result<()> {
    let task = resolve_task(ctx, task_id, rule)?;
    let (from, to) = (parse_instant(from)?, parse_instant(to)?);
    if to < from {
        anyhow::bail!("Window end is before its start");
    }
    let found = evaluator(ctx)?.occurrences_between(&task, from, to);
    print_instants(ctx, &found)
}

pub fn run_check(
    ctx: &Context,
    task_id: &str,
    date: &str,
    rule: Option<&str>,
) -> anyhow::Result<()> {
    let task = resolve_task(ctx, task_id, rule)?;
    let hit = evaluator(ctx)?.is_occurrence_on(&task, parse_instant(date)?);
    if ctx.json {
        println!("{}", serde_json::json!({ "task": task.id, "date": date, "occurs": hit }));
    } else if hit {
        println!("'{}' occurs on {}", task.id, date);
    } else {
        println!("'{}' does not occur on {}", task.id, date);
    }
    Ok(())
}

pub fn run_validate(ctx: &Context, rule: &str) -> anyhow::Result<()> {
    let validation = evaluator(ctx)?.validate_rrule(rule);
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&validation)?);
        return Ok(());
    }
    match &validation.error {
        None => println!("valid"),
        Some(reason) => println!("invalid: {}", reason),
    }
    Ok(())
}

pub fn run_describe(ctx: &Context, rule: &str) -> anyhow::Result<()> {
    let text = evaluator(ctx)?.to_natural_language(rule);
    if ctx.json {
        println!("{}", serde_json::json!({ "rule": rule, "description": text }));
    } else {
        println!("{}", text);
    }
    Ok(())
}
