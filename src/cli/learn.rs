// src/cli/learn.rs - Completion recording and suggestion review

use std::sync::Arc;

use chrono::Utc;

use super::tasks::TaskFile;
use super::{parse_instant, Context, LearnAction};
use crate::core::settings::fixed_settings;
use crate::infra::config::{StorageBackend, StorageConfig};
use crate::learner::store::{
    JsonFileLearnerStore, LearnerStore, MemoryLearnerStore, SqliteLearnerStore,
};
use crate::learner::types::Suggestion;
use crate::learner::PatternLearner;
use crate::rrule::RuleEvaluator;

/// Handle the `cadence learn` command.
pub fn run_learn(ctx: &Context, action: LearnAction) -> anyhow::Result<()> {
    let mut file = TaskFile::load(&ctx.tasks_path)?;
    let learner = open_learner(ctx, &file)?;

    match action {
        LearnAction::Record { task, at } => {
            let at = match at {
                Some(text) => parse_instant(&text)?,
                None => Utc::now(),
            };
            learner.record_completion(&task, at)?;
            println!("Recorded completion of '{}' at {}", task, at.to_rfc3339());

            if let Some(suggestion) = learner.auto_adjust(&task)? {
                install_rule(ctx, &mut file, &task, &suggestion)?;
                println!("Auto-adjusted '{}' to {}", task, suggestion.suggested_rrule);
            }
            learner.save()?;
        }
        LearnAction::Analyze { task } => match learner.analyze_task(&task) {
            Some(suggestion) => print_suggestion(ctx, &suggestion)?,
            None if ctx.json => println!("null"),
            None => println!("No suggestion for '{}'.", task),
        },
        LearnAction::Accept {
            task,
            suggestion_id,
            install,
        } => {
            let current = learner.analyze_task(&task);
            let id = pick_id(suggestion_id, current.as_ref())?;
            learner.accept_suggestion(&task, &id)?;
            learner.save()?;
            println!("Accepted {} for '{}'", id, task);

            if install {
                match current.filter(|s| s.id() == id) {
                    Some(suggestion) => {
                        install_rule(ctx, &mut file, &task, &suggestion)?;
                        println!("Installed {}", suggestion.suggested_rrule);
                    }
                    None => anyhow::bail!(
                        "{} is not the current suggestion for '{}', nothing to install",
                        id,
                        task
                    ),
                }
            }
        }
        LearnAction::Reject {
            task,
            suggestion_id,
        } => {
            let id = pick_id(suggestion_id, learner.analyze_task(&task).as_ref())?;
            learner.reject_suggestion(&task, &id)?;
            learner.save()?;
            println!("Rejected {} for '{}'", id, task);
        }
        LearnAction::Show { task: Some(task) } => {
            let completions = learner.completions(&task);
            let feedback = learner.feedback(&task);
            if ctx.json {
                let out = serde_json::json!({
                    "completions": completions,
                    "feedback": feedback,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{} completion(s):", completions.len());
                for c in &completions {
                    println!("  {}", c.to_rfc3339());
                }
                println!("{} feedback entr(ies):", feedback.len());
                for f in &feedback {
                    let verdict = if f.accepted { "accepted" } else { "rejected" };
                    println!("  {} {} {}", f.timestamp.to_rfc3339(), verdict, f.suggestion_id);
                }
            }
        }
        LearnAction::Show { task: None } => {
            let state = learner.snapshot();
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else if state.tasks.is_empty() {
                println!("No learner state yet.");
            } else {
                for (id, record) in &state.tasks {
                    println!(
                        "  {:<24} {:>4} completion(s)  {:>3} feedback",
                        id,
                        record.completions.len(),
                        record.feedback.len()
                    );
                }
            }
        }
        LearnAction::Reset => {
            learner.reset()?;
            println!("Learner state cleared.");
        }
    }
    Ok(())
}

pub fn open_store(storage: &StorageConfig) -> anyhow::Result<Arc<dyn LearnerStore>> {
    let store: Arc<dyn LearnerStore> = match storage.backend {
        StorageBackend::Json => Arc::new(JsonFileLearnerStore::new(storage.state_path())),
        StorageBackend::Sqlite => Arc::new(SqliteLearnerStore::open(&storage.state_path())?),
        StorageBackend::Memory => Arc::new(MemoryLearnerStore::new()),
    };
    Ok(store)
}

fn open_learner(ctx: &Context, file: &TaskFile) -> anyhow::Result<PatternLearner> {
    let learner = PatternLearner::new(
        open_store(&ctx.config.storage)?,
        Arc::new(file.lookup()),
        fixed_settings(ctx.config.smart_recurrence.clone()),
    )
    .with_timezone(ctx.config.evaluator.learner_tz()?);
    learner.load()?;
    Ok(learner)
}

fn pick_id(given: Option<String>, current: Option<&Suggestion>) -> anyhow::Result<String> {
    match (given, current) {
        (Some(id), _) => Ok(id),
        (None, Some(suggestion)) => Ok(PatternLearner::suggestion_id(suggestion)),
        (None, None) => anyhow::bail!("No current suggestion; pass a suggestion id"),
    }
}

fn install_rule(
    ctx: &Context,
    file: &mut TaskFile,
    task_id: &str,
    suggestion: &Suggestion,
) -> anyhow::Result<()> {
    let task = file
        .find_mut(task_id)
        .ok_or_else(|| anyhow::anyhow!("Unknown task '{}'", task_id))?;
    task.frequency.rrule = Some(suggestion.suggested_rrule.clone());
    file.save(&ctx.tasks_path)
}

fn print_suggestion(ctx: &Context, suggestion: &Suggestion) -> anyhow::Result<()> {
    let id = PatternLearner::suggestion_id(suggestion);
    if ctx.json {
        let out = serde_json::json!({ "id": id, "suggestion": suggestion });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    let description = RuleEvaluator::default().to_natural_language(&suggestion.suggested_rrule);
    println!("Suggestion {}", id);
    println!("  rule:        {}", suggestion.suggested_rrule);
    println!("  meaning:     {}", description);
    println!("  confidence:  {:.2}", suggestion.confidence);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learner::types::Evidence;

    #[test]
    fn test_pick_id_prefers_explicit() {
        let s = Suggestion::new(Evidence::Daily { interval: 1 }, 1.0);
        assert_eq!(pick_id(Some("sugg-x".into()), Some(&s)).unwrap(), "sugg-x");
        assert_eq!(pick_id(None, Some(&s)).unwrap(), s.id());
        assert!(pick_id(None, None).is_err());
    }

    #[test]
    fn test_open_store_per_backend() {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = StorageConfig {
            backend: StorageBackend::Sqlite,
            path: Some(dir.path().join("state.db")),
            tasks_file: None,
        };
        let store = open_store(&sqlite).unwrap();
        assert!(store.load().unwrap().tasks.is_empty());
        assert!(dir.path().join("state.db").exists());

        let memory = StorageConfig {
            backend: StorageBackend::Memory,
            ..Default::default()
        };
        assert!(open_store(&memory).unwrap().load().is_ok());
    }
}
