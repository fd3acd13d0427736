// src/cli/mod.rs - CLI definition (clap derive)

pub mod learn;
pub mod rule;
pub mod tasks;

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::infra::config::Config;

#[derive(Parser)]
#[command(
    name = "cadence",
    about = "Evaluate recurrence rules and learn them from completion history",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Task definitions file (TOML, one [[task]] table per task)
    #[arg(long, global = true)]
    pub tasks: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Next occurrence(s) strictly after a point in time
    Next {
        task: String,
        /// Start point (RFC 3339 or YYYY-MM-DD); defaults to now
        #[arg(long)]
        from: Option<String>,
        /// How many occurrences to print
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
        /// Evaluate this rule instead of the task's own
        #[arg(long)]
        rule: Option<String>,
    },
    /// Occurrences within a window, both ends inclusive
    Between {
        task: String,
        from: String,
        to: String,
        #[arg(long)]
        rule: Option<String>,
    },
    /// Whether the task recurs on a given day
    Check {
        task: String,
        date: String,
        #[arg(long)]
        rule: Option<String>,
    },
    /// Validate rule text
    Validate { rule: String },
    /// Describe rule text in plain English
    Describe { rule: String },
    /// Record completions and review learned suggestions
    Learn {
        #[command(subcommand)]
        action: LearnAction,
    },
}

#[derive(Subcommand, Clone)]
pub enum LearnAction {
    /// Record a completion (defaults to now)
    Record {
        task: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Analyze a task's history and print the suggestion, if any
    Analyze { task: String },
    /// Accept a suggestion (the current one when no id is given)
    Accept {
        task: String,
        suggestion_id: Option<String>,
        /// Also write the accepted rule into the tasks file
        #[arg(long)]
        install: bool,
    },
    /// Reject a suggestion (the current one when no id is given)
    Reject {
        task: String,
        suggestion_id: Option<String>,
    },
    /// Show recorded completions and feedback
    Show { task: Option<String> },
    /// Forget all learner state
    Reset,
}

/// Settings shared by every subcommand.
pub struct Context {
    pub config: Config,
    pub tasks_path: PathBuf,
    pub json: bool,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let config = match &cli.config {
            Some(path) => Config::load_from(std::path::Path::new(path))?,
            None => Config::load()?,
        };
        let tasks_path = cli
            .tasks
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| config.storage.tasks_path());
        Ok(Self {
            config,
            tasks_path,
            json: cli.json,
        })
    }
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::from_cli(&cli)?;
    match cli.command {
        Commands::Next {
            task,
            from,
            count,
            rule,
        } => rule::run_next(&ctx, &task, from.as_deref(), count, rule.as_deref()),
        Commands::Between {
            task,
            from,
            to,
            rule,
        } => rule::run_between(&ctx, &task, &from, &to, rule.as_deref()),
        Commands::Check { task, date, rule } => {
            rule::run_check(&ctx, &task, &date, rule.as_deref())
        }
        Commands::Validate { rule } => rule::run_validate(&ctx, &rule),
        Commands::Describe { rule } => rule::run_describe(&ctx, &rule),
        Commands::Learn { action } => learn::run_learn(&ctx, action),
    }
}

/// RFC 3339, or a bare date meaning midnight UTC.
pub fn parse_instant(text: &str) -> anyhow::Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Cannot parse '{}' as a date or RFC 3339 time", text))?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow::anyhow!("Invalid date '{}'", text))
}
