// src/rrule/mod.rs - Recurrence rule parsing, expansion and evaluation

pub mod describe;
pub mod evaluator;
pub mod expand;
pub mod parser;
pub mod types;

pub use describe::describe;
pub use evaluator::{RuleEvaluator, RuleValidation, RuleViolation};
pub use expand::{Occurrences, Schedule};
pub use parser::{parse_rule, RuleError};
pub use types::{parse_weekday_code, weekday_code, Freq, RecurrenceRule, RuleTime};
