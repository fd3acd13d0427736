// src/lib.rs - Library root for cadence

pub mod cli;
pub mod core;
pub mod infra;
pub mod learner;
pub mod rrule;
