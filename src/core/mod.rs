// src/core/mod.rs - Task model and learning settings

pub mod settings;
pub mod task;
