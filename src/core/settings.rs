// src/core/settings.rs - Smart recurrence settings read by the learner

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Learning knobs. Read fresh on every analysis so edits apply immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartRecurrenceSettings {
    pub enabled: bool,
    pub auto_adjust: bool,
    pub min_completions_for_learning: usize,
    pub confidence_threshold: f64,
    pub sensitivity: Sensitivity,
    pub min_sample_size: usize,
    pub min_confidence: f64,
}

impl Default for SmartRecurrenceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_adjust: false,
            min_completions_for_learning: 5,
            confidence_threshold: 0.7,
            sensitivity: Sensitivity::default(),
            min_sample_size: 5,
            min_confidence: 0.75,
        }
    }
}

impl SmartRecurrenceSettings {
    /// Minimum number of recorded completions before any analysis runs.
    pub fn min_completions(&self) -> usize {
        self.min_completions_for_learning.max(self.min_sample_size)
    }

    /// Candidates scoring below this are discarded.
    pub fn effective_threshold(&self) -> f64 {
        let base = self.confidence_threshold.max(self.min_confidence);
        (base + self.sensitivity.margin()).min(1.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl Sensitivity {
    fn margin(self) -> f64 {
        match self {
            Sensitivity::Conservative => 0.10,
            Sensitivity::Balanced | Sensitivity::Aggressive => 0.0,
        }
    }
}

/// Zero-argument accessor for the current settings snapshot.
pub type SettingsSource = Arc<dyn Fn() -> SmartRecurrenceSettings + Send + Sync>;

/// A source that always yields the same settings.
pub fn fixed_settings(settings: SmartRecurrenceSettings) -> SettingsSource {
    Arc::new(move || settings.clone())
}
