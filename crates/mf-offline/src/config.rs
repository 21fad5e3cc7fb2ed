//! Configuration for offline mastering

use std::fs;
use std::path::{Path, PathBuf};

use mf_master::MasteringPreferences;
use mf_master::generator::DEFAULT_AI_STRENGTH;
use serde::{Deserialize, Serialize};

use crate::error::{OfflineError, OfflineResult};

/// Offline processing configuration.
///
/// Loaded from JSON; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfflineConfig {
    /// Number of worker threads (0 = auto)
    pub thread_count: usize,

    /// Directory searched for `<name>.wav` impulse responses
    pub impulse_response_dir: Option<PathBuf>,

    /// Preferences used when a job does not bring its own
    pub preferences: MasteringPreferences,

    /// Blend strength for AI candidates submitted without one (0-100)
    pub ai_strength: f64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            thread_count: 0, // Auto-detect
            impulse_response_dir: None,
            preferences: MasteringPreferences::default(),
            ai_strength: DEFAULT_AI_STRENGTH,
        }
    }
}

impl OfflineConfig {
    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> OfflineResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| OfflineError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> OfflineResult<()> {
        if !self.ai_strength.is_finite() || !(0.0..=100.0).contains(&self.ai_strength) {
            return Err(OfflineError::Config(format!(
                "aiStrength must be in 0..=100, got {}",
                self.ai_strength
            )));
        }
        Ok(())
    }

    /// Set thread count
    pub fn with_threads(mut self, count: usize) -> Self {
        self.thread_count = count;
        self
    }

    /// Set impulse response directory
    pub fn with_impulse_response_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.impulse_response_dir = Some(dir.into());
        self
    }

    /// Set default preferences
    pub fn with_preferences(mut self, preferences: MasteringPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Set default AI strength
    pub fn with_ai_strength(mut self, strength: f64) -> Self {
        self.ai_strength = strength;
        self
    }
}
