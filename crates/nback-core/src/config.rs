use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::domain::ProgressionPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full engine configuration, fixed for the lifetime of one session.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NBackConfig {
    pub session: SessionConfig,
    pub scoring: ScoringConfig,
    pub timing: TimingConfig,
    pub stimuli: StimulusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Starting n-back depth. The training phases all run at this level.
    pub initial_n: u32,
    pub policy: ProgressionPolicy,
    /// Number of trials between progression evaluations.
    pub trials_per_block: u32,
    /// Minimum block accuracy required to advance under the Adaptive policy.
    pub accuracy_threshold: f32,
    /// Consecutive failed blocks tolerated before the session terminates.
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub points_correct: i32,
    /// Negative. A miss overwrites the trial total rather than accumulating.
    pub points_miss: i32,
    /// Negative.
    pub points_false_alarm: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// How long the response window stays open after stimulus onset.
    pub stimulus_duration_ms: u64,
    pub delay_between_stimuli_ms: u64,
    /// Pause shown between phases after an advancing block. Zero skips the
    /// transition message entirely.
    pub delay_between_phases_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StimulusConfig {
    /// Color palette; stimulus identity is the index into this table.
    pub colors: Vec<String>,
    /// Audio clip names; stimulus identity is the index into this table.
    pub audio_clips: Vec<String>,
    /// Number of grid cells available for spatial stimuli.
    pub cell_count: u16,
    /// Swatch the presentation layer uses for spatial (marker) highlights.
    pub spatial_highlight: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_n: 2,
            policy: ProgressionPolicy::Adaptive,
            trials_per_block: 20,
            accuracy_threshold: 0.85,
            max_consecutive_failures: 3,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            points_correct: 10,
            points_miss: -5,
            points_false_alarm: -5,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            stimulus_duration_ms: 1_500,
            delay_between_stimuli_ms: 1_000,
            delay_between_phases_ms: 2_000,
        }
    }
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            colors: vec![
                "Red".to_string(),
                "Green".to_string(),
                "Blue".to_string(),
                "Magenta".to_string(),
            ],
            audio_clips: vec!["C4".to_string(), "E4".to_string(), "G4".to_string()],
            cell_count: 16,
            spatial_highlight: "Yellow".to_string(),
        }
    }
}

impl NBackConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: NBackConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    /// Variables are prefixed with NBACK_, e.g. NBACK_TRIALS_PER_BLOCK=10.
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        use std::env;

        fn parse<T: std::str::FromStr>(var: &str, val: String) -> Result<T, ConfigError> {
            val.parse()
                .map_err(|_| ConfigError::Validation(format!("Invalid {}", var)))
        }

        if let Ok(val) = env::var("NBACK_INITIAL_N") {
            self.session.initial_n = parse("NBACK_INITIAL_N", val)?;
        }
        if let Ok(val) = env::var("NBACK_POLICY") {
            self.session.policy = parse("NBACK_POLICY", val)?;
        }
        if let Ok(val) = env::var("NBACK_TRIALS_PER_BLOCK") {
            self.session.trials_per_block = parse("NBACK_TRIALS_PER_BLOCK", val)?;
        }
        if let Ok(val) = env::var("NBACK_ACCURACY_THRESHOLD") {
            self.session.accuracy_threshold = parse("NBACK_ACCURACY_THRESHOLD", val)?;
        }
        if let Ok(val) = env::var("NBACK_MAX_CONSECUTIVE_FAILURES") {
            self.session.max_consecutive_failures =
                parse("NBACK_MAX_CONSECUTIVE_FAILURES", val)?;
        }
        if let Ok(val) = env::var("NBACK_STIMULUS_DURATION_MS") {
            self.timing.stimulus_duration_ms = parse("NBACK_STIMULUS_DURATION_MS", val)?;
        }
        if let Ok(val) = env::var("NBACK_DELAY_BETWEEN_STIMULI_MS") {
            self.timing.delay_between_stimuli_ms =
                parse("NBACK_DELAY_BETWEEN_STIMULI_MS", val)?;
        }
        if let Ok(val) = env::var("NBACK_DELAY_BETWEEN_PHASES_MS") {
            self.timing.delay_between_phases_ms = parse("NBACK_DELAY_BETWEEN_PHASES_MS", val)?;
        }
        if let Ok(val) = env::var("NBACK_CELL_COUNT") {
            self.stimuli.cell_count = parse("NBACK_CELL_COUNT", val)?;
        }

        Ok(())
    }

    /// Validate configuration values. A session must not start from an
    /// invalid draw space, so palette and count errors are rejected here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.initial_n == 0 {
            return Err(ConfigError::Validation(
                "session.initial_n must be >= 1".to_string(),
            ));
        }
        if self.session.trials_per_block == 0 {
            return Err(ConfigError::Validation(
                "session.trials_per_block must be > 0".to_string(),
            ));
        }
        if self.session.accuracy_threshold <= 0.0 || self.session.accuracy_threshold > 1.0 {
            return Err(ConfigError::Validation(
                "session.accuracy_threshold must be in (0, 1]".to_string(),
            ));
        }
        if self.session.max_consecutive_failures == 0 {
            return Err(ConfigError::Validation(
                "session.max_consecutive_failures must be > 0".to_string(),
            ));
        }

        if self.timing.stimulus_duration_ms == 0 {
            return Err(ConfigError::Validation(
                "timing.stimulus_duration_ms must be > 0".to_string(),
            ));
        }

        if self.stimuli.colors.is_empty() {
            return Err(ConfigError::Validation(
                "stimuli.colors must not be empty".to_string(),
            ));
        }
        if self.stimuli.colors.len() > 256 {
            return Err(ConfigError::Validation(
                "stimuli.colors must have at most 256 entries".to_string(),
            ));
        }
        if self.stimuli.audio_clips.is_empty() {
            return Err(ConfigError::Validation(
                "stimuli.audio_clips must not be empty".to_string(),
            ));
        }
        if self.stimuli.audio_clips.len() > 256 {
            return Err(ConfigError::Validation(
                "stimuli.audio_clips must have at most 256 entries".to_string(),
            ));
        }
        if self.stimuli.cell_count == 0 {
            return Err(ConfigError::Validation(
                "stimuli.cell_count must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Export configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
