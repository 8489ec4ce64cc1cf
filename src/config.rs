//! Configuration file support for pickr
//!
//! Reads from .pickr/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Weekly allocation settings
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Tone matching settings
    #[serde(default)]
    pub tone: ToneConfig,

    /// Dispatcher settings
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Weekly allocation settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScheduleConfig {
    /// Hours of day that get a slot, every day of the week
    /// Default: [9, 12, 17]
    #[serde(default = "default_anchors")]
    pub anchors: Vec<u32>,

    /// Drafts taken from each topic when topics are plentiful
    /// Default: 3
    #[serde(default = "default_posts_per_topic")]
    pub posts_per_topic: usize,

    /// Only topics discovered within this many days are eligible
    /// Default: 7
    #[serde(default = "default_recency_days")]
    pub recency_days: i64,

    /// Posting timezone as a fixed offset from UTC, in minutes
    /// Default: 0
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Commit every placement at its slot time instead of leaving suggestions
    /// Default: false
    #[serde(default)]
    pub auto_accept: bool,
}

/// Tone matching settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ToneConfig {
    /// Writing samples shorter than this never trigger a rewrite
    /// Default: 200
    #[serde(default = "default_min_sample_chars")]
    pub min_sample_chars: usize,

    /// External command that rewrites text in a user's voice
    #[serde(default)]
    pub rewrite_command: Option<String>,
}

/// Dispatcher settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DispatchConfig {
    /// Seconds between dispatch cycles in watch mode
    /// Default: 300
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Commits further out than this many days are rejected
    /// Default: 90
    #[serde(default = "default_horizon_days")]
    pub horizon_days: i64,

    /// External command that publishes a post and prints its platform id
    #[serde(default)]
    pub publish_command: Option<String>,

    /// Stop selecting a send after this many failed publishes (0 = never)
    /// Default: 0
    #[serde(default)]
    pub max_failures: i32,

    /// Retry policy for rate limited collaborator calls
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Bounded exponential backoff for rate limited calls
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    /// Default: 3
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Default: 1000
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Default: 2.0
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_anchors() -> Vec<u32> {
    vec![9, 12, 17]
}

fn default_posts_per_topic() -> usize {
    3
}

fn default_recency_days() -> i64 {
    7
}

fn default_min_sample_chars() -> usize {
    200
}

fn default_interval_secs() -> u64 {
    300
}

fn default_horizon_days() -> i64 {
    90
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            anchors: default_anchors(),
            posts_per_topic: default_posts_per_topic(),
            recency_days: default_recency_days(),
            utc_offset_minutes: 0,
            auto_accept: false,
        }
    }
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            min_sample_chars: default_min_sample_chars(),
            rewrite_command: None,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            horizon_days: default_horizon_days(),
            publish_command: None,
            max_failures: 0,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl ScheduleConfig {
    /// Anchor hours in order, without repeats or out-of-range hours
    pub fn anchor_hours(&self) -> Vec<u32> {
        let mut hours: Vec<u32> = self.anchors.iter().copied().filter(|h| *h < 24).collect();
        hours.sort_unstable();
        hours.dedup();
        hours
    }

    /// Total post budget for one week: every anchor on every day
    pub fn weekly_budget(&self) -> usize {
        7 * self.anchor_hours().len()
    }
}

impl DispatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Config {
    /// Load config from .pickr/config.toml
    /// Returns default config if no file exists
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Find config.toml by walking up directory tree
    fn find_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut dir = current_dir.as_path();

        loop {
            let config_path = dir.join(".pickr").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        None
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.anchors.is_empty() {
            return Err(ConfigError::Invalid("schedule.anchors must not be empty".into()));
        }
        if let Some(hour) = self.schedule.anchors.iter().find(|h| **h > 23) {
            return Err(ConfigError::Invalid(format!("schedule.anchors: {} is not an hour of day", hour)));
        }
        let mut hours = self.schedule.anchors.clone();
        hours.sort_unstable();
        hours.dedup();
        if hours.len() != self.schedule.anchors.len() {
            return Err(ConfigError::Invalid("schedule.anchors must not repeat an hour".into()));
        }
        if self.schedule.posts_per_topic == 0 {
            return Err(ConfigError::Invalid("schedule.posts_per_topic must be at least 1".into()));
        }
        if self.schedule.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Invalid("schedule.utc_offset_minutes must be within a day".into()));
        }
        if self.dispatch.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("dispatch.retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schedule.anchors, vec![9, 12, 17]);
        assert_eq!(config.schedule.weekly_budget(), 21);
        assert_eq!(config.tone.min_sample_chars, 200);
        assert_eq!(config.dispatch.interval(), Duration::from_secs(300));
        assert_eq!(config.dispatch.horizon_days, 90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[schedule]
anchors = [8, 20]
auto_accept = true

[tone]
min_sample_chars = 1000

[dispatch.retry]
max_attempts = 5
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.schedule.weekly_budget(), 14);
        assert!(config.schedule.auto_accept);
        assert_eq!(config.schedule.posts_per_topic, 3);
        assert_eq!(config.tone.min_sample_chars, 1000);
        assert_eq!(config.dispatch.retry.max_attempts, 5);
        assert_eq!(config.dispatch.retry.initial_backoff_ms, 1000);
    }

    #[test]
    fn test_rejects_bad_anchor() {
        let config: Config = toml::from_str("[schedule]\nanchors = [9, 25]\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        // Unvalidated settings still never place a slot at a bad hour
        assert_eq!(config.schedule.anchor_hours(), vec![9]);
        assert_eq!(config.schedule.weekly_budget(), 7);

        let repeated: Config = toml::from_str("[schedule]\nanchors = [17, 9, 17]\n").unwrap();
        assert!(matches!(repeated.validate(), Err(ConfigError::Invalid(_))));
        assert_eq!(repeated.schedule.anchor_hours(), vec![9, 17]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dispatch]\ninterval_secs = 60\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.dispatch.interval_secs, 60);

        std::fs::write(&path, "[dispatch\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse { .. })));
    }
}
