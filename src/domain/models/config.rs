//! Application configuration model.

use serde::{Deserialize, Serialize};

use super::run_config::{LearningAlgorithmKind, StepBudget};

/// Main configuration structure for statelearner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Defaults applied to new learning runs
    #[serde(default)]
    pub learner: LearnerConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".statelearner/statelearner.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_retention_days() -> u32 {
    14
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            retention_days: default_retention_days(),
        }
    }
}

/// What a resumed run does with the membership cache of the run it continues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeCachePolicy {
    /// Start from an empty cache.
    #[default]
    Fresh,
    /// Reuse the entries collected by the previous run in this process.
    CarryOver,
}

/// Learner defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LearnerConfig {
    /// Algorithm used when a run does not name one
    #[serde(default)]
    pub default_algorithm: LearningAlgorithmKind,

    /// Step budget used when a run does not set one
    #[serde(default)]
    pub default_max_steps: StepBudget,

    /// Whether membership queries are cached by default
    #[serde(default = "default_use_mq_cache")]
    pub use_mq_cache: bool,

    /// Cache handling on resume
    #[serde(default)]
    pub resume_cache: ResumeCachePolicy,
}

const fn default_use_mq_cache() -> bool {
    true
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            default_algorithm: LearningAlgorithmKind::default(),
            default_max_steps: StepBudget::default(),
            use_mq_cache: default_use_mq_cache(),
            resume_cache: ResumeCachePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.database.path, ".statelearner/statelearner.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.learner.resume_cache, ResumeCachePolicy::Fresh);
        assert!(config.learner.default_max_steps.is_unbounded());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "learner:\n  resume_cache: carry_over\n  default_algorithm: dhc\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.learner.resume_cache, ResumeCachePolicy::CarryOver);
        assert_eq!(config.learner.default_algorithm, LearningAlgorithmKind::Dhc);
        assert!(config.learner.use_mq_cache);
        assert_eq!(config.database.max_connections, 5);
    }
}
