//! Configuration management for runproc.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::{parse_secs, Args};
use crate::execution::ExecutorConfig;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Execution tunables.
    pub execution: ExecutionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Execution configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Time between SIGTERM and SIGKILL, in milliseconds.
    pub grace_window_ms: u64,
    /// Sleep between exit-status polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Bound on joining each drainer thread, in milliseconds.
    pub drain_join_timeout_ms: u64,
    /// Size of a single pipe read, in bytes.
    pub read_chunk_size: usize,
    /// Log the command and echo its output.
    pub verbose: bool,
    /// Timeout for commands run without an explicit one, in seconds.
    pub default_timeout_secs: Option<f64>,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            grace_window_ms: 1000,
            poll_interval_ms: 10,
            drain_join_timeout_ms: 1000,
            read_chunk_size: 1024,
            verbose: true,
            default_timeout_secs: None,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |key: &str| lookup(key)?.trim().parse::<u64>().ok();

        if let Some(ms) = millis("RUNPROC_GRACE_MS") {
            self.execution.grace_window_ms = ms;
        }

        if let Some(ms) = millis("RUNPROC_POLL_MS") {
            self.execution.poll_interval_ms = ms;
        }

        if let Some(timeout) = lookup("RUNPROC_TIMEOUT").as_deref().and_then(parse_secs) {
            self.execution.default_timeout_secs = Some(timeout.as_secs_f64());
        }

        if let Some(level) = lookup("RUNPROC_LOG_LEVEL").or_else(|| lookup("RUST_LOG")) {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if args.quiet {
            self.execution.verbose = false;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Validate and convert to the executor's runtime configuration.
    pub fn to_executor_config(&self) -> Result<ExecutorConfig, ConfigError> {
        let exec = &self.execution;

        if exec.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms", "must be positive".into()));
        }
        if exec.drain_join_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "drain_join_timeout_ms",
                "must be positive".into(),
            ));
        }
        if exec.read_chunk_size == 0 {
            return Err(ConfigError::Invalid("read_chunk_size", "must be positive".into()));
        }

        let default_timeout = match exec.default_timeout_secs {
            Some(secs) => Some(Duration::try_from_secs_f64(secs).map_err(|_| {
                ConfigError::Invalid("default_timeout_secs", format!("{secs} is not a duration"))
            })?),
            None => None,
        };

        Ok(ExecutorConfig {
            grace_window: Duration::from_millis(exec.grace_window_ms),
            poll_interval: Duration::from_millis(exec.poll_interval_ms),
            drain_join_timeout: Duration::from_millis(exec.drain_join_timeout_ms),
            chunk_size: exec.read_chunk_size,
            default_timeout,
        })
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing error.
    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is out of range.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
