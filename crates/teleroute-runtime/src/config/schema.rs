//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use teleroute_framework::DispatchPolicy;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelerouteConfig {
    /// Logging subscriber settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Update loop settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Append to `file_path`.
    File,
}

/// How often the log file is rotated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle transitions are logged.
///
/// Each dispatch opens an `update` span and one `group` span per matched
/// handler group, so `new` and `close` are enough to see the dispatch tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging subscriber settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` takes precedence when set.
    pub level: LogLevel,

    pub format: LogFormat,

    pub output: LogOutput,

    pub span_events: SpanEventConfig,

    /// Per-target levels, e.g. `teleroute_framework = "debug"`.
    pub filters: HashMap<String, LogLevel>,

    /// Include thread ids in each line.
    pub thread_ids: bool,

    /// Include source file and line in each line.
    pub file_location: bool,

    /// Required when `output` is `file`.
    pub file_path: Option<PathBuf>,

    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            span_events: SpanEventConfig::default(),
            filters: HashMap::new(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::Never,
        }
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Update loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Seconds to sleep between two pulls from the update source.
    ///
    /// Signed so that a negative value from a file or the environment is
    /// reported by validation instead of failing to parse.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: i64,

    /// Whether every matching group or only the first one handles an update.
    #[serde(default)]
    pub policy: DispatchPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            policy: DispatchPolicy::default(),
        }
    }
}

fn default_poll_interval_secs() -> i64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Figment;
    use figment::providers::Serialized;

    #[test]
    fn test_defaults() {
        let config = TelerouteConfig::default();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.output, LogOutput::Stdout);
        assert_eq!(config.dispatch.poll_interval_secs, 1);
        assert_eq!(config.dispatch.policy, DispatchPolicy::FanOut);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: TelerouteConfig = Figment::new()
            .merge(Serialized::default("dispatch.policy", "first-match"))
            .merge(Serialized::default("logging.filters.teleroute_framework", "trace"))
            .extract()
            .unwrap();

        assert_eq!(config.dispatch.policy, DispatchPolicy::FirstMatch);
        assert_eq!(config.dispatch.poll_interval_secs, 1);
        assert_eq!(config.logging.filters["teleroute_framework"], LogLevel::Trace);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_level_conversion() {
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }
}
