//! Configuration for the teleroute runtime.
//!
//! Settings are layered with figment from built-in defaults, optional TOML or
//! YAML files and `TELEROUTE_*` environment variables, then validated.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    DispatchConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig,
    TelerouteConfig,
};
pub use validation::validate_config;
