//! Configuration for the Brass runtime.
//!
//! Layered loading with figment, a typed schema and validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BrassConfig, DispatchConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    PollingConfig, RetryConfig, SpanEventConfig,
};
pub use validation::validate_config;
