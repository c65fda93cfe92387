//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BrassConfig, DispatchConfig, LogOutput, LoggingConfig, PollingConfig};

/// Largest batch the platform accepts.
pub const MAX_POLL_LIMIT: u32 = 1000;

/// Validates the entire configuration.
pub fn validate_config(config: &BrassConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_polling_config(&config.polling)?;
    validate_dispatch_config(&config.dispatch)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }
    Ok(())
}

fn validate_polling_config(polling: &PollingConfig) -> ConfigResult<()> {
    if polling.timeout_secs == 0 {
        return Err(ConfigError::validation(
            "polling.timeout_secs must be greater than 0",
        ));
    }

    if polling.limit == 0 || polling.limit > MAX_POLL_LIMIT {
        return Err(ConfigError::validation(format!(
            "polling.limit must be between 1 and {MAX_POLL_LIMIT}, got {}",
            polling.limit
        )));
    }

    if polling.initial_backoff_ms == 0 {
        return Err(ConfigError::validation(
            "polling.initial_backoff_ms must be greater than 0",
        ));
    }

    if polling.max_backoff_ms < polling.initial_backoff_ms {
        return Err(ConfigError::validation(
            "polling.max_backoff_ms must be greater than or equal to polling.initial_backoff_ms",
        ));
    }

    Ok(())
}

fn validate_dispatch_config(dispatch: &DispatchConfig) -> ConfigResult<()> {
    if dispatch.queue_capacity == 0 {
        return Err(ConfigError::validation(
            "dispatch.queue_capacity must be greater than 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid(config: &BrassConfig) -> String {
        match validate_config(config) {
            Err(ConfigError::ValidationError { message }) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&BrassConfig::default()).is_ok());
    }

    #[test]
    fn test_polling_bounds() {
        let mut config = BrassConfig::default();
        config.polling.timeout_secs = 0;
        assert!(invalid(&config).contains("timeout_secs"));

        let mut config = BrassConfig::default();
        config.polling.limit = 0;
        assert!(invalid(&config).contains("limit"));
        config.polling.limit = MAX_POLL_LIMIT + 1;
        assert!(invalid(&config).contains("limit"));
        config.polling.limit = MAX_POLL_LIMIT;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_backoff_bounds() {
        let mut config = BrassConfig::default();
        config.polling.initial_backoff_ms = 0;
        assert!(invalid(&config).contains("initial_backoff_ms"));

        let mut config = BrassConfig::default();
        config.polling.initial_backoff_ms = 5000;
        config.polling.max_backoff_ms = 1000;
        assert!(invalid(&config).contains("max_backoff_ms"));
    }

    #[test]
    fn test_queue_capacity() {
        let mut config = BrassConfig::default();
        config.dispatch.queue_capacity = 0;
        assert!(invalid(&config).contains("queue_capacity"));
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = BrassConfig::default();
        config.logging.output = LogOutput::File;
        assert!(invalid(&config).contains("file_path"));

        config.logging.file_path = Some("brass.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
