use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - At least one sync worker
/// - Non-negative defer window
/// - A yt-dlp binary is named
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.sync.thread_limit == 0 {
        return Err(ConfigError::ValidationError(
            "sync.thread_limit must be at least 1".to_string(),
        ));
    }

    if !config.sync.defer_hours.is_finite() || config.sync.defer_hours < 0.0 {
        return Err(ConfigError::ValidationError(
            "sync.defer_hours must be a non-negative number".to_string(),
        ));
    }

    if config.ytdlp.binary.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "ytdlp.binary cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_threads_fails() {
        let mut config = Config::default();
        config.sync.thread_limit = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_negative_defer_fails() {
        let mut config = Config::default();
        config.sync.defer_hours = -1.0;
        assert!(validate_config(&config).is_err());
    }
}
