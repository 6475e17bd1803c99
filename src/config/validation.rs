use thiserror::Error;

use super::models::Config;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("processor.storage_dir must not be empty")]
    EmptyStorageDir,

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
}

/// Sanity checks over a loaded configuration. Defaults always pass.
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.processor.storage_dir.as_os_str().is_empty() {
        return Err(ValidationError::EmptyStorageDir);
    }
    if config.processor.scan_interval_ms == 0 {
        return Err(ValidationError::ZeroValue {
            field: "processor.scan_interval_ms",
        });
    }
    if config.processor.poll_interval_ms == 0 {
        return Err(ValidationError::ZeroValue {
            field: "processor.poll_interval_ms",
        });
    }
    if config.processor.request_timeout_ms == 0 {
        return Err(ValidationError::ZeroValue {
            field: "processor.request_timeout_ms",
        });
    }
    if config.notifier.concurrency == 0 {
        return Err(ValidationError::ZeroValue {
            field: "notifier.concurrency",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate(&Config::default()), Ok(()));
    }

    #[test]
    fn empty_storage_dir_is_rejected() {
        let mut config = Config::default();
        config.processor.storage_dir = "".into();
        assert_eq!(validate(&config), Err(ValidationError::EmptyStorageDir));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let mut config = Config::default();
        config.processor.poll_interval_ms = 0;
        assert_eq!(
            validate(&config),
            Err(ValidationError::ZeroValue {
                field: "processor.poll_interval_ms"
            })
        );

        let mut config = Config::default();
        config.notifier.concurrency = 0;
        assert_eq!(
            validate(&config),
            Err(ValidationError::ZeroValue {
                field: "notifier.concurrency"
            })
        );
    }
}
