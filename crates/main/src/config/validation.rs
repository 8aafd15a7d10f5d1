use std::time::Duration;
use thiserror::Error;

/// Configuration error type for [`MainConfig`](crate::config::MainConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }
}

/// Trait for validating configuration values
pub trait ConfigValidator<T: ?Sized> {
    /// Validate a configuration value
    fn validate(&self, value: &T) -> Result<(), ConfigError>;
}

/// Rejects zero and overly long durations
pub struct DurationValidator {
    pub field: &'static str,
    pub max: Duration,
}

impl DurationValidator {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            max: Duration::from_secs(3600),
        }
    }
}

impl ConfigValidator<Duration> for DurationValidator {
    fn validate(&self, value: &Duration) -> Result<(), ConfigError> {
        if value.is_zero() || *value > self.max {
            return Err(ConfigError::invalid_value(
                self.field,
                format!("{}ms", value.as_millis()),
                format!("duration between 1ms and {}ms", self.max.as_millis()),
            ));
        }
        Ok(())
    }
}

/// Validates property locations, optionally prefixed with `optional:`
pub struct LocationValidator;

impl ConfigValidator<[String]> for LocationValidator {
    fn validate(&self, value: &[String]) -> Result<(), ConfigError> {
        for location in value {
            let path = location.strip_prefix("optional:").unwrap_or(location);
            if path.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "property_locations",
                    location.clone(),
                    "non-empty file path",
                ));
            }
        }
        Ok(())
    }
}
