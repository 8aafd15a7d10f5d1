use crate::config::{
    ConfigError, ConfigSource, ConfigValidator, DurationValidator, LocationValidator,
};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Environment variable listing comma-separated property locations
pub const PROPERTIES_ENV: &str = "ELIF_MAIN_PROPERTIES";
/// Environment variable toggling fail-fast auto-configuration
pub const AUTOCONFIG_FAIL_FAST_ENV: &str = "ELIF_MAIN_AUTOCONFIG_FAIL_FAST";
/// Environment variable with the shutdown timeout in milliseconds
pub const SHUTDOWN_TIMEOUT_ENV: &str = "ELIF_MAIN_SHUTDOWN_TIMEOUT_MS";

/// Location loaded when nothing else is configured
pub const DEFAULT_PROPERTY_LOCATION: &str = "optional:application.properties";

/// Configuration trait for bootstrapper settings
pub trait MainConfigTrait: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Settings that drive how [`Main`](crate::bootstrap::Main) boots a context
#[derive(Debug, Clone)]
pub struct MainConfig {
    /// Property files to load, in order. Later files override earlier ones.
    pub property_locations: Vec<String>,
    /// Fail on unknown component attributes instead of skipping them
    pub auto_configuration_fail_fast: bool,
    /// Upper bound on how long `stop()` waits for in-flight exchanges
    pub shutdown_timeout: Duration,
}

impl MainConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self {
            property_locations: vec![DEFAULT_PROPERTY_LOCATION.to_string()],
            auto_configuration_fail_fast: true,
            shutdown_timeout: Duration::from_secs(10),
        }
    }

    /// Replace the property locations
    pub fn with_property_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property_locations = locations.into_iter().map(Into::into).collect();
        self
    }

    /// Choose between fail-fast and warn-and-skip auto-configuration
    pub fn with_auto_configuration_fail_fast(mut self, fail_fast: bool) -> Self {
        self.auto_configuration_fail_fast = fail_fast;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for MainConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MainConfigTrait for MainConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Ok(locations) = env::var(PROPERTIES_ENV) {
            config.property_locations = locations
                .split(',')
                .map(str::trim)
                .filter(|location| !location.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Ok(fail_fast) = env::var(AUTOCONFIG_FAIL_FAST_ENV) {
            config.auto_configuration_fail_fast =
                fail_fast.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: "auto_configuration_fail_fast".to_string(),
                    value: fail_fast.clone(),
                    expected: "true or false".to_string(),
                })?;
        }

        if let Ok(timeout) = env::var(SHUTDOWN_TIMEOUT_ENV) {
            let millis: u64 = timeout.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "shutdown_timeout".to_string(),
                value: timeout.clone(),
                expected: "timeout in milliseconds".to_string(),
            })?;
            config.shutdown_timeout = Duration::from_millis(millis);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        LocationValidator.validate(self.property_locations.as_slice())?;
        DurationValidator::new("shutdown_timeout").validate(&self.shutdown_timeout)?;
        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();

        sources.insert(
            "property_locations".to_string(),
            if env::var(PROPERTIES_ENV).is_ok() {
                ConfigSource::EnvVar(PROPERTIES_ENV.to_string())
            } else {
                ConfigSource::Default(DEFAULT_PROPERTY_LOCATION.to_string())
            },
        );

        sources.insert(
            "auto_configuration_fail_fast".to_string(),
            if env::var(AUTOCONFIG_FAIL_FAST_ENV).is_ok() {
                ConfigSource::EnvVar(AUTOCONFIG_FAIL_FAST_ENV.to_string())
            } else {
                ConfigSource::Default("true".to_string())
            },
        );

        sources.insert(
            "shutdown_timeout".to_string(),
            if env::var(SHUTDOWN_TIMEOUT_ENV).is_ok() {
                ConfigSource::EnvVar(SHUTDOWN_TIMEOUT_ENV.to_string())
            } else {
                ConfigSource::Default("10000".to_string())
            },
        );

        sources
    }
}
