//! Configuration for the recovery subsystem and its REST transport

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MIN_INACTIVITY_SECONDS: u64 = 10;
pub const MAX_INACTIVITY_SECONDS: u64 = 180;
/// One week.
pub const MAX_RECOVERY_EXECUTION_MINUTES: u64 = 7 * 24 * 60;

/// Tuning of the producer health checks and recovery watchdog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Longest tolerated silence of system alives, and longest tolerated
    /// processing / user-alive delay.
    pub max_inactivity_seconds: u64,
    /// Longest a full recovery may run before it is replaced. Also bounds
    /// how far back a recovery may be anchored.
    pub max_recovery_execution_minutes: u64,
    /// Node id sent with recovery requests so replies reach this SDK only.
    pub sdk_node_id: Option<i32>,
    /// Delay before the first health check after `open`.
    pub initial_delay_secs: u64,
    /// Period of the health checks.
    pub tick_period_secs: u64,
    /// Capacity of the outbound recovery message channel.
    pub message_channel_capacity: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_inactivity_seconds: 20,
            max_recovery_execution_minutes: 360,
            sdk_node_id: None,
            initial_delay_secs: 60,
            tick_period_secs: 10,
            message_channel_capacity: 64,
        }
    }
}

impl RecoveryConfig {
    pub fn with_max_inactivity_seconds(mut self, seconds: u64) -> Self {
        self.max_inactivity_seconds = seconds;
        self
    }

    pub fn with_max_recovery_execution_minutes(mut self, minutes: u64) -> Self {
        self.max_recovery_execution_minutes = minutes;
        self
    }

    pub fn with_sdk_node_id(mut self, node_id: i32) -> Self {
        self.sdk_node_id = Some(node_id);
        self
    }

    pub fn with_message_channel_capacity(mut self, capacity: usize) -> Self {
        self.message_channel_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_INACTIVITY_SECONDS..=MAX_INACTIVITY_SECONDS).contains(&self.max_inactivity_seconds) {
            return Err(ConfigError::InactivityOutOfRange {
                value: self.max_inactivity_seconds,
                min: MIN_INACTIVITY_SECONDS,
                max: MAX_INACTIVITY_SECONDS,
            });
        }
        if self.max_recovery_execution_minutes == 0 {
            return Err(ConfigError::ZeroRecoveryExecution);
        }
        if self.max_recovery_execution_minutes > MAX_RECOVERY_EXECUTION_MINUTES {
            return Err(ConfigError::RecoveryExecutionTooLong {
                value: self.max_recovery_execution_minutes,
                max: MAX_RECOVERY_EXECUTION_MINUTES,
            });
        }
        if self.message_channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        if self.tick_period_secs == 0 {
            return Err(ConfigError::ZeroTickPeriod);
        }
        Ok(())
    }

    pub fn max_inactivity_millis(&self) -> i64 {
        self.max_inactivity_seconds as i64 * 1_000
    }

    pub fn max_recovery_execution_millis(&self) -> i64 {
        self.max_recovery_execution_minutes as i64 * 60_000
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_period_secs)
    }
}

/// Feed environment the SDK connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Unknown,
    Integration,
    Production,
    Test,
}

impl Environment {
    pub fn api_host(&self) -> Result<&'static str, ConfigError> {
        match self {
            Environment::Integration => Ok("api-mq.integration.oddin.gg"),
            Environment::Production => Ok("api-mq.oddin.gg"),
            Environment::Test => Ok("api-mq-test.integration.oddin.gg"),
            Environment::Unknown => Err(ConfigError::UnknownEnvironment("api")),
        }
    }
}

/// Settings of the HTTP recovery transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub environment: Environment,
    /// Overrides the environment's API host, including scheme
    /// (e.g. "http://localhost:8081").
    pub forced_api_url: Option<String>,
    pub access_token: String,
    pub api_version: String,
    pub timeout_secs: u64,
    pub retry_count: u32,
    pub retry_delay_secs: u64,
}

impl ApiConfig {
    pub fn new(access_token: impl Into<String>, environment: Environment) -> Self {
        Self {
            environment,
            forced_api_url: None,
            access_token: access_token.into(),
            api_version: "v1".to_string(),
            timeout_secs: 10,
            retry_count: 3,
            retry_delay_secs: 10,
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.forced_api_url = Some(url.into());
        self
    }

    /// Base URL every recovery path is appended to.
    pub fn base_url(&self) -> Result<String, ConfigError> {
        let root = match &self.forced_api_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", self.environment.api_host()?),
        };
        Ok(format!("{}/{}", root, self.api_version))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RecoveryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_inactivity_millis(), 20_000);
        assert_eq!(config.max_recovery_execution_millis(), 360 * 60_000);
    }

    #[test]
    fn test_inactivity_out_of_range() {
        let config = RecoveryConfig::default().with_max_inactivity_seconds(5);
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::InactivityOutOfRange {
                value: 5,
                min: 10,
                max: 180
            }
        );
    }

    #[test]
    fn test_zero_channel_capacity_rejected() {
        let config = RecoveryConfig::default().with_message_channel_capacity(0);
        assert_eq!(config.validate().unwrap_err(), ConfigError::ZeroChannelCapacity);
    }

    #[test]
    fn test_recovery_execution_bounds() {
        let config = RecoveryConfig::default().with_max_recovery_execution_minutes(0);
        assert_eq!(config.validate().unwrap_err(), ConfigError::ZeroRecoveryExecution);

        let config = RecoveryConfig::default().with_max_recovery_execution_minutes(u64::MAX);
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::RecoveryExecutionTooLong {
                value: u64::MAX,
                max: MAX_RECOVERY_EXECUTION_MINUTES
            }
        );

        let config = RecoveryConfig::default()
            .with_max_recovery_execution_minutes(MAX_RECOVERY_EXECUTION_MINUTES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: RecoveryConfig =
            serde_json::from_str(r#"{"max_inactivity_seconds": 30, "sdk_node_id": 7}"#).unwrap();
        assert_eq!(config.max_inactivity_seconds, 30);
        assert_eq!(config.sdk_node_id, Some(7));
        assert_eq!(config.tick_period_secs, 10);
    }

    #[test]
    fn test_api_base_url() {
        let config = ApiConfig::new("token", Environment::Integration);
        assert_eq!(
            config.base_url().unwrap(),
            "https://api-mq.integration.oddin.gg/v1"
        );

        let forced = config.with_api_url("http://localhost:8081/");
        assert_eq!(forced.base_url().unwrap(), "http://localhost:8081/v1");
    }

    #[test]
    fn test_unknown_environment_has_no_endpoint() {
        let config = ApiConfig::new("token", Environment::Unknown);
        assert!(config.base_url().is_err());
    }
}
