//! Process configuration surface.
//!
//! Deserialized from a TOML file by the binary and then overridden by command
//! line flags. Everything here is plain data; `validate` checks the values the
//! engine cannot work with.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::BatchSettings;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("batch_size must be positive")]
    InvalidBatchSize,

    #[error("flush_interval must be a positive number of seconds, got {0}")]
    InvalidFlushInterval(f64),

    #[error("unknown error policy '{0}' (expected 'fail' or 'log')")]
    UnknownErrorPolicy(String),
}

/// Identifier of a built-in error policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicyKind {
    /// Stop the loop on the first handler failure.
    #[default]
    Fail,

    /// Log the failure and carry on.
    Log,
}

impl FromStr for ErrorPolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(ErrorPolicyKind::Fail),
            "log" => Ok(ErrorPolicyKind::Log),
            other => Err(ConfigError::UnknownErrorPolicy(other.to_string())),
        }
    }
}

/// Connection parameters for the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispenserConfig {
    /// Pending items that force a flush.
    pub batch_size: usize,

    /// Maximum seconds a non-empty queue waits for a full batch.
    pub flush_interval: f64,

    /// Worker pool size; 0 runs handlers inline on the loop.
    pub workers: usize,

    /// Bound of the pool's task queue. Defaults to twice the worker count.
    pub pool_queue_capacity: Option<usize>,

    pub on_error: ErrorPolicyKind,

    pub store: StoreSettings,
}

impl Default for DispenserConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            flush_interval: 5.0,
            workers: 1,
            pool_queue_capacity: None,
            on_error: ErrorPolicyKind::Fail,
            store: StoreSettings::default(),
        }
    }
}

impl DispenserConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.batch_settings().map(|_| ())
    }

    pub fn batch_settings(&self) -> Result<BatchSettings, ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        let flush_interval = Duration::try_from_secs_f64(self.flush_interval)
            .ok()
            .filter(|d| !d.is_zero() && *d <= BatchSettings::MAX_FLUSH_INTERVAL)
            .ok_or(ConfigError::InvalidFlushInterval(self.flush_interval))?;
        Ok(BatchSettings::new(self.batch_size, flush_interval))
    }

    pub fn pool_queue_capacity(&self) -> usize {
        self.pool_queue_capacity
            .unwrap_or(self.workers.saturating_mul(2))
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = DispenserConfig::default();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.flush_interval, 5.0);
        assert_eq!(config.workers, 1);
        assert_eq!(config.on_error, ErrorPolicyKind::Fail);
        assert_eq!(config.store.port, 6379);
        assert_eq!(config.pool_queue_capacity(), 2);
    }

    #[test]
    fn batch_settings_convert_seconds() {
        let config = DispenserConfig {
            batch_size: 4,
            flush_interval: 1.5,
            ..Default::default()
        };
        let settings = config.batch_settings().unwrap();
        assert_eq!(settings.batch_size, 4);
        assert_eq!(settings.flush_interval, Duration::from_millis(1500));
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case::beyond_max(BatchSettings::MAX_FLUSH_INTERVAL.as_secs_f64() + 1.0)]
    #[case::overflows_instant(1e19)]
    fn rejects_bad_flush_interval(#[case] secs: f64) {
        let config = DispenserConfig {
            flush_interval: secs,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFlushInterval(_))
        ));
    }

    #[test]
    fn accepts_max_flush_interval() {
        let config = DispenserConfig {
            flush_interval: BatchSettings::MAX_FLUSH_INTERVAL.as_secs_f64(),
            ..Default::default()
        };
        assert_eq!(
            config.batch_settings().unwrap().flush_interval,
            BatchSettings::MAX_FLUSH_INTERVAL
        );
    }

    #[test]
    fn rejects_zero_batch_size() {
        let config = DispenserConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidBatchSize));
    }

    #[rstest]
    #[case("fail", Ok(ErrorPolicyKind::Fail))]
    #[case("log", Ok(ErrorPolicyKind::Log))]
    #[case("retry", Err(ConfigError::UnknownErrorPolicy("retry".into())))]
    fn parses_error_policy(#[case] raw: &str, #[case] expected: Result<ErrorPolicyKind, ConfigError>) {
        assert_eq!(raw.parse::<ErrorPolicyKind>(), expected);
    }

    #[test]
    fn deserializes_partial_json() {
        let config: DispenserConfig =
            serde_json::from_value(serde_json::json!({"batch_size": 3, "on_error": "log", "store": {"port": 7000}}))
                .unwrap();
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.on_error, ErrorPolicyKind::Log);
        assert_eq!(config.store.port, 7000);
        assert_eq!(config.store.host, "127.0.0.1");
        assert_eq!(config.flush_interval, 5.0);
    }
}
