use serde::Deserialize;
use std::time::Duration;

/// Default tick interval: how often the watcher sweeps the registry.
/// This bounds idle-detection latency; test suites override it to milliseconds.
pub const DEFAULT_TICK_INTERVAL_MILLIS: u64 = 5_000;

/// Watcher-wide settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Sweep interval in milliseconds.
    pub tick_interval_millis: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            tick_interval_millis: DEFAULT_TICK_INTERVAL_MILLIS,
        }
    }
}

impl WatcherConfig {
    /// The sweep interval as a `Duration`. A configured zero is clamped to
    /// 1ms so `tokio::time::interval` never panics on a zero period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_millis.max(1))
    }
}

/// Per-service registration: which service to watch, how long it may sit
/// idle, and whether its external runner gets a say in idleness.
#[derive(Debug, Clone)]
pub struct IdleTimeoutConfig {
    /// Opaque unique service identifier. Re-registering the same id replaces
    /// the previous entry.
    pub service_id: String,
    /// How long the service may go without recorded activity before its
    /// action fires. Immutable after registration.
    pub timeout: Duration,
    /// When true, a busy report from the runner-state oracle keeps the
    /// service alive regardless of elapsed time.
    pub use_runner_state: bool,
}

impl IdleTimeoutConfig {
    pub fn new(service_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            service_id: service_id.into(),
            timeout,
            use_runner_state: false,
        }
    }

    /// Defer idleness decisions to the runner-state oracle for this service.
    pub fn with_runner_state(mut self, enabled: bool) -> Self {
        self.use_runner_state = enabled;
        self
    }

    /// Fail-fast validation performed at registration time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_id.trim().is_empty() {
            return Err(ConfigError::EmptyServiceId);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout {
                service_id: self.service_id.clone(),
            });
        }
        Ok(())
    }
}

/// Registration-time configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The service id was empty or whitespace-only.
    EmptyServiceId,
    /// The timeout was zero; an entry that is always expired is a caller bug.
    ZeroTimeout { service_id: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EmptyServiceId => {
                write!(f, "idle timeout registration requires a non-empty service id")
            }
            ConfigError::ZeroTimeout { service_id } => {
                write!(
                    f,
                    "idle timeout for service {} must be greater than zero",
                    service_id
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watcher_config_default_interval() {
        let config = WatcherConfig::default();
        assert_eq!(config.tick_interval_millis, 5_000);
        assert_eq!(config.tick_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_watcher_config_zero_interval_clamped() {
        let config = WatcherConfig {
            tick_interval_millis: 0,
        };
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_watcher_config_from_toml() {
        let config: WatcherConfig = toml::from_str("tick_interval_millis = 250").unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_watcher_config_from_empty_toml_uses_defaults() {
        let config: WatcherConfig = toml::from_str("").unwrap();
        assert_eq!(config.tick_interval_millis, DEFAULT_TICK_INTERVAL_MILLIS);
    }

    #[test]
    fn test_valid_config_passes() {
        let config = IdleTimeoutConfig::new("kernel-1", Duration::from_secs(30));
        assert!(config.validate().is_ok());
        assert!(!config.use_runner_state);
    }

    #[test]
    fn test_with_runner_state_builder() {
        let config =
            IdleTimeoutConfig::new("kernel-1", Duration::from_secs(30)).with_runner_state(true);
        assert!(config.use_runner_state);
    }

    #[test]
    fn test_empty_service_id_rejected() {
        let config = IdleTimeoutConfig::new("", Duration::from_secs(30));
        assert_eq!(config.validate(), Err(ConfigError::EmptyServiceId));
    }

    #[test]
    fn test_whitespace_service_id_rejected() {
        let config = IdleTimeoutConfig::new("   ", Duration::from_secs(30));
        assert_eq!(config.validate(), Err(ConfigError::EmptyServiceId));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = IdleTimeoutConfig::new("kernel-1", Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout { .. }));
        assert!(err.to_string().contains("kernel-1"));
    }
}
