//! Runner-state oracle: an optional capability that reports whether a
//! service's external runner currently considers itself busy.
//!
//! Entries registered with `use_runner_state` defer to this before the
//! elapsed-time check; a busy runner keeps the service alive no matter how
//! long since the last recorded activity.

use async_trait::async_trait;

/// Capability to query external runner business for a service id.
///
/// Implementations typically wrap an HTTP probe or an orchestrator handle;
/// queries may take arbitrary time and are never awaited while the registry
/// lock is held.
#[async_trait]
pub trait RunnerState: Send + Sync {
    /// Whether the runner behind `service_id` is currently busy.
    ///
    /// Returning an error means "state unknown": the watcher keeps the entry
    /// alive for that tick rather than firing on absent information.
    async fn is_busy(&self, service_id: &str) -> Result<bool, OracleError>;
}

/// Failure to determine runner state (backend unreachable, malformed reply).
#[derive(Debug)]
pub struct OracleError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl OracleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runner state unavailable: {}", self.message)
    }
}

impl std::error::Error for OracleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOracle(bool);

    #[async_trait]
    impl RunnerState for FixedOracle {
        async fn is_busy(&self, _service_id: &str) -> Result<bool, OracleError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_trait_is_object_safe() {
        let oracle: Box<dyn RunnerState> = Box::new(FixedOracle(true));
        assert!(oracle.is_busy("svc").await.unwrap());
    }

    #[test]
    fn test_oracle_error_display() {
        let err = OracleError::new("connection refused");
        assert_eq!(
            err.to_string(),
            "runner state unavailable: connection refused"
        );
    }

    #[test]
    fn test_oracle_error_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = OracleError::with_source("probe failed", io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
