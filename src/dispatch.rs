//! Action dispatch: runs a registered one-shot callback off the scheduler's
//! critical path, isolating slow or panicking actions to their own entry.

use tracing::{debug, error};

/// One-shot callback invoked when a service's idle timeout fires.
///
/// The argument is `None` for a clean idle timeout. `Some` carries a
/// descriptive cause so orchestration layers can reuse the same callback
/// signature for abnormal exit paths they trigger themselves.
pub type IdleAction = Box<dyn FnOnce(Option<ExitError>) + Send + 'static>;

/// Descriptive cause handed to an [`IdleAction`] on a non-clean exit.
#[derive(Debug)]
pub struct ExitError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ExitError {
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

impl std::fmt::Display for ExitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Fire the action on the blocking pool so a callback that blocks (or takes
/// arbitrarily long) never stalls the tick scheduler or other entries.
///
/// A panic inside the action is contained to its blocking task; we await the
/// join handle from a watcher task purely to log it.
pub(crate) fn dispatch(service_id: String, action: IdleAction, cause: Option<ExitError>) {
    debug!(service_id = %service_id, "dispatching idle action");
    let handle = tokio::task::spawn_blocking(move || action(cause));
    tokio::spawn(async move {
        match handle.await {
            Ok(()) => debug!(service_id = %service_id, "idle action completed"),
            Err(join_err) if join_err.is_panic() => {
                error!(service_id = %service_id, "idle action panicked");
            }
            Err(join_err) => {
                error!(service_id = %service_id, error = %join_err, "idle action aborted");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_exit_error_display() {
        let err = ExitError::new("runner evicted");
        assert_eq!(err.to_string(), "runner evicted");
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn test_exit_error_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "no heartbeat");
        let err = ExitError::with_source("runner evicted", io);
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("no heartbeat"));
    }

    #[tokio::test]
    async fn test_dispatch_runs_action_with_cause() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        dispatch(
            "svc".to_string(),
            Box::new(move |cause| {
                *seen_clone.lock().unwrap() = Some(cause.map(|c| c.to_string()));
            }),
            Some(ExitError::new("forced stop")),
        );

        for _ in 0..100 {
            if seen.lock().unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            seen.lock().unwrap().take(),
            Some(Some("forced stop".to_string()))
        );
    }

    #[tokio::test]
    async fn test_dispatch_panic_is_contained() {
        // A panicking action must not take down the runtime or other dispatches.
        dispatch(
            "bad".to_string(),
            Box::new(|_| panic!("action blew up")),
            None,
        );

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        dispatch(
            "good".to_string(),
            Box::new(move |cause| {
                assert!(cause.is_none());
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
            None,
        );

        for _ in 0..100 {
            if count.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
