//! Idle-timeout watching for long-running interactive services.
//!
//! An [`IdleWatcher`] monitors independently registered services (notebook
//! kernels, visualization servers, command shells) and fires a caller-supplied
//! one-shot action when a service has gone longer than its configured timeout
//! without recorded activity. A single background task sweeps the registry on
//! a fixed tick interval, which bounds detection latency; per-service timers
//! are deliberately avoided.
//!
//! Services whose liveness is not fully visible through activity recording
//! can opt into the [`RunnerState`] oracle: while the oracle reports the
//! service's external runner as busy, the service is treated as active
//! regardless of elapsed time.
//!
//! ```no_run
//! use idlewatch::{IdleTimeoutConfig, IdleWatcher, WatcherConfig};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let watcher = IdleWatcher::new(WatcherConfig::default());
//! watcher
//!     .register(
//!         IdleTimeoutConfig::new("kernel-1", Duration::from_secs(600)),
//!         Box::new(|_cause| {
//!             // tear the kernel's container down
//!         }),
//!     )
//!     .expect("valid registration");
//!
//! // On every observed sign of life:
//! watcher.record_activity("kernel-1");
//! # }
//! ```

mod config;
mod dispatch;
mod oracle;
mod registry;
mod watcher;

pub use config::{ConfigError, IdleTimeoutConfig, WatcherConfig, DEFAULT_TICK_INTERVAL_MILLIS};
pub use dispatch::{ExitError, IdleAction};
pub use oracle::{OracleError, RunnerState};
pub use watcher::IdleWatcher;
