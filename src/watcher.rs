//! Tick scheduler and the public watcher handle.
//!
//! One background driver task sweeps the registry every tick interval and
//! fires the action for any entry idle past its timeout. Callers interact
//! through [`IdleWatcher`], which never blocks beyond the registry lock.

use crate::config::{ConfigError, IdleTimeoutConfig, WatcherConfig};
use crate::dispatch::{self, IdleAction};
use crate::oracle::RunnerState;
use crate::registry::{IdleCandidate, Registry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Process-wide idle-timeout watcher.
///
/// Owns the registry and the background tick driver; the watcher itself is
/// the caller-facing handle. Must be constructed inside a tokio runtime.
/// Dropping it aborts the driver; [`IdleWatcher::shutdown`] stops it
/// gracefully.
pub struct IdleWatcher {
    registry: Arc<Registry>,
    shutdown: watch::Sender<bool>,
    driver: Option<JoinHandle<()>>,
}

impl IdleWatcher {
    /// Start a watcher with no runner-state oracle. Entries registered with
    /// `use_runner_state` fall back to the plain elapsed-time check.
    pub fn new(config: WatcherConfig) -> Self {
        Self::start(config, None)
    }

    /// Start a watcher that consults `oracle` for `use_runner_state` entries.
    pub fn with_oracle(config: WatcherConfig, oracle: Arc<dyn RunnerState>) -> Self {
        Self::start(config, Some(oracle))
    }

    fn start(config: WatcherConfig, oracle: Option<Arc<dyn RunnerState>>) -> Self {
        let registry = Arc::new(Registry::new());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let tick_interval = config.tick_interval();
        let driver = tokio::spawn(run_ticks(
            Arc::clone(&registry),
            oracle,
            tick_interval,
            shutdown_rx,
        ));
        debug!(
            tick_interval_millis = tick_interval.as_millis() as u64,
            "idle watcher started"
        );
        Self {
            registry,
            shutdown,
            driver: Some(driver),
        }
    }

    /// Watch a service: once it has gone `config.timeout` without recorded
    /// activity (and its runner, if consulted, is not busy), `action` is
    /// invoked exactly once with `None` and the entry is removed.
    ///
    /// Registering an already-watched id replaces the previous entry and
    /// resets its idle clock; the replaced action is dropped unfired.
    pub fn register(
        &self,
        config: IdleTimeoutConfig,
        action: IdleAction,
    ) -> Result<(), ConfigError> {
        config.validate()?;
        debug!(
            service_id = %config.service_id,
            timeout_millis = config.timeout.as_millis() as u64,
            use_runner_state = config.use_runner_state,
            "registering idle timeout"
        );
        self.registry.insert(config, action);
        Ok(())
    }

    /// Stop watching `service_id`. The action will not fire. A no-op for
    /// unknown ids, so this may race freely with auto-removal after firing.
    pub fn unregister(&self, service_id: &str) {
        debug!(service_id = %service_id, "unregistering idle timeout");
        self.registry.remove(service_id);
    }

    /// Reset the idle clock for `service_id`. Call on every observed sign of
    /// life. A no-op for unknown ids; never blocks on the scheduler.
    pub fn record_activity(&self, service_id: &str) {
        self.registry.record_activity(service_id);
    }

    /// Number of currently watched services.
    pub fn watched(&self) -> usize {
        self.registry.len()
    }

    /// Stop the tick driver and wait for it to exit. Entries that have not
    /// fired are dropped without invoking their actions; actions already
    /// dispatched run to completion on the blocking pool.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(driver) = self.driver.take() {
            let _ = driver.await;
        }
    }
}

impl Drop for IdleWatcher {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

async fn run_ticks(
    registry: Arc<Registry>,
    oracle: Option<Arc<dyn RunnerState>>,
    tick_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticks = tokio::time::interval(tick_interval);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticks.tick() => sweep(&registry, oracle.as_ref()),
            _ = shutdown.changed() => {
                debug!("idle watcher stopped");
                return;
            }
        }
    }
}

/// One pass over the registry. The scan itself never awaits: oracle queries
/// run in their own task per entry, so a slow oracle for one service cannot
/// delay idle checks for the others or push back subsequent ticks. Per-entry
/// failures never abort the sweep.
fn sweep(registry: &Arc<Registry>, oracle: Option<&Arc<dyn RunnerState>>) {
    for candidate in registry.candidates() {
        if candidate.use_runner_state {
            if let Some(oracle) = oracle {
                let registry = Arc::clone(registry);
                let oracle = Arc::clone(oracle);
                tokio::spawn(async move {
                    match oracle.is_busy(&candidate.service_id).await {
                        Ok(true) => {}
                        Ok(false) => fire_if_expired(&registry, candidate),
                        Err(err) => {
                            warn!(
                                service_id = %candidate.service_id,
                                error = %err,
                                "cannot determine runner state, keeping service active this tick"
                            );
                        }
                    }
                });
                continue;
            }
            // No oracle wired in: a static embedder choice, so idleness falls
            // back to elapsed time alone.
        }

        fire_if_expired(registry, candidate);
    }
}

/// Claim and dispatch a candidate that is past its timeout. The claim is
/// re-checked under the registry lock, so activity recorded since the
/// snapshot (or during the oracle query), a racing unregister, or an
/// overlapping evaluation of the same entry all suppress dispatch.
fn fire_if_expired(registry: &Registry, candidate: IdleCandidate) {
    if candidate.idle_for() < candidate.timeout {
        return;
    }

    if let Some(action) = registry.claim_expired(&candidate.service_id) {
        info!(
            service_id = %candidate.service_id,
            idle_millis = candidate.idle_for().as_millis() as u64,
            "service idle past timeout, firing action"
        );
        dispatch::dispatch(candidate.service_id, action, None);
    }
}
