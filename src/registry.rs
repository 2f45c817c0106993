//! Timeout registry: the shared map from service id to its timeout entry,
//! plus the activity-recording write path.
//!
//! The mutex is held only for map reads/writes, never across an await or a
//! callback, so recording activity for one service can never be stalled by a
//! slow oracle query or action dispatch for another.

use crate::config::IdleTimeoutConfig;
use crate::dispatch::IdleAction;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// One registered service.
struct ServiceEntry {
    timeout: Duration,
    use_runner_state: bool,
    /// Forward-only: refreshed to `Instant::now()` on every recorded activity.
    last_activity: Instant,
    action: Option<IdleAction>,
}

/// Read-only snapshot of an entry, taken at the start of a sweep so the
/// idle evaluation (including oracle queries) runs outside the lock.
#[derive(Debug, Clone)]
pub(crate) struct IdleCandidate {
    pub service_id: String,
    pub timeout: Duration,
    pub use_runner_state: bool,
    pub last_activity: Instant,
}

impl IdleCandidate {
    /// Elapsed time since the snapshotted activity timestamp.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

/// Concurrent map of watched services. Constructed once per watcher and
/// shared between the caller-facing handle and the tick driver.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Mutex<HashMap<String, ServiceEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recover from poisoning rather than propagating a panic from some
    /// unrelated thread; the map itself stays coherent because every
    /// critical section is a handful of map operations.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ServiceEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace the entry for `config.service_id`, resetting its
    /// idle clock.
    pub fn insert(&self, config: IdleTimeoutConfig, action: IdleAction) {
        let entry = ServiceEntry {
            timeout: config.timeout,
            use_runner_state: config.use_runner_state,
            last_activity: Instant::now(),
            action: Some(action),
        };
        self.lock().insert(config.service_id, entry);
    }

    /// Remove the entry for `service_id`. A no-op for unknown ids, so callers
    /// may race freely with auto-removal after firing.
    pub fn remove(&self, service_id: &str) {
        self.lock().remove(service_id);
    }

    /// Refresh the idle clock for `service_id`. A no-op for unknown ids.
    pub fn record_activity(&self, service_id: &str) {
        if let Some(entry) = self.lock().get_mut(service_id) {
            entry.last_activity = Instant::now();
        }
    }

    /// Snapshot all entries for one sweep.
    pub fn candidates(&self) -> Vec<IdleCandidate> {
        self.lock()
            .iter()
            .map(|(service_id, entry)| IdleCandidate {
                service_id: service_id.clone(),
                timeout: entry.timeout,
                use_runner_state: entry.use_runner_state,
                last_activity: entry.last_activity,
            })
            .collect()
    }

    /// Atomically claim an expired entry: verify under the lock that it still
    /// exists and is still past its timeout (activity recorded since the
    /// snapshot suppresses the claim), then remove it and hand the owned
    /// action to the caller.
    ///
    /// Removal is the claim: whichever of two overlapping evaluations (or a
    /// racing unregister) takes the lock first wins, so the action is
    /// invoked at most once.
    pub fn claim_expired(&self, service_id: &str) -> Option<IdleAction> {
        let mut entries = self.lock();
        let entry = entries.get(service_id)?;
        if entry.last_activity.elapsed() < entry.timeout {
            return None;
        }
        entries.remove(service_id).and_then(|e| e.action)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
