//! # Delayed Upgrades
//!
//! Per-workload debounce of reload-triggering changes. The first delayed
//! change for a workload opens a batch and starts its one timer; changes
//! arriving inside the window merge into the batch; when the window closes
//! the whole batch is flushed as a single evaluation, producing one rollout
//! for the workload.
//!
//! The registry is process-wide shared state mutated by delivering tasks
//! (create/merge) and timer tasks (flush/delete), so every read-modify-write
//! happens under the registry lock. No I/O runs while the lock is held: the
//! flush snapshots the pending configs under the lock and performs all API
//! calls after releasing it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::change::ChangeConfig;
use crate::workload::WorkloadKind;

/// Identity of the workload a batch belongs to. Includes kind and namespace
/// so identically-named workloads never share a batch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
}

struct DelayedBatch {
    /// Pending changes keyed by resource name; a later change to the same
    /// resource replaces the earlier one, keeping only the latest hash.
    configs: HashMap<String, ChangeConfig>,
    /// Set while the flush is running. Exclusive: changes arriving now are
    /// dropped rather than merged or queued behind the flush.
    firing: bool,
}

/// Process-wide registry of delayed batches. Clones share the same
/// registry; timer tasks hold a clone so batches outlive any one caller.
#[derive(Clone)]
pub struct DelayedUpdates {
    window: Duration,
    batches: Arc<Mutex<HashMap<BatchKey, DelayedBatch>>>,
}

impl std::fmt::Debug for DelayedUpdates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedUpdates")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl DelayedUpdates {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            batches: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Queue a change for the workload identified by `key`. On the first
    /// change a batch is created and `flush` is armed to run when the window
    /// closes; later calls merge into the existing batch and their `flush`
    /// argument is discarded. Returns whether the change was accepted.
    pub fn enqueue<F, Fut>(&self, key: BatchKey, change: ChangeConfig, flush: F) -> bool
    where
        F: FnOnce(Vec<ChangeConfig>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut batches = self.lock();
        match batches.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let batch = entry.get_mut();
                if batch.firing {
                    warn!(
                        workload = %key.name,
                        namespace = %key.namespace,
                        resource = %change.resource_name,
                        "change arrived while batch is firing, dropping"
                    );
                    return false;
                }
                let resource_name = change.resource_name.clone();
                if batch.configs.insert(resource_name.clone(), change).is_some() {
                    debug!(
                        workload = %key.name,
                        resource = %resource_name,
                        "resource already queued, keeping latest content hash"
                    );
                } else {
                    info!(
                        workload = %key.name,
                        resource = %resource_name,
                        pending = batch.configs.len(),
                        "added change to delayed batch"
                    );
                }
                true
            }
            Entry::Vacant(entry) => {
                info!(
                    workload = %key.name,
                    namespace = %key.namespace,
                    resource = %change.resource_name,
                    window = ?self.window,
                    "opening delayed batch"
                );
                entry.insert(DelayedBatch {
                    configs: HashMap::from([(change.resource_name.clone(), change)]),
                    firing: false,
                });
                let registry = self.clone();
                let window = self.window;
                tokio::spawn(async move {
                    tokio::time::sleep(window).await;
                    registry.fire(key, flush).await;
                });
                true
            }
        }
    }

    async fn fire<F, Fut>(&self, key: BatchKey, flush: F)
    where
        F: FnOnce(Vec<ChangeConfig>) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        let snapshot = {
            let mut batches = self.lock();
            let Some(batch) = batches.get_mut(&key) else {
                warn!(workload = %key.name, "delayed batch disappeared before firing");
                return;
            };
            batch.firing = true;
            let mut configs: Vec<ChangeConfig> = batch.configs.values().cloned().collect();
            configs.sort_by(|a, b| a.resource_name.cmp(&b.resource_name));
            configs
        };

        debug!(
            workload = %key.name,
            pending = snapshot.len(),
            "delayed window closed, flushing"
        );
        flush(snapshot).await;

        self.lock().remove(&key);
        debug!(workload = %key.name, "delayed batch complete");
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BatchKey, DelayedBatch>> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
