//! Refresh driver
//!
//! The state machine applying an update plan: a snapshot transition
//! builds a fresh engine and publishes a new API generation with an
//! atomic pointer swap; deltas apply in place against the current
//! engine. Failures mark the plan's blobs in the failed-transition
//! tracker (every blob for a snapshot plan, the offending blob for a
//! delta plan) and, when the resident state was already mutated, poison
//! the engine until a snapshot succeeds.

use super::api::{DataAccessProxy, ReadApi, StaleReferenceDetector};
use super::listener::RefreshListener;
use super::tracker::FailedTransitionTracker;
use super::{Blob, UpdatePlan};
use crate::blob_reader::{read_delta, read_snapshot};
use crate::engine::ReadStateEngine;
use mosaic_core::{FilterConfig, MosaicError, MosaicResult, ReadEngineConfig};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Consumer update driver over a read state engine.
pub struct RefreshDriver {
    config: ReadEngineConfig,
    filter: FilterConfig,
    engine: RwLock<Arc<ReadStateEngine>>,
    proxy: RwLock<Option<Arc<DataAccessProxy>>>,
    current_api: RwLock<Option<Arc<ReadApi>>>,
    generation: AtomicU64,
    current_version: AtomicU64,
    poisoned: AtomicBool,
    tracker: FailedTransitionTracker,
    detector: StaleReferenceDetector,
    listeners: RwLock<Vec<Arc<dyn RefreshListener>>>,
}

impl RefreshDriver {
    /// Create a driver with no loaded state.
    pub fn new(config: ReadEngineConfig, filter: FilterConfig) -> RefreshDriver {
        RefreshDriver {
            engine: RwLock::new(Arc::new(ReadStateEngine::new(config.memory_mode))),
            config,
            filter,
            proxy: RwLock::new(None),
            current_api: RwLock::new(None),
            generation: AtomicU64::new(0),
            current_version: AtomicU64::new(0),
            poisoned: AtomicBool::new(false),
            tracker: FailedTransitionTracker::new(),
            detector: StaleReferenceDetector::new(),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a refresh listener.
    pub fn register_listener(&self, listener: Arc<dyn RefreshListener>) {
        self.listeners.write().push(listener);
    }

    /// The version of the last successfully applied blob (0 before any).
    pub fn current_version(&self) -> u64 {
        self.current_version.load(Ordering::Acquire)
    }

    /// The current read API generation, once a snapshot has been applied.
    pub fn read_api(&self) -> Option<Arc<ReadApi>> {
        self.current_api.read().clone()
    }

    /// The current state engine.
    pub fn engine(&self) -> Arc<ReadStateEngine> {
        self.engine.read().clone()
    }

    /// The failed-transition tracker.
    pub fn tracker(&self) -> &FailedTransitionTracker {
        &self.tracker
    }

    /// The stale-reference detector.
    pub fn stale_reference_detector(&self) -> &StaleReferenceDetector {
        &self.detector
    }

    /// Whether a failed transition left the engine unusable without a
    /// fresh snapshot.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Apply an update plan.
    ///
    /// Snapshot plans replace the engine and publish a new generation;
    /// delta plans mutate the current engine in place. On failure the
    /// plan's blobs are marked in the tracker and the error rethrown.
    pub fn update(&self, plan: &UpdatePlan) -> MosaicResult<()> {
        if plan.blobs().is_empty() {
            return Ok(());
        }

        // double-snapshot gate: reject known-failing plans before any I/O
        if self.config.double_snapshot.allow {
            if let Some(version) = self.tracker.first_failed_in(plan) {
                warn!(version, "plan rejected by failed-transition tracker");
                return Err(MosaicError::KnownFailingTransition { version });
            }
        }
        if self.is_poisoned() && !plan.is_snapshot_plan() {
            return Err(MosaicError::EnginePoisoned);
        }

        let mut mutated = false;
        let mut failing_blob = None;
        let result = self.run_plan(plan, &mut mutated, &mut failing_blob);

        match result {
            Ok(()) => {
                self.detector.sweep();
                self.current_version
                    .store(plan.destination_version(), Ordering::Release);
                info!(
                    destination = plan.destination_version(),
                    snapshot = plan.is_snapshot_plan(),
                    "update plan applied"
                );
                Ok(())
            }
            Err(err) => {
                if plan.is_snapshot_plan() {
                    for blob in plan.blobs() {
                        self.tracker.mark_failed(blob.to_version());
                    }
                } else if let Some(version) = failing_blob {
                    self.tracker.mark_failed(version);
                }
                if mutated && !err.is_pre_mutation() {
                    self.poisoned.store(true, Ordering::Release);
                }
                warn!(error = %err, "update plan failed");
                Err(err)
            }
        }
    }

    fn run_plan(
        &self,
        plan: &UpdatePlan,
        mutated: &mut bool,
        failing_blob: &mut Option<u64>,
    ) -> MosaicResult<()> {
        let mut remaining = plan.blobs();

        if plan.is_snapshot_plan() {
            let blob = &remaining[0];
            *failing_blob = Some(blob.to_version());
            self.apply_snapshot(blob, mutated)?;
            remaining = &remaining[1..];
        }

        for blob in remaining {
            *failing_blob = Some(blob.to_version());
            *mutated = true;
            let engine = self.engine();
            let mut input = blob.open()?;
            read_delta(&engine, &mut input, &self.filter)?;
            self.current_version
                .store(blob.to_version(), Ordering::Release);
            self.notify(|l| l.blob_loaded(blob))?;
        }

        // final listener notifications for the completed plan
        if let Some(api) = self.read_api() {
            let engine = self.engine();
            let version = plan.destination_version();
            if plan.is_snapshot_plan() {
                self.notify(|l| l.snapshot_update_occurred(&api, &engine, version))?;
            } else {
                self.notify(|l| l.delta_update_occurred(&api, &engine, version))?;
            }
        }
        Ok(())
    }

    fn apply_snapshot(&self, blob: &Blob, mutated: &mut bool) -> MosaicResult<()> {
        let mut input = blob.open()?;
        let new_engine = Arc::new(ReadStateEngine::new(self.config.memory_mode));
        read_snapshot(&new_engine, &mut input, &self.filter)?;

        // the snapshot read succeeded against a private engine; publish
        // it — everything past this point counts as a mutation
        *mutated = true;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let api = if self.config.object_longevity.enable_long_lived_object_support {
            let proxy = {
                let mut slot = self.proxy.write();
                slot.get_or_insert_with(|| Arc::new(DataAccessProxy::new(new_engine.clone())))
                    .clone()
            };
            proxy.swap(new_engine.clone());
            Arc::new(ReadApi::proxied(generation, proxy))
        } else {
            Arc::new(ReadApi::direct(generation, new_engine.clone()))
        };

        // wire the superseded generation into the historical chain, then
        // publish the new one with a pointer swap
        if let Some(previous) = self.current_api.read().clone() {
            previous.set_next(&api);
        }
        *self.engine.write() = new_engine.clone();
        *self.current_api.write() = Some(api.clone());
        self.detector.observe(&api);
        self.poisoned.store(false, Ordering::Release);
        self.current_version
            .store(blob.to_version(), Ordering::Release);

        self.notify(|l| l.blob_loaded(blob))?;
        self.notify(|l| l.snapshot_applied(&api, &new_engine, blob.to_version()))?;
        Ok(())
    }

    /// Invoke a callback on every listener, converting a panic into a
    /// transition failure.
    fn notify(&self, callback: impl Fn(&dyn RefreshListener)) -> MosaicResult<()> {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            catch_unwind(AssertUnwindSafe(|| callback(listener.as_ref()))).map_err(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "listener panicked".to_string());
                MosaicError::listener_failure(message)
            })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RefreshDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshDriver")
            .field("current_version", &self.current_version())
            .field("generation", &self.generation.load(Ordering::Acquire))
            .field("poisoned", &self.is_poisoned())
            .finish()
    }
}
