//! Read API generations
//!
//! Each successful snapshot publishes a new `ReadApi` generation.
//! Readers acquire a strong handle for the duration of a read; a
//! superseded generation is destroyed once its last reader departs.
//!
//! Superseded generations form a singly-linked historical chain through
//! weak `next` references, so old handles can locate their successor
//! without pinning it, and a dropped predecessor detaches on the next
//! cleanup pass. The stale-reference detector observes every handle the
//! driver creates and reports how many superseded generations user code
//! still keeps reachable.

use crate::engine::ReadStateEngine;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};

/// Swappable data-access indirection used when long-lived object support
/// is enabled: handles route reads through the proxy, so a snapshot that
/// replaces the engine keeps old handles working against the new state.
pub struct DataAccessProxy {
    current: RwLock<Arc<ReadStateEngine>>,
}

impl DataAccessProxy {
    pub(crate) fn new(engine: Arc<ReadStateEngine>) -> DataAccessProxy {
        DataAccessProxy {
            current: RwLock::new(engine),
        }
    }

    /// The engine currently behind the proxy.
    pub fn engine(&self) -> Arc<ReadStateEngine> {
        self.current.read().clone()
    }

    pub(crate) fn swap(&self, engine: Arc<ReadStateEngine>) {
        *self.current.write() = engine;
    }
}

enum DataAccess {
    Direct(Arc<ReadStateEngine>),
    Proxied(Arc<DataAccessProxy>),
}

/// A read handle over one API generation.
pub struct ReadApi {
    generation: u64,
    access: DataAccess,
    next: RwLock<Option<Weak<ReadApi>>>,
}

impl ReadApi {
    pub(crate) fn direct(generation: u64, engine: Arc<ReadStateEngine>) -> ReadApi {
        ReadApi {
            generation,
            access: DataAccess::Direct(engine),
            next: RwLock::new(None),
        }
    }

    pub(crate) fn proxied(generation: u64, proxy: Arc<DataAccessProxy>) -> ReadApi {
        ReadApi {
            generation,
            access: DataAccess::Proxied(proxy),
            next: RwLock::new(None),
        }
    }

    /// The generation counter of this handle (1 for the first snapshot).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The state engine behind this handle. Direct handles pin their
    /// generation's engine; proxied handles follow the proxy to the
    /// current one.
    pub fn engine(&self) -> Arc<ReadStateEngine> {
        match &self.access {
            DataAccess::Direct(engine) => engine.clone(),
            DataAccess::Proxied(proxy) => proxy.engine(),
        }
    }

    /// Whether this handle routes through the long-lived-object proxy.
    pub fn is_proxied(&self) -> bool {
        matches!(self.access, DataAccess::Proxied(_))
    }

    /// The generation that superseded this one, if it is still alive.
    pub fn next_generation(&self) -> Option<Arc<ReadApi>> {
        self.next.read().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set_next(&self, next: &Arc<ReadApi>) {
        *self.next.write() = Some(Arc::downgrade(next));
    }
}

impl std::fmt::Debug for ReadApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadApi")
            .field("generation", &self.generation)
            .field("proxied", &self.is_proxied())
            .finish()
    }
}

/// Observes every API handle through a weak reference and surfaces how
/// many superseded generations remain reachable.
#[derive(Default)]
pub struct StaleReferenceDetector {
    observed: Mutex<Vec<(u64, Weak<ReadApi>)>>,
}

impl StaleReferenceDetector {
    /// Create an empty detector.
    pub fn new() -> StaleReferenceDetector {
        StaleReferenceDetector::default()
    }

    /// Observe a newly created handle.
    pub fn observe(&self, api: &Arc<ReadApi>) {
        self.observed
            .lock()
            .push((api.generation(), Arc::downgrade(api)));
    }

    /// Handles from generations before `current_generation` that user
    /// code still keeps reachable.
    pub fn stale_handle_count(&self, current_generation: u64) -> usize {
        self.observed
            .lock()
            .iter()
            .filter(|(generation, weak)| {
                *generation < current_generation && weak.upgrade().is_some()
            })
            .count()
    }

    /// Drop bookkeeping for handles that are gone.
    pub fn sweep(&self) {
        self.observed
            .lock()
            .retain(|(_, weak)| weak.upgrade().is_some());
    }

    /// Number of handles still tracked.
    pub fn observed_count(&self) -> usize {
        self.observed.lock().len()
    }
}
