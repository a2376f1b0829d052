//! Read state engine
//!
//! The registry of typed read states, their wiring to schemas, the
//! shared memory recycler, and the lifecycle notifications they publish.
//!
//! Concurrency model: single-writer, single reader generation. Updates
//! run on one driver; any number of reader threads may traverse the
//! state after `notify_end_update` returns. During an update no
//! concurrent reader may observe intermediate state; enforcement is the
//! embedder's contract.

use crate::index::PrimaryKeyIndex;
use crate::read_state::TypeReadState;
use mosaic_core::{MemoryMode, MosaicError, MosaicResult};
use mosaic_format::SegmentRecycler;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Registry of typed read states plus the engine-wide state a snapshot
/// or delta carries: the randomized tag and the header tags.
pub struct ReadStateEngine {
    memory_mode: MemoryMode,
    recycler: SegmentRecycler,
    type_states: RwLock<FxHashMap<String, Arc<TypeReadState>>>,
    /// Registration order, for deterministic iteration.
    order: RwLock<Vec<String>>,
    randomized_tag: AtomicU64,
    header_tags: RwLock<BTreeMap<String, String>>,
    indexes: RwLock<FxHashMap<String, Arc<PrimaryKeyIndex>>>,
}

impl ReadStateEngine {
    /// Create an empty engine.
    pub fn new(memory_mode: MemoryMode) -> ReadStateEngine {
        ReadStateEngine {
            memory_mode,
            recycler: SegmentRecycler::new(),
            type_states: RwLock::new(FxHashMap::default()),
            order: RwLock::new(Vec::new()),
            randomized_tag: AtomicU64::new(0),
            header_tags: RwLock::new(BTreeMap::new()),
            indexes: RwLock::new(FxHashMap::default()),
        }
    }

    /// Memory residency for type data loaded into this engine.
    pub fn memory_mode(&self) -> MemoryMode {
        self.memory_mode
    }

    /// The shared segment recycler.
    pub fn recycler(&self) -> &SegmentRecycler {
        &self.recycler
    }

    /// Register a populated type state. Names are unique within a blob,
    /// so a second registration under the same name is a malformed blob.
    pub fn add_type_state(&self, state: Arc<TypeReadState>) -> MosaicResult<()> {
        let name = state.type_name().to_string();
        let mut states = self.type_states.write();
        if states.contains_key(&name) {
            return Err(MosaicError::malformed(format!(
                "duplicate schema name {:?}",
                name
            )));
        }
        states.insert(name.clone(), state);
        self.order.write().push(name);
        Ok(())
    }

    /// Look up a type state by name.
    pub fn type_state(&self, name: &str) -> Option<Arc<TypeReadState>> {
        self.type_states.read().get(name).cloned()
    }

    /// Registered type names, in registration order.
    pub fn type_names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Registered type states, in registration order.
    pub fn type_states(&self) -> Vec<Arc<TypeReadState>> {
        let states = self.type_states.read();
        self.order
            .read()
            .iter()
            .filter_map(|name| states.get(name).cloned())
            .collect()
    }

    /// Resolve cross-type references (a list's element type, an object's
    /// reference fields) so downstream accessors can follow them by
    /// pointer. A referenced type the filter excluded stays unwired.
    pub fn wire_type_states_to_schemas(&self) {
        let states = self.type_states.read();
        for state in states.values() {
            for referenced in state.schema().referenced_types() {
                if let Some(target) = states.get(referenced) {
                    state.wire_reference(referenced, Arc::downgrade(target));
                }
            }
        }
    }

    /// Build derived indexes for types that declared primary keys.
    /// Invoked once after the first snapshot.
    pub fn after_initialization(&self) -> MosaicResult<()> {
        let mut indexes = self.indexes.write();
        for state in self.type_states() {
            if let Some(index) = PrimaryKeyIndex::build(&state)? {
                debug!(
                    type_name = state.type_name(),
                    keys = index.len(),
                    "built primary-key index"
                );
                indexes.insert(state.type_name().to_string(), Arc::new(index));
            }
        }
        Ok(())
    }

    /// The primary-key index of a type, if one was built.
    pub fn primary_key_index(&self, type_name: &str) -> Option<Arc<PrimaryKeyIndex>> {
        self.indexes.read().get(type_name).cloned()
    }

    /// Broadcast begin-update to every type state's listeners.
    pub fn notify_begin_update(&self) {
        for state in self.type_states() {
            state.notify_begin_update();
        }
    }

    /// Broadcast end-update to every type state's listeners.
    pub fn notify_end_update(&self) {
        for state in self.type_states() {
            state.notify_end_update();
        }
    }

    /// The randomized tag of the currently resident state.
    pub fn randomized_tag(&self) -> u64 {
        self.randomized_tag.load(Ordering::Acquire)
    }

    /// Replace the randomized tag (snapshot or delta ingest).
    pub fn set_randomized_tag(&self, tag: u64) {
        self.randomized_tag.store(tag, Ordering::Release);
    }

    /// The header tags of the currently resident state.
    pub fn header_tags(&self) -> BTreeMap<String, String> {
        self.header_tags.read().clone()
    }

    /// Replace the header tags (snapshot or delta ingest).
    pub fn set_header_tags(&self, tags: BTreeMap<String, String>) {
        *self.header_tags.write() = tags;
    }
}

impl std::fmt::Debug for ReadStateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStateEngine")
            .field("memory_mode", &self.memory_mode)
            .field("types", &self.order.read().len())
            .field("randomized_tag", &self.randomized_tag())
            .finish()
    }
}
