//! Engine and consumer configuration
//!
//! Plain config structs with `Default` impls. All of these are set once at
//! consumer construction and never change for the lifetime of the engine.

use serde::{Deserialize, Serialize};

/// How type data is held in memory after a snapshot load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryMode {
    /// Eagerly copy blob bytes into engine-owned (recycler-pooled) buffers.
    OnHeap,
    /// Reference the memory-mapped region directly; pages fault in on
    /// first access.
    SharedMemoryLazy,
    /// Reference the memory-mapped region and prefault every page during
    /// the load, so reads never take a major fault.
    SharedMemoryEager,
}

impl MemoryMode {
    /// Whether type data aliases the mapped region rather than owning
    /// copies of it.
    pub fn is_shared(self) -> bool {
        matches!(
            self,
            MemoryMode::SharedMemoryLazy | MemoryMode::SharedMemoryEager
        )
    }
}

impl Default for MemoryMode {
    fn default() -> Self {
        MemoryMode::SharedMemoryLazy
    }
}

/// Controls whether a consumer may recover from a failed delta chain by
/// loading a fresh snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleSnapshotConfig {
    /// `true` to permit re-snapshot after delta failure. When enabled, a
    /// plan that intersects the failed-transition tracker is rejected up
    /// front instead of retried.
    pub allow: bool,
}

impl Default for DoubleSnapshotConfig {
    fn default() -> Self {
        DoubleSnapshotConfig { allow: true }
    }
}

/// Controls whether read-API handles remain usable across generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectLongevityConfig {
    /// `true` to route data access through a swappable proxy, so handles
    /// created against an old generation keep working after a snapshot
    /// replaces the engine state.
    pub enable_long_lived_object_support: bool,
}

/// Aggregate configuration for a read engine and its refresh driver.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReadEngineConfig {
    /// Memory residency for loaded type data.
    pub memory_mode: MemoryMode,
    /// Double-snapshot behavior.
    pub double_snapshot: DoubleSnapshotConfig,
    /// Long-lived handle behavior.
    pub object_longevity: ObjectLongevityConfig,
}
