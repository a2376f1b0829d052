//! Refresh listeners
//!
//! Callbacks invoked synchronously on the driver thread as an update
//! plan progresses. A panicking listener fails the transition: its state
//! may be corrupt, so the plan is marked failed and the error rethrown.

use super::{Blob, ReadApi};
use crate::engine::ReadStateEngine;
use std::sync::Arc;

/// Observes update plan execution. All methods default to no-ops.
pub trait RefreshListener: Send + Sync {
    /// A blob was read and applied.
    fn blob_loaded(&self, _blob: &Blob) {}

    /// A snapshot transition completed and a new API generation exists.
    /// Fired per snapshot blob, before the plan finishes.
    fn snapshot_applied(
        &self,
        _api: &Arc<ReadApi>,
        _engine: &Arc<ReadStateEngine>,
        _to_version: u64,
    ) {
    }

    /// A snapshot plan completed at `destination_version`.
    fn snapshot_update_occurred(
        &self,
        _api: &Arc<ReadApi>,
        _engine: &Arc<ReadStateEngine>,
        _destination_version: u64,
    ) {
    }

    /// A delta-only plan completed at `destination_version`.
    fn delta_update_occurred(
        &self,
        _api: &Arc<ReadApi>,
        _engine: &Arc<ReadStateEngine>,
        _destination_version: u64,
    ) {
    }
}
