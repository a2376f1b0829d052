//! Consumer update driver
//!
//! Applies update plans — a snapshot transition optionally followed by
//! deltas — to a read state engine: tracks failed transitions, gates
//! double-snapshots, publishes read-API generations, and notifies
//! refresh listeners.

mod api;
mod driver;
mod listener;
mod tracker;

pub use api::{DataAccessProxy, ReadApi, StaleReferenceDetector};
pub use driver::RefreshDriver;
pub use listener::RefreshListener;
pub use tracker::FailedTransitionTracker;

use mosaic_core::{MosaicError, MosaicResult};
use mosaic_format::BlobInput;
use std::path::PathBuf;
use std::sync::Arc;

/// Whether a blob reinitializes state or transitions it incrementally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    /// Full reinitialization blob
    Snapshot,
    /// Incremental update blob
    Delta,
}

#[derive(Debug, Clone)]
enum BlobSource {
    File(PathBuf),
    Memory(Arc<Vec<u8>>),
}

/// One blob of an update plan: its kind, the versions it transitions
/// between, and where its bytes live.
///
/// The destination version is the blob's identity in the
/// failed-transition tracker.
#[derive(Debug, Clone)]
pub struct Blob {
    kind: BlobKind,
    from_version: u64,
    to_version: u64,
    source: BlobSource,
}

impl Blob {
    /// A snapshot blob file producing `to_version`.
    pub fn snapshot(to_version: u64, path: impl Into<PathBuf>) -> Blob {
        Blob {
            kind: BlobKind::Snapshot,
            from_version: 0,
            to_version,
            source: BlobSource::File(path.into()),
        }
    }

    /// A delta blob file transitioning `from_version` to `to_version`.
    pub fn delta(from_version: u64, to_version: u64, path: impl Into<PathBuf>) -> Blob {
        Blob {
            kind: BlobKind::Delta,
            from_version,
            to_version,
            source: BlobSource::File(path.into()),
        }
    }

    /// An in-memory snapshot blob.
    pub fn snapshot_in_memory(to_version: u64, bytes: Vec<u8>) -> Blob {
        Blob {
            kind: BlobKind::Snapshot,
            from_version: 0,
            to_version,
            source: BlobSource::Memory(Arc::new(bytes)),
        }
    }

    /// An in-memory delta blob.
    pub fn delta_in_memory(from_version: u64, to_version: u64, bytes: Vec<u8>) -> Blob {
        Blob {
            kind: BlobKind::Delta,
            from_version,
            to_version,
            source: BlobSource::Memory(Arc::new(bytes)),
        }
    }

    /// The blob kind.
    pub fn kind(&self) -> BlobKind {
        self.kind
    }

    /// The version this blob applies on top of (0 for snapshots).
    pub fn from_version(&self) -> u64 {
        self.from_version
    }

    /// The version this blob produces.
    pub fn to_version(&self) -> u64 {
        self.to_version
    }

    pub(crate) fn open(&self) -> MosaicResult<BlobInput> {
        match &self.source {
            BlobSource::File(path) => BlobInput::open(path),
            BlobSource::Memory(bytes) => Ok(BlobInput::from_shared(bytes.clone())),
        }
    }
}

/// An ordered sequence of blobs applied by one `update` call: an
/// optional snapshot followed by deltas. A plan is a snapshot plan iff
/// it begins with a snapshot.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    blobs: Vec<Blob>,
    destination_version: u64,
}

impl UpdatePlan {
    /// Build a plan from blobs in application order. A snapshot may only
    /// appear first; the destination version is the last blob's.
    pub fn new(blobs: Vec<Blob>) -> MosaicResult<UpdatePlan> {
        for blob in blobs.iter().skip(1) {
            if blob.kind() == BlobKind::Snapshot {
                return Err(MosaicError::malformed(
                    "snapshot blob must be first in an update plan",
                ));
            }
        }
        let destination_version = blobs.last().map(|b| b.to_version()).unwrap_or(0);
        Ok(UpdatePlan {
            blobs,
            destination_version,
        })
    }

    /// Whether this plan begins with a snapshot.
    pub fn is_snapshot_plan(&self) -> bool {
        self.blobs
            .first()
            .map(|b| b.kind() == BlobKind::Snapshot)
            .unwrap_or(false)
    }

    /// The version the plan lands on.
    pub fn destination_version(&self) -> u64 {
        self.destination_version
    }

    /// The blobs in application order.
    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }
}
