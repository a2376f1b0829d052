//! Error types for the Mosaic dataset engine
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! ## Error Categories
//!
//! - **Format**: the blob stream is damaged or unreadable
//!   (`MalformedBlob`, `UnsupportedVersion`, `Io`)
//! - **Transition**: an update plan cannot be applied
//!   (`WrongOrigin`, `SchemaMismatch`, `KnownFailingTransition`,
//!   `DeltaUnsupported`, `EnginePoisoned`, `ListenerFailure`)
//! - **Access**: a read against loaded data is out of bounds
//!   (`OutOfRange`)

use crate::config::MemoryMode;
use std::io;
use thiserror::Error;

/// Result type alias for Mosaic operations
pub type MosaicResult<T> = std::result::Result<T, MosaicError>;

/// Error types for the Mosaic dataset engine
#[derive(Debug, Error)]
pub enum MosaicError {
    /// The blob stream is structurally damaged: truncated data, bad magic,
    /// an overlong varint, or a schema body that does not match its length.
    #[error("malformed blob: {message}")]
    MalformedBlob {
        /// What was wrong with the stream
        message: String,
    },

    /// The blob header declares a format version outside the accepted range.
    #[error("unsupported blob version {version} (supported: {min}..={max})")]
    UnsupportedVersion {
        /// Version found in the header
        version: u32,
        /// Oldest supported version
        min: u32,
        /// Newest supported version
        max: u32,
    },

    /// A delta's schema is structurally incompatible with the resident
    /// schema registered under the same name.
    #[error("schema mismatch for type {type_name}: {message}")]
    SchemaMismatch {
        /// The type whose schemas disagree
        type_name: String,
        /// How they disagree
        message: String,
    },

    /// A delta's origin tag does not match the engine's current
    /// randomized tag.
    #[error("wrong origin tag: engine is at {expected:#x}, delta expects {actual:#x}")]
    WrongOrigin {
        /// The engine's current randomized tag
        expected: u64,
        /// The origin tag carried by the delta header
        actual: u64,
    },

    /// The update plan contains a blob that previously failed, and the
    /// double-snapshot gate refuses to retry it.
    #[error("plan rejected: blob version {version} previously failed")]
    KnownFailingTransition {
        /// Version of the blob known to have failed
        version: u64,
    },

    /// Underlying file or mmap failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An ordinal, byte index, or bit offset read past the populated range.
    #[error("index {index} out of range (limit {limit})")]
    OutOfRange {
        /// The index that was requested
        index: u64,
        /// The first index past the populated range
        limit: u64,
    },

    /// Delta payload application is not supported in the shared-memory
    /// modes: the segments alias the mapped blob region and cannot be
    /// rewritten in place. Engine-owned (`OnHeap`) data applies deltas.
    #[error("delta application not supported in {mode:?} memory mode; re-snapshot instead")]
    DeltaUnsupported {
        /// The memory mode the type data was loaded under
        mode: MemoryMode,
    },

    /// A write targeted a segment that is a non-owning view into the
    /// mapped region; only engine-owned segments are writable.
    #[error("segment is a read-only view into the mapped region")]
    ReadOnlySegment,

    /// A previous failed transition mutated the engine; it may not be used
    /// until a fresh snapshot succeeds.
    #[error("engine poisoned by a failed transition; a snapshot is required")]
    EnginePoisoned,

    /// A listener panicked or failed during an update; the transition is
    /// treated as failed because listener state may be corrupt.
    #[error("listener failure during update: {message}")]
    ListenerFailure {
        /// What the listener reported (or the panic payload)
        message: String,
    },
}

impl MosaicError {
    /// Create a MalformedBlob error
    pub fn malformed(message: impl Into<String>) -> Self {
        MosaicError::MalformedBlob {
            message: message.into(),
        }
    }

    /// Create a SchemaMismatch error
    pub fn schema_mismatch(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        MosaicError::SchemaMismatch {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create an OutOfRange error
    pub fn out_of_range(index: u64, limit: u64) -> Self {
        MosaicError::OutOfRange { index, limit }
    }

    /// Create a ListenerFailure error
    pub fn listener_failure(message: impl Into<String>) -> Self {
        MosaicError::ListenerFailure {
            message: message.into(),
        }
    }

    /// Check if this error indicates a damaged blob stream
    ///
    /// Used by the refresh driver to distinguish bad inputs from bad state.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            MosaicError::MalformedBlob { .. } | MosaicError::UnsupportedVersion { .. }
        )
    }

    /// Check if this error was raised before any engine mutation
    ///
    /// Pre-mutation failures leave the engine usable; the driver only
    /// poisons the engine for failures past that point.
    pub fn is_pre_mutation(&self) -> bool {
        matches!(
            self,
            MosaicError::KnownFailingTransition { .. }
                | MosaicError::WrongOrigin { .. }
                | MosaicError::UnsupportedVersion { .. }
                | MosaicError::EnginePoisoned
        )
    }

    /// Check if a read ran past the populated range
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, MosaicError::OutOfRange { .. })
    }
}
