//! # Mosaic
//!
//! An in-process, read-optimized dataset engine: load an immutable,
//! schema-typed snapshot from a file-backed binary blob and serve
//! random-access, ordinal-indexed reads over it. Records are addressed
//! by a dense integer ordinal per type, and the backing bytes stay
//! resident in OS virtual memory — no per-record heap allocation.
//!
//! # Quick Start
//!
//! ```no_run
//! use mosaic::{Blob, FilterConfig, ReadEngineConfig, RefreshDriver, UpdatePlan};
//!
//! fn main() -> mosaic::MosaicResult<()> {
//!     let driver = RefreshDriver::new(
//!         ReadEngineConfig::default(),
//!         FilterConfig::new_include_all(),
//!     );
//!
//!     let plan = UpdatePlan::new(vec![Blob::snapshot(20260801, "snapshot-20260801.blob")])?;
//!     driver.update(&plan)?;
//!
//!     let engine = driver.engine();
//!     let movies = engine.type_state("Movie").unwrap();
//!     let object = movies.object().unwrap();
//!     for ordinal in movies.populated_ordinals() {
//!         println!(
//!             "{}: {:?}",
//!             ordinal,
//!             object.read_string(ordinal, "title")?
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Crate | Responsibility |
//! |-------|----------------|
//! | `mosaic-core` | Errors, schema model, filter and engine configuration |
//! | `mosaic-format` | Varint codec, blob input (mmap), segmented arrays, header/schema codecs |
//! | `mosaic-engine` | Type read states, read state engine, blob reader, refresh driver |
//!
//! The [`RefreshDriver`] is the main entry point: it applies update
//! plans (a snapshot, optionally followed by deltas), publishes
//! [`ReadApi`] generations, and tracks failed transitions. Direct engine
//! access via [`ReadStateEngine`] suits embedders that manage blobs
//! themselves.

pub use mosaic_core::{
    DoubleSnapshotConfig, FieldType, FilterConfig, MemoryMode, MosaicError, MosaicResult,
    ObjectField, ObjectLongevityConfig, ObjectSchema, ReadEngineConfig, Schema, SchemaKind,
};
pub use mosaic_engine::{
    read_delta, read_snapshot, Blob, BlobKind, KeyValue, ListTypeReadState, MapTypeReadState,
    ObjectTypeReadState, PrimaryKeyIndex, ReadApi, ReadStateEngine, RefreshDriver,
    RefreshListener, SetTypeReadState, StaleReferenceDetector, TypeReadState, TypeStateListener,
    UpdatePlan,
};
pub use mosaic_format::{
    BlobHeader, BlobInput, DeltaBuilder, ElementUpdate, EntryUpdate, FieldUpdate, FieldValue,
    SegmentRecycler, SegmentedByteArray, SegmentedLongArray, SnapshotBuilder, TypeData,
};
