//! Read state engine for Mosaic
//!
//! Loads immutable, schema-typed snapshots from file-backed binary blobs
//! and serves random-access, ordinal-indexed reads over memory-mapped
//! segments:
//!
//! - `read_state`: per-kind populators (object, list, set, map) with
//!   sharding and filtered-field discard paths
//! - `engine`: the registry of typed read states, schema wiring, and
//!   lifecycle notifications
//! - `blob_reader`: the snapshot/delta walker dispatching sub-streams to
//!   type states
//! - `index`: primary-key indexes derived after the first snapshot
//! - `refresh`: the consumer update driver — update plans, the
//!   failed-transition tracker, generation handoff, stale-reference
//!   detection

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blob_reader;
pub mod engine;
pub mod index;
pub mod listener;
pub mod read_state;
pub mod refresh;

pub use blob_reader::{read_delta, read_snapshot};
pub use engine::ReadStateEngine;
pub use index::{KeyValue, PrimaryKeyIndex};
pub use listener::TypeStateListener;
pub use read_state::{
    ListTypeReadState, MapTypeReadState, ObjectTypeReadState, SetTypeReadState, TypeReadState,
};
pub use refresh::{
    Blob, BlobKind, DataAccessProxy, FailedTransitionTracker, ReadApi, RefreshDriver,
    RefreshListener, StaleReferenceDetector, UpdatePlan,
};
