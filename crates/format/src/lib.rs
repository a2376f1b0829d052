//! Blob format layer for Mosaic
//!
//! Everything that touches raw blob bytes lives here:
//! - `varint`: variable-length integer codec
//! - `blob_input`: uniform random-access + sequential view over a blob
//!   file (mmap) or an in-memory buffer
//! - `recycler`: two-generation pool of reusable segment buffers
//! - `segmented_bytes` / `segmented_longs`: growable, index-addressable
//!   logical arrays composed of fixed-size segments
//! - `header`: blob header codec (magic, version, randomized tags)
//! - `schema_codec`: schema records and the shard-count preamble
//! - `writer`: `SnapshotBuilder`, the fixture producer used by tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blob_input;
pub mod header;
pub mod recycler;
pub mod schema_codec;
pub mod segmented_bytes;
pub mod segmented_longs;
pub mod varint;
pub mod writer;

pub use blob_input::{BlobInput, Region};
pub use header::{read_header, write_header, BlobHeader, BLOB_MAGIC, BLOB_VERSION};
pub use recycler::SegmentRecycler;
pub use schema_codec::{
    read_schema, read_shard_preamble, write_schema, write_shard_preamble,
};
pub use segmented_bytes::SegmentedByteArray;
pub use segmented_longs::{bits_needed, null_sentinel, SegmentedLongArray};
pub use writer::{
    DeltaBuilder, ElementUpdate, EntryUpdate, FieldUpdate, FieldValue, SnapshotBuilder, TypeData,
};
