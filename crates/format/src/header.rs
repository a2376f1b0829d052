//! Blob header codec
//!
//! Every snapshot and delta blob begins with a fixed magic prefix, a
//! format version, the two 64-bit randomized tags, and a
//! length-prefixed sequence of key/value string tags. A delta's origin
//! tag must equal the engine's current randomized tag; applying either
//! blob kind replaces the engine's tag with the header's destination tag.

use crate::blob_input::BlobInput;
use crate::varint::write_varint;
use mosaic_core::{MosaicError, MosaicResult};
use std::collections::BTreeMap;

/// Magic bytes identifying a Mosaic blob ("MOSA" little-endian).
pub const BLOB_MAGIC: u32 = 0x4D4F_5341;

/// Current blob format version.
pub const BLOB_VERSION: u32 = 1;

/// Oldest blob format version this reader accepts.
pub const MIN_SUPPORTED_BLOB_VERSION: u32 = 1;

/// Parsed blob header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeader {
    /// Blob format version
    pub version: u32,
    /// Randomized tag of the state this blob applies on top of
    /// (0 for snapshots)
    pub origin_tag: u64,
    /// Randomized tag of the state this blob produces
    pub destination_tag: u64,
    /// Free-form key/value tags carried with the state
    pub tags: BTreeMap<String, String>,
}

impl BlobHeader {
    /// Header for a snapshot producing `destination_tag`.
    pub fn snapshot(destination_tag: u64) -> BlobHeader {
        BlobHeader {
            version: BLOB_VERSION,
            origin_tag: 0,
            destination_tag,
            tags: BTreeMap::new(),
        }
    }

    /// Header for a delta transitioning `origin_tag` to `destination_tag`.
    pub fn delta(origin_tag: u64, destination_tag: u64) -> BlobHeader {
        BlobHeader {
            version: BLOB_VERSION,
            origin_tag,
            destination_tag,
            tags: BTreeMap::new(),
        }
    }
}

/// Read and validate a blob header from the input's current position.
pub fn read_header(input: &mut BlobInput) -> MosaicResult<BlobHeader> {
    let magic = input.read_u32()?;
    if magic != BLOB_MAGIC {
        return Err(MosaicError::malformed(format!(
            "bad blob magic {:#010x}",
            magic
        )));
    }
    let version = input.read_u32()?;
    if !(MIN_SUPPORTED_BLOB_VERSION..=BLOB_VERSION).contains(&version) {
        return Err(MosaicError::UnsupportedVersion {
            version,
            min: MIN_SUPPORTED_BLOB_VERSION,
            max: BLOB_VERSION,
        });
    }
    let origin_tag = input.read_u64()?;
    let destination_tag = input.read_u64()?;

    let tag_count = input.read_varint()?;
    let mut tags = BTreeMap::new();
    for _ in 0..tag_count {
        let key = input.read_vstring()?;
        let value = input.read_vstring()?;
        tags.insert(key, value);
    }

    Ok(BlobHeader {
        version,
        origin_tag,
        destination_tag,
        tags,
    })
}

/// Append the wire encoding of `header` to `out`.
pub fn write_header(out: &mut Vec<u8>, header: &BlobHeader) {
    out.extend_from_slice(&BLOB_MAGIC.to_le_bytes());
    out.extend_from_slice(&header.version.to_le_bytes());
    out.extend_from_slice(&header.origin_tag.to_le_bytes());
    out.extend_from_slice(&header.destination_tag.to_le_bytes());
    write_varint(out, header.tags.len() as u64);
    for (key, value) in &header.tags {
        write_varint(out, key.len() as u64);
        out.extend_from_slice(key.as_bytes());
        write_varint(out, value.len() as u64);
        out.extend_from_slice(value.as_bytes());
    }
}
