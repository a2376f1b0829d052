//! Blob input
//!
//! Uniform random-access + sequential view over a snapshot or delta blob.
//! The file-backed variant memory-maps the whole file read-only, the way
//! disk caches elsewhere in the system are opened; segmented arrays can
//! then alias slices of the shared region without copying. An in-memory
//! variant backs tests and rehydrated blobs.

use crate::varint;
use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;
use mosaic_core::{MosaicError, MosaicResult};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

/// Shared backing bytes of a blob: a mapped file or a heap buffer.
///
/// Cloning is cheap (Arc bump). Holders of a `Region` co-own the backing,
/// so mmap'd pages stay valid as long as any view of them is alive.
#[derive(Clone)]
pub enum Region {
    /// Memory-mapped file contents
    Mapped(Arc<Mmap>),
    /// Heap-resident blob bytes
    Heap(Arc<Vec<u8>>),
}

impl Region {
    /// The full backing byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Region::Mapped(mmap) => &mmap[..],
            Region::Heap(bytes) => bytes,
        }
    }

    /// Total length of the backing in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the backing is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Region::Mapped(mmap) => f.debug_tuple("Mapped").field(&mmap.len()).finish(),
            Region::Heap(bytes) => f.debug_tuple("Heap").field(&bytes.len()).finish(),
        }
    }
}

/// A blob plus a logical read position.
///
/// Sequential reads (`read_u8`, `read_varint`, ...) advance the position;
/// `region()` hands out the shared backing so typed read states can
/// reference slices of it without copying.
pub struct BlobInput {
    region: Region,
    position: usize,
}

impl BlobInput {
    /// Open a blob file, memory-mapping its full contents read-only.
    pub fn open(path: impl AsRef<Path>) -> MosaicResult<BlobInput> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the map is read-only and the file is opened read-only.
        let mmap = unsafe { Mmap::map(&file) }?;
        tracing::debug!(path = ?path.as_ref(), len = mmap.len(), "mapped blob");
        Ok(BlobInput {
            region: Region::Mapped(Arc::new(mmap)),
            position: 0,
        })
    }

    /// Wrap an in-memory blob.
    pub fn from_vec(bytes: Vec<u8>) -> BlobInput {
        BlobInput::from_shared(Arc::new(bytes))
    }

    /// Wrap shared in-memory blob bytes without copying.
    pub fn from_shared(bytes: Arc<Vec<u8>>) -> BlobInput {
        BlobInput {
            region: Region::Heap(bytes),
            position: 0,
        }
    }

    /// Total blob length in bytes.
    pub fn len(&self) -> usize {
        self.region.len()
    }

    /// Whether the blob is empty.
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    /// Current logical read position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the read position. Positions up to `len()` (exclusive end) are
    /// valid; anything past that is `MalformedBlob`.
    pub fn set_position(&mut self, position: usize) -> MosaicResult<()> {
        if position > self.len() {
            return Err(MosaicError::malformed(format!(
                "seek to {} past blob end {}",
                position,
                self.len()
            )));
        }
        self.position = position;
        Ok(())
    }

    /// Advance the read position by `count` bytes.
    pub fn skip(&mut self, count: usize) -> MosaicResult<()> {
        let target = self
            .position
            .checked_add(count)
            .ok_or_else(|| MosaicError::malformed("skip overflows blob position"))?;
        self.set_position(target)
    }

    /// The number of bytes remaining past the current position.
    pub fn remaining(&self) -> usize {
        self.len() - self.position
    }

    /// Shared handle to the backing bytes.
    pub fn region(&self) -> Region {
        self.region.clone()
    }

    fn take(&mut self, count: usize) -> MosaicResult<&[u8]> {
        if self.remaining() < count {
            return Err(MosaicError::malformed(format!(
                "unexpected end of blob: need {} bytes at {}, have {}",
                count,
                self.position,
                self.remaining()
            )));
        }
        let start = self.position;
        self.position += count;
        Ok(&self.region.as_bytes()[start..start + count])
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> MosaicResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian u32.
    pub fn read_u32(&mut self) -> MosaicResult<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    /// Read a little-endian u64.
    pub fn read_u64(&mut self) -> MosaicResult<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    /// Read a varint (see [`crate::varint`]).
    pub fn read_varint(&mut self) -> MosaicResult<u64> {
        varint::read_varint(self)
    }

    /// Read a varint-length-prefixed UTF-8 string.
    pub fn read_vstring(&mut self) -> MosaicResult<String> {
        let len = self.read_varint()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| MosaicError::malformed("invalid UTF-8 in string"))
    }
}

impl Read for BlobInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = buf.len().min(self.remaining());
        buf[..count]
            .copy_from_slice(&self.region.as_bytes()[self.position..self.position + count]);
        self.position += count;
        Ok(count)
    }
}

impl std::fmt::Debug for BlobInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobInput")
            .field("len", &self.len())
            .field("position", &self.position)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_sequential_reads_advance_position() {
        let mut bytes = vec![0x2A];
        bytes.extend_from_slice(&7u32.to_le_bytes());
        bytes.extend_from_slice(&9u64.to_le_bytes());
        let mut input = BlobInput::from_vec(bytes);

        assert_eq!(input.read_u8().unwrap(), 0x2A);
        assert_eq!(input.read_u32().unwrap(), 7);
        assert_eq!(input.read_u64().unwrap(), 9);
        assert_eq!(input.position(), 13);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn test_truncated_read_is_malformed() {
        let mut input = BlobInput::from_vec(vec![1, 2]);
        let err = input.read_u32().unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_vstring_roundtrip() {
        let mut bytes = Vec::new();
        varint::write_varint(&mut bytes, 5);
        bytes.extend_from_slice(b"hello");
        let mut input = BlobInput::from_vec(bytes);
        assert_eq!(input.read_vstring().unwrap(), "hello");
    }

    #[test]
    fn test_vstring_invalid_utf8() {
        let mut bytes = Vec::new();
        varint::write_varint(&mut bytes, 2);
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        let mut input = BlobInput::from_vec(bytes);
        assert!(input.read_vstring().unwrap_err().is_malformed());
    }

    #[test]
    fn test_skip_and_seek_bounds() {
        let mut input = BlobInput::from_vec(vec![0; 8]);
        input.skip(8).unwrap();
        assert_eq!(input.remaining(), 0);
        assert!(input.skip(1).is_err());
        assert!(input.set_position(9).is_err());
        input.set_position(3).unwrap();
        assert_eq!(input.position(), 3);
    }

    #[test]
    fn test_open_mmap_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");
        let mut file = File::create(&path).unwrap();
        file.write_all(&[1, 2, 3, 4]).unwrap();
        drop(file);

        let mut input = BlobInput::open(&path).unwrap();
        assert_eq!(input.len(), 4);
        assert_eq!(input.read_u8().unwrap(), 1);

        // region handle keeps the mapping alive independently
        let region = input.region();
        drop(input);
        assert_eq!(region.as_bytes(), &[1, 2, 3, 4]);
    }
}
