//! Segmented byte array
//!
//! A logical byte sequence indexed by a 64-bit offset, composed of an
//! expandable vector of fixed-size segments. Each segment is a
//! power-of-two-length slice: index decomposition is
//! `segment = index >> L`, `offset = index & (2^L - 1)`.
//!
//! In the shared-memory modes the segments are non-owning views into the
//! blob's mapped region; the array co-owns the region handle so the
//! mapping outlives every view. In `OnHeap` mode the segments are
//! recycler-owned buffers the data is copied into. Segments are never
//! resized or moved once created; only the segment vector grows.

use crate::blob_input::{BlobInput, Region};
use crate::recycler::SegmentRecycler;
use mosaic_core::{MemoryMode, MosaicError, MosaicResult};

/// Page granularity used to prefault mapped data in eager mode.
const PREFAULT_STRIDE: usize = 4096;

enum SegmentBacking {
    /// Non-owning view: byte offset of the segment start within the
    /// shared region.
    View { offset: usize },
    /// Recycler-owned copy.
    Owned(Box<[u8]>),
}

/// Growable, index-addressable logical byte array over fixed-size
/// segments.
pub struct SegmentedByteArray {
    log2_of_segment_size: u32,
    bitmask: u64,
    segments: Vec<Option<SegmentBacking>>,
    length: u64,
    /// Owning handle that keeps the mapped region alive for the views.
    /// Released last, in `destroy`, after the views are cleared.
    region: Option<Region>,
}

impl SegmentedByteArray {
    /// Create an empty array addressing segments of `2^log2_of_segment_size`
    /// bytes.
    pub fn new(log2_of_segment_size: u32) -> SegmentedByteArray {
        SegmentedByteArray {
            log2_of_segment_size,
            bitmask: (1u64 << log2_of_segment_size) - 1,
            segments: Vec::new(),
            length: 0,
            region: None,
        }
    }

    /// Number of logical bytes populated.
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Whether no bytes are populated.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Read the byte at `index`.
    pub fn get(&self, index: u64) -> MosaicResult<u8> {
        if index >= self.length {
            return Err(MosaicError::out_of_range(index, self.length));
        }
        let segment_index = (index >> self.log2_of_segment_size) as usize;
        let offset = (index & self.bitmask) as usize;
        match &self.segments[segment_index] {
            Some(SegmentBacking::View { offset: base }) => {
                let region = self.region.as_ref().expect("view without region");
                Ok(region.as_bytes()[base + offset])
            }
            Some(SegmentBacking::Owned(bytes)) => Ok(bytes[offset]),
            None => Err(MosaicError::out_of_range(index, self.length)),
        }
    }

    /// Copy `out.len()` bytes starting at logical `start` into `out`.
    pub fn copy_into(&self, start: u64, out: &mut [u8]) -> MosaicResult<()> {
        let end = start + out.len() as u64;
        if end > self.length {
            return Err(MosaicError::out_of_range(end, self.length));
        }
        let segment_size = 1usize << self.log2_of_segment_size;
        let mut copied = 0usize;
        let mut index = start;
        while copied < out.len() {
            let segment_index = (index >> self.log2_of_segment_size) as usize;
            let offset = (index & self.bitmask) as usize;
            let chunk = (segment_size - offset).min(out.len() - copied);
            match &self.segments[segment_index] {
                Some(SegmentBacking::View { offset: base }) => {
                    let region = self.region.as_ref().expect("view without region");
                    out[copied..copied + chunk]
                        .copy_from_slice(&region.as_bytes()[base + offset..base + offset + chunk]);
                }
                Some(SegmentBacking::Owned(bytes)) => {
                    out[copied..copied + chunk].copy_from_slice(&bytes[offset..offset + chunk]);
                }
                None => return Err(MosaicError::out_of_range(index, self.length)),
            }
            copied += chunk;
            index += chunk as u64;
        }
        Ok(())
    }

    /// Populate logical indices `[0, length)` from the input's current
    /// position, advancing the input by exactly `length` bytes.
    ///
    /// Shared memory modes alias the input's backing region and store a
    /// handle to keep it alive; `OnHeap` copies into recycler-owned
    /// segments. Eager mode additionally touches one byte per page so
    /// later reads never take a major fault.
    pub fn read_from(
        &mut self,
        input: &mut BlobInput,
        length: u64,
        mode: MemoryMode,
        recycler: &SegmentRecycler,
    ) -> MosaicResult<()> {
        debug_assert!(
            mode.is_shared() || recycler.log2_of_byte_segment_size() == self.log2_of_segment_size,
            "recycler segment size must match array segment size"
        );
        let start = input.position();
        if (input.remaining() as u64) < length {
            return Err(MosaicError::malformed(format!(
                "byte block of {} bytes exceeds remaining blob ({})",
                length,
                input.remaining()
            )));
        }

        self.segments.clear();
        self.region = None;
        self.length = length;

        let segment_size = 1u64 << self.log2_of_segment_size;
        let num_segments = ((length + segment_size - 1) / segment_size) as usize;
        self.ensure_segment_capacity(num_segments);

        match mode {
            MemoryMode::OnHeap => {
                let source = input.region();
                let bytes = source.as_bytes();
                for i in 0..num_segments {
                    let seg_start = start + (i as u64 * segment_size) as usize;
                    let seg_len = (segment_size as usize).min(start + length as usize - seg_start);
                    let mut segment = recycler.get_bytes();
                    segment[..seg_len].copy_from_slice(&bytes[seg_start..seg_start + seg_len]);
                    self.segments.push(Some(SegmentBacking::Owned(segment)));
                }
            }
            MemoryMode::SharedMemoryLazy | MemoryMode::SharedMemoryEager => {
                let region = input.region();
                for i in 0..num_segments {
                    self.segments.push(Some(SegmentBacking::View {
                        offset: start + (i as u64 * segment_size) as usize,
                    }));
                }
                if mode == MemoryMode::SharedMemoryEager {
                    let bytes = region.as_bytes();
                    let mut touched = 0u8;
                    let mut page = start;
                    while page < start + length as usize {
                        touched ^= bytes[page];
                        page += PREFAULT_STRIDE;
                    }
                    std::hint::black_box(touched);
                }
                self.region = Some(region);
            }
        }

        input.set_position(start + length as usize)
    }

    /// Release segments (owned ones back to the recycler), then the
    /// region handle last.
    pub fn destroy(&mut self, recycler: &SegmentRecycler) {
        for backing in self.segments.drain(..) {
            if let Some(SegmentBacking::Owned(segment)) = backing {
                recycler.recycle_bytes(segment);
            }
        }
        self.length = 0;
        self.region = None;
    }

    /// Grow the segment vector capacity by 3/2, never reallocating the
    /// segments themselves.
    fn ensure_segment_capacity(&mut self, required: usize) {
        let capacity = self.segments.capacity();
        if capacity < required {
            let grown = capacity + (capacity >> 1);
            let target = required.max(grown);
            self.segments.reserve_exact(target - self.segments.len());
        }
    }
}

impl std::fmt::Debug for SegmentedByteArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedByteArray")
            .field("length", &self.length)
            .field("segments", &self.segments.len())
            .field("log2_of_segment_size", &self.log2_of_segment_size)
            .finish()
    }
}
