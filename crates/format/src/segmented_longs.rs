//! Segmented long array
//!
//! The same segmentation as [`crate::segmented_bytes`], reinterpreting
//! the backing bytes as little-endian 64-bit words. Object type states
//! pack fixed-width field values into contiguous bit streams over these
//! words; the bit-packed read helpers extract a value spanning at most
//! two adjacent words.

use crate::blob_input::{BlobInput, Region};
use crate::recycler::SegmentRecycler;
use byteorder::{ByteOrder, LittleEndian};
use mosaic_core::{MemoryMode, MosaicError, MosaicResult};

/// Number of bits needed to represent `value` in a packed slot
/// (at least 1).
pub fn bits_needed(value: u64) -> u32 {
    (64 - value.leading_zeros()).max(1)
}

/// The all-ones null sentinel for a packed slot of `width` bits.
pub fn null_sentinel(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

enum LongBacking {
    /// Byte offset of the segment's first word within the shared region.
    /// Word reads assemble from bytes, so the region needs no alignment.
    View { offset: usize },
    /// Recycler-owned copy.
    Owned(Box<[u64]>),
}

/// Growable, index-addressable logical array of 64-bit LE words with
/// bit-packed read helpers.
pub struct SegmentedLongArray {
    log2_of_segment_size: u32,
    bitmask: u64,
    segments: Vec<Option<LongBacking>>,
    max_longs: u64,
    region: Option<Region>,
}

impl SegmentedLongArray {
    /// Create an empty array addressing segments of
    /// `2^log2_of_segment_size` longs.
    pub fn new(log2_of_segment_size: u32) -> SegmentedLongArray {
        SegmentedLongArray {
            log2_of_segment_size,
            bitmask: (1u64 << log2_of_segment_size) - 1,
            segments: Vec::new(),
            max_longs: 0,
            region: None,
        }
    }

    /// Number of words populated.
    pub fn max_longs(&self) -> u64 {
        self.max_longs
    }

    /// Highest valid byte index of a word read: `max_longs*8 - 8`.
    pub fn max_byte_index(&self) -> i64 {
        self.max_longs as i64 * 8 - 8
    }

    /// Read the word at `long_index`.
    pub fn get(&self, long_index: u64) -> MosaicResult<u64> {
        if long_index >= self.max_longs {
            return Err(MosaicError::out_of_range(long_index * 8, self.max_longs * 8));
        }
        let segment_index = (long_index >> self.log2_of_segment_size) as usize;
        let offset = (long_index & self.bitmask) as usize;
        match &self.segments[segment_index] {
            Some(LongBacking::View { offset: base }) => {
                let region = self.region.as_ref().expect("view without region");
                let byte_offset = base + offset * 8;
                Ok(LittleEndian::read_u64(
                    &region.as_bytes()[byte_offset..byte_offset + 8],
                ))
            }
            Some(LongBacking::Owned(words)) => Ok(words[offset]),
            None => Err(MosaicError::out_of_range(long_index * 8, self.max_longs * 8)),
        }
    }

    /// Read `bit_len` bits (at most 58) starting at `bit_offset`, spanning
    /// at most two adjacent words, and return the little-endian integer
    /// masked to `bit_len`.
    ///
    /// This is the hot path for fixed-width field reads; widths above 58
    /// go through [`Self::get_large_element_value`].
    pub fn get_element_value(&self, bit_offset: u64, bit_len: u32) -> MosaicResult<u64> {
        debug_assert!(bit_len <= 58, "bit_len {} exceeds 58", bit_len);
        self.read_packed(bit_offset, bit_len)
    }

    /// Read `bit_len` bits (up to 64) starting at `bit_offset`. Same
    /// semantics as [`Self::get_element_value`] without the width bound;
    /// used for 64-bit slots (doubles, wide longs).
    pub fn get_large_element_value(&self, bit_offset: u64, bit_len: u32) -> MosaicResult<u64> {
        debug_assert!(bit_len <= 64, "bit_len {} exceeds 64", bit_len);
        self.read_packed(bit_offset, bit_len)
    }

    fn read_packed(&self, bit_offset: u64, bit_len: u32) -> MosaicResult<u64> {
        if bit_len == 0 {
            return Ok(0);
        }
        let word_index = bit_offset >> 6;
        let shift = (bit_offset & 63) as u32;
        let mask = if bit_len == 64 {
            u64::MAX
        } else {
            (1u64 << bit_len) - 1
        };
        let mut value = self.get(word_index)? >> shift;
        if shift + bit_len > 64 {
            value |= self.get(word_index + 1)? << (64 - shift);
        }
        Ok(value & mask)
    }

    /// Overwrite the word at `long_index`. Only owned (recycler-backed)
    /// segments are writable; views into the shared region fail
    /// `ReadOnlySegment`.
    fn set(&mut self, long_index: u64, value: u64) -> MosaicResult<()> {
        if long_index >= self.max_longs {
            return Err(MosaicError::out_of_range(long_index * 8, self.max_longs * 8));
        }
        let segment_index = (long_index >> self.log2_of_segment_size) as usize;
        let offset = (long_index & self.bitmask) as usize;
        match &mut self.segments[segment_index] {
            Some(LongBacking::Owned(words)) => {
                words[offset] = value;
                Ok(())
            }
            Some(LongBacking::View { .. }) => Err(MosaicError::ReadOnlySegment),
            None => Err(MosaicError::out_of_range(long_index * 8, self.max_longs * 8)),
        }
    }

    /// Overwrite `bit_len` bits (up to 64) starting at `bit_offset`,
    /// spanning at most two adjacent words. The inverse of the packed
    /// reads; valid only over owned segments.
    pub fn set_element_value(
        &mut self,
        bit_offset: u64,
        bit_len: u32,
        value: u64,
    ) -> MosaicResult<()> {
        debug_assert!(bit_len <= 64, "bit_len {} exceeds 64", bit_len);
        if bit_len == 0 {
            return Ok(());
        }
        let mask = if bit_len == 64 {
            u64::MAX
        } else {
            (1u64 << bit_len) - 1
        };
        debug_assert!(value <= mask, "value does not fit {} bits", bit_len);
        let word_index = bit_offset >> 6;
        let shift = (bit_offset & 63) as u32;
        let word = self.get(word_index)?;
        self.set(word_index, (word & !(mask << shift)) | (value << shift))?;
        if shift + bit_len > 64 {
            let high_mask = mask >> (64 - shift);
            let next = self.get(word_index + 1)?;
            self.set(
                word_index + 1,
                (next & !high_mask) | (value >> (64 - shift)),
            )?;
        }
        Ok(())
    }

    /// Populate words `[0, num_longs)` from the input's current position,
    /// advancing the input by exactly `num_longs * 8` bytes.
    pub fn read_from(
        &mut self,
        input: &mut BlobInput,
        num_longs: u64,
        mode: MemoryMode,
        recycler: &SegmentRecycler,
    ) -> MosaicResult<()> {
        debug_assert!(
            mode.is_shared() || recycler.log2_of_long_segment_size() == self.log2_of_segment_size,
            "recycler segment size must match array segment size"
        );
        let start = input.position();
        let byte_len = num_longs * 8;
        if (input.remaining() as u64) < byte_len {
            return Err(MosaicError::malformed(format!(
                "long block of {} words exceeds remaining blob ({} bytes)",
                num_longs,
                input.remaining()
            )));
        }

        self.segments.clear();
        self.region = None;
        self.max_longs = num_longs;

        let segment_size = 1u64 << self.log2_of_segment_size;
        let num_segments = ((num_longs + segment_size - 1) / segment_size) as usize;
        self.ensure_segment_capacity(num_segments);

        match mode {
            MemoryMode::OnHeap => {
                let source = input.region();
                let bytes = source.as_bytes();
                for i in 0..num_segments {
                    let first_long = i as u64 * segment_size;
                    let longs_here = segment_size.min(num_longs - first_long) as usize;
                    let mut segment = recycler.get_longs();
                    let base = start + (first_long * 8) as usize;
                    for (j, word) in segment[..longs_here].iter_mut().enumerate() {
                        *word = LittleEndian::read_u64(&bytes[base + j * 8..base + j * 8 + 8]);
                    }
                    self.segments.push(Some(LongBacking::Owned(segment)));
                }
            }
            MemoryMode::SharedMemoryLazy | MemoryMode::SharedMemoryEager => {
                let region = input.region();
                for i in 0..num_segments {
                    self.segments.push(Some(LongBacking::View {
                        offset: start + (i as u64 * segment_size * 8) as usize,
                    }));
                }
                if mode == MemoryMode::SharedMemoryEager {
                    let bytes = region.as_bytes();
                    let mut touched = 0u8;
                    let mut page = start;
                    while page < start + byte_len as usize {
                        touched ^= bytes[page];
                        page += 4096;
                    }
                    std::hint::black_box(touched);
                }
                self.region = Some(region);
            }
        }

        input.set_position(start + byte_len as usize)
    }

    /// Release segments (owned ones back to the recycler), then the
    /// region handle last.
    pub fn destroy(&mut self, recycler: &SegmentRecycler) {
        for backing in self.segments.drain(..) {
            if let Some(LongBacking::Owned(segment)) = backing {
                recycler.recycle_longs(segment);
            }
        }
        self.max_longs = 0;
        self.region = None;
    }

    fn ensure_segment_capacity(&mut self, required: usize) {
        let capacity = self.segments.capacity();
        if capacity < required {
            let grown = capacity + (capacity >> 1);
            let target = required.max(grown);
            self.segments.reserve_exact(target - self.segments.len());
        }
    }
}

impl std::fmt::Debug for SegmentedLongArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedLongArray")
            .field("max_longs", &self.max_longs)
            .field("segments", &self.segments.len())
            .finish()
    }
}
