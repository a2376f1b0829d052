//! Segment recycler
//!
//! A pool of reusable segment buffers for type data that is engine-owned
//! rather than mmap-backed (the `OnHeap` memory mode, and rehydrated
//! blobs). Freed segments land in a pending generation and only become
//! reusable after `swap_generations()`, which the blob reader calls
//! between type applications; readers of the previous generation never
//! see a buffer reused out from under them.

use parking_lot::Mutex;

#[derive(Default)]
struct Pools {
    bytes: Vec<Box<[u8]>>,
    longs: Vec<Box<[u64]>>,
}

/// Two-generation pool of byte and long segments.
pub struct SegmentRecycler {
    log2_of_byte_segment_size: u32,
    log2_of_long_segment_size: u32,
    free: Mutex<Pools>,
    pending: Mutex<Pools>,
}

impl SegmentRecycler {
    /// Default byte-segment size exponent (16 KiB segments).
    pub const DEFAULT_LOG2_BYTE_SEGMENT_SIZE: u32 = 14;
    /// Default long-segment size exponent (2^11 longs = 16 KiB).
    pub const DEFAULT_LOG2_LONG_SEGMENT_SIZE: u32 = 11;

    /// Create a recycler with the default segment sizes.
    pub fn new() -> SegmentRecycler {
        SegmentRecycler::with_segment_sizes(
            Self::DEFAULT_LOG2_BYTE_SEGMENT_SIZE,
            Self::DEFAULT_LOG2_LONG_SEGMENT_SIZE,
        )
    }

    /// Create a recycler with explicit segment size exponents.
    pub fn with_segment_sizes(log2_bytes: u32, log2_longs: u32) -> SegmentRecycler {
        SegmentRecycler {
            log2_of_byte_segment_size: log2_bytes,
            log2_of_long_segment_size: log2_longs,
            free: Mutex::new(Pools::default()),
            pending: Mutex::new(Pools::default()),
        }
    }

    /// Segment size exponent for byte segments.
    pub fn log2_of_byte_segment_size(&self) -> u32 {
        self.log2_of_byte_segment_size
    }

    /// Segment size exponent for long segments.
    pub fn log2_of_long_segment_size(&self) -> u32 {
        self.log2_of_long_segment_size
    }

    /// Take a zeroed byte segment from the pool, allocating if empty.
    pub fn get_bytes(&self) -> Box<[u8]> {
        match self.free.lock().bytes.pop() {
            Some(mut segment) => {
                segment.fill(0);
                segment
            }
            None => vec![0u8; 1 << self.log2_of_byte_segment_size].into_boxed_slice(),
        }
    }

    /// Take a zeroed long segment from the pool, allocating if empty.
    pub fn get_longs(&self) -> Box<[u64]> {
        match self.free.lock().longs.pop() {
            Some(mut segment) => {
                segment.fill(0);
                segment
            }
            None => vec![0u64; 1 << self.log2_of_long_segment_size].into_boxed_slice(),
        }
    }

    /// Return a byte segment. It becomes reusable after the next
    /// generation swap.
    pub fn recycle_bytes(&self, segment: Box<[u8]>) {
        self.pending.lock().bytes.push(segment);
    }

    /// Return a long segment. It becomes reusable after the next
    /// generation swap.
    pub fn recycle_longs(&self, segment: Box<[u64]>) {
        self.pending.lock().longs.push(segment);
    }

    /// Promote the pending generation into the free pool.
    pub fn swap_generations(&self) {
        let mut pending = self.pending.lock();
        let mut free = self.free.lock();
        free.bytes.append(&mut pending.bytes);
        free.longs.append(&mut pending.longs);
    }

    /// Number of immediately reusable segments (bytes, longs).
    pub fn free_counts(&self) -> (usize, usize) {
        let free = self.free.lock();
        (free.bytes.len(), free.longs.len())
    }
}

impl Default for SegmentRecycler {
    fn default() -> Self {
        SegmentRecycler::new()
    }
}
