//! Shared shard layout for list and set types
//!
//! Both kinds encode ordinal → element-ordinal ranges the same way: a
//! pointer stream of cumulative exclusive end indices (holes repeat the
//! previous value) and a bit-packed element stream. The range of
//! shard-ordinal `o` is `[pointer(o-1), pointer(o))`, with `pointer(-1)`
//! defined as 0.

use super::{read_long_block, PopulationBitmap};
use mosaic_core::{MemoryMode, MosaicError, MosaicResult};
use mosaic_format::{null_sentinel, BlobInput, SegmentRecycler, SegmentedLongArray};
use parking_lot::RwLock;

const PACKED_READ_MAX_BITS: u32 = 58;

pub(crate) fn read_width(input: &mut BlobInput, what: &str) -> MosaicResult<u32> {
    let width = input.read_varint()?;
    if width == 0 || width > 64 {
        return Err(MosaicError::malformed(format!(
            "{} declares {}-bit slots",
            what, width
        )));
    }
    Ok(width as u32)
}

pub(crate) fn packed_value(
    array: &SegmentedLongArray,
    index: u64,
    width: u32,
) -> MosaicResult<u64> {
    let bit_offset = index * u64::from(width);
    if width <= PACKED_READ_MAX_BITS {
        array.get_element_value(bit_offset, width)
    } else {
        array.get_large_element_value(bit_offset, width)
    }
}

struct CollectionShard {
    population: PopulationBitmap,
    pointer_width: u32,
    pointers: SegmentedLongArray,
    element_width: u32,
    /// Locked so delta application can overwrite elements in place.
    elements: RwLock<SegmentedLongArray>,
}

/// Shards of one list or set type.
pub(crate) struct CollectionData {
    num_shards: u32,
    shard_shift: u32,
    shards: Vec<CollectionShard>,
}

impl CollectionData {
    pub(crate) fn new(num_shards: u32) -> CollectionData {
        CollectionData {
            num_shards,
            shard_shift: num_shards.trailing_zeros(),
            shards: Vec::new(),
        }
    }

    pub(crate) fn read_snapshot(
        &mut self,
        input: &mut BlobInput,
        num_shards: u32,
        mode: MemoryMode,
        recycler: &SegmentRecycler,
    ) -> MosaicResult<()> {
        for _ in 0..num_shards {
            let num_ordinals = input.read_varint()?;
            let population = PopulationBitmap::read_from(input, num_ordinals, mode, recycler)?;
            let pointer_width = read_width(input, "collection pointer stream")?;
            let pointers = read_long_block(input, mode, recycler)?;
            let element_width = read_width(input, "collection element stream")?;
            let elements = read_long_block(input, mode, recycler)?;
            self.shards.push(CollectionShard {
                population,
                pointer_width,
                pointers,
                element_width,
                elements: RwLock::new(elements),
            });
        }
        Ok(())
    }

    pub(crate) fn shard_populations(&self) -> Vec<&PopulationBitmap> {
        self.shards.iter().map(|s| &s.population).collect()
    }

    pub(crate) fn destroy(&mut self, recycler: &SegmentRecycler) {
        for shard in &mut self.shards {
            shard.population.destroy(recycler);
            shard.pointers.destroy(recycler);
            shard.elements.get_mut().destroy(recycler);
        }
        self.shards.clear();
    }

    fn locate(&self, ordinal: u64) -> MosaicResult<(&CollectionShard, u64)> {
        let shard = self
            .shards
            .get((ordinal & u64::from(self.num_shards - 1)) as usize)
            .ok_or_else(|| MosaicError::out_of_range(ordinal, 0))?;
        let shard_ordinal = ordinal >> self.shard_shift;
        if !shard.population.is_populated(shard_ordinal) {
            return Err(MosaicError::out_of_range(
                ordinal,
                u64::from(self.num_shards) * shard.population.num_ordinals(),
            ));
        }
        Ok((shard, shard_ordinal))
    }

    fn range(shard: &CollectionShard, shard_ordinal: u64) -> MosaicResult<(u64, u64)> {
        let end = packed_value(&shard.pointers, shard_ordinal, shard.pointer_width)?;
        let start = if shard_ordinal == 0 {
            0
        } else {
            packed_value(&shard.pointers, shard_ordinal - 1, shard.pointer_width)?
        };
        Ok((start, end))
    }

    /// Number of elements of `ordinal`.
    pub(crate) fn size(&self, ordinal: u64) -> MosaicResult<u64> {
        let (shard, shard_ordinal) = self.locate(ordinal)?;
        let (start, end) = Self::range(shard, shard_ordinal)?;
        Ok(end - start)
    }

    /// The `index`-th element ordinal of `ordinal`.
    pub(crate) fn element(&self, ordinal: u64, index: u64) -> MosaicResult<u64> {
        let (shard, shard_ordinal) = self.locate(ordinal)?;
        let (start, end) = Self::range(shard, shard_ordinal)?;
        if index >= end - start {
            return Err(MosaicError::out_of_range(index, end - start));
        }
        let elements = shard.elements.read();
        packed_value(&elements, start + index, shard.element_width)
    }

    /// All element ordinals of `ordinal`, in stored order.
    pub(crate) fn elements(&self, ordinal: u64) -> MosaicResult<Vec<u64>> {
        let (shard, shard_ordinal) = self.locate(ordinal)?;
        let (start, end) = Self::range(shard, shard_ordinal)?;
        let elements = shard.elements.read();
        (start..end)
            .map(|i| packed_value(&elements, i, shard.element_width))
            .collect()
    }

    /// Whether `ordinal` contains `element_ordinal`.
    pub(crate) fn contains(&self, ordinal: u64, element_ordinal: u64) -> MosaicResult<bool> {
        let (shard, shard_ordinal) = self.locate(ordinal)?;
        let (start, end) = Self::range(shard, shard_ordinal)?;
        let elements = shard.elements.read();
        for i in start..end {
            if packed_value(&elements, i, shard.element_width)? == element_ordinal {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Apply element overwrites from a delta payload. The caller has
    /// already verified the schema and that the shards are engine-owned.
    pub(crate) fn apply_delta(&self, input: &mut BlobInput) -> MosaicResult<()> {
        let num_updates = input.read_varint()?;
        for _ in 0..num_updates {
            let ordinal = input.read_varint()?;
            let index = input.read_varint()?;
            let element = input.read_varint()?;

            let (shard, shard_ordinal) = self.locate(ordinal).map_err(|_| {
                MosaicError::malformed(format!("delta modifies unpopulated ordinal {}", ordinal))
            })?;
            let (start, end) = Self::range(shard, shard_ordinal)?;
            if index >= end - start {
                return Err(MosaicError::malformed(format!(
                    "delta element index {} past size {} of ordinal {}",
                    index,
                    end - start,
                    ordinal
                )));
            }
            if shard.element_width < 64 && element > null_sentinel(shard.element_width) {
                return Err(MosaicError::malformed(format!(
                    "delta element {} does not fit the {}-bit element stream",
                    element, shard.element_width
                )));
            }
            shard.elements.write().set_element_value(
                (start + index) * u64::from(shard.element_width),
                shard.element_width,
                element,
            )?;
        }
        Ok(())
    }
}
