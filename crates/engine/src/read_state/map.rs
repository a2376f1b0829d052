//! Map type read state
//!
//! Entries are bit-packed key/value ordinal pairs: entry `e` occupies
//! `key_width + value_width` bits at `e * (key_width + value_width)`.
//! The pointer stream holds cumulative exclusive entry counts, exactly
//! like the collection pointer stream.

use super::collection::{packed_value, read_width};
use super::{read_long_block, PopulationBitmap};
use mosaic_core::schema::MapSchema;
use mosaic_core::{MemoryMode, MosaicError, MosaicResult};
use mosaic_format::{null_sentinel, BlobInput, SegmentRecycler, SegmentedLongArray};
use parking_lot::RwLock;

struct MapShard {
    population: PopulationBitmap,
    pointer_width: u32,
    pointers: SegmentedLongArray,
    key_width: u32,
    value_width: u32,
    /// Locked so delta application can overwrite entries in place.
    entries: RwLock<SegmentedLongArray>,
}

/// Read state of one map type: ordinal → (key ordinal, value ordinal)
/// entries.
pub struct MapTypeReadState {
    schema: MapSchema,
    num_shards: u32,
    shard_shift: u32,
    shards: Vec<MapShard>,
}

impl MapTypeReadState {
    pub(crate) fn new(schema: MapSchema, num_shards: u32) -> MapTypeReadState {
        MapTypeReadState {
            schema,
            num_shards,
            shard_shift: num_shards.trailing_zeros(),
            shards: Vec::new(),
        }
    }

    /// The map schema.
    pub fn schema(&self) -> &MapSchema {
        &self.schema
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
            let pointer_width = read_width(input, "map pointer stream")?;
            let pointers = read_long_block(input, mode, recycler)?;
            let key_width = read_width(input, "map key stream")?;
            let value_width = read_width(input, "map value stream")?;
            let entries = read_long_block(input, mode, recycler)?;
            self.shards.push(MapShard {
                population,
                pointer_width,
                pointers,
                key_width,
                value_width,
                entries: RwLock::new(entries),
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
            shard.entries.get_mut().destroy(recycler);
        }
        self.shards.clear();
    }

    fn locate(&self, ordinal: u64) -> MosaicResult<(&MapShard, u64)> {
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

    fn range(shard: &MapShard, shard_ordinal: u64) -> MosaicResult<(u64, u64)> {
        let end = packed_value(&shard.pointers, shard_ordinal, shard.pointer_width)?;
        let start = if shard_ordinal == 0 {
            0
        } else {
            packed_value(&shard.pointers, shard_ordinal - 1, shard.pointer_width)?
        };
        Ok((start, end))
    }

    fn entry_at(shard: &MapShard, entry_index: u64) -> MosaicResult<(u64, u64)> {
        let entry_width = shard.key_width + shard.value_width;
        let base = entry_index * u64::from(entry_width);
        let entries = shard.entries.read();
        let key = if shard.key_width <= 58 {
            entries.get_element_value(base, shard.key_width)?
        } else {
            entries.get_large_element_value(base, shard.key_width)?
        };
        let value_offset = base + u64::from(shard.key_width);
        let value = if shard.value_width <= 58 {
            entries.get_element_value(value_offset, shard.value_width)?
        } else {
            entries.get_large_element_value(value_offset, shard.value_width)?
        };
        Ok((key, value))
    }

    /// Apply entry overwrites from a delta payload. The caller has
    /// already verified the schema and that the shards are engine-owned.
    pub(crate) fn apply_delta(&self, input: &mut BlobInput) -> MosaicResult<()> {
        let num_updates = input.read_varint()?;
        for _ in 0..num_updates {
            let ordinal = input.read_varint()?;
            let index = input.read_varint()?;
            let key = input.read_varint()?;
            let value = input.read_varint()?;

            let (shard, shard_ordinal) = self.locate(ordinal).map_err(|_| {
                MosaicError::malformed(format!("delta modifies unpopulated ordinal {}", ordinal))
            })?;
            let (start, end) = Self::range(shard, shard_ordinal)?;
            if index >= end - start {
                return Err(MosaicError::malformed(format!(
                    "delta entry index {} past size {} of ordinal {}",
                    index,
                    end - start,
                    ordinal
                )));
            }
            if shard.key_width < 64 && key > null_sentinel(shard.key_width) {
                return Err(MosaicError::malformed(format!(
                    "delta key {} does not fit the {}-bit key stream",
                    key, shard.key_width
                )));
            }
            if shard.value_width < 64 && value > null_sentinel(shard.value_width) {
                return Err(MosaicError::malformed(format!(
                    "delta value {} does not fit the {}-bit value stream",
                    value, shard.value_width
                )));
            }
            let base = (start + index) * u64::from(shard.key_width + shard.value_width);
            let mut entries = shard.entries.write();
            entries.set_element_value(base, shard.key_width, key)?;
            entries.set_element_value(base + u64::from(shard.key_width), shard.value_width, value)?;
        }
        Ok(())
    }

    /// Number of entries of the map at `ordinal`.
    pub fn size(&self, ordinal: u64) -> MosaicResult<u64> {
        let (shard, shard_ordinal) = self.locate(ordinal)?;
        let (start, end) = Self::range(shard, shard_ordinal)?;
        Ok(end - start)
    }

    /// The entry at position `index` as (key ordinal, value ordinal).
    pub fn entry(&self, ordinal: u64, index: u64) -> MosaicResult<(u64, u64)> {
        let (shard, shard_ordinal) = self.locate(ordinal)?;
        let (start, end) = Self::range(shard, shard_ordinal)?;
        if index >= end - start {
            return Err(MosaicError::out_of_range(index, end - start));
        }
        Self::entry_at(shard, start + index)
    }

    /// The value ordinal stored under `key_ordinal`, if present.
    pub fn get(&self, ordinal: u64, key_ordinal: u64) -> MosaicResult<Option<u64>> {
        let (shard, shard_ordinal) = self.locate(ordinal)?;
        let (start, end) = Self::range(shard, shard_ordinal)?;
        for i in start..end {
            let (key, value) = Self::entry_at(shard, i)?;
            if key == key_ordinal {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// All entries, in stored order.
    pub fn entries(&self, ordinal: u64) -> MosaicResult<Vec<(u64, u64)>> {
        let (shard, shard_ordinal) = self.locate(ordinal)?;
        let (start, end) = Self::range(shard, shard_ordinal)?;
        (start..end).map(|i| Self::entry_at(shard, i)).collect()
    }
}
