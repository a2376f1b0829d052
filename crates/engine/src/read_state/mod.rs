//! Type read states
//!
//! A type read state is the per-type container holding a filtered
//! schema, one or more shards (each shard owning the segmented arrays
//! that encode ordinal → record data), and its lifecycle listeners.
//!
//! The shard holding ordinal `o` is `o & (num_shards - 1)`; within a
//! shard, records are addressed by `o >> log2(num_shards)`. Each shard
//! payload starts with a population bitmap (which shard-ordinals exist),
//! followed by kind-specific segmented streams.

mod collection;
mod list;
mod map;
mod object;
mod set;

pub use list::ListTypeReadState;
pub use map::MapTypeReadState;
pub use object::ObjectTypeReadState;
pub use set::SetTypeReadState;

use crate::listener::TypeStateListener;
use mosaic_core::schema::Schema;
use mosaic_core::{FilterConfig, MemoryMode, MosaicError, MosaicResult};
use mosaic_format::{BlobInput, SegmentRecycler, SegmentedLongArray};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};

/// Read a varint-length-prefixed long block into a fresh segmented
/// long array.
pub(crate) fn read_long_block(
    input: &mut BlobInput,
    mode: MemoryMode,
    recycler: &SegmentRecycler,
) -> MosaicResult<SegmentedLongArray> {
    let num_longs = input.read_varint()?;
    let mut array = SegmentedLongArray::new(recycler.log2_of_long_segment_size());
    array.read_from(input, num_longs, mode, recycler)?;
    Ok(array)
}

/// Read a varint-length-prefixed byte block into a fresh segmented
/// byte array.
pub(crate) fn read_byte_block(
    input: &mut BlobInput,
    mode: MemoryMode,
    recycler: &SegmentRecycler,
) -> MosaicResult<mosaic_format::SegmentedByteArray> {
    let num_bytes = input.read_varint()?;
    let mut array = mosaic_format::SegmentedByteArray::new(recycler.log2_of_byte_segment_size());
    array.read_from(input, num_bytes, mode, recycler)?;
    Ok(array)
}

/// Skip a varint-length-prefixed long block.
pub(crate) fn skip_long_block(input: &mut BlobInput) -> MosaicResult<()> {
    let num_longs = input.read_varint()?;
    let byte_len = num_longs
        .checked_mul(8)
        .ok_or_else(|| MosaicError::malformed("long block length overflows"))?;
    input.skip(byte_len as usize)
}

/// Skip a varint-length-prefixed byte block.
pub(crate) fn skip_byte_block(input: &mut BlobInput) -> MosaicResult<()> {
    let num_bytes = input.read_varint()?;
    input.skip(num_bytes as usize)
}

/// Which ordinals of one shard exist, backed by a segmented bit array.
#[derive(Debug)]
pub(crate) struct PopulationBitmap {
    words: SegmentedLongArray,
    num_ordinals: u64,
}

impl PopulationBitmap {
    /// Read the bitmap covering `num_ordinals` shard-ordinals from the
    /// input's current position.
    pub(crate) fn read_from(
        input: &mut BlobInput,
        num_ordinals: u64,
        mode: MemoryMode,
        recycler: &SegmentRecycler,
    ) -> MosaicResult<PopulationBitmap> {
        let num_longs = input.read_varint()?;
        let expected = (num_ordinals + 63) / 64;
        if num_longs != expected {
            return Err(MosaicError::malformed(format!(
                "population bitmap has {} words, expected {} for {} ordinals",
                num_longs, expected, num_ordinals
            )));
        }
        let mut words = SegmentedLongArray::new(recycler.log2_of_long_segment_size());
        words.read_from(input, num_longs, mode, recycler)?;
        Ok(PopulationBitmap {
            words,
            num_ordinals,
        })
    }

    pub(crate) fn num_ordinals(&self) -> u64 {
        self.num_ordinals
    }

    pub(crate) fn is_populated(&self, shard_ordinal: u64) -> bool {
        if shard_ordinal >= self.num_ordinals {
            return false;
        }
        self.words
            .get(shard_ordinal >> 6)
            .map(|word| (word >> (shard_ordinal & 63)) & 1 == 1)
            .unwrap_or(false)
    }

    /// Populated shard-ordinals in ascending order.
    pub(crate) fn populated(&self) -> Vec<u64> {
        (0..self.num_ordinals)
            .filter(|&o| self.is_populated(o))
            .collect()
    }

    pub(crate) fn destroy(&mut self, recycler: &SegmentRecycler) {
        self.words.destroy(recycler);
    }
}

/// Kind-specific read state.
pub(crate) enum TypeStateData {
    Object(ObjectTypeReadState),
    List(ListTypeReadState),
    Set(SetTypeReadState),
    Map(MapTypeReadState),
}

/// Per-type container: filtered schema, shards, and listeners.
///
/// Constructed by the blob reader for each type the filter includes,
/// populated from the type's snapshot sub-stream, then registered with
/// the read state engine.
pub struct TypeReadState {
    /// Retained (filtered) schema
    schema: Schema,
    num_shards: u32,
    shard_shift: u32,
    data: TypeStateData,
    listeners: RwLock<Vec<Arc<dyn TypeStateListener>>>,
    /// Cross-type references resolved by `wire_type_states_to_schemas`,
    /// keyed by referenced type name. Weak so schema cycles cannot leak.
    references: RwLock<FxHashMap<String, Weak<TypeReadState>>>,
}

impl TypeReadState {
    /// Build an empty state for `schema`, retaining only the fields
    /// `filter` includes.
    pub fn new(schema: Schema, num_shards: u32, filter: &FilterConfig) -> TypeReadState {
        debug_assert!(num_shards.is_power_of_two());
        let shard_shift = num_shards.trailing_zeros();
        let (retained, data) = match schema {
            Schema::Object(stored) => {
                let filtered = stored.filter(filter);
                let state = ObjectTypeReadState::new(stored, filtered.clone(), num_shards);
                (Schema::Object(filtered), TypeStateData::Object(state))
            }
            Schema::List(s) => (
                Schema::List(s.clone()),
                TypeStateData::List(ListTypeReadState::new(s, num_shards)),
            ),
            Schema::Set(s) => (
                Schema::Set(s.clone()),
                TypeStateData::Set(SetTypeReadState::new(s, num_shards)),
            ),
            Schema::Map(s) => (
                Schema::Map(s.clone()),
                TypeStateData::Map(MapTypeReadState::new(s, num_shards)),
            ),
        };
        TypeReadState {
            schema: retained,
            num_shards,
            shard_shift,
            data,
            listeners: RwLock::new(Vec::new()),
            references: RwLock::new(FxHashMap::default()),
        }
    }

    /// The retained (filtered) schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The schema as stored on the wire, before filtering.
    pub fn stored_schema(&self) -> Schema {
        match &self.data {
            TypeStateData::Object(state) => Schema::Object(state.stored_schema().clone()),
            _ => self.schema.clone(),
        }
    }

    /// The type name.
    pub fn type_name(&self) -> &str {
        self.schema.name()
    }

    /// Number of shards (a power of two).
    pub fn num_shards(&self) -> u32 {
        self.num_shards
    }

    /// The shard holding `ordinal`.
    pub fn shard_index(&self, ordinal: u64) -> u32 {
        (ordinal & u64::from(self.num_shards - 1)) as u32
    }

    /// Consume this type's snapshot sub-stream: one shard payload per
    /// shard, in shard order.
    pub fn read_snapshot(
        &mut self,
        input: &mut BlobInput,
        mode: MemoryMode,
        recycler: &SegmentRecycler,
    ) -> MosaicResult<()> {
        let num_shards = self.num_shards;
        match &mut self.data {
            TypeStateData::Object(state) => state.read_snapshot(input, num_shards, mode, recycler),
            TypeStateData::List(state) => state.read_snapshot(input, num_shards, mode, recycler),
            TypeStateData::Set(state) => state.read_snapshot(input, num_shards, mode, recycler),
            TypeStateData::Map(state) => state.read_snapshot(input, num_shards, mode, recycler),
        }
    }

    /// Apply this type's delta sub-stream: fixed-width overwrites of
    /// existing ordinals, against engine-owned (`OnHeap`) shards.
    ///
    /// The shared-memory modes reject application with
    /// `DeltaUnsupported` — their segments alias the mapped blob region
    /// and cannot be rewritten in place. Ordinal adds/removes and
    /// var-width modifies are not carried by the payload.
    pub fn apply_delta(
        &self,
        input: &mut BlobInput,
        delta_schema: &Schema,
        mode: MemoryMode,
        _recycler: &SegmentRecycler,
    ) -> MosaicResult<()> {
        self.stored_schema()
            .check_compatible(delta_schema)
            .map_err(|message| MosaicError::schema_mismatch(self.type_name(), message))?;
        let byte_len = input.read_varint()? as usize;
        if mode.is_shared() {
            return Err(MosaicError::DeltaUnsupported { mode });
        }
        let payload_end = input.position() + byte_len;
        match &self.data {
            TypeStateData::Object(state) => state.apply_delta(input)?,
            TypeStateData::List(state) => state.apply_delta(input)?,
            TypeStateData::Set(state) => state.apply_delta(input)?,
            TypeStateData::Map(state) => state.apply_delta(input)?,
        }
        if input.position() != payload_end {
            return Err(MosaicError::malformed("delta payload length mismatch"));
        }
        Ok(())
    }

    /// Global ordinals present in this type, ascending.
    pub fn populated_ordinals(&self) -> Vec<u64> {
        let shift = self.shard_shift;
        let mut ordinals: Vec<u64> = self
            .shard_populations()
            .iter()
            .enumerate()
            .flat_map(|(shard, bitmap)| {
                bitmap
                    .populated()
                    .into_iter()
                    .map(move |so| (so << shift) | shard as u64)
            })
            .collect();
        ordinals.sort_unstable();
        ordinals
    }

    /// Whether `ordinal` exists in this type.
    pub fn is_populated(&self, ordinal: u64) -> bool {
        let shard = self.shard_index(ordinal) as usize;
        let shard_ordinal = ordinal >> self.shard_shift;
        self.shard_populations()
            .get(shard)
            .map(|bitmap| bitmap.is_populated(shard_ordinal))
            .unwrap_or(false)
    }

    /// The highest populated ordinal, if any.
    pub fn max_ordinal(&self) -> Option<u64> {
        self.populated_ordinals().last().copied()
    }

    fn shard_populations(&self) -> Vec<&PopulationBitmap> {
        match &self.data {
            TypeStateData::Object(state) => state.shard_populations(),
            TypeStateData::List(state) => state.shard_populations(),
            TypeStateData::Set(state) => state.shard_populations(),
            TypeStateData::Map(state) => state.shard_populations(),
        }
    }

    /// The object view of this state, if it is an object type.
    pub fn object(&self) -> Option<&ObjectTypeReadState> {
        match &self.data {
            TypeStateData::Object(state) => Some(state),
            _ => None,
        }
    }

    /// The list view of this state, if it is a list type.
    pub fn list(&self) -> Option<&ListTypeReadState> {
        match &self.data {
            TypeStateData::List(state) => Some(state),
            _ => None,
        }
    }

    /// The set view of this state, if it is a set type.
    pub fn set(&self) -> Option<&SetTypeReadState> {
        match &self.data {
            TypeStateData::Set(state) => Some(state),
            _ => None,
        }
    }

    /// The map view of this state, if it is a map type.
    pub fn map(&self) -> Option<&MapTypeReadState> {
        match &self.data {
            TypeStateData::Map(state) => Some(state),
            _ => None,
        }
    }

    /// Register a lifecycle listener.
    pub fn add_listener(&self, listener: Arc<dyn TypeStateListener>) {
        self.listeners.write().push(listener);
    }

    pub(crate) fn notify_begin_update(&self) {
        for listener in self.listeners.read().iter() {
            listener.begin_update(self.type_name());
        }
    }

    pub(crate) fn notify_end_update(&self) {
        for listener in self.listeners.read().iter() {
            listener.end_update(self.type_name());
        }
    }

    pub(crate) fn wire_reference(&self, name: &str, target: Weak<TypeReadState>) {
        self.references.write().insert(name.to_string(), target);
    }

    /// The wired state for a referenced type name, if it was loaded.
    pub fn referenced_state(&self, name: &str) -> Option<Arc<TypeReadState>> {
        self.references.read().get(name).and_then(Weak::upgrade)
    }

    /// Release all shard data back to the recycler.
    pub fn destroy(&mut self, recycler: &SegmentRecycler) {
        match &mut self.data {
            TypeStateData::Object(state) => state.destroy(recycler),
            TypeStateData::List(state) => state.destroy(recycler),
            TypeStateData::Set(state) => state.destroy(recycler),
            TypeStateData::Map(state) => state.destroy(recycler),
        }
    }
}

impl std::fmt::Debug for TypeReadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeReadState")
            .field("type_name", &self.type_name())
            .field("kind", &self.schema.kind())
            .field("num_shards", &self.num_shards)
            .finish()
    }
}

/// Advance `input` past an entire snapshot type payload without
/// retaining data. Used for filtered-out types; consumes exactly the
/// bytes a full read would.
pub fn discard_snapshot(
    input: &mut BlobInput,
    schema: &Schema,
    num_shards: u32,
) -> MosaicResult<()> {
    for _ in 0..num_shards {
        let _num_ordinals = input.read_varint()?;
        skip_long_block(input)?; // population bitmap
        match schema {
            Schema::Object(s) => {
                for field in &s.fields {
                    let _width = input.read_varint()?;
                    skip_long_block(input)?;
                    if field.field_type.is_var_width() {
                        skip_byte_block(input)?;
                    }
                }
            }
            Schema::List(_) | Schema::Set(_) => {
                let _pointer_width = input.read_varint()?;
                skip_long_block(input)?;
                let _element_width = input.read_varint()?;
                skip_long_block(input)?;
            }
            Schema::Map(_) => {
                let _pointer_width = input.read_varint()?;
                skip_long_block(input)?;
                let _key_width = input.read_varint()?;
                let _value_width = input.read_varint()?;
                skip_long_block(input)?;
            }
        }
    }
    Ok(())
}

/// Advance `input` past a delta type payload without retaining data.
pub fn discard_delta(input: &mut BlobInput) -> MosaicResult<()> {
    skip_byte_block(input)
}
