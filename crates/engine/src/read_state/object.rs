//! Object type read state
//!
//! Records are densely packed bit streams: each included field has one
//! fixed-width slot per shard-ordinal in its own segmented long stream,
//! and var-width fields additionally carry a byte heap the slots point
//! into. The filtered schema's fields are walked in stored-schema order
//! during population; excluded fields are read and dropped.
//!
//! Slot conventions (matching the writer):
//! - fixed fields: ZigZag-folded integers, raw ordinals, or IEEE bit
//!   patterns; the all-ones value of the slot width is null
//! - var fields: `end_offset + 1` into the heap, 0 is null; the value
//!   start is the nearest previous non-null end

use super::{read_byte_block, read_long_block, PopulationBitmap};
use mosaic_core::schema::{FieldType, ObjectField, ObjectSchema};
use mosaic_core::{MemoryMode, MosaicError, MosaicResult};
use mosaic_format::varint::unfold_signed;
use mosaic_format::{
    null_sentinel, BlobInput, SegmentRecycler, SegmentedByteArray, SegmentedLongArray,
};
use parking_lot::RwLock;

/// The widest slot the two-word packed read handles on the hot path;
/// wider slots (doubles, wide longs) take the large-read path.
const PACKED_READ_MAX_BITS: u32 = 58;

struct FieldData {
    width: u32,
    /// Locked so delta application can overwrite slots in place while
    /// the containing state sits behind the engine's shared handle.
    fixed: RwLock<SegmentedLongArray>,
    heap: Option<SegmentedByteArray>,
}

struct ObjectShard {
    population: PopulationBitmap,
    /// Field data indexed by filtered-schema position.
    fields: Vec<FieldData>,
}

/// Read state of one object type.
pub struct ObjectTypeReadState {
    stored_schema: ObjectSchema,
    schema: ObjectSchema,
    num_shards: u32,
    shard_shift: u32,
    shards: Vec<ObjectShard>,
}

impl ObjectTypeReadState {
    pub(crate) fn new(
        stored_schema: ObjectSchema,
        schema: ObjectSchema,
        num_shards: u32,
    ) -> ObjectTypeReadState {
        ObjectTypeReadState {
            stored_schema,
            schema,
            num_shards,
            shard_shift: num_shards.trailing_zeros(),
            shards: Vec::new(),
        }
    }

    /// The schema as stored on the wire, before filtering.
    pub fn stored_schema(&self) -> &ObjectSchema {
        &self.stored_schema
    }

    /// The retained (filtered) schema.
    pub fn schema(&self) -> &ObjectSchema {
        &self.schema
    }

    pub(crate) fn read_snapshot(
        &mut self,
        input: &mut BlobInput,
        num_shards: u32,
        mode: MemoryMode,
        recycler: &SegmentRecycler,
    ) -> MosaicResult<()> {
        // stored position -> filtered index, None for excluded fields
        let mut include = vec![None; self.stored_schema.fields.len()];
        for (filtered_index, field) in self.schema.fields.iter().enumerate() {
            include[field.stored_position] = Some(filtered_index);
        }

        for _ in 0..num_shards {
            let num_ordinals = input.read_varint()?;
            let population = PopulationBitmap::read_from(input, num_ordinals, mode, recycler)?;

            let mut fields = Vec::with_capacity(self.schema.fields.len());
            for (position, stored_field) in self.stored_schema.fields.iter().enumerate() {
                let width = input.read_varint()?;
                if width > 64 {
                    return Err(MosaicError::malformed(format!(
                        "field {:?} declares {}-bit slots",
                        stored_field.name, width
                    )));
                }
                if include[position].is_some() {
                    let fixed = read_long_block(input, mode, recycler)?;
                    let heap = if stored_field.field_type.is_var_width() {
                        Some(read_byte_block(input, mode, recycler)?)
                    } else {
                        None
                    };
                    fields.push(FieldData {
                        width: width as u32,
                        fixed: RwLock::new(fixed),
                        heap,
                    });
                } else {
                    super::skip_long_block(input)?;
                    if stored_field.field_type.is_var_width() {
                        super::skip_byte_block(input)?;
                    }
                }
            }
            self.shards.push(ObjectShard { population, fields });
        }
        Ok(())
    }

    pub(crate) fn shard_populations(&self) -> Vec<&PopulationBitmap> {
        self.shards.iter().map(|s| &s.population).collect()
    }

    pub(crate) fn destroy(&mut self, recycler: &SegmentRecycler) {
        for shard in &mut self.shards {
            for field in &mut shard.fields {
                field.fixed.get_mut().destroy(recycler);
                if let Some(heap) = &mut field.heap {
                    heap.destroy(recycler);
                }
            }
            shard.population.destroy(recycler);
        }
        self.shards.clear();
    }

    /// Apply fixed-width field overwrites from a delta payload. The
    /// caller has already verified the schema and that the shards are
    /// engine-owned (`OnHeap`).
    pub(crate) fn apply_delta(&self, input: &mut BlobInput) -> MosaicResult<()> {
        let num_updates = input.read_varint()?;
        for _ in 0..num_updates {
            let ordinal = input.read_varint()?;
            let position = input.read_varint()? as usize;
            let is_null = input.read_u8()? != 0;
            let raw = if is_null {
                None
            } else {
                Some(input.read_varint()?)
            };

            let stored_field = self.stored_schema.fields.get(position).ok_or_else(|| {
                MosaicError::malformed(format!(
                    "delta names field position {} of {} stored fields",
                    position,
                    self.stored_schema.fields.len()
                ))
            })?;
            if stored_field.field_type.is_var_width() {
                return Err(MosaicError::malformed(format!(
                    "delta overwrites var-width field {:?}",
                    stored_field.name
                )));
            }
            // a field the filter dropped has no resident slot; the
            // update bytes are already consumed
            let Some(field_index) = self
                .schema
                .fields
                .iter()
                .position(|f| f.stored_position == position)
            else {
                continue;
            };

            let shard = self
                .shards
                .get((ordinal & u64::from(self.num_shards - 1)) as usize)
                .ok_or_else(|| MosaicError::out_of_range(ordinal, 0))?;
            let shard_ordinal = ordinal >> self.shard_shift;
            if !shard.population.is_populated(shard_ordinal) {
                return Err(MosaicError::malformed(format!(
                    "delta modifies unpopulated ordinal {}",
                    ordinal
                )));
            }
            let field = &shard.fields[field_index];
            let slot = match raw {
                Some(value) => {
                    if field.width < 64 && value >= null_sentinel(field.width) {
                        return Err(MosaicError::malformed(format!(
                            "delta value {} does not fit the {}-bit slot of field {:?}",
                            value, field.width, stored_field.name
                        )));
                    }
                    value
                }
                None => null_sentinel(field.width),
            };
            field.fixed.write().set_element_value(
                shard_ordinal * u64::from(field.width),
                field.width,
                slot,
            )?;
        }
        Ok(())
    }

    fn locate(
        &self,
        ordinal: u64,
        field_name: &str,
        expected: FieldType,
    ) -> MosaicResult<(&ObjectShard, u64, usize, &ObjectField)> {
        let field_index = self.schema.field_index(field_name).ok_or_else(|| {
            MosaicError::schema_mismatch(
                &self.schema.name,
                format!("no field {:?} in retained schema", field_name),
            )
        })?;
        let field = &self.schema.fields[field_index];
        if field.field_type != expected {
            return Err(MosaicError::schema_mismatch(
                &self.schema.name,
                format!(
                    "field {:?} is {:?}, read as {:?}",
                    field_name, field.field_type, expected
                ),
            ));
        }
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
        Ok((shard, shard_ordinal, field_index, field))
    }

    fn slot(field: &FieldData, shard_ordinal: u64) -> MosaicResult<u64> {
        let bit_offset = shard_ordinal * u64::from(field.width);
        let fixed = field.fixed.read();
        if field.width <= PACKED_READ_MAX_BITS {
            fixed.get_element_value(bit_offset, field.width)
        } else {
            fixed.get_large_element_value(bit_offset, field.width)
        }
    }

    fn read_fixed(
        &self,
        ordinal: u64,
        field_name: &str,
        expected: FieldType,
    ) -> MosaicResult<Option<u64>> {
        let (shard, shard_ordinal, field_index, _) = self.locate(ordinal, field_name, expected)?;
        let field = &shard.fields[field_index];
        let slot = Self::slot(field, shard_ordinal)?;
        if slot == null_sentinel(field.width) {
            Ok(None)
        } else {
            Ok(Some(slot))
        }
    }

    /// Read an int field; `None` is the wire null.
    pub fn read_int(&self, ordinal: u64, field_name: &str) -> MosaicResult<Option<i32>> {
        Ok(self
            .read_fixed(ordinal, field_name, FieldType::Int)?
            .map(|slot| unfold_signed(slot) as i32))
    }

    /// Read a long field.
    pub fn read_long(&self, ordinal: u64, field_name: &str) -> MosaicResult<Option<i64>> {
        Ok(self
            .read_fixed(ordinal, field_name, FieldType::Long)?
            .map(unfold_signed))
    }

    /// Read a float field.
    pub fn read_float(&self, ordinal: u64, field_name: &str) -> MosaicResult<Option<f32>> {
        Ok(self
            .read_fixed(ordinal, field_name, FieldType::Float)?
            .map(|slot| f32::from_bits(slot as u32)))
    }

    /// Read a double field. The all-ones NaN pattern is null.
    pub fn read_double(&self, ordinal: u64, field_name: &str) -> MosaicResult<Option<f64>> {
        Ok(self
            .read_fixed(ordinal, field_name, FieldType::Double)?
            .map(f64::from_bits))
    }

    /// Read a boolean field.
    pub fn read_boolean(&self, ordinal: u64, field_name: &str) -> MosaicResult<Option<bool>> {
        Ok(self
            .read_fixed(ordinal, field_name, FieldType::Boolean)?
            .map(|slot| slot == 1))
    }

    /// Read a reference field: the ordinal of the referenced record.
    pub fn read_ordinal(&self, ordinal: u64, field_name: &str) -> MosaicResult<Option<u64>> {
        self.read_fixed(ordinal, field_name, FieldType::Reference)
    }

    fn read_var(
        &self,
        ordinal: u64,
        field_name: &str,
        expected: FieldType,
    ) -> MosaicResult<Option<Vec<u8>>> {
        let (shard, shard_ordinal, field_index, _) = self.locate(ordinal, field_name, expected)?;
        let field = &shard.fields[field_index];
        let slot = Self::slot(field, shard_ordinal)?;
        if slot == 0 {
            return Ok(None);
        }
        let end = slot - 1;
        let mut start = 0;
        for previous in (0..shard_ordinal).rev() {
            let previous_slot = Self::slot(field, previous)?;
            if previous_slot != 0 {
                start = previous_slot - 1;
                break;
            }
        }
        let heap = field.heap.as_ref().ok_or_else(|| {
            MosaicError::schema_mismatch(&self.schema.name, "var-width field has no heap")
        })?;
        let mut bytes = vec![0u8; (end - start) as usize];
        heap.copy_into(start, &mut bytes)?;
        Ok(Some(bytes))
    }

    /// Read a string field.
    pub fn read_string(&self, ordinal: u64, field_name: &str) -> MosaicResult<Option<String>> {
        match self.read_var(ordinal, field_name, FieldType::String)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| MosaicError::malformed("invalid UTF-8 in string field")),
            None => Ok(None),
        }
    }

    /// Read a bytes field.
    pub fn read_bytes(&self, ordinal: u64, field_name: &str) -> MosaicResult<Option<Vec<u8>>> {
        self.read_var(ordinal, field_name, FieldType::Bytes)
    }
}
