//! Primary-key indexes
//!
//! Object types may declare a primary-key field path. After the first
//! snapshot the engine builds, for each such type, a hash index from key
//! values to the ordinal holding them, so embedders can resolve records
//! without scanning the population.

use crate::read_state::{ObjectTypeReadState, TypeReadState};
use mosaic_core::schema::FieldType;
use mosaic_core::MosaicResult;
use rustc_hash::FxHashMap;
use tracing::warn;

/// One component of a primary key, canonicalized for hashing (floats by
/// bit pattern).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    /// Int field value
    Int(i32),
    /// Long field value
    Long(i64),
    /// Float field value, by bit pattern
    FloatBits(u32),
    /// Double field value, by bit pattern
    DoubleBits(u64),
    /// Boolean field value
    Boolean(bool),
    /// String field value
    String(String),
    /// Bytes field value
    Bytes(Vec<u8>),
    /// Reference field value
    Ordinal(u64),
    /// Null field value
    Null,
}

impl KeyValue {
    fn read(state: &ObjectTypeReadState, ordinal: u64, field_name: &str) -> MosaicResult<KeyValue> {
        let field_type = state
            .schema()
            .field(field_name)
            .map(|f| f.field_type)
            .ok_or_else(|| {
                mosaic_core::MosaicError::schema_mismatch(
                    &state.schema().name,
                    format!("no field {:?} in retained schema", field_name),
                )
            })?;
        Ok(match field_type {
            FieldType::Int => state
                .read_int(ordinal, field_name)?
                .map_or(KeyValue::Null, KeyValue::Int),
            FieldType::Long => state
                .read_long(ordinal, field_name)?
                .map_or(KeyValue::Null, KeyValue::Long),
            FieldType::Float => state
                .read_float(ordinal, field_name)?
                .map_or(KeyValue::Null, |v| KeyValue::FloatBits(v.to_bits())),
            FieldType::Double => state
                .read_double(ordinal, field_name)?
                .map_or(KeyValue::Null, |v| KeyValue::DoubleBits(v.to_bits())),
            FieldType::Boolean => state
                .read_boolean(ordinal, field_name)?
                .map_or(KeyValue::Null, KeyValue::Boolean),
            FieldType::String => state
                .read_string(ordinal, field_name)?
                .map_or(KeyValue::Null, KeyValue::String),
            FieldType::Bytes => state
                .read_bytes(ordinal, field_name)?
                .map_or(KeyValue::Null, KeyValue::Bytes),
            FieldType::Reference => state
                .read_ordinal(ordinal, field_name)?
                .map_or(KeyValue::Null, KeyValue::Ordinal),
        })
    }
}

/// Hash index from primary-key values to ordinals for one object type.
pub struct PrimaryKeyIndex {
    type_name: String,
    fields: Vec<String>,
    by_key: FxHashMap<Vec<KeyValue>, u64>,
}

impl PrimaryKeyIndex {
    /// Build the index for `state` if it is an object type with a
    /// declared primary key whose fields all survive filtering.
    /// Key paths must name direct fields of the type.
    pub(crate) fn build(state: &TypeReadState) -> MosaicResult<Option<PrimaryKeyIndex>> {
        let object = match state.object() {
            Some(object) if !object.schema().primary_key.is_empty() => object,
            _ => return Ok(None),
        };
        let fields = object.schema().primary_key.clone();
        for field in &fields {
            if field.contains('.') || object.schema().field(field).is_none() {
                warn!(
                    type_name = state.type_name(),
                    field, "primary-key field unavailable, skipping index"
                );
                return Ok(None);
            }
        }

        let mut by_key = FxHashMap::default();
        for ordinal in state.populated_ordinals() {
            let mut key = Vec::with_capacity(fields.len());
            for field in &fields {
                key.push(KeyValue::read(object, ordinal, field)?);
            }
            if let Some(previous) = by_key.insert(key, ordinal) {
                warn!(
                    type_name = state.type_name(),
                    previous, ordinal, "duplicate primary key, keeping the later ordinal"
                );
            }
        }
        Ok(Some(PrimaryKeyIndex {
            type_name: state.type_name().to_string(),
            fields,
            by_key,
        }))
    }

    /// The indexed type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The key field names, in declaration order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Resolve a key to its ordinal.
    pub fn ordinal_for(&self, key: &[KeyValue]) -> Option<u64> {
        self.by_key.get(key).copied()
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
