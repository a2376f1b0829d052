//! Schema records and the shard-count preamble
//!
//! Schemas serialize as `[kind:u8][name:vstring][body]`; the body is
//! kind-specific. The shard preamble precedes each type's payload and
//! carries a backwards-compatibility sentinel: a leading zero varint
//! means "1 shard, pre-sharding format"; otherwise a count of
//! forwards-compatibility bytes to skip, then the shard count itself.

use crate::blob_input::BlobInput;
use crate::varint::write_varint;
use mosaic_core::schema::{
    FieldType, ListSchema, MapSchema, ObjectField, ObjectSchema, Schema, SchemaKind, SetSchema,
};
use mosaic_core::{MosaicError, MosaicResult};

fn write_vstring(out: &mut Vec<u8>, value: &str) {
    write_varint(out, value.len() as u64);
    out.extend_from_slice(value.as_bytes());
}

/// Read one schema record from the input's current position.
pub fn read_schema(input: &mut BlobInput) -> MosaicResult<Schema> {
    let kind_byte = input.read_u8()?;
    let kind = SchemaKind::from_u8(kind_byte)
        .ok_or_else(|| MosaicError::malformed(format!("unknown schema kind {}", kind_byte)))?;
    let name = input.read_vstring()?;

    match kind {
        SchemaKind::Object => {
            let pk_count = input.read_varint()? as usize;
            let mut primary_key = Vec::with_capacity(pk_count);
            for _ in 0..pk_count {
                primary_key.push(input.read_vstring()?);
            }
            let field_count = input.read_varint()? as usize;
            let mut fields = Vec::with_capacity(field_count);
            for position in 0..field_count {
                let field_name = input.read_vstring()?;
                let type_byte = input.read_u8()?;
                let field_type = FieldType::from_u8(type_byte).ok_or_else(|| {
                    MosaicError::malformed(format!(
                        "unknown field kind {} in type {:?}",
                        type_byte, name
                    ))
                })?;
                let referenced_type = if field_type == FieldType::Reference {
                    Some(input.read_vstring()?)
                } else {
                    None
                };
                fields.push(ObjectField {
                    name: field_name,
                    field_type,
                    referenced_type,
                    stored_position: position,
                });
            }
            Ok(Schema::Object(ObjectSchema {
                name,
                fields,
                primary_key,
            }))
        }
        SchemaKind::List => Ok(Schema::List(ListSchema {
            name,
            element_type: input.read_vstring()?,
        })),
        SchemaKind::Set => {
            let element_type = input.read_vstring()?;
            let hash_count = input.read_varint()? as usize;
            let mut hash_key_paths = Vec::with_capacity(hash_count);
            for _ in 0..hash_count {
                hash_key_paths.push(input.read_vstring()?);
            }
            Ok(Schema::Set(SetSchema {
                name,
                element_type,
                hash_key_paths,
            }))
        }
        SchemaKind::Map => {
            let key_type = input.read_vstring()?;
            let value_type = input.read_vstring()?;
            let hash_count = input.read_varint()? as usize;
            let mut hash_key_paths = Vec::with_capacity(hash_count);
            for _ in 0..hash_count {
                hash_key_paths.push(input.read_vstring()?);
            }
            Ok(Schema::Map(MapSchema {
                name,
                key_type,
                value_type,
                hash_key_paths,
            }))
        }
    }
}

/// Append the wire encoding of `schema` to `out`.
pub fn write_schema(out: &mut Vec<u8>, schema: &Schema) {
    out.push(schema.kind() as u8);
    write_vstring(out, schema.name());
    match schema {
        Schema::Object(s) => {
            write_varint(out, s.primary_key.len() as u64);
            for path in &s.primary_key {
                write_vstring(out, path);
            }
            write_varint(out, s.fields.len() as u64);
            for field in &s.fields {
                write_vstring(out, &field.name);
                out.push(field.field_type as u8);
                if let Some(referenced) = &field.referenced_type {
                    write_vstring(out, referenced);
                }
            }
        }
        Schema::List(s) => write_vstring(out, &s.element_type),
        Schema::Set(s) => {
            write_vstring(out, &s.element_type);
            write_varint(out, s.hash_key_paths.len() as u64);
            for path in &s.hash_key_paths {
                write_vstring(out, path);
            }
        }
        Schema::Map(s) => {
            write_vstring(out, &s.key_type);
            write_vstring(out, &s.value_type);
            write_varint(out, s.hash_key_paths.len() as u64);
            for path in &s.hash_key_paths {
                write_vstring(out, path);
            }
        }
    }
}

/// Read the shard-count preamble. Returns the number of shards (a power
/// of two).
pub fn read_shard_preamble(input: &mut BlobInput) -> MosaicResult<u32> {
    let marker = input.read_varint()?;
    if marker == 0 {
        // pre-sharding format
        return Ok(1);
    }
    let forwards_compat_len = input.read_varint()? as usize;
    input.skip(forwards_compat_len)?;
    let num_shards = input.read_varint()?;
    if num_shards == 0 || !num_shards.is_power_of_two() || num_shards > u64::from(u32::MAX) {
        return Err(MosaicError::malformed(format!(
            "shard count {} is not a positive power of two",
            num_shards
        )));
    }
    Ok(num_shards as u32)
}

/// Append the modern shard preamble for `num_shards` to `out`.
pub fn write_shard_preamble(out: &mut Vec<u8>, num_shards: u32) {
    debug_assert!(num_shards.is_power_of_two());
    write_varint(out, 1); // sharded-format marker
    write_varint(out, 0); // no forwards-compatibility bytes
    write_varint(out, u64::from(num_shards));
}
