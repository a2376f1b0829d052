//! Snapshot and delta blob writer
//!
//! The producer side proper lives outside this engine; this module is the
//! in-repo fixture producer used by tests and examples to emit blobs in
//! the exact wire format the reader consumes, the same way the vector
//! mmap cache ships its own writer for its reader's tests.
//!
//! Payload layout notes:
//! - Fixed-width slots hold ZigZag-folded integers (or raw ordinals /
//!   IEEE bit patterns); the all-ones value of the slot width is the
//!   null sentinel. Floats use 33-bit slots so every 32-bit pattern is
//!   representable alongside the sentinel; doubles use 64-bit slots
//!   where the all-ones NaN pattern reads as null.
//! - Var-width slots hold `end_offset + 1` into the field's byte heap,
//!   with 0 meaning null.
//! - Collection pointer slots hold the cumulative exclusive end index;
//!   a hole repeats the previous cumulative value.

use crate::header::{write_header, BlobHeader};
use crate::schema_codec::{write_schema, write_shard_preamble};
use crate::segmented_longs::{bits_needed, null_sentinel};
use crate::varint::{fold_signed, write_varint};
use mosaic_core::schema::{
    FieldType, ListSchema, MapSchema, ObjectSchema, Schema, SetSchema,
};

/// One field value of one object record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit signed integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Boolean
    Boolean(bool),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Ordinal of a referenced record
    Ordinal(u64),
    /// Absent value
    Null,
}

/// The records of one type, indexed by ordinal (`None` = ordinal hole).
#[derive(Debug, Clone)]
pub enum TypeData {
    /// Object records: one `Vec<FieldValue>` per ordinal, arity matching
    /// the schema
    Object {
        /// The stored schema
        schema: ObjectSchema,
        /// Power-of-two shard count
        num_shards: u32,
        /// Records by ordinal
        records: Vec<Option<Vec<FieldValue>>>,
    },
    /// List records: element ordinals per ordinal
    List {
        /// Type name
        name: String,
        /// Element type name
        element_type: String,
        /// Power-of-two shard count
        num_shards: u32,
        /// Records by ordinal
        records: Vec<Option<Vec<u64>>>,
    },
    /// Set records: member ordinals per ordinal
    Set {
        /// Type name
        name: String,
        /// Element type name
        element_type: String,
        /// Hash-key field paths into the element type
        hash_key_paths: Vec<String>,
        /// Power-of-two shard count
        num_shards: u32,
        /// Records by ordinal
        records: Vec<Option<Vec<u64>>>,
    },
    /// Map records: (key ordinal, value ordinal) entries per ordinal
    Map {
        /// Type name
        name: String,
        /// Key type name
        key_type: String,
        /// Value type name
        value_type: String,
        /// Hash-key field paths into the key type
        hash_key_paths: Vec<String>,
        /// Power-of-two shard count
        num_shards: u32,
        /// Records by ordinal
        records: Vec<Option<Vec<(u64, u64)>>>,
    },
}

impl TypeData {
    fn schema(&self) -> Schema {
        match self {
            TypeData::Object { schema, .. } => Schema::Object(schema.clone()),
            TypeData::List {
                name, element_type, ..
            } => Schema::List(ListSchema {
                name: name.clone(),
                element_type: element_type.clone(),
            }),
            TypeData::Set {
                name,
                element_type,
                hash_key_paths,
                ..
            } => Schema::Set(SetSchema {
                name: name.clone(),
                element_type: element_type.clone(),
                hash_key_paths: hash_key_paths.clone(),
            }),
            TypeData::Map {
                name,
                key_type,
                value_type,
                hash_key_paths,
                ..
            } => Schema::Map(MapSchema {
                name: name.clone(),
                key_type: key_type.clone(),
                value_type: value_type.clone(),
                hash_key_paths: hash_key_paths.clone(),
            }),
        }
    }

    fn num_shards(&self) -> u32 {
        match self {
            TypeData::Object { num_shards, .. }
            | TypeData::List { num_shards, .. }
            | TypeData::Set { num_shards, .. }
            | TypeData::Map { num_shards, .. } => *num_shards,
        }
    }
}

/// Packs values of fixed bit width into a contiguous little-endian bit
/// stream over 64-bit words.
pub struct BitWriter {
    words: Vec<u64>,
    bit_pos: u64,
}

impl BitWriter {
    /// Create an empty bit stream.
    pub fn new() -> BitWriter {
        BitWriter {
            words: Vec::new(),
            bit_pos: 0,
        }
    }

    /// Append the low `width` bits of `value`.
    pub fn write(&mut self, value: u64, width: u32) {
        debug_assert!(width >= 1 && width <= 64);
        debug_assert!(width == 64 || value < (1u64 << width));
        let word = (self.bit_pos >> 6) as usize;
        let shift = (self.bit_pos & 63) as u32;
        while self.words.len() <= word + 1 {
            self.words.push(0);
        }
        self.words[word] |= value << shift;
        if shift + width > 64 {
            self.words[word + 1] |= value >> (64 - shift);
        }
        self.bit_pos += u64::from(width);
    }

    /// The packed words, trimmed to the populated length.
    pub fn finish(mut self) -> Vec<u64> {
        let needed = ((self.bit_pos + 63) / 64) as usize;
        self.words.truncate(needed);
        self.words
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        BitWriter::new()
    }
}

fn write_long_block(out: &mut Vec<u8>, words: &[u64]) {
    write_varint(out, words.len() as u64);
    for word in words {
        out.extend_from_slice(&word.to_le_bytes());
    }
}

fn write_byte_block(out: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn population_bitmap(present: &[bool]) -> Vec<u64> {
    let mut words = vec![0u64; (present.len() + 63) / 64];
    for (ordinal, &is_present) in present.iter().enumerate() {
        if is_present {
            words[ordinal >> 6] |= 1u64 << (ordinal & 63);
        }
    }
    words
}

/// Split `records` into per-shard vectors: ordinal `o` lands in shard
/// `o & (num_shards - 1)` at shard-ordinal `o >> log2(num_shards)`.
fn shard_split<T: Clone>(records: &[Option<T>], num_shards: u32) -> Vec<Vec<Option<T>>> {
    let shift = num_shards.trailing_zeros();
    let mask = u64::from(num_shards - 1);
    let mut shards: Vec<Vec<Option<T>>> = vec![Vec::new(); num_shards as usize];
    for (ordinal, record) in records.iter().enumerate() {
        let shard = (ordinal as u64 & mask) as usize;
        let shard_ordinal = (ordinal as u64 >> shift) as usize;
        let target = &mut shards[shard];
        if record.is_some() {
            while target.len() < shard_ordinal {
                target.push(None);
            }
            target.push(record.clone());
        }
    }
    shards
}

fn fold_fixed(value: &FieldValue, field_type: FieldType) -> Option<u64> {
    match (value, field_type) {
        (FieldValue::Null, _) => None,
        (FieldValue::Int(v), FieldType::Int) => Some(fold_signed(i64::from(*v))),
        (FieldValue::Long(v), FieldType::Long) => Some(fold_signed(*v)),
        (FieldValue::Float(v), FieldType::Float) => Some(u64::from(v.to_bits())),
        (FieldValue::Double(v), FieldType::Double) => Some(v.to_bits()),
        (FieldValue::Boolean(v), FieldType::Boolean) => Some(u64::from(*v)),
        (FieldValue::Ordinal(v), FieldType::Reference) => Some(*v),
        _ => panic!(
            "field value {:?} does not match field type {:?}",
            value, field_type
        ),
    }
}

fn var_bytes(value: &FieldValue) -> Option<&[u8]> {
    match value {
        FieldValue::Null => None,
        FieldValue::String(s) => Some(s.as_bytes()),
        FieldValue::Bytes(b) => Some(b),
        other => panic!("field value {:?} is not var-width", other),
    }
}

fn write_object_shard(out: &mut Vec<u8>, schema: &ObjectSchema, shard: &[Option<Vec<FieldValue>>]) {
    let n = shard.len();
    write_varint(out, n as u64);

    let present: Vec<bool> = shard.iter().map(|r| r.is_some()).collect();
    write_long_block(out, &population_bitmap(&present));

    for (field_index, field) in schema.fields.iter().enumerate() {
        if field.field_type.is_var_width() {
            // heap + end+1 offset slots, 0 = null
            let mut heap = Vec::new();
            let mut slots = Vec::with_capacity(n);
            for record in shard {
                let slot = match record.as_ref().and_then(|r| var_bytes(&r[field_index])) {
                    Some(bytes) => {
                        heap.extend_from_slice(bytes);
                        heap.len() as u64 + 1
                    }
                    None => 0,
                };
                slots.push(slot);
            }
            let width = bits_needed(slots.iter().copied().max().unwrap_or(0));
            let mut packer = BitWriter::new();
            for slot in &slots {
                packer.write(*slot, width);
            }
            write_varint(out, u64::from(width));
            write_long_block(out, &packer.finish());
            write_byte_block(out, &heap);
        } else {
            let folded: Vec<Option<u64>> = shard
                .iter()
                .map(|record| {
                    record
                        .as_ref()
                        .and_then(|r| fold_fixed(&r[field_index], field.field_type))
                })
                .collect();
            let width = fixed_width(field.field_type, &folded);
            let mut packer = BitWriter::new();
            for value in &folded {
                packer.write(value.unwrap_or_else(|| null_sentinel(width)), width);
            }
            write_varint(out, u64::from(width));
            write_long_block(out, &packer.finish());
        }
    }
}

fn fixed_width(field_type: FieldType, folded: &[Option<u64>]) -> u32 {
    match field_type {
        FieldType::Boolean => 2,
        // one bit above the 32-bit pattern space keeps the sentinel clear
        // of every representable float
        FieldType::Float => 33,
        FieldType::Double => 64,
        _ => {
            let max = folded.iter().flatten().copied().max().unwrap_or(0);
            let mut width = bits_needed(max);
            while width < 64 && folded.iter().flatten().any(|&v| v == null_sentinel(width)) {
                width += 1;
            }
            width
        }
    }
}

fn write_pointer_block(out: &mut Vec<u8>, ends: &[u64]) {
    let width = bits_needed(ends.iter().copied().max().unwrap_or(0));
    let mut packer = BitWriter::new();
    for end in ends {
        packer.write(*end, width);
    }
    write_varint(out, u64::from(width));
    write_long_block(out, &packer.finish());
}

fn write_collection_shard(out: &mut Vec<u8>, shard: &[Option<Vec<u64>>]) {
    write_varint(out, shard.len() as u64);
    let present: Vec<bool> = shard.iter().map(|r| r.is_some()).collect();
    write_long_block(out, &population_bitmap(&present));

    let mut ends = Vec::with_capacity(shard.len());
    let mut elements = Vec::new();
    let mut cumulative = 0u64;
    for record in shard {
        if let Some(members) = record {
            cumulative += members.len() as u64;
            elements.extend_from_slice(members);
        }
        ends.push(cumulative);
    }
    write_pointer_block(out, &ends);

    let element_width = bits_needed(elements.iter().copied().max().unwrap_or(0));
    let mut packer = BitWriter::new();
    for element in &elements {
        packer.write(*element, element_width);
    }
    write_varint(out, u64::from(element_width));
    write_long_block(out, &packer.finish());
}

fn write_map_shard(out: &mut Vec<u8>, shard: &[Option<Vec<(u64, u64)>>]) {
    write_varint(out, shard.len() as u64);
    let present: Vec<bool> = shard.iter().map(|r| r.is_some()).collect();
    write_long_block(out, &population_bitmap(&present));

    let mut ends = Vec::with_capacity(shard.len());
    let mut entries = Vec::new();
    let mut cumulative = 0u64;
    for record in shard {
        if let Some(pairs) = record {
            cumulative += pairs.len() as u64;
            entries.extend_from_slice(pairs);
        }
        ends.push(cumulative);
    }
    write_pointer_block(out, &ends);

    let key_width = bits_needed(entries.iter().map(|(k, _)| *k).max().unwrap_or(0));
    let value_width = bits_needed(entries.iter().map(|(_, v)| *v).max().unwrap_or(0));
    write_varint(out, u64::from(key_width));
    write_varint(out, u64::from(value_width));
    let mut packer = BitWriter::new();
    for (key, value) in &entries {
        packer.write(*key, key_width);
        packer.write(*value, value_width);
    }
    write_long_block(out, &packer.finish());
}

fn write_type_block(out: &mut Vec<u8>, data: &TypeData) {
    write_schema(out, &data.schema());
    write_shard_preamble(out, data.num_shards());
    match data {
        TypeData::Object {
            schema,
            num_shards,
            records,
        } => {
            for record in records.iter().flatten() {
                assert_eq!(
                    record.len(),
                    schema.fields.len(),
                    "record arity must match schema {:?}",
                    schema.name
                );
            }
            for shard in shard_split(records, *num_shards) {
                write_object_shard(out, schema, &shard);
            }
        }
        TypeData::List {
            num_shards, records, ..
        }
        | TypeData::Set {
            num_shards, records, ..
        } => {
            for shard in shard_split(records, *num_shards) {
                write_collection_shard(out, &shard);
            }
        }
        TypeData::Map {
            num_shards, records, ..
        } => {
            for shard in shard_split(records, *num_shards) {
                write_map_shard(out, &shard);
            }
        }
    }
}

/// Builds a snapshot blob.
///
/// ```
/// use mosaic_core::schema::{FieldType, ObjectField, ObjectSchema};
/// use mosaic_format::{FieldValue, SnapshotBuilder, TypeData};
///
/// let schema = ObjectSchema {
///     name: "Movie".to_string(),
///     fields: vec![ObjectField {
///         name: "id".to_string(),
///         field_type: FieldType::Int,
///         referenced_type: None,
///         stored_position: 0,
///     }],
///     primary_key: vec![],
/// };
/// let blob = SnapshotBuilder::new(0xDEADBEEF)
///     .add_type(TypeData::Object {
///         schema,
///         num_shards: 1,
///         records: vec![Some(vec![FieldValue::Int(1)])],
///     })
///     .build();
/// assert!(!blob.is_empty());
/// ```
pub struct SnapshotBuilder {
    header: BlobHeader,
    types: Vec<TypeData>,
}

impl SnapshotBuilder {
    /// Start a snapshot producing `destination_tag`.
    pub fn new(destination_tag: u64) -> SnapshotBuilder {
        SnapshotBuilder {
            header: BlobHeader::snapshot(destination_tag),
            types: Vec::new(),
        }
    }

    /// Attach a header key/value tag.
    pub fn header_tag(mut self, key: &str, value: &str) -> SnapshotBuilder {
        self.header.tags.insert(key.to_string(), value.to_string());
        self
    }

    /// Append a type block.
    pub fn add_type(mut self, data: TypeData) -> SnapshotBuilder {
        self.types.push(data);
        self
    }

    /// Emit the blob bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_header(&mut out, &self.header);
        write_varint(&mut out, self.types.len() as u64);
        for data in &self.types {
            write_type_block(&mut out, data);
        }
        out
    }
}

/// One object field overwrite carried by a delta. Only fixed-width
/// fields can be overwritten in place; var-width values live in a
/// shared heap whose offsets cannot change per record.
#[derive(Debug, Clone)]
pub struct FieldUpdate {
    /// Ordinal of the record to modify
    pub ordinal: u64,
    /// Field name in the stored schema
    pub field: String,
    /// Replacement value
    pub value: FieldValue,
}

/// One collection element overwrite carried by a delta.
#[derive(Debug, Clone, Copy)]
pub struct ElementUpdate {
    /// Ordinal of the list or set to modify
    pub ordinal: u64,
    /// Position within the ordinal's element range
    pub index: u64,
    /// Replacement element ordinal
    pub element: u64,
}

/// One map entry overwrite carried by a delta.
#[derive(Debug, Clone, Copy)]
pub struct EntryUpdate {
    /// Ordinal of the map to modify
    pub ordinal: u64,
    /// Position within the ordinal's entry range
    pub index: u64,
    /// Replacement key ordinal
    pub key: u64,
    /// Replacement value ordinal
    pub value: u64,
}

/// Builds a delta blob: length-prefixed per-type payloads carrying
/// fixed-width overwrite records, or opaque bytes the caller supplies.
pub struct DeltaBuilder {
    header: BlobHeader,
    types: Vec<(Schema, Vec<u8>)>,
}

impl DeltaBuilder {
    /// Start a delta transitioning `origin_tag` to `destination_tag`.
    pub fn new(origin_tag: u64, destination_tag: u64) -> DeltaBuilder {
        DeltaBuilder {
            header: BlobHeader::delta(origin_tag, destination_tag),
            types: Vec::new(),
        }
    }

    /// Append a type block with an opaque payload.
    pub fn add_type(mut self, schema: Schema, payload: Vec<u8>) -> DeltaBuilder {
        self.types.push((schema, payload));
        self
    }

    /// Append an object type block overwriting fixed-width fields of
    /// existing ordinals.
    pub fn update_object(self, schema: ObjectSchema, updates: &[FieldUpdate]) -> DeltaBuilder {
        let mut payload = Vec::new();
        write_varint(&mut payload, updates.len() as u64);
        for update in updates {
            let position = schema
                .fields
                .iter()
                .position(|f| f.name == update.field)
                .unwrap_or_else(|| panic!("unknown field {:?}", update.field));
            let field_type = schema.fields[position].field_type;
            assert!(
                !field_type.is_var_width(),
                "delta overwrites carry fixed-width fields only"
            );
            write_varint(&mut payload, update.ordinal);
            write_varint(&mut payload, position as u64);
            match fold_fixed(&update.value, field_type) {
                Some(folded) => {
                    payload.push(0);
                    write_varint(&mut payload, folded);
                }
                None => payload.push(1),
            }
        }
        self.add_type(Schema::Object(schema), payload)
    }

    /// Append a list or set type block overwriting element ordinals of
    /// existing records.
    pub fn update_collection(self, schema: Schema, updates: &[ElementUpdate]) -> DeltaBuilder {
        assert!(
            matches!(schema, Schema::List(_) | Schema::Set(_)),
            "collection updates apply to list and set types"
        );
        let mut payload = Vec::new();
        write_varint(&mut payload, updates.len() as u64);
        for update in updates {
            write_varint(&mut payload, update.ordinal);
            write_varint(&mut payload, update.index);
            write_varint(&mut payload, update.element);
        }
        self.add_type(schema, payload)
    }

    /// Append a map type block overwriting entries of existing records.
    pub fn update_map(self, schema: MapSchema, updates: &[EntryUpdate]) -> DeltaBuilder {
        let mut payload = Vec::new();
        write_varint(&mut payload, updates.len() as u64);
        for update in updates {
            write_varint(&mut payload, update.ordinal);
            write_varint(&mut payload, update.index);
            write_varint(&mut payload, update.key);
            write_varint(&mut payload, update.value);
        }
        self.add_type(Schema::Map(schema), payload)
    }

    /// Emit the blob bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_header(&mut out, &self.header);
        write_varint(&mut out, self.types.len() as u64);
        for (schema, payload) in &self.types {
            write_schema(&mut out, schema);
            write_byte_block(&mut out, payload);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_input::BlobInput;
    use crate::header::read_header;
    use crate::schema_codec::{read_schema, read_shard_preamble};
    use mosaic_core::schema::ObjectField;

    #[test]
    fn test_bit_writer_packs_contiguously() {
        let mut writer = BitWriter::new();
        writer.write(0b101, 3);
        writer.write(0b11, 2);
        let words = writer.finish();
        assert_eq!(words, vec![0b11_101]);
    }

    #[test]
    fn test_bit_writer_spans_words() {
        let mut writer = BitWriter::new();
        writer.write(0, 58);
        writer.write(0xABC, 12);
        let words = writer.finish();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0] >> 58, 0xABC & 0x3F);
        assert_eq!(words[1], 0xABC >> 6);
    }

    #[test]
    fn test_population_bitmap() {
        let words = population_bitmap(&[true, false, true, false]);
        assert_eq!(words, vec![0b101]);
        assert!(population_bitmap(&[]).is_empty());
    }

    #[test]
    fn test_shard_split_dispatch() {
        let records: Vec<Option<u32>> = (0..16).map(Some).collect();
        let shards = shard_split(&records, 4);
        for (shard_index, shard) in shards.iter().enumerate() {
            for (shard_ordinal, record) in shard.iter().enumerate() {
                let ordinal = record.unwrap() as u64;
                assert_eq!(ordinal & 3, shard_index as u64);
                assert_eq!(ordinal >> 2, shard_ordinal as u64);
            }
        }
    }

    #[test]
    fn test_fixed_width_avoids_sentinel_collision() {
        // max folded value 3 needs 2 bits, but 3 == sentinel(2), so the
        // writer widens to 3 bits
        let folded = vec![Some(3u64), Some(1)];
        assert_eq!(fixed_width(FieldType::Int, &folded), 3);
    }

    #[test]
    fn test_snapshot_frames_parse_back() {
        let schema = ObjectSchema {
            name: "Movie".to_string(),
            fields: vec![ObjectField {
                name: "id".to_string(),
                field_type: FieldType::Int,
                referenced_type: None,
                stored_position: 0,
            }],
            primary_key: vec![],
        };
        let blob = SnapshotBuilder::new(0xCAFE)
            .header_tag("producer", "tests")
            .add_type(TypeData::Object {
                schema: schema.clone(),
                num_shards: 2,
                records: vec![Some(vec![FieldValue::Int(5)]), Some(vec![FieldValue::Int(6)])],
            })
            .build();

        let mut input = BlobInput::from_vec(blob);
        let header = read_header(&mut input).unwrap();
        assert_eq!(header.destination_tag, 0xCAFE);
        assert_eq!(header.tags["producer"], "tests");
        assert_eq!(input.read_varint().unwrap(), 1);
        let parsed = read_schema(&mut input).unwrap();
        assert_eq!(parsed.name(), "Movie");
        assert_eq!(read_shard_preamble(&mut input).unwrap(), 2);
    }

    #[test]
    fn test_update_object_payload_encoding() {
        let schema = ObjectSchema {
            name: "Movie".to_string(),
            fields: vec![
                ObjectField {
                    name: "id".to_string(),
                    field_type: FieldType::Int,
                    referenced_type: None,
                    stored_position: 0,
                },
                ObjectField {
                    name: "runtime".to_string(),
                    field_type: FieldType::Long,
                    referenced_type: None,
                    stored_position: 1,
                },
            ],
            primary_key: vec![],
        };
        let blob = DeltaBuilder::new(0x1, 0x2)
            .update_object(
                schema,
                &[
                    FieldUpdate {
                        ordinal: 3,
                        field: "runtime".to_string(),
                        value: FieldValue::Long(-1),
                    },
                    FieldUpdate {
                        ordinal: 0,
                        field: "id".to_string(),
                        value: FieldValue::Null,
                    },
                ],
            )
            .build();

        let mut input = BlobInput::from_vec(blob);
        read_header(&mut input).unwrap();
        assert_eq!(input.read_varint().unwrap(), 1);
        read_schema(&mut input).unwrap();
        let payload_len = input.read_varint().unwrap();
        assert_eq!(payload_len as usize, input.remaining());
        assert_eq!(input.read_varint().unwrap(), 2); // update count
        assert_eq!(input.read_varint().unwrap(), 3); // ordinal
        assert_eq!(input.read_varint().unwrap(), 1); // stored position
        assert_eq!(input.read_u8().unwrap(), 0); // has a value
        assert_eq!(input.read_varint().unwrap(), 1); // ZigZag(-1)
        assert_eq!(input.read_varint().unwrap(), 0); // ordinal
        assert_eq!(input.read_varint().unwrap(), 0); // stored position
        assert_eq!(input.read_u8().unwrap(), 1); // null
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn test_delta_builder_frames() {
        let schema = Schema::List(ListSchema {
            name: "Cast".to_string(),
            element_type: "Actor".to_string(),
        });
        let blob = DeltaBuilder::new(0xAA, 0xBB)
            .add_type(schema, vec![1, 2, 3])
            .build();

        let mut input = BlobInput::from_vec(blob);
        let header = read_header(&mut input).unwrap();
        assert_eq!(header.origin_tag, 0xAA);
        assert_eq!(input.read_varint().unwrap(), 1);
        let parsed = read_schema(&mut input).unwrap();
        assert_eq!(parsed.name(), "Cast");
        assert_eq!(input.read_varint().unwrap(), 3);
        assert_eq!(input.remaining(), 3);
    }
}
