//! Delta walker tests: origin-tag assertion, tag chaining, discard of
//! unknown types, in-place payload application against engine-owned
//! shards, and the shared-memory rejection path.

use mosaic_core::schema::{FieldType, ListSchema, MapSchema, ObjectField, ObjectSchema, Schema};
use mosaic_core::{FilterConfig, MemoryMode, MosaicError};
use mosaic_engine::{read_delta, read_snapshot, ReadStateEngine};
use mosaic_format::{
    BlobInput, DeltaBuilder, ElementUpdate, EntryUpdate, FieldUpdate, FieldValue, SnapshotBuilder,
    TypeData,
};

fn movie_schema() -> ObjectSchema {
    ObjectSchema {
        name: "Movie".to_string(),
        fields: vec![ObjectField {
            name: "id".to_string(),
            field_type: FieldType::Int,
            referenced_type: None,
            stored_position: 0,
        }],
        primary_key: vec![],
    }
}

fn snapshot_engine(destination_tag: u64) -> ReadStateEngine {
    let blob = SnapshotBuilder::new(destination_tag)
        .add_type(TypeData::Object {
            schema: movie_schema(),
            num_shards: 1,
            records: vec![Some(vec![FieldValue::Int(1)])],
        })
        .build();
    let engine = ReadStateEngine::new(MemoryMode::SharedMemoryLazy);
    let mut input = BlobInput::from_vec(blob);
    read_snapshot(&engine, &mut input, &FilterConfig::new_include_all()).unwrap();
    engine
}

#[test]
fn wrong_origin_is_rejected_and_engine_unchanged() {
    let engine = snapshot_engine(0xAA);
    let delta = DeltaBuilder::new(0xBB, 0xCC).build();

    let err = read_delta(
        &engine,
        &mut BlobInput::from_vec(delta),
        &FilterConfig::new_include_all(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        MosaicError::WrongOrigin {
            expected: 0xAA,
            actual: 0xBB
        }
    ));
    assert_eq!(engine.randomized_tag(), 0xAA);
    assert!(err.is_pre_mutation());
}

#[test]
fn empty_delta_advances_the_tag_chain() {
    let engine = snapshot_engine(0xAA);
    let delta = DeltaBuilder::new(0xAA, 0xAB).build();

    let header = read_delta(
        &engine,
        &mut BlobInput::from_vec(delta),
        &FilterConfig::new_include_all(),
    )
    .unwrap();

    assert_eq!(header.destination_tag, 0xAB);
    assert_eq!(engine.randomized_tag(), 0xAB);

    // a second delta chains from the new tag
    let next = DeltaBuilder::new(0xAB, 0xAC).build();
    read_delta(
        &engine,
        &mut BlobInput::from_vec(next),
        &FilterConfig::new_include_all(),
    )
    .unwrap();
    assert_eq!(engine.randomized_tag(), 0xAC);
}

#[test]
fn unknown_delta_type_is_discarded() {
    let engine = snapshot_engine(0xAA);
    let unknown = Schema::List(ListSchema {
        name: "NeverLoaded".to_string(),
        element_type: "Movie".to_string(),
    });
    let delta = DeltaBuilder::new(0xAA, 0xAB)
        .add_type(unknown, vec![0xDE, 0xAD, 0xBE, 0xEF])
        .build();

    let mut input = BlobInput::from_vec(delta);
    read_delta(&engine, &mut input, &FilterConfig::new_include_all()).unwrap();
    assert_eq!(input.remaining(), 0, "discard must consume the payload");
    assert_eq!(engine.randomized_tag(), 0xAB);
}

fn titled_schema() -> ObjectSchema {
    ObjectSchema {
        name: "Movie".to_string(),
        fields: vec![
            ObjectField {
                name: "id".to_string(),
                field_type: FieldType::Int,
                referenced_type: None,
                stored_position: 0,
            },
            ObjectField {
                name: "title".to_string(),
                field_type: FieldType::String,
                referenced_type: None,
                stored_position: 1,
            },
        ],
        primary_key: vec![],
    }
}

fn on_heap_engine(destination_tag: u64) -> ReadStateEngine {
    let blob = SnapshotBuilder::new(destination_tag)
        .add_type(TypeData::Object {
            schema: titled_schema(),
            num_shards: 1,
            records: vec![
                Some(vec![
                    FieldValue::Int(1),
                    FieldValue::String("A".to_string()),
                ]),
                Some(vec![
                    FieldValue::Int(2),
                    FieldValue::String("BB".to_string()),
                ]),
            ],
        })
        .build();
    let engine = ReadStateEngine::new(MemoryMode::OnHeap);
    let mut input = BlobInput::from_vec(blob);
    read_snapshot(&engine, &mut input, &FilterConfig::new_include_all()).unwrap();
    engine
}

#[test]
fn on_heap_delta_overwrites_object_field() {
    let engine = on_heap_engine(0xAA);
    let delta = DeltaBuilder::new(0xAA, 0xAB)
        .update_object(
            titled_schema(),
            &[
                FieldUpdate {
                    ordinal: 1,
                    field: "id".to_string(),
                    value: FieldValue::Int(3),
                },
                FieldUpdate {
                    ordinal: 0,
                    field: "id".to_string(),
                    value: FieldValue::Null,
                },
            ],
        )
        .build();

    let mut input = BlobInput::from_vec(delta);
    read_delta(&engine, &mut input, &FilterConfig::new_include_all()).unwrap();
    assert_eq!(input.remaining(), 0, "payload must be fully consumed");
    assert_eq!(engine.randomized_tag(), 0xAB);

    let movie = engine.type_state("Movie").unwrap();
    let object = movie.object().unwrap();
    assert_eq!(object.read_int(1, "id").unwrap(), Some(3));
    assert_eq!(object.read_int(0, "id").unwrap(), None);
    // untouched fields still read the snapshot values
    assert_eq!(object.read_string(0, "title").unwrap(), Some("A".to_string()));
    assert_eq!(object.read_string(1, "title").unwrap(), Some("BB".to_string()));
}

#[test]
fn on_heap_delta_updates_collections_and_maps() {
    let blob = SnapshotBuilder::new(0xAA)
        .add_type(TypeData::List {
            name: "Cast".to_string(),
            element_type: "Actor".to_string(),
            num_shards: 1,
            records: vec![Some(vec![3, 1, 4])],
        })
        .add_type(TypeData::Map {
            name: "Ratings".to_string(),
            key_type: "Country".to_string(),
            value_type: "Rating".to_string(),
            hash_key_paths: vec![],
            num_shards: 1,
            records: vec![Some(vec![(1, 100), (2, 200)])],
        })
        .build();
    let engine = ReadStateEngine::new(MemoryMode::OnHeap);
    read_snapshot(
        &engine,
        &mut BlobInput::from_vec(blob),
        &FilterConfig::new_include_all(),
    )
    .unwrap();

    let delta = DeltaBuilder::new(0xAA, 0xAB)
        .update_collection(
            Schema::List(ListSchema {
                name: "Cast".to_string(),
                element_type: "Actor".to_string(),
            }),
            &[ElementUpdate {
                ordinal: 0,
                index: 2,
                element: 5,
            }],
        )
        .update_map(
            MapSchema {
                name: "Ratings".to_string(),
                key_type: "Country".to_string(),
                value_type: "Rating".to_string(),
                hash_key_paths: vec![],
            },
            &[EntryUpdate {
                ordinal: 0,
                index: 1,
                key: 3,
                value: 150,
            }],
        )
        .build();

    let mut input = BlobInput::from_vec(delta);
    read_delta(&engine, &mut input, &FilterConfig::new_include_all()).unwrap();
    assert_eq!(input.remaining(), 0);

    let cast = engine.type_state("Cast").unwrap();
    assert_eq!(cast.list().unwrap().elements(0).unwrap(), vec![3, 1, 5]);

    let ratings = engine.type_state("Ratings").unwrap();
    assert_eq!(
        ratings.map().unwrap().entries(0).unwrap(),
        vec![(1, 100), (3, 150)]
    );
}

#[test]
fn on_heap_delta_value_wider_than_slot_is_malformed() {
    let engine = on_heap_engine(0xAA);
    // the resident id slots are 3 bits wide; 1000 cannot fit
    let delta = DeltaBuilder::new(0xAA, 0xAB)
        .update_object(
            titled_schema(),
            &[FieldUpdate {
                ordinal: 0,
                field: "id".to_string(),
                value: FieldValue::Int(1000),
            }],
        )
        .build();

    let err = read_delta(
        &engine,
        &mut BlobInput::from_vec(delta),
        &FilterConfig::new_include_all(),
    )
    .unwrap_err();
    assert!(err.is_malformed());
}

#[test]
fn on_heap_delta_var_width_overwrite_is_malformed() {
    let engine = on_heap_engine(0xAA);
    // hand-crafted payload naming the title field; the builder refuses
    // to encode var-width overwrites
    let mut payload = Vec::new();
    mosaic_format::varint::write_varint(&mut payload, 1);
    mosaic_format::varint::write_varint(&mut payload, 0); // ordinal
    mosaic_format::varint::write_varint(&mut payload, 1); // title's stored position
    payload.push(0);
    mosaic_format::varint::write_varint(&mut payload, 1);
    let delta = DeltaBuilder::new(0xAA, 0xAB)
        .add_type(Schema::Object(titled_schema()), payload)
        .build();

    let err = read_delta(
        &engine,
        &mut BlobInput::from_vec(delta),
        &FilterConfig::new_include_all(),
    )
    .unwrap_err();
    assert!(err.is_malformed());
}

#[test]
fn on_heap_delta_modifying_unpopulated_ordinal_is_malformed() {
    let engine = on_heap_engine(0xAA);
    let delta = DeltaBuilder::new(0xAA, 0xAB)
        .update_object(
            titled_schema(),
            &[FieldUpdate {
                ordinal: 9,
                field: "id".to_string(),
                value: FieldValue::Int(1),
            }],
        )
        .build();

    let err = read_delta(
        &engine,
        &mut BlobInput::from_vec(delta),
        &FilterConfig::new_include_all(),
    )
    .unwrap_err();
    assert!(err.is_malformed());
}

#[test]
fn shared_mode_delta_payload_is_rejected() {
    for mode in [MemoryMode::SharedMemoryLazy, MemoryMode::SharedMemoryEager] {
        let blob = SnapshotBuilder::new(0xAA)
            .add_type(TypeData::Object {
                schema: movie_schema(),
                num_shards: 1,
                records: vec![Some(vec![FieldValue::Int(1)])],
            })
            .build();
        let engine = ReadStateEngine::new(mode);
        read_snapshot(
            &engine,
            &mut BlobInput::from_vec(blob),
            &FilterConfig::new_include_all(),
        )
        .unwrap();

        let delta = DeltaBuilder::new(0xAA, 0xAB)
            .update_object(
                movie_schema(),
                &[FieldUpdate {
                    ordinal: 0,
                    field: "id".to_string(),
                    value: FieldValue::Int(0),
                }],
            )
            .build();
        let err = read_delta(
            &engine,
            &mut BlobInput::from_vec(delta),
            &FilterConfig::new_include_all(),
        )
        .unwrap_err();

        assert!(
            matches!(err, MosaicError::DeltaUnsupported { mode: m } if m == mode),
            "mode {:?}",
            mode
        );
        assert!(!err.is_pre_mutation());
    }
}

#[test]
fn incompatible_delta_schema_is_a_mismatch() {
    let engine = snapshot_engine(0xAA);
    let mut changed = movie_schema();
    changed.fields[0].field_type = FieldType::Long;
    let delta = DeltaBuilder::new(0xAA, 0xAB)
        .add_type(Schema::Object(changed), vec![])
        .build();

    let err = read_delta(
        &engine,
        &mut BlobInput::from_vec(delta),
        &FilterConfig::new_include_all(),
    )
    .unwrap_err();
    assert!(matches!(err, MosaicError::SchemaMismatch { .. }));
}

#[test]
fn snapshot_with_nonzero_origin_is_malformed() {
    let mut blob = Vec::new();
    let mut header = mosaic_format::BlobHeader::snapshot(0x1);
    header.origin_tag = 0x99;
    mosaic_format::write_header(&mut blob, &header);
    mosaic_format::varint::write_varint(&mut blob, 0);

    let engine = ReadStateEngine::new(MemoryMode::OnHeap);
    let err = read_snapshot(
        &engine,
        &mut BlobInput::from_vec(blob),
        &FilterConfig::new_include_all(),
    )
    .unwrap_err();
    assert!(err.is_malformed());
}

#[test]
fn duplicate_schema_names_are_malformed() {
    let blob = SnapshotBuilder::new(1)
        .add_type(TypeData::Object {
            schema: movie_schema(),
            num_shards: 1,
            records: vec![Some(vec![FieldValue::Int(1)])],
        })
        .add_type(TypeData::Object {
            schema: movie_schema(),
            num_shards: 1,
            records: vec![Some(vec![FieldValue::Int(2)])],
        })
        .build();

    let engine = ReadStateEngine::new(MemoryMode::SharedMemoryLazy);
    let err = read_snapshot(
        &engine,
        &mut BlobInput::from_vec(blob),
        &FilterConfig::new_include_all(),
    )
    .unwrap_err();
    assert!(err.is_malformed());
}
