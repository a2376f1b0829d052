//! Consumer lifecycle tests: update plans, failure tracking, generation
//! handoff, and listener callbacks, driven through the public facade.

use mosaic::{
    Blob, DeltaBuilder, FieldType, FieldUpdate, FilterConfig, MemoryMode, MosaicError,
    ObjectField, ObjectSchema, ReadApi, ReadEngineConfig, ReadStateEngine, RefreshDriver,
    RefreshListener, SnapshotBuilder, TypeData, UpdatePlan,
};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

fn movie_schema() -> ObjectSchema {
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

fn movie_snapshot(destination_tag: u64) -> Vec<u8> {
    SnapshotBuilder::new(destination_tag)
        .add_type(TypeData::Object {
            schema: movie_schema(),
            num_shards: 1,
            records: vec![
                Some(vec![
                    mosaic::FieldValue::Int(1),
                    mosaic::FieldValue::String("A".to_string()),
                ]),
                Some(vec![
                    mosaic::FieldValue::Int(2),
                    mosaic::FieldValue::String("BB".to_string()),
                ]),
            ],
        })
        .build()
}

#[derive(Default)]
struct Recording {
    blobs_loaded: AtomicU64,
    snapshots_applied: AtomicU64,
    snapshot_updates: Mutex<Vec<u64>>,
    delta_updates: Mutex<Vec<u64>>,
}

impl RefreshListener for Recording {
    fn blob_loaded(&self, _blob: &Blob) {
        self.blobs_loaded.fetch_add(1, Ordering::SeqCst);
    }
    fn snapshot_applied(&self, _api: &Arc<ReadApi>, _engine: &Arc<ReadStateEngine>, _to: u64) {
        self.snapshots_applied.fetch_add(1, Ordering::SeqCst);
    }
    fn snapshot_update_occurred(
        &self,
        _api: &Arc<ReadApi>,
        _engine: &Arc<ReadStateEngine>,
        version: u64,
    ) {
        self.snapshot_updates.lock().unwrap().push(version);
    }
    fn delta_update_occurred(
        &self,
        _api: &Arc<ReadApi>,
        _engine: &Arc<ReadStateEngine>,
        version: u64,
    ) {
        self.delta_updates.lock().unwrap().push(version);
    }
}

fn driver() -> RefreshDriver {
    RefreshDriver::new(ReadEngineConfig::default(), FilterConfig::new_include_all())
}

#[test]
fn empty_snapshot_plan() {
    let blob = SnapshotBuilder::new(0xDEADBEEF).build();
    let driver = driver();
    let listener = Arc::new(Recording::default());
    driver.register_listener(listener.clone());

    let plan = UpdatePlan::new(vec![Blob::snapshot_in_memory(100, blob)]).unwrap();
    driver.update(&plan).unwrap();

    assert_eq!(driver.current_version(), 100);
    assert!(driver.engine().type_names().is_empty());
    assert_eq!(driver.engine().randomized_tag(), 0xDEADBEEF);
    assert_eq!(listener.snapshots_applied.load(Ordering::SeqCst), 1);
    assert_eq!(*listener.snapshot_updates.lock().unwrap(), vec![100]);
}

#[test]
fn snapshot_then_reads_through_api() {
    let driver = driver();
    let plan =
        UpdatePlan::new(vec![Blob::snapshot_in_memory(7, movie_snapshot(0xFACE))]).unwrap();
    driver.update(&plan).unwrap();

    let api = driver.read_api().unwrap();
    assert_eq!(api.generation(), 1);
    let engine = api.engine();
    let state = engine.type_state("Movie").unwrap();
    assert_eq!(state.populated_ordinals(), vec![0, 1]);
    let movie = state.object().unwrap();
    assert_eq!(movie.read_int(1, "id").unwrap(), Some(2));
    assert_eq!(movie.read_string(1, "title").unwrap(), Some("BB".to_string()));
}

#[test]
fn snapshot_from_mmap_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("snapshot.blob");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&movie_snapshot(0xF11E)).unwrap();
    drop(file);

    for mode in [
        MemoryMode::OnHeap,
        MemoryMode::SharedMemoryLazy,
        MemoryMode::SharedMemoryEager,
    ] {
        let config = ReadEngineConfig {
            memory_mode: mode,
            ..ReadEngineConfig::default()
        };
        let driver = RefreshDriver::new(config, FilterConfig::new_include_all());
        let plan = UpdatePlan::new(vec![Blob::snapshot(1, &path)]).unwrap();
        driver.update(&plan).unwrap();

        let engine = driver.engine();
        let movie = engine.type_state("Movie").unwrap();
        assert_eq!(
            movie.object().unwrap().read_string(0, "title").unwrap(),
            Some("A".to_string())
        );
    }
}

#[test]
fn wrong_origin_delta_marks_blob_failed() {
    let driver = driver();
    driver
        .update(&UpdatePlan::new(vec![Blob::snapshot_in_memory(1, movie_snapshot(0xAA))]).unwrap())
        .unwrap();

    let bad_delta = DeltaBuilder::new(0xBB, 0xCC).build();
    let plan = UpdatePlan::new(vec![Blob::delta_in_memory(1, 2, bad_delta)]).unwrap();
    let err = driver.update(&plan).unwrap_err();

    assert!(matches!(err, MosaicError::WrongOrigin { .. }));
    // version and tag unchanged, blob marked failed, engine not poisoned
    assert_eq!(driver.current_version(), 1);
    assert_eq!(driver.engine().randomized_tag(), 0xAA);
    assert!(driver.tracker().contains(2));
    assert!(!driver.is_poisoned());
}

#[test]
fn known_failing_plan_is_rejected_before_io() {
    let driver = driver();
    driver.tracker().mark_failed(5);

    // the path does not exist; the gate must fire before any open()
    let plan = UpdatePlan::new(vec![Blob::snapshot(5, "/nonexistent/failing.blob")]).unwrap();
    let err = driver.update(&plan).unwrap_err();
    assert!(matches!(
        err,
        MosaicError::KnownFailingTransition { version: 5 }
    ));
}

#[test]
fn double_snapshot_disabled_retries_known_failures() {
    let config = ReadEngineConfig {
        double_snapshot: mosaic::DoubleSnapshotConfig { allow: false },
        ..ReadEngineConfig::default()
    };
    let driver = RefreshDriver::new(config, FilterConfig::new_include_all());
    driver.tracker().mark_failed(9);

    // with the gate off, the plan proceeds and succeeds on retry
    let plan =
        UpdatePlan::new(vec![Blob::snapshot_in_memory(9, movie_snapshot(0x9))]).unwrap();
    driver.update(&plan).unwrap();
    assert_eq!(driver.current_version(), 9);
}

#[test]
fn delta_chain_after_snapshot() {
    let driver = driver();
    let listener = Arc::new(Recording::default());
    driver.register_listener(listener.clone());

    let plan = UpdatePlan::new(vec![
        Blob::snapshot_in_memory(1, movie_snapshot(0xA1)),
        Blob::delta_in_memory(1, 2, DeltaBuilder::new(0xA1, 0xA2).build()),
        Blob::delta_in_memory(2, 3, DeltaBuilder::new(0xA2, 0xA3).build()),
    ])
    .unwrap();
    driver.update(&plan).unwrap();

    assert_eq!(driver.current_version(), 3);
    assert_eq!(driver.engine().randomized_tag(), 0xA3);
    assert_eq!(listener.blobs_loaded.load(Ordering::SeqCst), 3);
    assert_eq!(*listener.snapshot_updates.lock().unwrap(), vec![3]);

    // a later delta-only plan fires the delta callback
    let delta_plan = UpdatePlan::new(vec![Blob::delta_in_memory(
        3,
        4,
        DeltaBuilder::new(0xA3, 0xA4).build(),
    )])
    .unwrap();
    driver.update(&delta_plan).unwrap();
    assert_eq!(*listener.delta_updates.lock().unwrap(), vec![4]);
}

#[test]
fn on_heap_delta_plan_mutates_resident_type() {
    let config = ReadEngineConfig {
        memory_mode: MemoryMode::OnHeap,
        ..ReadEngineConfig::default()
    };
    let driver = RefreshDriver::new(config, FilterConfig::new_include_all());
    driver
        .update(&UpdatePlan::new(vec![Blob::snapshot_in_memory(1, movie_snapshot(0xAA))]).unwrap())
        .unwrap();

    let delta = DeltaBuilder::new(0xAA, 0xAB)
        .update_object(
            movie_schema(),
            &[FieldUpdate {
                ordinal: 0,
                field: "id".to_string(),
                value: mosaic::FieldValue::Int(3),
            }],
        )
        .build();
    driver
        .update(&UpdatePlan::new(vec![Blob::delta_in_memory(1, 2, delta)]).unwrap())
        .unwrap();

    assert_eq!(driver.current_version(), 2);
    assert_eq!(driver.engine().randomized_tag(), 0xAB);
    assert!(!driver.is_poisoned());

    let movie = driver.engine().type_state("Movie").unwrap();
    let object = movie.object().unwrap();
    assert_eq!(object.read_int(0, "id").unwrap(), Some(3));
    assert_eq!(object.read_string(0, "title").unwrap(), Some("A".to_string()));
    assert_eq!(object.read_int(1, "id").unwrap(), Some(2));
}

#[test]
fn failed_delta_poisons_until_snapshot() {
    let driver = driver();
    driver
        .update(&UpdatePlan::new(vec![Blob::snapshot_in_memory(1, movie_snapshot(0xAA))]).unwrap())
        .unwrap();

    // a delta carrying payload for a resident type fails mid-application
    let delta = DeltaBuilder::new(0xAA, 0xAB)
        .add_type(mosaic::Schema::Object(movie_schema()), vec![1, 2, 3])
        .build();
    let plan = UpdatePlan::new(vec![Blob::delta_in_memory(1, 2, delta)]).unwrap();
    let err = driver.update(&plan).unwrap_err();
    assert!(matches!(err, MosaicError::DeltaUnsupported { .. }));
    assert!(driver.is_poisoned());

    // delta-only plans are refused while poisoned
    let next = UpdatePlan::new(vec![Blob::delta_in_memory(
        2,
        3,
        DeltaBuilder::new(0xAB, 0xAC).build(),
    )])
    .unwrap();
    assert!(matches!(
        driver.update(&next).unwrap_err(),
        MosaicError::EnginePoisoned
    ));

    // a fresh snapshot recovers
    driver
        .update(&UpdatePlan::new(vec![Blob::snapshot_in_memory(5, movie_snapshot(0xBB))]).unwrap())
        .unwrap();
    assert!(!driver.is_poisoned());
    assert_eq!(driver.current_version(), 5);
}

#[test]
fn failed_snapshot_plan_marks_every_blob_and_keeps_old_state() {
    let driver = driver();
    driver
        .update(&UpdatePlan::new(vec![Blob::snapshot_in_memory(1, movie_snapshot(0xAA))]).unwrap())
        .unwrap();

    let plan = UpdatePlan::new(vec![
        Blob::snapshot_in_memory(10, vec![0, 1, 2, 3]), // garbage blob
        Blob::delta_in_memory(10, 11, DeltaBuilder::new(0x1, 0x2).build()),
    ])
    .unwrap();
    let err = driver.update(&plan).unwrap_err();
    assert!(err.is_malformed());

    // every blob in the failed snapshot plan is marked
    assert!(driver.tracker().contains(10));
    assert!(driver.tracker().contains(11));
    // the failure happened before any mutation of the resident state
    assert!(!driver.is_poisoned());
    assert_eq!(driver.current_version(), 1);
    assert_eq!(driver.engine().randomized_tag(), 0xAA);
}

#[test]
fn generations_chain_and_stale_handles_are_detected() {
    let driver = driver();
    driver
        .update(&UpdatePlan::new(vec![Blob::snapshot_in_memory(1, movie_snapshot(0x1))]).unwrap())
        .unwrap();
    let first = driver.read_api().unwrap();

    driver
        .update(&UpdatePlan::new(vec![Blob::snapshot_in_memory(2, movie_snapshot(0x2))]).unwrap())
        .unwrap();
    let second = driver.read_api().unwrap();
    assert_eq!(second.generation(), 2);

    // the superseded generation links forward to its successor
    assert_eq!(first.next_generation().unwrap().generation(), 2);
    // holding `first` past generation 2 is a stale handle
    assert_eq!(driver.stale_reference_detector().stale_handle_count(2), 1);

    drop(first);
    assert_eq!(driver.stale_reference_detector().stale_handle_count(2), 0);
}

#[test]
fn long_lived_handles_follow_the_proxy() {
    let config = ReadEngineConfig {
        object_longevity: mosaic::ObjectLongevityConfig {
            enable_long_lived_object_support: true,
        },
        ..ReadEngineConfig::default()
    };
    let driver = RefreshDriver::new(config, FilterConfig::new_include_all());

    driver
        .update(&UpdatePlan::new(vec![Blob::snapshot_in_memory(1, movie_snapshot(0x1))]).unwrap())
        .unwrap();
    let old_handle = driver.read_api().unwrap();
    assert!(old_handle.is_proxied());

    driver
        .update(&UpdatePlan::new(vec![Blob::snapshot_in_memory(2, movie_snapshot(0x2))]).unwrap())
        .unwrap();

    // the old handle now sees the new generation's data
    assert_eq!(old_handle.engine().randomized_tag(), 0x2);
}

#[test]
fn panicking_listener_fails_the_transition() {
    struct Exploding;
    impl RefreshListener for Exploding {
        fn snapshot_update_occurred(
            &self,
            _api: &Arc<ReadApi>,
            _engine: &Arc<ReadStateEngine>,
            _version: u64,
        ) {
            panic!("listener exploded");
        }
    }

    let driver = driver();
    driver.register_listener(Arc::new(Exploding));
    let plan = UpdatePlan::new(vec![Blob::snapshot_in_memory(3, movie_snapshot(0x3))]).unwrap();
    let err = driver.update(&plan).unwrap_err();

    assert!(matches!(err, MosaicError::ListenerFailure { .. }));
    assert!(driver.tracker().contains(3));
}

#[test]
fn filtered_consumer_drops_types() {
    let junk = TypeData::Object {
        schema: ObjectSchema {
            name: "Junk".to_string(),
            fields: vec![ObjectField {
                name: "noise".to_string(),
                field_type: FieldType::Long,
                referenced_type: None,
                stored_position: 0,
            }],
            primary_key: vec![],
        },
        num_shards: 1,
        records: vec![Some(vec![mosaic::FieldValue::Long(42)])],
    };
    let blob = SnapshotBuilder::new(0x4)
        .add_type(TypeData::Object {
            schema: movie_schema(),
            num_shards: 1,
            records: vec![Some(vec![
                mosaic::FieldValue::Int(1),
                mosaic::FieldValue::String("A".to_string()),
            ])],
        })
        .add_type(junk)
        .build();

    let mut filter = FilterConfig::new_include_all();
    filter.exclude_type("Junk");
    let driver = RefreshDriver::new(ReadEngineConfig::default(), filter);
    driver
        .update(&UpdatePlan::new(vec![Blob::snapshot_in_memory(1, blob)]).unwrap())
        .unwrap();

    let engine = driver.engine();
    assert!(engine.type_state("Junk").is_none());
    assert!(engine.type_state("Movie").is_some());
}
