//! Blob reader
//!
//! The top-level snapshot/delta walker: decodes the header, enumerates
//! per-type sub-streams, and dispatches each to the appropriate typed
//! populator — or to the discard path when the filter excludes the type.
//! The recycler's generations are swapped between type applications.
//!
//! Any failure mid-walk aborts the current transition; the engine is
//! then considered corrupt and may not be used further without
//! re-snapshotting. The refresh driver owns that bookkeeping.

use crate::engine::ReadStateEngine;
use crate::read_state::{self, TypeReadState};
use mosaic_core::{FilterConfig, MosaicError, MosaicResult};
use mosaic_format::{read_header, read_schema, read_shard_preamble, BlobHeader, BlobInput};
use std::sync::Arc;
use tracing::{debug, info};

/// Walk a snapshot blob, populating `engine`.
///
/// The engine's randomized tag and header tags are replaced by the
/// header's on success. Returns the parsed header.
pub fn read_snapshot(
    engine: &ReadStateEngine,
    input: &mut BlobInput,
    filter: &FilterConfig,
) -> MosaicResult<BlobHeader> {
    let header = read_header(input)?;
    if header.origin_tag != 0 {
        return Err(MosaicError::malformed(format!(
            "snapshot blob carries origin tag {:#x}",
            header.origin_tag
        )));
    }

    engine.notify_begin_update();

    let num_types = input.read_varint()?;
    for _ in 0..num_types {
        let schema = read_schema(input)?;
        if engine.type_state(schema.name()).is_some() {
            return Err(MosaicError::malformed(format!(
                "duplicate schema name {:?}",
                schema.name()
            )));
        }
        let num_shards = read_shard_preamble(input)?;
        if filter.includes_type(schema.name()) {
            let mut state = TypeReadState::new(schema, num_shards, filter);
            state.read_snapshot(input, engine.memory_mode(), engine.recycler())?;
            debug!(
                type_name = state.type_name(),
                num_shards,
                ordinals = state.populated_ordinals().len(),
                "populated type"
            );
            engine.add_type_state(Arc::new(state))?;
        } else {
            debug!(type_name = schema.name(), "discarding filtered type");
            read_state::discard_snapshot(input, &schema, num_shards)?;
        }
        engine.recycler().swap_generations();
    }

    engine.wire_type_states_to_schemas();
    engine.set_randomized_tag(header.destination_tag);
    engine.set_header_tags(header.tags.clone());
    engine.notify_end_update();
    engine.after_initialization()?;

    info!(
        num_types,
        tag = format_args!("{:#x}", header.destination_tag),
        "snapshot loaded"
    );
    Ok(header)
}

/// Walk a delta blob against `engine`, asserting the origin tag.
///
/// Types the engine does not hold (or the filter excludes) are
/// discarded; types it does hold go through `apply_delta`. The engine's
/// randomized tag advances to the header's destination tag on success.
pub fn read_delta(
    engine: &ReadStateEngine,
    input: &mut BlobInput,
    filter: &FilterConfig,
) -> MosaicResult<BlobHeader> {
    let header = read_header(input)?;
    let current = engine.randomized_tag();
    if header.origin_tag != current {
        return Err(MosaicError::WrongOrigin {
            expected: current,
            actual: header.origin_tag,
        });
    }

    engine.notify_begin_update();

    let num_types = input.read_varint()?;
    for _ in 0..num_types {
        let schema = read_schema(input)?;
        match engine.type_state(schema.name()) {
            Some(state) if filter.includes_type(schema.name()) => {
                state.apply_delta(input, &schema, engine.memory_mode(), engine.recycler())?;
            }
            _ => {
                debug!(type_name = schema.name(), "discarding delta type");
                read_state::discard_delta(input)?;
            }
        }
        engine.recycler().swap_generations();
    }

    engine.set_randomized_tag(header.destination_tag);
    engine.set_header_tags(header.tags.clone());
    engine.notify_end_update();

    info!(
        num_types,
        tag = format_args!("{:#x}", header.destination_tag),
        "delta applied"
    );
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::MemoryMode;
    use mosaic_format::varint::write_varint;
    use mosaic_format::{write_header, SnapshotBuilder, TypeData};

    #[test]
    fn test_truncated_type_table_is_malformed() {
        let mut blob = Vec::new();
        write_header(&mut blob, &BlobHeader::snapshot(1));
        write_varint(&mut blob, 1); // one type promised, none present

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
    fn test_types_register_in_wire_order() {
        let list = |name: &str| TypeData::List {
            name: name.to_string(),
            element_type: "Elem".to_string(),
            num_shards: 1,
            records: vec![Some(vec![0])],
        };
        let blob = SnapshotBuilder::new(1)
            .add_type(list("B"))
            .add_type(list("A"))
            .build();

        let engine = ReadStateEngine::new(MemoryMode::OnHeap);
        let mut input = BlobInput::from_vec(blob);
        read_snapshot(&engine, &mut input, &FilterConfig::new_include_all()).unwrap();
        assert_eq!(input.remaining(), 0);
        assert_eq!(engine.type_names(), vec!["B".to_string(), "A".to_string()]);
    }
}
