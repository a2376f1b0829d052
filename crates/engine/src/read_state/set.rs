//! Set type read state

use super::collection::CollectionData;
use super::PopulationBitmap;
use mosaic_core::schema::SetSchema;
use mosaic_core::{MemoryMode, MosaicResult};
use mosaic_format::{BlobInput, SegmentRecycler};

/// Read state of one set type: ordinal → member element ordinals.
///
/// Membership is resolved by scanning the ordinal's element range; the
/// hash-key paths carried by the schema describe how members were keyed
/// by the producer.
pub struct SetTypeReadState {
    schema: SetSchema,
    data: CollectionData,
}

impl SetTypeReadState {
    pub(crate) fn new(schema: SetSchema, num_shards: u32) -> SetTypeReadState {
        SetTypeReadState {
            schema,
            data: CollectionData::new(num_shards),
        }
    }

    /// The set schema.
    pub fn schema(&self) -> &SetSchema {
        &self.schema
    }

    pub(crate) fn read_snapshot(
        &mut self,
        input: &mut BlobInput,
        num_shards: u32,
        mode: MemoryMode,
        recycler: &SegmentRecycler,
    ) -> MosaicResult<()> {
        self.data.read_snapshot(input, num_shards, mode, recycler)
    }

    pub(crate) fn apply_delta(&self, input: &mut BlobInput) -> MosaicResult<()> {
        self.data.apply_delta(input)
    }

    pub(crate) fn shard_populations(&self) -> Vec<&PopulationBitmap> {
        self.data.shard_populations()
    }

    pub(crate) fn destroy(&mut self, recycler: &SegmentRecycler) {
        self.data.destroy(recycler)
    }

    /// Number of members of the set at `ordinal`.
    pub fn size(&self, ordinal: u64) -> MosaicResult<u64> {
        self.data.size(ordinal)
    }

    /// Whether the set at `ordinal` contains `element_ordinal`.
    pub fn contains_element(&self, ordinal: u64, element_ordinal: u64) -> MosaicResult<bool> {
        self.data.contains(ordinal, element_ordinal)
    }

    /// All member ordinals, in stored order.
    pub fn elements(&self, ordinal: u64) -> MosaicResult<Vec<u64>> {
        self.data.elements(ordinal)
    }
}
