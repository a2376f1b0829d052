//! List type read state

use super::collection::CollectionData;
use super::PopulationBitmap;
use mosaic_core::schema::ListSchema;
use mosaic_core::{MemoryMode, MosaicResult};
use mosaic_format::{BlobInput, SegmentRecycler};

/// Read state of one list type: ordinal → ordered element ordinals.
pub struct ListTypeReadState {
    schema: ListSchema,
    data: CollectionData,
}

impl ListTypeReadState {
    pub(crate) fn new(schema: ListSchema, num_shards: u32) -> ListTypeReadState {
        ListTypeReadState {
            schema,
            data: CollectionData::new(num_shards),
        }
    }

    /// The list schema.
    pub fn schema(&self) -> &ListSchema {
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

    /// Number of elements of the list at `ordinal`.
    pub fn size(&self, ordinal: u64) -> MosaicResult<u64> {
        self.data.size(ordinal)
    }

    /// The element ordinal at position `index`.
    pub fn element(&self, ordinal: u64, index: u64) -> MosaicResult<u64> {
        self.data.element(ordinal, index)
    }

    /// All element ordinals, in list order.
    pub fn elements(&self, ordinal: u64) -> MosaicResult<Vec<u64>> {
        self.data.elements(ordinal)
    }
}
