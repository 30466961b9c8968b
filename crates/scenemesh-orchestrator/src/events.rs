//! Events delivered to the orchestrator by the message bus.

use std::collections::{BTreeMap, BTreeSet};

use scenemesh_store::{StagedBlock, VoxelBlockIndex};
use serde::{Deserialize, Serialize};

/// Staged geometry keyed by [`VoxelBlockIndex::bucket`].
///
/// Ordered so that staging (and therefore packing ties) is reproducible.
pub type UpdateMap = BTreeMap<u32, Vec<StagedBlock>>;

/// One reconstruction worker's share of a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometryChunk {
    /// Frame this chunk belongs to.
    pub frame_id: u64,
    /// Index of the producing worker within the frame.
    pub chunk_id: u32,
    /// The worker's staged blocks, grouped by bucket.
    pub update_map: UpdateMap,
}

impl GeometryChunk {
    /// Groups `blocks` by bucket into a chunk.
    pub fn from_blocks<I>(frame_id: u64, chunk_id: u32, blocks: I) -> Self
    where
        I: IntoIterator<Item = StagedBlock>,
    {
        let mut update_map = UpdateMap::new();
        for block in blocks {
            update_map
                .entry(block.index.bucket())
                .or_default()
                .push(block);
        }
        Self {
            frame_id,
            chunk_id,
            update_map,
        }
    }

    /// Number of staged blocks in the chunk.
    pub fn block_count(&self) -> usize {
        self.update_map.values().map(Vec::len).sum()
    }

    /// Consumes the chunk, yielding its blocks in bucket order.
    pub fn into_blocks(self) -> impl Iterator<Item = StagedBlock> {
        self.update_map.into_values().flatten()
    }
}

/// Voxel blocks whose geometry is stale for a scene.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionList {
    /// Scene the list was computed for.
    pub scene_id: u64,
    /// Blocks to delete.
    pub blocks: BTreeSet<VoxelBlockIndex>,
}

impl DeletionList {
    /// Creates a deletion list.
    pub fn new<I>(scene_id: u64, blocks: I) -> Self
    where
        I: IntoIterator<Item = VoxelBlockIndex>,
    {
        Self {
            scene_id,
            blocks: blocks.into_iter().collect(),
        }
    }
}

/// Everything the integration thread consumes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SceneEvent {
    /// A partial frame of new geometry.
    Chunk(GeometryChunk),
    /// A list of blocks to delete.
    Deletion(DeletionList),
}

impl From<GeometryChunk> for SceneEvent {
    fn from(chunk: GeometryChunk) -> Self {
        SceneEvent::Chunk(chunk)
    }
}

impl From<DeletionList> for SceneEvent {
    fn from(list: DeletionList) -> Self {
        SceneEvent::Deletion(list)
    }
}
