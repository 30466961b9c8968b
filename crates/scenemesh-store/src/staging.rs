//! Staging area for freshly reconstructed voxel-block geometry awaiting packing.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::voxel_block::VoxelBlockIndex;

/// A vertex position.
pub type Vertex = [f64; 3];

/// An RGB vertex color.
pub type Color = [f64; 3];

/// Un-indexed triangle soup for one voxel block.
///
/// Every three consecutive vertices form one face.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StagedBlock {
    /// The block this geometry belongs to.
    pub index: VoxelBlockIndex,
    /// Triangle vertices, three per face.
    pub vertices: Vec<Vertex>,
    /// Per-vertex colors. May be shorter than `vertices` (padded with black).
    pub colors: Vec<Color>,
}

impl StagedBlock {
    /// Creates a staged block from its vertex and color lists.
    pub fn new(index: VoxelBlockIndex, vertices: Vec<Vertex>, colors: Vec<Color>) -> Self {
        Self {
            index,
            vertices,
            colors,
        }
    }

    /// Number of complete faces.
    pub fn face_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Trims a dangling partial triangle and aligns colors with vertices.
    fn normalize(&mut self) {
        let whole = self.face_count() * 3;
        if whole != self.vertices.len() {
            tracing::warn!(
                "block {} contributed {} vertices, dropping partial triangle",
                self.index,
                self.vertices.len()
            );
            self.vertices.truncate(whole);
        }
        self.colors.resize(self.vertices.len(), [0.0; 3]);
    }
}

/// Per-frame accumulation of staged blocks, keyed by block identity.
///
/// Blocks keep first-arrival order so that packing is reproducible.
#[derive(Debug, Default)]
pub struct StagingArea {
    blocks: Vec<StagedBlock>,
    lookup: FxHashMap<VoxelBlockIndex, usize>,
}

impl StagingArea {
    /// Creates an empty staging area.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one contribution, concatenating onto an existing entry for the same block.
    pub fn stage(&mut self, mut contribution: StagedBlock) {
        contribution.normalize();
        match self.lookup.get(&contribution.index) {
            Some(&slot) => {
                let staged = &mut self.blocks[slot];
                staged.vertices.append(&mut contribution.vertices);
                staged.colors.append(&mut contribution.colors);
            }
            None => {
                self.lookup
                    .insert(contribution.index, self.blocks.len());
                self.blocks.push(contribution);
            }
        }
    }

    #[cfg(test)]
    fn get(&self, index: &VoxelBlockIndex) -> Option<&StagedBlock> {
        self.lookup.get(index).map(|&slot| &self.blocks[slot])
    }

    /// Number of distinct staged blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Empties the area, returning blocks ordered by face count, largest first.
    ///
    /// The sort is stable: equal-sized blocks keep first-arrival order.
    pub fn drain_largest_first(&mut self) -> Vec<StagedBlock> {
        self.lookup.clear();
        let mut blocks = std::mem::take(&mut self.blocks);
        blocks.sort_by_key(|block| std::cmp::Reverse(block.face_count()));
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soup(index: (i32, i32, i32), faces: usize, tag: f64) -> StagedBlock {
        StagedBlock::new(
            index.into(),
            vec![[tag, 0.0, 0.0]; faces * 3],
            vec![[tag, tag, tag]; faces * 3],
        )
    }

    #[test]
    fn test_stage_new_block() {
        let mut area = StagingArea::new();
        area.stage(soup((0, 0, 0), 2, 1.0));
        assert_eq!(area.len(), 1);
        assert_eq!(area.get(&VoxelBlockIndex::new(0, 0, 0)).unwrap().face_count(), 2);
    }

    #[test]
    fn test_contributions_for_same_block_concatenate() {
        let mut area = StagingArea::new();
        area.stage(soup((1, 0, 0), 1, 1.0));
        area.stage(soup((1, 0, 0), 2, 2.0));

        assert_eq!(area.len(), 1);
        let staged = area.get(&VoxelBlockIndex::new(1, 0, 0)).unwrap();
        assert_eq!(staged.face_count(), 3);
        assert_eq!(staged.vertices[0], [1.0, 0.0, 0.0]);
        assert_eq!(staged.vertices[3], [2.0, 0.0, 0.0]);
        assert_eq!(staged.colors.len(), staged.vertices.len());
    }

    #[test]
    fn test_missing_colors_padded() {
        let mut area = StagingArea::new();
        area.stage(StagedBlock::new(
            VoxelBlockIndex::new(0, 0, 0),
            vec![[0.0; 3]; 3],
            Vec::new(),
        ));
        area.stage(soup((0, 0, 0), 1, 5.0));

        let staged = area.get(&VoxelBlockIndex::new(0, 0, 0)).unwrap();
        assert_eq!(staged.colors[0], [0.0; 3]);
        assert_eq!(staged.colors[3], [5.0; 3]);
    }

    #[test]
    fn test_partial_triangle_dropped() {
        let mut area = StagingArea::new();
        area.stage(StagedBlock::new(
            VoxelBlockIndex::new(0, 0, 0),
            vec![[0.0; 3]; 4],
            vec![[1.0; 3]; 4],
        ));
        let staged = area.get(&VoxelBlockIndex::new(0, 0, 0)).unwrap();
        assert_eq!(staged.vertices.len(), 3);
        assert_eq!(staged.colors.len(), 3);
    }

    #[test]
    fn test_drain_orders_largest_first_with_stable_ties() {
        let mut area = StagingArea::new();
        area.stage(soup((0, 0, 0), 1, 0.0));
        area.stage(soup((1, 0, 0), 3, 0.0));
        area.stage(soup((2, 0, 0), 1, 0.0));
        area.stage(soup((3, 0, 0), 3, 0.0));

        let order: Vec<_> = area
            .drain_largest_first()
            .into_iter()
            .map(|b| b.index.x)
            .collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
        assert!(area.is_empty());
        assert!(area.get(&VoxelBlockIndex::new(1, 0, 0)).is_none());
    }
}
