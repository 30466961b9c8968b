//! Mesh store error types.

use crate::range::FaceRange;
use crate::voxel_block::VoxelBlockIndex;

/// Errors raised by [`MeshStore`](crate::MeshStore).
///
/// Every variant except [`StoreError::Export`] signals corrupted store state.
/// Callers must stop operating on the store once one is returned.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Two accumulated free ranges share face slots.
    #[error("free ranges overlap: {previous} and {next}")]
    OverlappingFreeRanges {
        /// The lower range after sorting.
        previous: FaceRange,
        /// The range that starts inside `previous`.
        next: FaceRange,
    },

    /// The free list holds adjacent or unsorted ranges outside a clean/merge pair.
    #[error("free list of {ranges} ranges is not merged")]
    UncoalescedFreeList {
        /// Number of free ranges.
        ranges: usize,
    },

    /// Vertex, color and face buffers went out of step.
    #[error("buffer length mismatch: {vertices} vertices, {colors} colors, {faces} face indices")]
    BufferMismatch {
        /// Number of stored vertices.
        vertices: usize,
        /// Number of stored colors.
        colors: usize,
        /// Number of stored face indices.
        faces: usize,
    },

    /// A live block range collides with another live range or a free range.
    #[error("range {range} of block {block} overlaps {other}")]
    OverlappingLiveRange {
        /// The block whose range collides.
        block: VoxelBlockIndex,
        /// Its live range.
        range: FaceRange,
        /// The range it collides with.
        other: FaceRange,
    },

    /// A range points outside the face buffer.
    #[error("range {range} exceeds the {face_slots} stored face slots")]
    RangeOutOfBounds {
        /// The offending range.
        range: FaceRange,
        /// Current face slot count.
        face_slots: usize,
    },

    /// Writing the verification export failed.
    #[error("failed to export mesh: {0}")]
    Export(#[source] std::io::Error),
}
