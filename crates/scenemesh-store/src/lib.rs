//! Incremental, voxel-indexed scene mesh store.
//!
//! Holds one continuously mutated vertex/face buffer for the live scene and
//! absorbs per-cycle deletions and insertions keyed by voxel block, reusing
//! freed face slots instead of rewriting the buffer.

pub mod error;
pub mod export;
pub mod face_table;
pub mod range;
pub mod staging;
pub mod store;
pub mod voxel_block;

pub use error::StoreError;
pub use export::write_obj;
pub use face_table::FaceIndexTable;
pub use range::{BlockSlot, FaceRange, FreeList};
pub use staging::{Color, StagedBlock, StagingArea, Vertex};
pub use store::{CleanReport, MeshStore, StoreCapacity, StoreStats, Tombstone};
pub use voxel_block::{BUCKET_COUNT, VoxelBlockIndex};
