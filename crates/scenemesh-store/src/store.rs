//! The live scene mesh: a compacting face-slot allocator indexed by voxel block.
//!
//! One update cycle runs, in order:
//!
//! 1. [`MeshStore::clean`] + [`MeshStore::merge_free_ranges`] for deleted blocks
//!    (may also happen between cycles),
//! 2. [`MeshStore::restore_nullified`] to undo last cycle's nullification,
//! 3. [`MeshStore::stage`] for every incoming contribution,
//! 4. [`MeshStore::pack`] to place staged geometry into free ranges or the tail.
//!
//! Nothing here ever walks the whole vertex buffer; work is proportional to the
//! number of touched blocks and free ranges.

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::StoreError;
use crate::export::write_obj;
use crate::face_table::FaceIndexTable;
use crate::range::{BlockSlot, FaceRange, FreeList};
use crate::staging::{Color, StagedBlock, StagingArea, Vertex};
use crate::voxel_block::VoxelBlockIndex;

/// Up-front reservations for a [`MeshStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreCapacity {
    /// Face slots reserved in the vertex, color and face buffers.
    pub face_slots: usize,
    /// Face slots covered by the precomputed index table at construction.
    pub face_table_slots: usize,
    /// Voxel blocks reserved in the index.
    pub blocks: usize,
}

impl Default for StoreCapacity {
    fn default() -> Self {
        Self {
            face_slots: 1 << 16,
            face_table_slots: 1 << 18,
            blocks: 25_600,
        }
    }
}

/// A free range whose leftover face content was zeroed at the end of a cycle.
///
/// The saved content is written back by [`MeshStore::restore_nullified`] so the
/// range can be reconsidered on the next cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tombstone {
    /// The nullified slots.
    pub range: FaceRange,
    /// Face indices the range held before zeroing.
    pub saved: Vec<u32>,
}

/// Outcome of one [`MeshStore::clean`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Blocks whose live range moved onto the free list.
    pub cleared: usize,
    /// Blocks that were already empty.
    pub already_empty: usize,
    /// Blocks the store has never seen.
    pub unknown: usize,
}

/// Point-in-time size figures for logging and latency records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Total face slots (live, free and nullified).
    pub face_slots: usize,
    /// Blocks with a live range.
    pub live_blocks: usize,
    /// Known blocks without a live range.
    pub empty_blocks: usize,
    /// Number of free ranges.
    pub free_ranges: usize,
    /// Face slots in free ranges.
    pub free_slots: usize,
    /// Nullified ranges awaiting restore.
    pub tombstones: usize,
    /// Blocks waiting in the staging area.
    pub staged_blocks: usize,
    /// Bytes held by vertex positions.
    pub vertex_bytes: usize,
    /// Bytes held by face indices.
    pub face_bytes: usize,
}

/// Incremental, voxel-indexed scene mesh.
///
/// Face slot `i` always consists of vertices `3i..3i+3` and, when live, the
/// face triple `[3i, 3i+1, 3i+2]`. Free or nullified slots keep their vertices
/// but have their face triple zeroed once a pack leaves them unused.
pub struct MeshStore {
    vertices: Vec<Vertex>,
    colors: Vec<Color>,
    faces: Vec<u32>,
    face_table: FaceIndexTable,
    index: FxHashMap<VoxelBlockIndex, BlockSlot>,
    free: FreeList,
    staging: StagingArea,
    tombstones: Vec<Tombstone>,
}

impl MeshStore {
    /// Creates an empty store with default reservations.
    pub fn new() -> Self {
        Self::with_capacity(StoreCapacity::default())
    }

    /// Creates an empty store, reserving buffers up front so that the append
    /// path of [`pack`](Self::pack) does not reallocate every cycle.
    pub fn with_capacity(capacity: StoreCapacity) -> Self {
        let flat = capacity.face_slots * 3;
        Self {
            vertices: Vec::with_capacity(flat),
            colors: Vec::with_capacity(flat),
            faces: Vec::with_capacity(flat),
            face_table: FaceIndexTable::new(capacity.face_table_slots),
            index: FxHashMap::with_capacity_and_hasher(capacity.blocks, Default::default()),
            free: FreeList::with_capacity(capacity.blocks / 4),
            staging: StagingArea::new(),
            tombstones: Vec::new(),
        }
    }

    // --- Deletion ---

    /// Marks the given blocks deleted, releasing their live ranges.
    ///
    /// Released ranges are accumulated unsorted; call
    /// [`merge_free_ranges`](Self::merge_free_ranges) before the next pack.
    /// Already-empty and unknown blocks are skipped, so repeating a call is a no-op.
    pub fn clean<'a, I>(&mut self, deleted: I) -> CleanReport
    where
        I: IntoIterator<Item = &'a VoxelBlockIndex>,
    {
        let mut report = CleanReport::default();
        for block in deleted {
            match self.index.get_mut(block) {
                Some(slot) => match *slot {
                    BlockSlot::Occupied(range) => {
                        tracing::trace!("releasing block {block} range {range}");
                        self.free.push(range);
                        *slot = BlockSlot::Empty;
                        report.cleared += 1;
                    }
                    BlockSlot::Empty => {
                        tracing::debug!("block {block} already empty, skipping");
                        report.already_empty += 1;
                    }
                },
                None => {
                    tracing::debug!("block {block} (bucket {}) not tracked", block.bucket());
                    report.unknown += 1;
                }
            }
        }
        tracing::debug!(
            "cleaned {} blocks ({} already empty, {} unknown)",
            report.cleared,
            report.already_empty,
            report.unknown
        );
        report
    }

    /// Sorts and coalesces the free list.
    ///
    /// An overlap means the store is corrupted and is returned as
    /// [`StoreError::OverlappingFreeRanges`].
    pub fn merge_free_ranges(&mut self) -> Result<(), StoreError> {
        let before = self.free.len();
        self.free.merge()?;
        tracing::debug!("merged {before} free ranges into {}", self.free.len());
        Ok(())
    }

    // --- Insertion ---

    /// Absorbs freshly reconstructed geometry into the staging area.
    pub fn stage<I>(&mut self, contributions: I)
    where
        I: IntoIterator<Item = StagedBlock>,
    {
        for contribution in contributions {
            self.staging.stage(contribution);
        }
    }

    /// Writes back the face content saved by the previous pack's nullification.
    ///
    /// Returns the number of slots restored.
    pub fn restore_nullified(&mut self) -> usize {
        let mut restored = 0;
        for tombstone in self.tombstones.drain(..) {
            let start = tombstone.range.start * 3;
            self.faces[start..start + tombstone.saved.len()].copy_from_slice(&tombstone.saved);
            restored += tombstone.range.len();
        }
        if restored > 0 {
            tracing::debug!("restored {restored} nullified face slots");
        }
        restored
    }

    /// Places every staged block and nullifies the unused remainder of the free list.
    ///
    /// Blocks go largest first into the first free range that fits, or at the
    /// tail when none does. Returns the number of free slots left over, which
    /// were nullified.
    pub fn pack(&mut self) -> Result<usize, StoreError> {
        if !self.tombstones.is_empty() {
            tracing::debug!(
                "discarding {} tombstones not restored before pack",
                self.tombstones.len()
            );
            self.tombstones.clear();
        }

        let staged = self.staging.drain_largest_first();

        // A block staged while still live gives up its old slots first.
        let mut released = false;
        for block in &staged {
            if let Some(slot) = self.index.get_mut(&block.index)
                && let BlockSlot::Occupied(range) = *slot
            {
                tracing::debug!("block {} re-staged while live, releasing {range}", block.index);
                self.free.push(range);
                *slot = BlockSlot::Empty;
                released = true;
            }
        }
        if released {
            self.free.merge()?;
        }

        let mut reused = 0usize;
        let mut appended = 0usize;
        for block in &staged {
            let faces = block.face_count();
            if faces == 0 {
                tracing::debug!("block {} staged without faces", block.index);
                self.index.insert(block.index, BlockSlot::Empty);
                continue;
            }

            let range = match self.free.first_fit(faces) {
                Some(pos) => {
                    let range = self.free.take_front(pos, faces);
                    self.write_block(range, block);
                    reused += faces;
                    range
                }
                None => {
                    appended += faces;
                    self.append_block(block)
                }
            };
            tracing::trace!("packed block {} with {faces} faces into {range}", block.index);
            self.index.insert(block.index, BlockSlot::Occupied(range));
        }

        let leftover = self.nullify_leftover();
        tracing::debug!(
            "packed {} blocks: {reused} faces reused, {appended} appended, {leftover} nullified",
            staged.len()
        );
        Ok(leftover)
    }

    fn write_block(&mut self, range: FaceRange, block: &StagedBlock) {
        let flat = range.flat();
        self.face_table.ensure(range.end + 1);
        self.vertices[flat.clone()].copy_from_slice(&block.vertices);
        self.colors[flat.clone()].copy_from_slice(&block.colors);
        self.faces[flat.clone()].copy_from_slice(self.face_table.slice(flat));
    }

    fn append_block(&mut self, block: &StagedBlock) -> FaceRange {
        let range = FaceRange::with_len(self.face_count(), block.face_count());
        self.face_table.ensure(range.end + 1);
        self.vertices.extend_from_slice(&block.vertices);
        self.colors.extend_from_slice(&block.colors);
        self.faces
            .extend_from_slice(self.face_table.slice(range.flat()));
        range
    }

    fn nullify_leftover(&mut self) -> usize {
        let mut leftover = 0;
        for range in self.free.iter() {
            let flat = range.flat();
            let saved = self.faces[flat.clone()].to_vec();
            self.faces[flat].fill(0);
            self.tombstones.push(Tombstone {
                range: *range,
                saved,
            });
            leftover += range.len();
        }
        leftover
    }

    // --- Export ---

    /// Writes the live mesh as a Wavefront OBJ file for verification.
    ///
    /// Nullified face slots are skipped.
    pub fn export(&self, path: &Path) -> Result<(), StoreError> {
        let file = std::fs::File::create(path).map_err(StoreError::Export)?;
        let written = write_obj(
            std::io::BufWriter::new(file),
            &self.vertices,
            &self.colors,
            &self.faces,
        )
        .map_err(StoreError::Export)?;
        tracing::info!("exported {written} faces to {}", path.display());
        Ok(())
    }

    // --- Accessors ---

    /// Vertex positions, three per face slot.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Vertex colors, parallel to [`vertices`](Self::vertices).
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Flat face indices, three per face slot. Nullified slots read `[0, 0, 0]`.
    pub fn faces(&self) -> &[u32] {
        &self.faces
    }

    /// Total number of face slots.
    pub fn face_count(&self) -> usize {
        self.faces.len() / 3
    }

    /// The slot state of `block`, or `None` if the block was never packed.
    pub fn slot(&self, block: &VoxelBlockIndex) -> Option<BlockSlot> {
        self.index.get(block).copied()
    }

    /// Iterates over `(block, range)` for every block with live geometry.
    pub fn live_blocks(&self) -> impl Iterator<Item = (&VoxelBlockIndex, FaceRange)> {
        self.index
            .iter()
            .filter_map(|(block, slot)| slot.range().map(|range| (block, range)))
    }

    /// Current free ranges.
    pub fn free_ranges(&self) -> &[FaceRange] {
        self.free.as_slice()
    }

    /// Ranges nullified by the last pack.
    pub fn tombstones(&self) -> &[Tombstone] {
        &self.tombstones
    }

    /// Number of blocks waiting in the staging area.
    pub fn staged_count(&self) -> usize {
        self.staging.len()
    }

    /// Size figures for logging.
    pub fn stats(&self) -> StoreStats {
        let live_blocks = self.index.values().filter(|s| s.is_occupied()).count();
        StoreStats {
            face_slots: self.face_count(),
            live_blocks,
            empty_blocks: self.index.len() - live_blocks,
            free_ranges: self.free.len(),
            free_slots: self.free.total_slots(),
            tombstones: self.tombstones.len(),
            staged_blocks: self.staging.len(),
            vertex_bytes: std::mem::size_of_val(self.vertices.as_slice()),
            face_bytes: std::mem::size_of_val(self.faces.as_slice()),
        }
    }

    /// Verifies buffer lengths and that live and free ranges are in bounds and disjoint.
    ///
    /// The free list must be merged, so call this after
    /// [`merge_free_ranges`](Self::merge_free_ranges) or [`pack`](Self::pack).
    ///
    /// Cost is proportional to the number of ranges, not the buffer size.
    pub fn check_invariants(&self) -> Result<(), StoreError> {
        if !self.free.is_coalesced() {
            return Err(StoreError::UncoalescedFreeList {
                ranges: self.free.len(),
            });
        }
        if self.faces.len() != self.vertices.len() || self.colors.len() != self.vertices.len() {
            return Err(StoreError::BufferMismatch {
                vertices: self.vertices.len(),
                colors: self.colors.len(),
                faces: self.faces.len(),
            });
        }

        let face_slots = self.face_count();
        let mut claimed: Vec<(FaceRange, Option<VoxelBlockIndex>)> = self
            .live_blocks()
            .map(|(block, range)| (range, Some(*block)))
            .chain(self.free.iter().map(|range| (*range, None)))
            .collect();
        claimed.sort_unstable_by_key(|(range, _)| *range);

        for (range, _) in &claimed {
            if range.end >= face_slots {
                return Err(StoreError::RangeOutOfBounds {
                    range: *range,
                    face_slots,
                });
            }
        }
        for pair in claimed.windows(2) {
            let (previous, previous_block) = pair[0];
            let (next, next_block) = pair[1];
            if !previous.overlaps(&next) {
                continue;
            }
            return Err(match (previous_block, next_block) {
                (Some(block), _) => StoreError::OverlappingLiveRange {
                    block,
                    range: previous,
                    other: next,
                },
                (None, Some(block)) => StoreError::OverlappingLiveRange {
                    block,
                    range: next,
                    other: previous,
                },
                (None, None) => StoreError::OverlappingFreeRanges { previous, next },
            });
        }
        Ok(())
    }
}

impl Default for MeshStore {
    fn default() -> Self {
        Self::new()
    }
}
