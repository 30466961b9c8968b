//! Face-slot ranges, per-block slot state and the free-range list.

use std::fmt;

use crate::error::StoreError;

/// Inclusive span `[start, end]` of face-slot positions.
///
/// A face slot holds one face-index triple, i.e. three consecutive vertices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceRange {
    /// First occupied slot.
    pub start: usize,
    /// Last occupied slot (inclusive).
    pub end: usize,
}

impl FaceRange {
    /// Creates the inclusive range `[start, end]`.
    ///
    /// # Panics
    ///
    /// Panics if `end < start`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(end >= start, "inverted face range [{start}, {end}]");
        Self { start, end }
    }

    /// Creates the range of `len` slots beginning at `start`. `len` must be non-zero.
    pub fn with_len(start: usize, len: usize) -> Self {
        assert!(len > 0, "empty face range at {start}");
        Self {
            start,
            end: start + len - 1,
        }
    }

    /// Number of face slots covered.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always `false`; kept for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the two ranges share at least one slot.
    pub fn overlaps(&self, other: &FaceRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Offsets into a flat buffer storing three elements per face slot.
    pub(crate) fn flat(&self) -> std::ops::Range<usize> {
        self.start * 3..(self.end + 1) * 3
    }
}

impl fmt::Display for FaceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Occupancy of a known voxel block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockSlot {
    /// The block's geometry lives in these face slots.
    Occupied(FaceRange),
    /// The block was deleted (or packed with no faces) and reserves nothing.
    Empty,
}

impl BlockSlot {
    /// The live range, if any.
    pub fn range(&self) -> Option<FaceRange> {
        match self {
            BlockSlot::Occupied(range) => Some(*range),
            BlockSlot::Empty => None,
        }
    }

    /// Returns `true` for [`BlockSlot::Occupied`].
    pub fn is_occupied(&self) -> bool {
        matches!(self, BlockSlot::Occupied(_))
    }
}

/// Face ranges released by deleted blocks and not yet reused.
///
/// Ranges are pushed unsorted by [`push`](Self::push); [`merge`](Self::merge)
/// restores the sorted, coalesced form that packing scans.
#[derive(Clone, Debug, Default)]
pub struct FreeList {
    ranges: Vec<FaceRange>,
}

impl FreeList {
    /// Creates an empty free list.
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Creates an empty free list with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ranges: Vec::with_capacity(capacity),
        }
    }

    /// Accumulates a released range without sorting.
    pub fn push(&mut self, range: FaceRange) {
        self.ranges.push(range);
    }

    /// Sorts by start and coalesces ranges where `prev.end + 1 == next.start`.
    ///
    /// A true overlap means a slot was released twice. The list is left
    /// untouched past that point and the overlap is returned as an error.
    pub fn merge(&mut self) -> Result<(), StoreError> {
        if self.ranges.len() < 2 {
            return Ok(());
        }
        self.ranges.sort_unstable();

        let mut write = 0;
        for read in 1..self.ranges.len() {
            let next = self.ranges[read];
            let prev = &mut self.ranges[write];
            if prev.end + 1 == next.start {
                prev.end = next.end;
            } else if prev.end >= next.start {
                let previous = *prev;
                tracing::error!("free ranges overlap: {previous} and {next}");
                return Err(StoreError::OverlappingFreeRanges { previous, next });
            } else {
                write += 1;
                self.ranges[write] = next;
            }
        }
        self.ranges.truncate(write + 1);
        Ok(())
    }

    /// Position of the first range holding at least `len` slots.
    pub fn first_fit(&self, len: usize) -> Option<usize> {
        self.ranges.iter().position(|range| range.len() >= len)
    }

    /// Carves `len` slots off the front of the range at `pos`.
    ///
    /// The range is removed when exactly consumed.
    pub fn take_front(&mut self, pos: usize, len: usize) -> FaceRange {
        let range = self.ranges[pos];
        debug_assert!(range.len() >= len);
        let taken = FaceRange::with_len(range.start, len);
        if range.len() == len {
            self.ranges.remove(pos);
        } else {
            self.ranges[pos].start += len;
        }
        taken
    }

    /// Iterates over the free ranges in list order.
    pub fn iter(&self) -> impl Iterator<Item = &FaceRange> {
        self.ranges.iter()
    }

    /// The free ranges as a slice.
    pub fn as_slice(&self) -> &[FaceRange] {
        &self.ranges
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Returns `true` if no range is free.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total number of free slots.
    pub fn total_slots(&self) -> usize {
        self.ranges.iter().map(FaceRange::len).sum()
    }

    /// Whether the list is sorted with no adjacent or overlapping pair.
    pub fn is_coalesced(&self) -> bool {
        self.ranges.windows(2).all(|w| w[0].end + 1 < w[1].start)
    }
}
