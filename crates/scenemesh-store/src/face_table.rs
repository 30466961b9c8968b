//! Precomputed sequential face-index triples.
//!
//! Slot `i` always indexes vertices `3i, 3i+1, 3i+2`, so the face buffer for
//! any range is a straight copy out of this table.

/// Flat table where slot `i` holds `[3i, 3i + 1, 3i + 2]`.
#[derive(Debug, Default)]
pub struct FaceIndexTable {
    indices: Vec<u32>,
}

impl FaceIndexTable {
    /// Builds a table covering `slots` face slots.
    pub fn new(slots: usize) -> Self {
        let mut table = Self {
            indices: Vec::new(),
        };
        table.ensure(slots);
        table
    }

    /// Number of face slots covered.
    pub fn slots(&self) -> usize {
        self.indices.len() / 3
    }

    /// Grows the table (at least doubling) until it covers `slots` face slots.
    pub fn ensure(&mut self, slots: usize) {
        let covered = self.slots();
        if slots <= covered {
            return;
        }
        let target = slots.max(covered * 2);
        tracing::debug!("growing face index table from {covered} to {target} slots");
        self.indices.reserve((target - covered) * 3);
        self.indices.extend((covered * 3..target * 3).map(|i| i as u32));
    }

    /// Face indices for the given flat offsets. The table must already cover them.
    pub fn slice(&self, flat: std::ops::Range<usize>) -> &[u32] {
        &self.indices[flat]
    }
}
