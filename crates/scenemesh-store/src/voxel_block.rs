//! Voxel block identity and the bucket hash used to shard geometry updates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of buckets that [`VoxelBlockIndex::bucket`] reduces into.
pub const BUCKET_COUNT: u32 = 25_600;

const PRIME_X: i32 = 73_856_093;
const PRIME_Y: i32 = 19_349_669;
const PRIME_Z: i32 = 83_492_791;

/// Identifies a fixed-size spatial cell of the reconstructed scene.
///
/// Coordinates are voxel-block grid positions, not world units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelBlockIndex {
    /// Block-grid X coordinate.
    pub x: i32,
    /// Block-grid Y coordinate.
    pub y: i32,
    /// Block-grid Z coordinate.
    pub z: i32,
}

impl VoxelBlockIndex {
    /// Creates a new voxel block index.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Deterministic multiplicative-XOR hash reduced into `[0, BUCKET_COUNT)`.
    ///
    /// Distinct blocks may share a bucket. Producers key their per-chunk update
    /// maps by this value, so it must stay stable across processes.
    pub fn bucket(&self) -> u32 {
        let mixed = self.x.wrapping_mul(PRIME_X)
            ^ self.y.wrapping_mul(PRIME_Y)
            ^ self.z.wrapping_mul(PRIME_Z);
        mixed.unsigned_abs() % BUCKET_COUNT
    }
}

impl From<(i32, i32, i32)> for VoxelBlockIndex {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Self::new(x, y, z)
    }
}

impl fmt::Display for VoxelBlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
