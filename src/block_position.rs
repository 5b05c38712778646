use serde::{Deserialize, Serialize};

/// An integer position on the voxel grid.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPosition {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPosition {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Masks each component down to a multiple of `side`, rounding toward
    /// negative infinity. `side` must be a power of two.
    #[inline(always)]
    pub fn aligned(self, side: i32) -> Self {
        let mask = !(side - 1);
        Self {
            x: self.x & mask,
            y: self.y & mask,
            z: self.z & mask,
        }
    }

    #[inline(always)]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

impl From<(i32, i32, i32)> for BlockPosition {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Self { x, y, z }
    }
}

impl From<BlockPosition> for (i32, i32, i32) {
    fn from(pos: BlockPosition) -> Self {
        (pos.x, pos.y, pos.z)
    }
}
