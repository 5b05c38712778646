use crate::block_position::BlockPosition;
use serde::{Deserialize, Serialize};

/// An axis-aligned box over integer voxel coordinates.
///
/// Both corners are inclusive: the box covers `min..=max` on every axis.
/// A box with `max < min` on any axis is invalid and contains nothing;
/// [`BoundingBox::invalid`] is the canonical empty box, used as the
/// identity when accumulating bounds with [`BoundingBox::union`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub min: BlockPosition,
    pub max: BlockPosition,
}

impl BoundingBox {
    pub fn new(min: BlockPosition, max: BlockPosition) -> Self {
        Self { min, max }
    }

    /// Builds the box spanning two arbitrary corners, normalizing so the
    /// result is valid regardless of corner order.
    pub fn from_corners(a: BlockPosition, b: BlockPosition) -> Self {
        Self {
            min: BlockPosition::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPosition::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// The cube with minimum corner `origin` and the given side length.
    /// The side is taken as `i64` so the cube covering the whole `i32`
    /// space is expressible; the corners always fit in `i32`.
    pub fn from_origin_and_side(origin: BlockPosition, side: i64) -> Self {
        Self {
            min: origin,
            max: BlockPosition::new(
                (origin.x as i64 + side - 1) as i32,
                (origin.y as i64 + side - 1) as i32,
                (origin.z as i64 + side - 1) as i32,
            ),
        }
    }

    /// The canonical empty box: unioning anything into it yields that thing.
    pub fn invalid() -> Self {
        Self {
            min: BlockPosition::new(i32::MAX, i32::MAX, i32::MAX),
            max: BlockPosition::new(i32::MIN, i32::MIN, i32::MIN),
        }
    }

    #[inline(always)]
    pub fn is_invalid(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    #[inline(always)]
    pub fn contains(&self, pos: BlockPosition) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        !other.is_invalid() && self.contains(other.min) && self.contains(other.max)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !self.is_invalid()
            && !other.is_invalid()
            && self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Component-wise max of mins and min of maxes. The result is invalid
    /// when the boxes do not overlap.
    pub fn intersection(&self, other: &BoundingBox) -> BoundingBox {
        if self.is_invalid() || other.is_invalid() {
            return Self::invalid();
        }
        Self {
            min: BlockPosition::new(
                self.min.x.max(other.min.x),
                self.min.y.max(other.min.y),
                self.min.z.max(other.min.z),
            ),
            max: BlockPosition::new(
                self.max.x.min(other.max.x),
                self.max.y.min(other.max.y),
                self.max.z.min(other.max.z),
            ),
        }
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        if self.is_invalid() {
            return *other;
        }
        if other.is_invalid() {
            return *self;
        }
        Self {
            min: BlockPosition::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: BlockPosition::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// The parts of this box not covered by `other`, as up to six disjoint
    /// boxes. Returns the whole box when the two do not overlap.
    pub fn subtract(&self, other: &BoundingBox) -> Vec<BoundingBox> {
        let inner = self.intersection(other);
        if inner.is_invalid() {
            return vec![*self];
        }
        if inner == *self {
            return Vec::new();
        }

        let mut pieces = Vec::with_capacity(6);
        let mut core = *self;

        if core.min.x < inner.min.x {
            let mut piece = core;
            piece.max.x = inner.min.x - 1;
            pieces.push(piece);
            core.min.x = inner.min.x;
        }
        if core.max.x > inner.max.x {
            let mut piece = core;
            piece.min.x = inner.max.x + 1;
            pieces.push(piece);
            core.max.x = inner.max.x;
        }
        if core.min.y < inner.min.y {
            let mut piece = core;
            piece.max.y = inner.min.y - 1;
            pieces.push(piece);
            core.min.y = inner.min.y;
        }
        if core.max.y > inner.max.y {
            let mut piece = core;
            piece.min.y = inner.max.y + 1;
            pieces.push(piece);
            core.max.y = inner.max.y;
        }
        if core.min.z < inner.min.z {
            let mut piece = core;
            piece.max.z = inner.min.z - 1;
            pieces.push(piece);
            core.min.z = inner.min.z;
        }
        if core.max.z > inner.max.z {
            let mut piece = core;
            piece.min.z = inner.max.z + 1;
            pieces.push(piece);
            core.max.z = inner.max.z;
        }

        pieces
    }

    pub fn get_dimensions(&self) -> (i64, i64, i64) {
        if self.is_invalid() {
            return (0, 0, 0);
        }
        (
            self.max.x as i64 - self.min.x as i64 + 1,
            self.max.y as i64 - self.min.y as i64 + 1,
            self.max.z as i64 - self.min.z as i64 + 1,
        )
    }

    pub fn volume(&self) -> u64 {
        let (w, h, l) = self.get_dimensions();
        (w as u64)
            .saturating_mul(h as u64)
            .saturating_mul(l as u64)
    }
}
