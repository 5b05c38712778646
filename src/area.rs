use crate::block_position::BlockPosition;
use crate::bounding_box::BoundingBox;

/// Side length of the cube covering the whole i32 coordinate space.
///
/// Power-of-two aligned cubes partition every scale at multiples of their
/// side, so zero is a cube boundary at every scale below this one: content
/// straddling an axis sign change can only live under the full-space cube.
/// Side lengths are carried as `i64` solely so this one cube is
/// representable; origins and cell coordinates always fit in `i32`.
pub(crate) const FULL_SPACE_SIDE: i64 = 1 << 32;

/// Flattened index of `pos` within the dense block that contains it.
///
/// Two's-complement masking makes this total over all integers: negative
/// coordinates land on the correct in-block offset because `&` rounds the
/// same way alignment does.
#[inline(always)]
pub(crate) fn block_local_index(pos: BlockPosition, block_side: i32) -> usize {
    let mask = block_side - 1;
    ((pos.x & mask) + (pos.y & mask) * block_side + (pos.z & mask) * block_side * block_side)
        as usize
}

/// Masks each component of `pos` down to a multiple of `side`, rounding
/// toward negative infinity. The full-space cube has a fixed origin.
pub(crate) fn aligned_for_side(pos: BlockPosition, side: i64) -> BlockPosition {
    if side >= FULL_SPACE_SIDE {
        return BlockPosition::new(i32::MIN, i32::MIN, i32::MIN);
    }
    let mask = !(side - 1);
    BlockPosition::new(
        ((pos.x as i64) & mask) as i32,
        ((pos.y as i64) & mask) as i32,
        ((pos.z as i64) & mask) as i32,
    )
}

#[inline(always)]
pub(crate) fn cube_contains(origin: BlockPosition, side: i64, pos: BlockPosition) -> bool {
    let dx = pos.x as i64 - origin.x as i64;
    let dy = pos.y as i64 - origin.y as i64;
    let dz = pos.z as i64 - origin.z as i64;
    dx >= 0 && dx < side && dy >= 0 && dy < side && dz >= 0 && dz < side
}

/// Minimum corner of octant `index` of the cube at `origin`.
pub(crate) fn octant_origin_of(origin: BlockPosition, side: i64, index: usize) -> BlockPosition {
    let half = side / 2;
    BlockPosition::new(
        (origin.x as i64 + if index & 1 != 0 { half } else { 0 }) as i32,
        (origin.y as i64 + if index & 2 != 0 { half } else { 0 }) as i32,
        (origin.z as i64 + if index & 4 != 0 { half } else { 0 }) as i32,
    )
}

/// Grows the cube at `origin` by repeated doubling (re-aligning the origin
/// each step) until it contains `target`. Each doubling keeps the previous
/// cube inside the new one, so existing content stays covered. Terminates
/// at the full-space cube, which contains everything.
pub(crate) fn enclosing_cube(
    mut origin: BlockPosition,
    mut side: i64,
    target: BlockPosition,
) -> (BlockPosition, i64) {
    while !cube_contains(origin, side, target) {
        side <<= 1;
        origin = aligned_for_side(origin, side);
    }
    (origin, side)
}

/// Like [`enclosing_cube`], but grows until the cube contains the whole
/// target box.
pub(crate) fn enclosing_cube_for_box(
    mut origin: BlockPosition,
    mut side: i64,
    target: &BoundingBox,
) -> (BlockPosition, i64) {
    while !(cube_contains(origin, side, target.min) && cube_contains(origin, side, target.max)) {
        side <<= 1;
        origin = aligned_for_side(origin, side);
    }
    (origin, side)
}

/// Storage payload of an [`Area`]. Exactly one representation is live at a
/// time; switching drops the previous payload.
#[derive(Debug)]
pub(crate) enum Representation<V> {
    /// The whole cube holds one value.
    Uniform(V),
    /// Eight octant slots (bit 0 = +X half, bit 1 = +Y, bit 2 = +Z). An
    /// empty slot reads as `fill`, the uniform value this node had before
    /// it was carved into a container. Children may be smaller than their
    /// octant; they never straddle octant boundaries.
    Container {
        fill: V,
        children: [Option<Box<Area<V>>>; 8],
    },
    /// Dense cells, one per position in the cube. Only valid at block
    /// granularity.
    Block(Vec<V>),
}

/// A node of the sparse voxel tree: a cube of power-of-two side length,
/// aligned to its own size, holding one of three representations.
#[derive(Debug)]
pub(crate) struct Area<V> {
    pub(crate) origin: BlockPosition,
    pub(crate) side_length: i64,
    pub(crate) repr: Representation<V>,
    /// Set on every node a mutation path touches; consolidation clears it
    /// and skips clean subtrees.
    pub(crate) dirty: bool,
}

impl<V> Area<V> {
    pub(crate) fn new(origin: BlockPosition, side_length: i64, value: V) -> Self {
        Self {
            origin,
            side_length,
            repr: Representation::Uniform(value),
            dirty: false,
        }
    }

    pub(crate) fn bounds(&self) -> BoundingBox {
        BoundingBox::from_origin_and_side(self.origin, self.side_length)
    }

    #[inline(always)]
    pub(crate) fn contains(&self, pos: BlockPosition) -> bool {
        cube_contains(self.origin, self.side_length, pos)
    }

    pub(crate) fn contains_box(&self, bounds: &BoundingBox) -> bool {
        !bounds.is_invalid()
            && cube_contains(self.origin, self.side_length, bounds.min)
            && cube_contains(self.origin, self.side_length, bounds.max)
    }

    /// Which octant slot covers `pos`. The midpoint test is `>=` on the
    /// high side of each axis.
    #[inline(always)]
    pub(crate) fn child_index(&self, pos: BlockPosition) -> usize {
        let half = self.side_length / 2;
        let mut index = 0;
        if pos.x as i64 >= self.origin.x as i64 + half {
            index |= 1;
        }
        if pos.y as i64 >= self.origin.y as i64 + half {
            index |= 2;
        }
        if pos.z as i64 >= self.origin.z as i64 + half {
            index |= 4;
        }
        index
    }

    pub(crate) fn octant_origin(&self, index: usize) -> BlockPosition {
        octant_origin_of(self.origin, self.side_length, index)
    }

    /// Replaces whatever this node holds with a single uniform value.
    pub(crate) fn make_uniform(&mut self, value: V) {
        self.repr = Representation::Uniform(value);
    }
}

impl<V: Clone> Area<V> {
    /// Converts a uniform node into a container with all slots empty; the
    /// former uniform value becomes the container fill, so every octant
    /// still reads the same value until a child is carved out. Containers
    /// pass through unchanged.
    pub(crate) fn make_container(&mut self) {
        if let Representation::Uniform(_) = self.repr {
            let repr = std::mem::replace(&mut self.repr, Representation::Block(Vec::new()));
            let Representation::Uniform(fill) = repr else {
                unreachable!("representation checked above");
            };
            self.repr = Representation::Container {
                fill,
                children: Default::default(),
            };
        }
    }

    /// Converts a uniform node into a dense block, every cell starting at
    /// the former uniform value. Only meaningful at block granularity;
    /// blocks pass through unchanged.
    pub(crate) fn make_block(&mut self, block_side: i32) {
        if let Representation::Uniform(value) = &self.repr {
            let cells = vec![value.clone(); (block_side as usize).pow(3)];
            self.repr = Representation::Block(cells);
        }
    }
}
