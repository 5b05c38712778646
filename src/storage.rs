use crate::area::{
    aligned_for_side, block_local_index, enclosing_cube, enclosing_cube_for_box, octant_origin_of,
    Area, Representation,
};
use crate::block_position::BlockPosition;
use crate::bounding_box::BoundingBox;
use crate::snapshot::{BlockPatch, RegionSnapshot, SnapshotError, UniformArea};
use log::{debug, trace};

/// Block side length used by [`VoxelStorage::new`].
pub const DEFAULT_BLOCK_SIDE_LENGTH: i32 = 16;

/// A sparse voxel store mapping integer 3D positions to values of type `V`.
///
/// Storage is an octree of power-of-two cubes. Cubes holding a single
/// repeated value are kept as one uniform node no matter how large, so
/// region fills stay cheap; only cubes with mixed content materialize
/// dense blocks at the finest granularity. The root cube grows by doubling
/// whenever a write lands outside it, so the addressable space is the
/// whole `i32` range in every axis.
///
/// A distinguished null value, supplied at construction, represents
/// "never written". Reads outside all written content return it, and the
/// snapshot serializer never records it.
///
/// The structure is single-owner and single-threaded; callers sharing it
/// across threads must serialize access externally.
#[derive(Debug)]
pub struct VoxelStorage<V> {
    root: Option<Box<Area<V>>>,
    null_value: V,
    block_side: i32,
}

impl<V: Clone + PartialEq> VoxelStorage<V> {
    pub fn new(null_value: V) -> Self {
        Self::with_block_side_length(null_value, DEFAULT_BLOCK_SIDE_LENGTH)
    }

    /// Creates a store with a custom block side length, which must be a
    /// power of two.
    pub fn with_block_side_length(null_value: V, block_side_length: i32) -> Self {
        assert!(
            block_side_length > 0 && block_side_length & (block_side_length - 1) == 0,
            "block side length must be a power of two, got {}",
            block_side_length
        );
        Self {
            root: None,
            null_value,
            block_side: block_side_length,
        }
    }

    pub fn null_value(&self) -> &V {
        &self.null_value
    }

    pub fn block_side_length(&self) -> i32 {
        self.block_side
    }

    /// Discards all content; the store reads as all-null afterwards.
    pub fn clear(&mut self) {
        self.root = None;
    }

    /// Reads the value at `pos`, returning the null value for positions
    /// that were never written. Never mutates the tree.
    pub fn get(&self, pos: BlockPosition) -> V {
        let Some(mut node) = self.root.as_deref() else {
            return self.null_value.clone();
        };
        if !node.contains(pos) {
            return self.null_value.clone();
        }
        loop {
            match &node.repr {
                Representation::Uniform(value) => return value.clone(),
                Representation::Block(cells) => {
                    return cells[block_local_index(pos, self.block_side)].clone();
                }
                Representation::Container { fill, children } => {
                    match children[node.child_index(pos)].as_deref() {
                        Some(child) if child.contains(pos) => node = child,
                        _ => return fill.clone(),
                    }
                }
            }
        }
    }

    /// Writes one voxel. If the write makes its whole block uniform, a
    /// consolidation pass folds the block upward immediately; otherwise
    /// compaction waits for an explicit [`VoxelStorage::consolidate`].
    pub fn set(&mut self, pos: BlockPosition, value: V) {
        let cells = self.write_cell(pos, value.clone());
        if cells.iter().all(|cell| *cell == value) {
            self.consolidate();
        }
    }

    /// Writes one voxel without attempting consolidation. Cheaper for
    /// batches; follow up with [`VoxelStorage::consolidate`].
    pub fn set_uncompacted(&mut self, pos: BlockPosition, value: V) {
        self.write_cell(pos, value);
    }

    fn write_cell(&mut self, pos: BlockPosition, value: V) -> &mut Vec<V> {
        let block_side = self.block_side;
        let block = self.find_or_create_block(pos);
        let Representation::Block(cells) = &mut block.repr else {
            unreachable!("find_or_create_block returns a dense block");
        };
        cells[block_local_index(pos, block_side)] = value;
        cells
    }

    /// Sets every voxel inside `bounds` to `value`. Cubes fully inside the
    /// box collapse to a single uniform node in O(1) regardless of their
    /// size; only the box boundary touches dense cells. An invalid box is
    /// a no-op.
    pub fn fill(&mut self, bounds: BoundingBox, value: V) {
        if bounds.is_invalid() {
            return;
        }
        // Growing to both corners guarantees the root covers the box.
        self.find_or_create_block(bounds.min);
        self.find_or_create_block(bounds.max);
        let block_side = self.block_side;
        if let Some(root) = self.root.as_deref_mut() {
            Self::fill_area(root, &bounds, &value, block_side);
        }
        self.consolidate();
    }

    fn fill_area(node: &mut Area<V>, bounds: &BoundingBox, value: &V, block_side: i32) {
        let cube = node.bounds();
        if bounds.contains_box(&cube) {
            node.make_uniform(value.clone());
            node.dirty = true;
            return;
        }
        if !cube.intersects(bounds) {
            return;
        }
        node.dirty = true;

        if node.side_length == block_side as i64 {
            node.make_block(block_side);
            let Representation::Block(cells) = &mut node.repr else {
                unreachable!("block granularity nodes are dense after make_block");
            };
            let patch = cube.intersection(bounds);
            for z in patch.min.z..=patch.max.z {
                for y in patch.min.y..=patch.max.y {
                    for x in patch.min.x..=patch.max.x {
                        cells[block_local_index(BlockPosition::new(x, y, z), block_side)] =
                            value.clone();
                    }
                }
            }
            return;
        }

        node.make_container();
        let octant_boxes: [BoundingBox; 8] = std::array::from_fn(|index| {
            BoundingBox::from_origin_and_side(node.octant_origin(index), node.side_length / 2)
        });
        let Representation::Container { fill, children } = &mut node.repr else {
            unreachable!("nodes above block granularity are containers after make_container");
        };
        for (index, octant_box) in octant_boxes.iter().enumerate() {
            let patch = octant_box.intersection(bounds);
            if patch.is_invalid() {
                continue;
            }
            let slot = &mut children[index];
            match slot.as_deref() {
                None => {
                    // Smallest aligned cube covering exactly the patch.
                    let (origin, side) = enclosing_cube_for_box(
                        patch.min.aligned(block_side),
                        block_side as i64,
                        &patch,
                    );
                    *slot = Some(Box::new(Area::new(origin, side, fill.clone())));
                }
                Some(child) if !child.contains_box(&patch) => {
                    let (origin, side) =
                        enclosing_cube_for_box(child.origin, child.side_length, &patch);
                    let old = slot.take().expect("slot occupied in this arm");
                    let mut bridge = Area::new(origin, side, fill.clone());
                    bridge.make_container();
                    let old_octant = bridge.child_index(old.origin);
                    let Representation::Container { children, .. } = &mut bridge.repr else {
                        unreachable!("bridge was just made a container");
                    };
                    children[old_octant] = Some(old);
                    *slot = Some(Box::new(bridge));
                }
                Some(_) => {}
            }
            Self::fill_area(
                slot.as_deref_mut().expect("slot filled above"),
                bounds,
                value,
                block_side,
            );
        }
    }

    /// Returns the dense block covering `pos`, creating the root, growing
    /// it, and carving intermediate nodes as needed. Every node on the
    /// path is marked for consolidation. Newly created nodes inherit the
    /// uniform value of the region they were carved from, so reads are
    /// unchanged until something is actually written.
    fn find_or_create_block(&mut self, pos: BlockPosition) -> &mut Area<V> {
        let block_side = self.block_side;
        if self.root.is_none() {
            self.root = Some(Box::new(Area::new(
                pos.aligned(block_side),
                block_side as i64,
                self.null_value.clone(),
            )));
        }
        // One doubling at a time keeps the old root an exact octant of the
        // next one; containment is re-tested after every step.
        while self.root.as_ref().is_some_and(|root| !root.contains(pos)) {
            let old = self.root.take().expect("root present in growth loop");
            let side = old.side_length << 1;
            let origin = aligned_for_side(old.origin, side);
            debug!(
                "growing root: side {} -> {} at ({}, {}, {})",
                old.side_length, side, origin.x, origin.y, origin.z
            );
            let was_dirty = old.dirty;
            // Everything outside the old root was never written, so the
            // grown root reads as null there.
            let mut grown = Area::new(origin, side, self.null_value.clone());
            grown.make_container();
            let octant = grown.child_index(old.origin);
            let Representation::Container { children, .. } = &mut grown.repr else {
                unreachable!("grown root was just made a container");
            };
            children[octant] = Some(old);
            grown.dirty = was_dirty;
            self.root = Some(Box::new(grown));
        }
        let root = self.root.as_deref_mut().expect("root created above");
        Self::descend_to_block(root, pos, block_side)
    }

    fn descend_to_block<'a>(
        node: &'a mut Area<V>,
        pos: BlockPosition,
        block_side: i32,
    ) -> &'a mut Area<V> {
        node.dirty = true;
        if node.side_length == block_side as i64 {
            node.make_block(block_side);
            return node;
        }
        node.make_container();
        let octant = node.child_index(pos);
        let Representation::Container { fill, children } = &mut node.repr else {
            unreachable!("nodes above block granularity are containers after make_container");
        };
        let slot = &mut children[octant];
        match slot.as_deref() {
            None => {
                *slot = Some(Box::new(Area::new(
                    pos.aligned(block_side),
                    block_side as i64,
                    fill.clone(),
                )));
            }
            Some(child) if !child.contains(pos) => {
                // The existing child is too small to reach pos: grow a
                // bridging node that encloses both and re-parent the child
                // under it.
                let (origin, side) = enclosing_cube(child.origin, child.side_length, pos);
                let old = slot.take().expect("slot occupied in this arm");
                let mut bridge = Area::new(origin, side, fill.clone());
                bridge.make_container();
                let old_octant = bridge.child_index(old.origin);
                let Representation::Container { children, .. } = &mut bridge.repr else {
                    unreachable!("bridge was just made a container");
                };
                children[old_octant] = Some(old);
                *slot = Some(Box::new(bridge));
            }
            Some(_) => {}
        }
        Self::descend_to_block(
            slot.as_deref_mut().expect("slot filled above"),
            pos,
            block_side,
        )
    }

    /// Compacts the tree: blocks whose cells all agree become uniform
    /// nodes, and containers whose octants all agree collapse bottom-up.
    /// Only subtrees touched since the last pass are visited. Observable
    /// content never changes; the pass is idempotent.
    pub fn consolidate(&mut self) {
        if let Some(root) = self.root.as_deref_mut() {
            trace!("consolidating voxel tree, root side {}", root.side_length);
            Self::consolidate_area(root);
        }
    }

    fn consolidate_area(node: &mut Area<V>) {
        if let Representation::Container { children, .. } = &mut node.repr {
            for child in children.iter_mut().flatten() {
                if child.dirty {
                    Self::consolidate_area(child);
                }
            }
        }
        if let Some(value) = Self::uniform_candidate(node) {
            node.make_uniform(value);
        }
        node.dirty = false;
    }

    fn uniform_candidate(node: &Area<V>) -> Option<V> {
        match &node.repr {
            Representation::Uniform(_) => None,
            Representation::Block(cells) => {
                let first = cells.first()?;
                cells
                    .iter()
                    .all(|cell| cell == first)
                    .then(|| first.clone())
            }
            Representation::Container { fill, children } => {
                let octant_side = node.side_length / 2;
                let mut agreed: Option<&V> = None;
                for slot in children {
                    let octant_value = match slot.as_deref() {
                        None => fill,
                        Some(child) => match &child.repr {
                            Representation::Uniform(value) => {
                                // A child smaller than its octant leaves
                                // the remainder of the octant at the fill
                                // value.
                                if child.side_length < octant_side && value != fill {
                                    return None;
                                }
                                value
                            }
                            _ => return None,
                        },
                    };
                    match agreed {
                        None => agreed = Some(octant_value),
                        Some(previous) if previous == octant_value => {}
                        Some(_) => return None,
                    }
                }
                agreed.cloned()
            }
        }
    }

    /// The block-aligned bounding box of all non-null content, or the
    /// invalid box when nothing non-null was ever written. Block nodes
    /// contribute their whole cube without scanning cells, so the bound
    /// is block-aligned by construction.
    pub fn block_bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::invalid();
        let Some(root) = self.root.as_deref() else {
            return bounds;
        };
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match &node.repr {
                Representation::Block(_) => bounds = bounds.union(&node.bounds()),
                Representation::Uniform(value) => {
                    if *value != self.null_value {
                        bounds = bounds.union(&node.bounds());
                    }
                }
                Representation::Container { fill, children } => {
                    if *fill != self.null_value {
                        // The cube holds fill wherever no child covers it,
                        // and it subsumes every child.
                        bounds = bounds.union(&node.bounds());
                    } else {
                        for child in children.iter().flatten() {
                            if !bounds.contains_box(&child.bounds()) {
                                stack.push(child.as_ref());
                            }
                        }
                    }
                }
            }
        }
        bounds
    }

    /// True when no position reads a non-null value.
    pub fn is_empty(&self) -> bool {
        let Some(root) = self.root.as_deref() else {
            return true;
        };
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match &node.repr {
                Representation::Uniform(value) => {
                    if *value != self.null_value {
                        return false;
                    }
                }
                Representation::Block(cells) => {
                    if cells.iter().any(|cell| *cell != self.null_value) {
                        return false;
                    }
                }
                Representation::Container { fill, children } => {
                    if *fill != self.null_value {
                        // Fill shows through unless every octant has a
                        // full-size child in front of it.
                        let half = node.side_length / 2;
                        let fully_covered = children.iter().all(|slot| {
                            slot.as_deref()
                                .is_some_and(|child| child.side_length == half)
                        });
                        if !fully_covered {
                            return false;
                        }
                    }
                    for child in children.iter().flatten() {
                        stack.push(child.as_ref());
                    }
                }
            }
        }
        true
    }

    /// Every non-null voxel inside `query`, sorted by position. An invalid
    /// query yields an empty list.
    pub fn collect_non_null_in_bounds(&self, query: BoundingBox) -> Vec<(BlockPosition, V)> {
        let mut out = Vec::new();
        if query.is_invalid() {
            return out;
        }
        let Some(root) = self.root.as_deref() else {
            return out;
        };
        let mut stack = vec![(root, query)];
        while let Some((node, region)) = stack.pop() {
            let region = region.intersection(&node.bounds());
            if region.is_invalid() {
                continue;
            }
            match &node.repr {
                Representation::Uniform(value) => {
                    if *value != self.null_value {
                        Self::push_region_cells(&region, value, &mut out);
                    }
                }
                Representation::Block(cells) => {
                    for z in region.min.z..=region.max.z {
                        for y in region.min.y..=region.max.y {
                            for x in region.min.x..=region.max.x {
                                let pos = BlockPosition::new(x, y, z);
                                let cell = &cells[block_local_index(pos, self.block_side)];
                                if *cell != self.null_value {
                                    out.push((pos, cell.clone()));
                                }
                            }
                        }
                    }
                }
                Representation::Container { fill, children } => {
                    for (index, slot) in children.iter().enumerate() {
                        let octant_box = BoundingBox::from_origin_and_side(
                            node.octant_origin(index),
                            node.side_length / 2,
                        );
                        let octant_region = octant_box.intersection(&region);
                        if octant_region.is_invalid() {
                            continue;
                        }
                        match slot.as_deref() {
                            Some(child) => {
                                stack.push((child, octant_region));
                                if *fill != self.null_value {
                                    for piece in octant_region.subtract(&child.bounds()) {
                                        Self::push_region_cells(&piece, fill, &mut out);
                                    }
                                }
                            }
                            None => {
                                if *fill != self.null_value {
                                    Self::push_region_cells(&octant_region, fill, &mut out);
                                }
                            }
                        }
                    }
                }
            }
        }
        out.sort_unstable_by_key(|(pos, _)| *pos);
        out
    }

    fn push_region_cells(region: &BoundingBox, value: &V, out: &mut Vec<(BlockPosition, V)>) {
        for z in region.min.z..=region.max.z {
            for y in region.min.y..=region.max.y {
                for x in region.min.x..=region.max.x {
                    out.push((BlockPosition::new(x, y, z), value.clone()));
                }
            }
        }
    }

    /// Extracts all content intersecting `query` as a compact snapshot:
    /// uniform cubes for single-value regions, full cell arrays for dense
    /// blocks. Consolidates first so the result is maximally compact.
    /// Null regions are never recorded.
    pub fn snapshot(&mut self, query: BoundingBox) -> RegionSnapshot<V> {
        self.consolidate();
        let mut snapshot = RegionSnapshot::new(self.block_side);
        if query.is_invalid() {
            return snapshot;
        }
        let Some(root) = self.root.as_deref() else {
            return snapshot;
        };
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !node.bounds().intersects(&query) {
                continue;
            }
            match &node.repr {
                Representation::Block(cells) => snapshot.blocks.push(BlockPatch {
                    origin: node.origin,
                    cells: cells.clone(),
                }),
                Representation::Uniform(value) => {
                    if *value != self.null_value {
                        snapshot.uniform_areas.push(UniformArea {
                            origin: node.origin,
                            side_length: node.side_length,
                            value: value.clone(),
                        });
                    }
                }
                Representation::Container { fill, children } => {
                    if *fill != self.null_value {
                        Self::emit_fill_areas(
                            node,
                            fill,
                            children,
                            &query,
                            &mut snapshot.uniform_areas,
                        );
                    }
                    for child in children.iter().flatten() {
                        stack.push(child.as_ref());
                    }
                }
            }
        }
        snapshot
    }

    /// Emits the parts of a container cube where the fill value shows
    /// through, as aligned power-of-two cubes that exclude every child
    /// cube. Children emit their own content when visited, so the output
    /// areas are disjoint and replay order does not matter.
    fn emit_fill_areas(
        node: &Area<V>,
        fill: &V,
        children: &[Option<Box<Area<V>>>; 8],
        query: &BoundingBox,
        out: &mut Vec<UniformArea<V>>,
    ) {
        let mut cubes = vec![(node.origin, node.side_length)];
        while let Some((origin, side)) = cubes.pop() {
            let cube = BoundingBox::from_origin_and_side(origin, side);
            if !cube.intersects(query) {
                continue;
            }
            let mut covered_by_child = false;
            let mut splits = false;
            for child in children.iter().flatten() {
                if child.origin == origin && child.side_length == side {
                    covered_by_child = true;
                    break;
                }
                if cube.contains_box(&child.bounds()) {
                    splits = true;
                }
            }
            if covered_by_child {
                continue;
            }
            if splits {
                for index in 0..8 {
                    cubes.push((octant_origin_of(origin, side, index), side / 2));
                }
            } else {
                out.push(UniformArea {
                    origin,
                    side_length: side,
                    value: fill.clone(),
                });
            }
        }
    }

    /// Replays a snapshot on top of the current content: uniform areas as
    /// fills, block patches as direct cell overwrites, then one final
    /// consolidation. Validates the snapshot against this store before
    /// touching anything, so a failed restore leaves the store unchanged.
    pub fn restore(&mut self, snapshot: &RegionSnapshot<V>) -> Result<(), SnapshotError> {
        if snapshot.block_side_length != self.block_side {
            return Err(SnapshotError::BlockSideMismatch {
                expected: self.block_side,
                found: snapshot.block_side_length,
            });
        }
        let expected_cells = (self.block_side as usize).pow(3);
        for patch in &snapshot.blocks {
            if patch.cells.len() != expected_cells {
                return Err(SnapshotError::BlockLength {
                    origin: patch.origin,
                    expected: expected_cells,
                    found: patch.cells.len(),
                });
            }
        }
        for area in &snapshot.uniform_areas {
            let bounds = BoundingBox::from_origin_and_side(area.origin, area.side_length);
            self.fill(bounds, area.value.clone());
        }
        for patch in &snapshot.blocks {
            let block = self.find_or_create_block(patch.origin);
            let Representation::Block(cells) = &mut block.repr else {
                unreachable!("find_or_create_block returns a dense block");
            };
            cells.clone_from(&patch.cells);
        }
        self.consolidate();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32, y: i32, z: i32) -> BlockPosition {
        BlockPosition::new(x, y, z)
    }

    fn boxed(min: (i32, i32, i32), max: (i32, i32, i32)) -> BoundingBox {
        BoundingBox::new(min.into(), max.into())
    }

    fn store() -> VoxelStorage<u32> {
        VoxelStorage::with_block_side_length(0, 4)
    }

    #[test]
    fn test_root_absent_until_first_write() {
        let mut storage = store();
        assert!(storage.root.is_none());
        assert_eq!(storage.get(pos(0, 0, 0)), 0);
        storage.set(pos(0, 0, 0), 1);
        assert!(storage.root.is_some());
    }

    #[test]
    fn test_first_root_is_one_block() {
        let mut storage = store();
        storage.set(pos(5, 6, 7), 1);
        let root = storage.root.as_deref().unwrap();
        assert_eq!(root.side_length, 4);
        assert_eq!(root.origin, pos(4, 4, 4));
        assert!(matches!(root.repr, Representation::Block(_)));
    }

    #[test]
    fn test_root_growth_reparents_old_root() {
        let mut storage = store();
        storage.set_uncompacted(pos(0, 0, 0), 1);
        storage.set_uncompacted(pos(6, 0, 0), 2);
        let root = storage.root.as_deref().unwrap();
        assert_eq!(root.side_length, 8);
        let Representation::Container { children, .. } = &root.repr else {
            panic!("grown root should be a container");
        };
        let old = children[0]
            .as_deref()
            .expect("old root re-parented at octant 0");
        assert_eq!(old.side_length, 4);
        assert_eq!(old.origin, pos(0, 0, 0));
    }

    #[test]
    fn test_sign_straddling_content_roots_at_full_space() {
        let mut storage = store();
        storage.set_uncompacted(pos(2, 2, 2), 1);
        storage.set_uncompacted(pos(-2, 2, 2), 2);
        let root = storage.root.as_deref().unwrap();
        assert_eq!(root.side_length, crate::area::FULL_SPACE_SIDE);
        assert_eq!(storage.get(pos(2, 2, 2)), 1);
        assert_eq!(storage.get(pos(-2, 2, 2)), 2);
        assert_eq!(storage.get(pos(0, 2, 2)), 0);
    }

    #[test]
    fn test_uniform_block_write_folds_to_uniform_root() {
        let mut storage = store();
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    storage.set(pos(x, y, z), 9);
                }
            }
        }
        // The last set makes the block uniform and set() consolidates.
        let root = storage.root.as_deref().unwrap();
        assert!(
            matches!(&root.repr, Representation::Uniform(value) if *value == 9),
            "expected uniform root, got {:?}",
            root.repr
        );
    }

    #[test]
    fn test_set_uncompacted_leaves_block_dense() {
        let mut storage = store();
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    storage.set_uncompacted(pos(x, y, z), 9);
                }
            }
        }
        let root = storage.root.as_deref().unwrap();
        assert!(matches!(root.repr, Representation::Block(_)));
        storage.consolidate();
        let root = storage.root.as_deref().unwrap();
        assert!(matches!(&root.repr, Representation::Uniform(value) if *value == 9));
    }

    #[test]
    fn test_consolidate_clears_dirty_flags() {
        let mut storage = store();
        storage.set_uncompacted(pos(0, 0, 0), 1);
        storage.set_uncompacted(pos(100, 0, 0), 2);
        assert!(storage.root.as_deref().unwrap().dirty);
        storage.consolidate();
        let mut stack = vec![storage.root.as_deref().unwrap()];
        while let Some(node) = stack.pop() {
            assert!(!node.dirty);
            if let Representation::Container { children, .. } = &node.repr {
                for child in children.iter().flatten() {
                    stack.push(child.as_ref());
                }
            }
        }
    }

    #[test]
    fn test_carving_uniform_region_keeps_fill_value() {
        let mut storage = store();
        storage.fill(boxed((0, 0, 0), (7, 7, 7)), 5);
        // Carve a single different voxel out of the uniform cube.
        storage.set(pos(1, 1, 1), 6);
        assert_eq!(storage.get(pos(1, 1, 1)), 6);
        // Everything else in the cube still reads the old fill.
        assert_eq!(storage.get(pos(0, 0, 0)), 5);
        assert_eq!(storage.get(pos(7, 7, 7)), 5);
        assert_eq!(storage.get(pos(4, 4, 4)), 5);
    }

    #[test]
    fn test_undersized_child_blocks_merge_when_fill_differs() {
        let mut storage = store();
        // Uniform 5 over a 16-cube, then a small region of 7 deep inside:
        // the containers on the path hold fill 5 with an undersized child
        // and must not collapse.
        storage.fill(boxed((0, 0, 0), (15, 15, 15)), 5);
        storage.fill(boxed((0, 0, 0), (3, 3, 3)), 7);
        storage.consolidate();
        assert_eq!(storage.get(pos(0, 0, 0)), 7);
        assert_eq!(storage.get(pos(4, 4, 4)), 5);
        assert_eq!(storage.get(pos(15, 15, 15)), 5);
    }

    #[test]
    fn test_consolidate_merges_carved_region_written_back() {
        let mut storage = store();
        storage.fill(boxed((0, 0, 0), (7, 7, 7)), 5);
        storage.set_uncompacted(pos(1, 1, 1), 6);
        storage.set_uncompacted(pos(1, 1, 1), 5);
        storage.consolidate();
        let root = storage.root.as_deref().unwrap();
        assert!(
            matches!(&root.repr, Representation::Uniform(value) if *value == 5),
            "write-back to the fill value should re-merge, got {:?}",
            root.repr
        );
    }

    #[test]
    fn test_snapshot_emits_fill_cubes_around_children() {
        let mut storage = store();
        storage.fill(boxed((0, 0, 0), (7, 7, 7)), 5);
        storage.set(pos(0, 0, 0), 6);
        let snapshot = storage.snapshot(boxed((0, 0, 0), (7, 7, 7)));

        // The carved block is dense; the fill shows up as disjoint cubes.
        assert_eq!(snapshot.blocks.len(), 1);
        assert_eq!(snapshot.blocks[0].origin, pos(0, 0, 0));
        assert!(!snapshot.uniform_areas.is_empty());
        for area in &snapshot.uniform_areas {
            assert_eq!(area.value, 5);
            let area_box = BoundingBox::from_origin_and_side(area.origin, area.side_length);
            assert!(!area_box.intersects(&boxed((0, 0, 0), (3, 3, 3))));
        }
        // Fill cubes plus the block tile the whole 8-cube.
        let covered: u64 = snapshot
            .uniform_areas
            .iter()
            .map(|area| BoundingBox::from_origin_and_side(area.origin, area.side_length).volume())
            .sum();
        assert_eq!(covered + 64, 512);
    }

    #[test]
    fn test_fill_with_null_clears_region() {
        let mut storage = store();
        storage.fill(boxed((0, 0, 0), (7, 7, 7)), 5);
        storage.fill(boxed((0, 0, 0), (3, 3, 3)), 0);
        assert_eq!(storage.get(pos(0, 0, 0)), 0);
        assert_eq!(storage.get(pos(4, 0, 0)), 5);
        assert!(!storage.is_empty());
        storage.fill(boxed((0, 0, 0), (7, 7, 7)), 0);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_snapshot_skips_null_child_inside_filled_region() {
        let mut storage = store();
        storage.fill(boxed((0, 0, 0), (7, 7, 7)), 5);
        storage.fill(boxed((4, 4, 4), (7, 7, 7)), 0);
        let snapshot = storage.snapshot(boxed((0, 0, 0), (7, 7, 7)));
        assert!(snapshot.blocks.is_empty());
        for area in &snapshot.uniform_areas {
            assert_eq!(area.value, 5);
            let area_box = BoundingBox::from_origin_and_side(area.origin, area.side_length);
            assert!(!area_box.intersects(&boxed((4, 4, 4), (7, 7, 7))));
        }
        let covered: u64 = snapshot
            .uniform_areas
            .iter()
            .map(|area| BoundingBox::from_origin_and_side(area.origin, area.side_length).volume())
            .sum();
        assert_eq!(covered, 512 - 64);
    }

    #[test]
    fn test_clear_drops_root() {
        let mut storage = store();
        storage.fill(boxed((0, 0, 0), (31, 31, 31)), 3);
        storage.clear();
        assert!(storage.root.is_none());
        assert_eq!(storage.get(pos(0, 0, 0)), 0);
        assert!(storage.block_bounds().is_invalid());
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_non_power_of_two_block_side_rejected() {
        let _ = VoxelStorage::with_block_side_length(0u32, 6);
    }
}
