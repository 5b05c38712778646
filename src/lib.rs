//! Sparse voxel storage built on an octree of power-of-two cubes.
//!
//! [`VoxelStorage`] maps integer 3D positions to values of an arbitrary
//! copyable type. Regions holding a single repeated value stay compressed
//! as one node no matter how large, so axis-aligned fills never touch
//! per-voxel memory; mixed regions materialize dense blocks at the finest
//! granularity. The root cube grows on demand, a lazy consolidation pass
//! re-compresses after batches of writes, and [`snapshot::RegionSnapshot`]
//! captures sparse regions for transfer or persistence.

mod area;
pub mod block_position;
pub mod bounding_box;
pub mod snapshot;
pub mod storage;

pub use block_position::BlockPosition;
pub use bounding_box::BoundingBox;
pub use snapshot::{BlockPatch, RegionSnapshot, SnapshotError, UniformArea};
pub use storage::{VoxelStorage, DEFAULT_BLOCK_SIDE_LENGTH};
