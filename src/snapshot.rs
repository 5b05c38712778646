use crate::block_position::BlockPosition;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const SNAPSHOT_MAGIC: &[u8; 4] = b"ACRN";
const SNAPSHOT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8;

/// Error type for snapshot decoding and replay.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot data too short")]
    TooShort,
    #[error("bad snapshot magic")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("snapshot block side {found} does not match store block side {expected}")]
    BlockSideMismatch { expected: i32, found: i32 },
    #[error("block patch at {origin:?} has {found} cells, expected {expected}")]
    BlockLength {
        origin: BlockPosition,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Codec(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

/// A cube of one repeated value: `side_length³` cells starting at `origin`.
/// The side is `i64` because a store whose content straddles a coordinate
/// sign change is rooted at the cube covering the whole `i32` space.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UniformArea<V> {
    pub origin: BlockPosition,
    pub side_length: i64,
    pub value: V,
}

/// One dense block: `block_side_length³` cells in x-then-y-then-z order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BlockPatch<V> {
    pub origin: BlockPosition,
    pub cells: Vec<V>,
}

/// The sparse serialization of a region: a list of uniform cubes plus a
/// list of dense blocks. Null-valued regions are never recorded; absence
/// means "unset".
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RegionSnapshot<V> {
    pub block_side_length: i32,
    pub uniform_areas: Vec<UniformArea<V>>,
    pub blocks: Vec<BlockPatch<V>>,
}

impl<V> RegionSnapshot<V> {
    pub fn new(block_side_length: i32) -> Self {
        Self {
            block_side_length,
            uniform_areas: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.uniform_areas.is_empty() && self.blocks.is_empty()
    }
}

impl<V: Serialize> RegionSnapshot<V> {
    /// Encodes the snapshot as a self-describing byte buffer: a 4-byte
    /// magic, a version word, then the bincode payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let mut data = Vec::with_capacity(HEADER_LEN + payload.len());
        data.extend_from_slice(SNAPSHOT_MAGIC);
        data.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        data.extend_from_slice(&payload);
        Ok(data)
    }
}

impl<V: DeserializeOwned> RegionSnapshot<V> {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(SnapshotError::TooShort);
        }
        if &data[..4] != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        Ok(bincode::deserialize(&data[HEADER_LEN..])?)
    }
}
