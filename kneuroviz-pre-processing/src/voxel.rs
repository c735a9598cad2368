/// Voxel element types stored in the volume
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type declared in the volume info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Uint8,
    Uint16,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Uint8 => "uint8",
            DataType::Uint16 => "uint16",
        }
    }

    /// Bytes per voxel
    pub fn size(&self) -> usize {
        match self {
            DataType::Uint8 => 1,
            DataType::Uint16 => 2,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rust type backing one voxel of a `DataType`.
/// Chunk files store voxels little endian.
pub trait Voxel: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    fn read_le(bytes: &[u8]) -> Self;

    fn write_le(self, out: &mut Vec<u8>);

    /// Widen to a segment label.
    fn to_label(self) -> u64;

    /// Narrow from a wider integer, wrapping on overflow.
    fn from_wrapping(value: u64) -> Self;
}

impl Voxel for u8 {
    const DATA_TYPE: DataType = DataType::Uint8;

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }

    fn to_label(self) -> u64 {
        self as u64
    }

    fn from_wrapping(value: u64) -> Self {
        value as u8
    }
}

impl Voxel for u16 {
    const DATA_TYPE: DataType = DataType::Uint16;

    fn read_le(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn to_label(self) -> u64 {
        self as u64
    }

    fn from_wrapping(value: u64) -> Self {
        value as u16
    }
}
