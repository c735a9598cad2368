/// Validated, immutable run configuration built from command-line arguments.
use crate::bounds::{parse_shape, split_triple};
use crate::cli::{MeshExportArgs, PreprocessArgs};
use crate::constants::{BLOCK_DEPTH_DIVISOR, BLOCK_EDGE_DIVISOR};
use crate::error::{Error, Result};
use crate::info::LayerType;
use crate::voxel::DataType;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    /// Raw intensity image stored as uint8.
    Channel,
    /// Label volume stored as uint16 and meshed.
    Segmentation,
}

impl ImageType {
    pub fn layer_type(&self) -> LayerType {
        match self {
            ImageType::Channel => LayerType::Image,
            ImageType::Segmentation => LayerType::Segmentation,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ImageType::Channel => DataType::Uint8,
            ImageType::Segmentation => DataType::Uint16,
        }
    }

    /// Only segmentations get mesh and manifest tasks.
    pub fn is_meshed(&self) -> bool {
        matches!(self, ImageType::Segmentation)
    }
}

impl FromStr for ImageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "channel" => Ok(ImageType::Channel),
            "segmentation" => Ok(ImageType::Segmentation),
            other => Err(Error::InvalidImageType(other.to_string())),
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageType::Channel => f.write_str("channel"),
            ImageType::Segmentation => f.write_str("segmentation"),
        }
    }
}

/// Physical voxel size along x, y, z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution(pub [f64; 3]);

impl FromStr for Resolution {
    type Err = Error;

    /// Accepts "x,y,z" with optional surrounding brackets or parentheses.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidResolution(s.to_string());
        let parts = split_triple(s).ok_or_else(invalid)?;

        let mut values = [0.0f64; 3];
        for (slot, part) in values.iter_mut().zip(parts) {
            let value: f64 = part.parse().map_err(|_| invalid())?;
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid());
            }
            *slot = value;
        }

        Ok(Resolution(values))
    }
}

/// Default copy block for a source of shape `(z, y, x)`:
/// half the slowest axis in-plane and a further eighth of that in depth,
/// never below one voxel.
pub fn default_block_shape(source_shape: [usize; 3]) -> [usize; 3] {
    let edge = source_shape[0] / BLOCK_EDGE_DIVISOR;
    [
        edge.max(1),
        edge.max(1),
        (edge / BLOCK_DEPTH_DIVISOR).max(1),
    ]
}

/// Settings of one pre-processing run.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    pub source: PathBuf,
    pub resolution: Resolution,
    pub image_type: ImageType,
    pub destination: PathBuf,
    /// Explicit copy block; derived from the source shape when absent.
    pub block_shape: Option<[usize; 3]>,
    pub chunk_size: [usize; 3],
    pub parallel: usize,
    pub magnitude: u32,
}

impl PreprocessConfig {
    /// Validates every argument without touching the filesystem.
    pub fn from_args(args: &PreprocessArgs) -> Result<Self> {
        let image_type: ImageType = args.image_type.parse()?;
        let resolution: Resolution = args.resolution.parse()?;

        let block_shape = args
            .block_shape
            .as_deref()
            .map(|text| parse_shape(text).ok_or_else(|| Error::InvalidShape(text.to_string())))
            .transpose()?;
        let chunk_size = parse_shape(&args.chunk_size)
            .ok_or_else(|| Error::InvalidShape(args.chunk_size.clone()))?;

        Ok(Self {
            source: args.source.clone(),
            resolution,
            image_type,
            destination: args.destination.clone(),
            block_shape,
            chunk_size,
            parallel: args.parallel.max(1),
            magnitude: args.magnitude,
        })
    }

    /// Copy block for a source of shape `(z, y, x)`.
    pub fn block_shape_for(&self, source_shape: [usize; 3]) -> [usize; 3] {
        self.block_shape
            .unwrap_or_else(|| default_block_shape(source_shape))
    }
}

/// Settings of one mesh export run.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshExportConfig {
    pub folder: PathBuf,
    pub segment_id: u64,
    pub destination: PathBuf,
    /// Converter as given on the command line or environment, resolved before use.
    pub converter: Option<PathBuf>,
}

impl MeshExportConfig {
    pub fn from_args(args: &MeshExportArgs) -> Result<Self> {
        let segment_id = args
            .segment
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::InvalidSegmentId(args.segment.clone()))?;

        Ok(Self {
            folder: args.folder.clone(),
            segment_id,
            destination: args.destination.clone(),
            converter: args.converter.clone(),
        })
    }

    /// Geometry file written by the export, `<destination>/<id>.obj`.
    pub fn obj_path(&self) -> PathBuf {
        self.destination.join(format!("{}.obj", self.segment_id))
    }

    /// Compressed mesh produced by the converter, `<destination>/<id>.ctm`.
    pub fn ctm_path(&self) -> PathBuf {
        self.destination.join(format!("{}.ctm", self.segment_id))
    }
}
