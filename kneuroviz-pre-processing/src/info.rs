/// Volume descriptor written as the store's `info` file.
use crate::bounds::Bbox;
use crate::error::{Error, Result};
use crate::voxel::DataType;
use serde::{Deserialize, Serialize};

/// Store level tag separating intensity images from label volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Image,
    Segmentation,
}

/// Chunk payload encoding. Only uncompressed chunks are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Raw,
}

/// One resolution level of the volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleInfo {
    /// Directory name holding this level's chunks.
    pub key: String,
    /// Physical size of one voxel along x, y, z.
    pub resolution: [f64; 3],
    pub voxel_offset: [usize; 3],
    /// Extent in voxels along x, y, z.
    pub size: [usize; 3],
    pub chunk_sizes: Vec<[usize; 3]>,
    pub encoding: Encoding,
}

impl ScaleInfo {
    /// Voxel bounds covered by this level.
    pub fn bounds(&self) -> Bbox {
        Bbox::new(
            self.voxel_offset,
            [
                self.voxel_offset[0] + self.size[0],
                self.voxel_offset[1] + self.size[1],
                self.voxel_offset[2] + self.size[2],
            ],
        )
    }

    pub fn chunk_size(&self) -> [usize; 3] {
        self.chunk_sizes[0]
    }
}

/// Complete volume descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeInfo {
    #[serde(rename = "type")]
    pub layer_type: LayerType,
    pub data_type: DataType,
    pub num_channels: u32,
    pub scales: Vec<ScaleInfo>,
    /// Mesh sub-directory, present once meshing has been set up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<String>,
}

impl VolumeInfo {
    /// Build a single channel, single scale, raw encoded descriptor at zero offset.
    pub fn new(
        layer_type: LayerType,
        data_type: DataType,
        resolution: [f64; 3],
        size: [usize; 3],
        chunk_size: [usize; 3],
    ) -> Self {
        let key = resolution
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join("_");

        Self {
            layer_type,
            data_type,
            num_channels: 1,
            scales: vec![ScaleInfo {
                key,
                resolution,
                voxel_offset: [0, 0, 0],
                size,
                chunk_sizes: vec![chunk_size],
                encoding: Encoding::Raw,
            }],
            mesh: None,
        }
    }

    /// Scale at the given mip level.
    pub fn scale(&self, mip: usize) -> Result<&ScaleInfo> {
        self.scales
            .get(mip)
            .ok_or_else(|| Error::Store(format!("Mip level {} does not exist", mip)))
    }

    /// Checks the invariants every stored descriptor must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.num_channels != 1 {
            return Err(Error::Store(format!(
                "Only single channel volumes are supported, found {}",
                self.num_channels
            )));
        }
        if self.scales.is_empty() {
            return Err(Error::Store("Volume info has no scales".into()));
        }

        for scale in &self.scales {
            if scale.size.contains(&0) {
                return Err(Error::Store(format!(
                    "Scale {} has an empty extent {:?}",
                    scale.key, scale.size
                )));
            }
            if scale.resolution.iter().any(|r| !r.is_finite() || *r <= 0.0) {
                return Err(Error::Store(format!(
                    "Scale {} has an invalid resolution {:?}",
                    scale.key, scale.resolution
                )));
            }
            match scale.chunk_sizes.first() {
                Some(chunk) if !chunk.contains(&0) => {}
                _ => {
                    return Err(Error::Store(format!(
                        "Scale {} has no usable chunk size",
                        scale.key
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VolumeInfo {
        VolumeInfo::new(
            LayerType::Segmentation,
            DataType::Uint16,
            [4.0, 4.0, 40.0],
            [128, 128, 64],
            [64, 64, 64],
        )
    }

    #[test]
    fn serialises_precomputed_layout() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "segmentation");
        assert_eq!(json["data_type"], "uint16");
        assert_eq!(json["num_channels"], 1);
        assert_eq!(json["scales"][0]["key"], "4_4_40");
        assert_eq!(json["scales"][0]["encoding"], "raw");
        assert_eq!(json["scales"][0]["size"], serde_json::json!([128, 128, 64]));
        assert!(json.get("mesh").is_none());
    }

    #[test]
    fn parses_back_with_mesh_directory() {
        let mut info = sample();
        info.mesh = Some("mesh".into());
        let text = serde_json::to_string(&info).unwrap();
        let parsed: VolumeInfo = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, info);
    }

    #[test]
    fn rejects_empty_extent() {
        let mut info = sample();
        info.scales[0].size = [0, 1, 1];
        assert!(info.validate().is_err());
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn scale_bounds_follow_offset() {
        let mut info = sample();
        info.scales[0].voxel_offset = [1, 2, 3];
        assert_eq!(
            info.scale(0).unwrap().bounds(),
            Bbox::new([1, 2, 3], [129, 130, 67])
        );
        assert!(info.scale(1).is_err());
    }
}
