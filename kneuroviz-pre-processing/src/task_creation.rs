/// Mesh and mesh manifest task definitions and their creation over a volume.
use crate::bounds::Bbox;
use crate::constants::MESH_DIR;
use crate::error::{Error, Result};
use crate::manifest::{
    MeshManifest, collect_fragments, fragment_name, init_mesh_dir, mesh_dir, write_manifest,
};
use crate::surface::{TaskSurface, task_data_region};
use crate::task_queue::RegisteredTask;
use crate::volume::PrecomputedVolume;
use crate::voxel::{DataType, Voxel};
use ndarray::Array3;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Meshes every label inside one block of a segmentation volume and writes
/// one fragment per label.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshTask {
    pub layer_path: PathBuf,
    pub mip: usize,
    pub offset: [usize; 3],
    pub shape: [usize; 3],
}

impl MeshTask {
    fn read_labels<T: Voxel>(volume: &PrecomputedVolume, region: Bbox) -> Result<Array3<u64>> {
        Ok(volume.read_block::<T>(region)?.mapv(T::to_label))
    }
}

impl RegisteredTask for MeshTask {
    fn execute(&self) -> Result<()> {
        let volume = PrecomputedVolume::open(&self.layer_path)?.with_mip(self.mip)?;
        let bounds = volume.bounds();

        let requested = Bbox::new(
            self.offset,
            [
                self.offset[0] + self.shape[0],
                self.offset[1] + self.shape[1],
                self.offset[2] + self.shape[2],
            ],
        );
        let Some(task) = requested.intersection(&bounds) else {
            return Ok(());
        };

        let region = task_data_region(&task, &bounds);
        let labels = match volume.info().data_type {
            DataType::Uint8 => Self::read_labels::<u8>(&volume, region)?,
            DataType::Uint16 => Self::read_labels::<u16>(&volume, region)?,
        };

        let surface = TaskSurface::new(labels.view(), region, task, bounds);
        let resolution = volume.resolution();
        let dir = mesh_dir(&volume);

        let mut written = 0;
        for label in surface.labels() {
            let mesh = surface.extract(label, resolution);
            if mesh.is_empty() {
                continue;
            }
            fs::write(dir.join(fragment_name(label, &task)), mesh.to_precomputed())?;
            written += 1;
        }

        debug!(task = %task, fragments = written, "Meshed block");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("MeshTask(offset={:?}, shape={:?})", self.offset, self.shape)
    }
}

/// Writes manifests for every segment whose id starts with `prefix`.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshManifestTask {
    pub layer_path: PathBuf,
    pub prefix: String,
}

impl RegisteredTask for MeshManifestTask {
    fn execute(&self) -> Result<()> {
        let volume = PrecomputedVolume::open(&self.layer_path)?;
        let dir = mesh_dir(&volume);

        for (label, fragments) in collect_fragments(&dir, &self.prefix)? {
            write_manifest(&dir, label, &MeshManifest { fragments })?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("MeshManifestTask(prefix={})", self.prefix)
    }
}

/// Prepares the mesh directory of a segmentation store and returns one
/// `MeshTask` per block of `shape` covering the volume.
pub fn create_meshing_tasks(
    layer_path: &Path,
    mip: usize,
    shape: [usize; 3],
) -> Result<Vec<MeshTask>> {
    if shape.contains(&0) {
        return Err(Error::InvalidShape(format!("{:?}", shape)));
    }

    let mut volume = PrecomputedVolume::open(layer_path)?.with_mip(mip)?;
    if volume.info().mesh.is_none() {
        volume.set_mesh_dir(MESH_DIR);
        volume.commit_info()?;
    }
    init_mesh_dir(&mesh_dir(&volume))?;

    let tasks = volume
        .bounds()
        .blocks(shape)
        .filter(|block| !block.is_subvoxel())
        .map(|block| MeshTask {
            layer_path: layer_path.to_path_buf(),
            mip,
            offset: block.min,
            shape,
        })
        .collect();

    Ok(tasks)
}

/// One manifest task per segment id prefix of `magnitude` digits.
///
/// Ids shorter than `magnitude` digits get an exact `"<id>:"` prefix, all
/// others are grouped by their leading digits, so every non-zero id is
/// covered exactly once.
pub fn create_mesh_manifest_tasks(layer_path: &Path, magnitude: u32) -> Vec<MeshManifestTask> {
    let magnitude = magnitude.max(1);
    let start = 10u64.pow(magnitude - 1);
    let end = 10u64.pow(magnitude);

    let exact = (1..start).map(|id| format!("{}:", id));
    let leading = (start..end).map(|id| id.to_string());

    exact
        .chain(leading)
        .map(|prefix| MeshManifestTask {
            layer_path: layer_path.to_path_buf(),
            prefix,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes(magnitude: u32) -> Vec<String> {
        create_mesh_manifest_tasks(Path::new("store"), magnitude)
            .into_iter()
            .map(|t| t.prefix)
            .collect()
    }

    fn covering_tasks(prefixes: &[String], id: u64) -> usize {
        let name = format!("{}:0:0-1_0-1_0-1", id);
        prefixes.iter().filter(|p| name.starts_with(p.as_str())).count()
    }

    #[test]
    fn magnitude_two_prefixes() {
        let prefixes = prefixes(2);
        assert_eq!(prefixes.len(), 99);
        assert_eq!(prefixes[0], "1:");
        assert_eq!(prefixes[8], "9:");
        assert_eq!(prefixes[9], "10");
        assert_eq!(prefixes[98], "99");
    }

    #[test]
    fn every_id_has_exactly_one_manifest_task() {
        for magnitude in 1..=3 {
            let prefixes = prefixes(magnitude);
            for id in [1, 7, 10, 42, 99, 100, 144, 1000, 65_535] {
                assert_eq!(covering_tasks(&prefixes, id), 1, "id {id}, magnitude {magnitude}");
            }
        }
    }
}
