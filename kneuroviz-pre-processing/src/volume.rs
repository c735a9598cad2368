/// Directory backed chunked volume store.
use crate::bounds::Bbox;
use crate::constants::{INFO_FILE, MESH_DIR};
use crate::error::{Error, Result};
use crate::info::VolumeInfo;
use crate::voxel::Voxel;
use ndarray::{Array3, ArrayView3, Ix3, SliceInfo, SliceInfoElem, s};
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Chunked volume rooted at a local directory.
///
/// Layout: `info` JSON descriptor plus one file per chunk under the scale key,
/// named `x0-x1_y0-y1_z0-z1` and holding raw little endian voxels, x fastest.
/// Chunks never written read back as zeros.
pub struct PrecomputedVolume {
    path: PathBuf,
    info: VolumeInfo,
    mip: usize,
}

impl PrecomputedVolume {
    /// Creates the store directory and commits `info`, replacing any existing store.
    ///
    /// Chunk and mesh directories left by an earlier run at `path` are removed,
    /// so stale chunks never mix with the new layout.
    pub fn create(path: &Path, info: VolumeInfo) -> Result<Self> {
        info.validate()?;

        fs::create_dir_all(path).map_err(|source| Error::StoreCreation {
            path: path.to_path_buf(),
            source,
        })?;

        let mut stale: Vec<String> = info.scales.iter().map(|s| s.key.clone()).collect();
        if let Ok(previous) = Self::open(path) {
            stale.extend(previous.info.scales.into_iter().map(|s| s.key));
            stale.extend(previous.info.mesh);
        }
        stale.push(MESH_DIR.to_string());
        for name in &stale {
            remove_store_dir(path, name)?;
        }

        let volume = Self {
            path: path.to_path_buf(),
            info,
            mip: 0,
        };
        volume.commit_info()?;
        Ok(volume)
    }

    /// Opens an existing store by reading its descriptor.
    pub fn open(path: &Path) -> Result<Self> {
        let info_path = path.join(INFO_FILE);
        let text = match fs::read_to_string(&info_path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::MissingFile(info_path));
            }
            Err(err) => return Err(err.into()),
        };

        let info: VolumeInfo = serde_json::from_str(&text)?;
        info.validate()?;

        Ok(Self {
            path: path.to_path_buf(),
            info,
            mip: 0,
        })
    }

    /// Selects the mip level used by block reads and writes.
    pub fn with_mip(mut self, mip: usize) -> Result<Self> {
        self.info.scale(mip)?;
        self.mip = mip;
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &VolumeInfo {
        &self.info
    }

    pub fn mip(&self) -> usize {
        self.mip
    }

    /// Records the mesh sub-directory in the descriptor; call `commit_info` to persist it.
    pub fn set_mesh_dir(&mut self, dir: &str) {
        self.info.mesh = Some(dir.to_string());
    }

    /// Writes the descriptor to `<path>/info`.
    pub fn commit_info(&self) -> Result<()> {
        let info_path = self.path.join(INFO_FILE);
        let json = serde_json::to_string_pretty(&self.info)?;
        fs::write(&info_path, json).map_err(|source| Error::StoreCreation {
            path: info_path,
            source,
        })?;
        debug!(path = %self.path.display(), "Committed volume info");
        Ok(())
    }

    /// Voxel bounds of the selected mip level.
    pub fn bounds(&self) -> Bbox {
        self.scale().bounds()
    }

    pub fn resolution(&self) -> [f64; 3] {
        self.scale().resolution
    }

    fn scale(&self) -> &crate::info::ScaleInfo {
        // `with_mip` and `validate` guarantee the level exists.
        &self.info.scales[self.mip]
    }

    /// Writes `data`, indexed `[x, y, z]`, into `bbox`.
    /// Boxes need not be chunk aligned; partially covered chunks are merged
    /// with their stored contents.
    pub fn write_block<T: Voxel>(&self, bbox: Bbox, data: ArrayView3<T>) -> Result<()> {
        self.check_type::<T>()?;
        self.check_region(&bbox)?;

        let shape = bbox.shape();
        if data.shape() != &shape[..] {
            return Err(Error::Store(format!(
                "Block data has shape {:?} but {} needs {:?}",
                data.shape(),
                bbox,
                shape
            )));
        }
        if bbox.is_subvoxel() {
            return Ok(());
        }

        self.chunks_for(&bbox).par_iter().try_for_each(|chunk| {
            let Some(overlap) = chunk.intersection(&bbox) else {
                return Ok(());
            };

            let mut chunk_data = if overlap == *chunk {
                Array3::<T>::default(chunk.shape())
            } else {
                self.read_chunk::<T>(chunk)?
            };

            chunk_data
                .slice_mut(region(&overlap.relative_to(chunk.min)))
                .assign(&data.slice(region(&overlap.relative_to(bbox.min))));

            self.write_chunk(chunk, &chunk_data)
        })
    }

    /// Reads `bbox` as an array indexed `[x, y, z]`.
    pub fn read_block<T: Voxel>(&self, bbox: Bbox) -> Result<Array3<T>> {
        self.check_type::<T>()?;
        self.check_region(&bbox)?;

        let mut block = Array3::<T>::default(bbox.shape());
        if bbox.is_subvoxel() {
            return Ok(block);
        }

        for chunk in self.chunks_for(&bbox) {
            let Some(overlap) = chunk.intersection(&bbox) else {
                continue;
            };
            let chunk_data = self.read_chunk::<T>(&chunk)?;
            block
                .slice_mut(region(&overlap.relative_to(bbox.min)))
                .assign(&chunk_data.slice(region(&overlap.relative_to(chunk.min))));
        }

        Ok(block)
    }

    /// Chunk boxes, clipped to the volume, that intersect `bbox`.
    fn chunks_for(&self, bbox: &Bbox) -> Vec<Bbox> {
        let scale = self.scale();
        let bounds = scale.bounds();
        let chunk_size = scale.chunk_size();

        let mut aligned_min = [0usize; 3];
        let mut aligned_max = [0usize; 3];
        for axis in 0..3 {
            let origin = bounds.min[axis];
            let first = (bbox.min[axis] - origin) / chunk_size[axis];
            let last = (bbox.max[axis] - origin).div_ceil(chunk_size[axis]);
            aligned_min[axis] = origin + first * chunk_size[axis];
            aligned_max[axis] = (origin + last * chunk_size[axis]).min(bounds.max[axis]);
        }

        Bbox::new(aligned_min, aligned_max)
            .blocks(chunk_size)
            .collect()
    }

    fn chunk_path(&self, chunk: &Bbox) -> PathBuf {
        self.path.join(&self.scale().key).join(chunk.to_filename())
    }

    fn read_chunk<T: Voxel>(&self, chunk: &Bbox) -> Result<Array3<T>> {
        let path = self.chunk_path(chunk);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(Array3::default(chunk.shape()));
            }
            Err(err) => return Err(err.into()),
        };

        let width = T::DATA_TYPE.size();
        if bytes.len() != chunk.volume() * width {
            return Err(Error::Store(format!(
                "Chunk {} holds {} bytes, expected {}",
                path.display(),
                bytes.len(),
                chunk.volume() * width
            )));
        }

        let values: Vec<T> = bytes.chunks_exact(width).map(T::read_le).collect();
        let [sx, sy, sz] = chunk.shape();

        // Stored x fastest, so the buffer is a C ordered (z, y, x) array.
        let zyx = Array3::from_shape_vec((sz, sy, sx), values)
            .map_err(|e| Error::Store(format!("Chunk {}: {}", path.display(), e)))?;
        Ok(zyx.reversed_axes())
    }

    fn write_chunk<T: Voxel>(&self, chunk: &Bbox, data: &Array3<T>) -> Result<()> {
        let path = self.chunk_path(chunk);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut bytes = Vec::with_capacity(data.len() * T::DATA_TYPE.size());
        for value in data.t().iter() {
            value.write_le(&mut bytes);
        }

        fs::write(&path, bytes)?;
        Ok(())
    }

    fn check_type<T: Voxel>(&self) -> Result<()> {
        if T::DATA_TYPE != self.info.data_type {
            return Err(Error::DataTypeMismatch {
                expected: self.info.data_type.as_str(),
                actual: T::DATA_TYPE.as_str(),
            });
        }
        Ok(())
    }

    fn check_region(&self, bbox: &Bbox) -> Result<()> {
        let bounds = self.bounds();
        if !bounds.contains_box(bbox) {
            return Err(Error::Store(format!(
                "{} lies outside the volume {}",
                bbox, bounds
            )));
        }
        Ok(())
    }
}

/// Removes `<root>/<name>` recursively. Anything but a single plain
/// directory name is left alone.
pub(crate) fn remove_store_dir(root: &Path, name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return Ok(());
    }

    let dir = root.join(name);
    match fs::remove_dir_all(&dir) {
        Ok(()) => {
            debug!(dir = %dir.display(), "Removed stale store directory");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::StoreCreation { path: dir, source }),
    }
}

/// Slice selecting `bbox` from an array indexed `[x, y, z]`.
fn region(bbox: &Bbox) -> SliceInfo<[SliceInfoElem; 3], Ix3, Ix3> {
    s![
        bbox.min[0]..bbox.max[0],
        bbox.min[1]..bbox.max[1],
        bbox.min[2]..bbox.max[2]
    ]
}
