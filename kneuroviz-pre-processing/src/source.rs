/// Source volumes read by the converter.
use crate::bounds::Bbox;
use crate::error::{Error, Result};
use crate::voxel::Voxel;
use hdf5::types::TypeDescriptor;
use ndarray::{Array3, Ix3, s};
use std::path::Path;
use tracing::{info, warn};

/// Read access to a 3-D volume stored slowest axis first, `(z, y, x)`.
pub trait VolumeSource {
    /// Source shape in `(z, y, x)` order.
    fn shape(&self) -> [usize; 3];

    /// Reads the `(x, y, z)` box `bbox`, transposed to `[x, y, z]` indexing
    /// and cast to `T`.
    fn read_block<T: Voxel>(&self, bbox: Bbox) -> Result<Array3<T>>;

    /// Human readable origin used in log messages.
    fn describe(&self) -> String;

    /// Volume extent in `(x, y, z)` order.
    fn extent(&self) -> [usize; 3] {
        let [z, y, x] = self.shape();
        [x, y, z]
    }
}

/// Element family of a stored dataset. Blocks are read through the widest
/// type of the family, then narrowed to the voxel type with wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoredKind {
    Unsigned,
    Signed,
    Float,
}

impl StoredKind {
    fn of(dataset: &hdf5::Dataset) -> Result<Self> {
        match dataset.dtype()?.to_descriptor()? {
            TypeDescriptor::Unsigned(_) => Ok(StoredKind::Unsigned),
            TypeDescriptor::Integer(_) => Ok(StoredKind::Signed),
            TypeDescriptor::Float(_) => Ok(StoredKind::Float),
            other => Err(Error::MalformedDataset(format!(
                "{} has non numeric element type {:?}",
                dataset.name(),
                other
            ))),
        }
    }
}

/// First top-level dataset of an HDF5 file.
pub struct Hdf5Source {
    _file: hdf5::File,
    dataset: hdf5::Dataset,
    shape: [usize; 3],
    kind: StoredKind,
}

impl Hdf5Source {
    /// Opens `path` and selects its first dataset.
    /// More than one dataset only logs a warning.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::MissingFile(path.to_path_buf()));
        }

        let file = hdf5::File::open(path)?;
        let datasets = file.datasets()?;
        let names: Vec<String> = datasets.iter().map(|d| d.name()).collect();
        info!(file = %path.display(), datasets = ?names, "Opened HDF5 source");

        if datasets.len() > 1 {
            warn!(
                "There are two or more datasets in {}, using {}",
                path.display(),
                names[0]
            );
        }

        let dataset = datasets.into_iter().next().ok_or_else(|| {
            Error::MalformedDataset(format!("{} contains no datasets", path.display()))
        })?;

        let dims = dataset.shape();
        let shape: [usize; 3] = dims.as_slice().try_into().map_err(|_| {
            Error::MalformedDataset(format!(
                "{} has shape {:?}, expected three axes",
                dataset.name(),
                dims
            ))
        })?;
        if shape.contains(&0) {
            return Err(Error::MalformedDataset(format!(
                "{} has an empty axis in shape {:?}",
                dataset.name(),
                shape
            )));
        }

        let kind = StoredKind::of(&dataset)?;

        Ok(Self {
            _file: file,
            dataset,
            shape,
            kind,
        })
    }

    /// Name of the selected dataset.
    pub fn dataset_name(&self) -> String {
        self.dataset.name()
    }
}

impl VolumeSource for Hdf5Source {
    fn shape(&self) -> [usize; 3] {
        self.shape
    }

    fn read_block<T: Voxel>(&self, bbox: Bbox) -> Result<Array3<T>> {
        let selection = s![
            bbox.min[2]..bbox.max[2],
            bbox.min[1]..bbox.max[1],
            bbox.min[0]..bbox.max[0]
        ];
        // HDF5 conversion to a narrower type saturates; wrap like the in-memory path.
        let zyx: Array3<u64> = match self.kind {
            StoredKind::Unsigned => self.dataset.read_slice::<u64, _, Ix3>(selection)?,
            StoredKind::Signed => self
                .dataset
                .read_slice::<i64, _, Ix3>(selection)?
                .mapv(|v| v as u64),
            StoredKind::Float => self
                .dataset
                .read_slice::<f64, _, Ix3>(selection)?
                .mapv(|v| v as i64 as u64),
        };
        Ok(zyx.reversed_axes().mapv(T::from_wrapping))
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.dataset.filename(), self.dataset.name())
    }
}

/// In-memory source holding integer voxels in `(z, y, x)` order.
pub struct ArraySource {
    data: Array3<u64>,
}

impl ArraySource {
    pub fn new(data: Array3<u64>) -> Result<Self> {
        if data.shape().contains(&0) {
            return Err(Error::MalformedDataset(format!(
                "In-memory volume has an empty axis in shape {:?}",
                data.shape()
            )));
        }
        Ok(Self { data })
    }
}

impl VolumeSource for ArraySource {
    fn shape(&self) -> [usize; 3] {
        let dims = self.data.dim();
        [dims.0, dims.1, dims.2]
    }

    fn read_block<T: Voxel>(&self, bbox: Bbox) -> Result<Array3<T>> {
        let zyx = self.data.slice(s![
            bbox.min[2]..bbox.max[2],
            bbox.min[1]..bbox.max[1],
            bbox.min[0]..bbox.max[0]
        ]);
        Ok(zyx.reversed_axes().mapv(T::from_wrapping))
    }

    fn describe(&self) -> String {
        format!("in-memory volume {:?}", self.data.shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_source_reverses_axes() {
        // shape (z, y, x) = (2, 3, 4)
        let data = Array3::from_shape_fn((2, 3, 4), |(z, y, x)| (100 * z + 10 * y + x) as u64);
        let source = ArraySource::new(data).unwrap();
        assert_eq!(source.shape(), [2, 3, 4]);
        assert_eq!(source.extent(), [4, 3, 2]);

        let block = source
            .read_block::<u16>(Bbox::new([1, 0, 1], [4, 2, 2]))
            .unwrap();
        assert_eq!(block.shape(), &[3, 2, 1]);
        assert_eq!(block[[0, 0, 0]], 101);
        assert_eq!(block[[2, 1, 0]], 113);
    }

    #[test]
    fn array_source_casts_with_wrapping() {
        let data = Array3::from_elem((1, 1, 1), 258u64);
        let source = ArraySource::new(data).unwrap();
        let block = source.read_block::<u8>(Bbox::from_shape([1, 1, 1])).unwrap();
        assert_eq!(block[[0, 0, 0]], 2);
    }

    #[test]
    fn missing_hdf5_file_is_reported() {
        let err = Hdf5Source::open(Path::new("/definitely/not/here.h5")).err().unwrap();
        assert!(matches!(err, Error::MissingFile(_)));
    }
}
