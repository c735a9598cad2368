/// HDF5 to chunked volume conversion with conditional mesh generation.
use crate::config::PreprocessConfig;
use crate::constants::{MESH_MIP, PROGRESS_CHARS, PROGRESS_TEMPLATE};
use crate::error::{Error, Result};
use crate::info::{LayerType, VolumeInfo};
use crate::source::{Hdf5Source, VolumeSource};
use crate::task_creation::{create_mesh_manifest_tasks, create_meshing_tasks};
use crate::task_queue::LocalTaskQueue;
use crate::volume::PrecomputedVolume;
use crate::voxel::{DataType, Voxel};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

/// Outcome of one pre-processing run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    /// Store extent in `(x, y, z)` order.
    pub extent: [usize; 3],
    pub data_type: DataType,
    pub layer_type: LayerType,
    pub block_shape: [usize; 3],
    pub blocks_written: usize,
    pub blocks_skipped: usize,
    pub mesh_tasks: usize,
    pub manifest_tasks: usize,
    /// Worker count of the mesh queue, `None` when nothing was meshed.
    pub parallel: Option<usize>,
}

/// Converts one HDF5 dataset into a chunked volume store.
/// Segmentations are meshed and their manifests aggregated afterwards.
pub struct VolumeConverter {
    config: PreprocessConfig,
}

impl VolumeConverter {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Opens the configured HDF5 file and runs the whole pipeline on it.
    pub fn convert(&self) -> Result<ConversionReport> {
        let source = Hdf5Source::open(&self.config.source)?;
        self.run_with_source(&source)
    }

    /// Copies `source` into the destination store, then meshes segmentations.
    pub fn run_with_source<S: VolumeSource>(&self, source: &S) -> Result<ConversionReport> {
        let extent = source.extent();
        let block_shape = self.config.block_shape_for(source.shape());
        let image_type = self.config.image_type;
        let data_type = image_type.data_type();

        println!(
            "Converting {} ({}) to {}",
            source.describe(),
            image_type,
            self.config.destination.display()
        );
        info!(
            extent = ?extent,
            block_shape = ?block_shape,
            data_type = %data_type,
            "Volume layout"
        );

        let info = VolumeInfo::new(
            image_type.layer_type(),
            data_type,
            self.config.resolution.0,
            extent,
            self.config.chunk_size,
        );
        let volume = PrecomputedVolume::create(&self.config.destination, info)?;

        let (blocks_written, blocks_skipped) = match data_type {
            DataType::Uint8 => self.copy_blocks::<u8, S>(source, &volume, block_shape)?,
            DataType::Uint16 => self.copy_blocks::<u16, S>(source, &volume, block_shape)?,
        };
        println!("KNeuroViz pre-processing DONE!");

        let mut report = ConversionReport {
            extent,
            data_type,
            layer_type: image_type.layer_type(),
            block_shape,
            blocks_written,
            blocks_skipped,
            mesh_tasks: 0,
            manifest_tasks: 0,
            parallel: None,
        };

        if image_type.is_meshed() {
            self.generate_meshes(block_shape, &mut report)?;
        } else {
            println!("Image type {} is not meshed", image_type);
        }

        Ok(report)
    }

    /// Copies every non sub-voxel block in x-fastest order.
    /// Returns the written and skipped block counts; `BlockIter` never yields
    /// sub-voxel blocks, so the skipped count stays zero for block grids.
    fn copy_blocks<T: Voxel, S: VolumeSource>(
        &self,
        source: &S,
        volume: &PrecomputedVolume,
        block_shape: [usize; 3],
    ) -> Result<(usize, usize)> {
        let blocks = volume.bounds().blocks(block_shape);

        let pb = ProgressBar::new(blocks.total() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(PROGRESS_TEMPLATE)
                .map_err(|e| Error::Task(e.to_string()))?
                .progress_chars(PROGRESS_CHARS),
        );
        pb.set_message("Copying blocks");

        let mut written = 0;
        let mut skipped = 0;
        for block in blocks {
            pb.inc(1);
            if block.is_subvoxel() {
                skipped += 1;
                continue;
            }

            let data = source.read_block::<T>(block)?;
            volume.write_block(block, data.view())?;
            debug!(block = %block, "Copied block");
            written += 1;
        }

        pb.finish_with_message("Blocks copied");
        info!(written, skipped, "Copy loop finished");
        Ok((written, skipped))
    }

    /// Runs meshing then manifest aggregation on a local task queue.
    fn generate_meshes(&self, block_shape: [usize; 3], report: &mut ConversionReport) -> Result<()> {
        let layer_path = &self.config.destination;
        let mut queue = LocalTaskQueue::new(self.config.parallel)?;

        let tasks = create_meshing_tasks(layer_path, MESH_MIP, block_shape)?;
        report.mesh_tasks = queue.insert_all(tasks, "mesh tasks")?;

        let tasks = create_mesh_manifest_tasks(layer_path, self.config.magnitude);
        report.manifest_tasks = queue.insert_all(tasks, "mesh manifest tasks")?;

        report.parallel = Some(queue.parallel());
        println!("Mesh manifest processing DONE!");
        Ok(())
    }
}
