/// Command-line arguments of the pre-processing and mesh export tools.
use crate::constants::{
    CONVERTER_ENV, DEFAULT_CHUNK_SIZE, MESH_MANIFEST_MAGNITUDE, MESH_QUEUE_PARALLELISM,
};
use clap::Parser;
use std::path::PathBuf;

/// Convert an HDF5 volume into a chunked volume store and mesh segmentations.
#[derive(Parser, Debug, Clone)]
#[command(name = "kneuroviz-pre-processing")]
#[command(
    about = "ex) kneuroviz-pre-processing -S ../source_dir/xx.h5 -R 4,4,40 -I channel -D ../destination_dir"
)]
pub struct PreprocessArgs {
    /// Source HDF5 file, e.g. "../xxx.h5".
    #[arg(short = 'S', long = "source")]
    pub source: PathBuf,

    /// Physical resolution as "x,y,z".
    #[arg(short = 'R', long = "resolution")]
    pub resolution: String,

    /// Image type: channel or segmentation.
    #[arg(short = 'I', long = "image-type")]
    pub image_type: String,

    /// Destination directory of the chunked volume store.
    #[arg(short = 'D', long = "destination")]
    pub destination: PathBuf,

    /// Copy block shape "x,y,z" (default: derived from the source shape).
    #[arg(long)]
    pub block_shape: Option<String>,

    /// Chunk shape "x,y,z" of the volume store.
    #[arg(long, default_value = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: String,

    /// Parallel workers of the mesh task queue.
    #[arg(long, default_value_t = MESH_QUEUE_PARALLELISM)]
    pub parallel: usize,

    /// Segment id prefix digits per mesh manifest task.
    #[arg(long, default_value_t = MESH_MANIFEST_MAGNITUDE, value_parser = clap::value_parser!(u32).range(1..=9))]
    pub magnitude: u32,
}

/// Export a segment mesh from a chunked volume store and convert it to OpenCTM.
#[derive(Parser, Debug, Clone)]
#[command(name = "mesh-export")]
#[command(about = "ex) mesh-export -F ../folder_dir -N 144 -D ../destination_dir/")]
pub struct MeshExportArgs {
    /// Chunked volume store folder holding the info file.
    #[arg(short = 'F', long = "folder")]
    pub folder: PathBuf,

    /// Segmentation id number.
    #[arg(short = 'N', long = "segment")]
    pub segment: String,

    /// Destination directory for the .obj and .ctm files.
    #[arg(short = 'D', long = "destination")]
    pub destination: PathBuf,

    /// Mesh converter executable (default: ctmconv on PATH).
    #[arg(long, env = CONVERTER_ENV)]
    pub converter: Option<PathBuf>,
}
