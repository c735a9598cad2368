/// Shared configuration for volume pre-processing and mesh export

/// Worker count of the local mesh task queue
pub const MESH_QUEUE_PARALLELISM: usize = 8;

/// Digits of segment id prefix handled by one mesh manifest task
pub const MESH_MANIFEST_MAGNITUDE: u32 = 2;

/// Chunk edge lengths of the volume store as "x,y,z"
pub const DEFAULT_CHUNK_SIZE: &str = "64,64,64";

/// Divisor applied to the slowest input axis for the in-plane block edge
pub const BLOCK_EDGE_DIVISOR: usize = 2;

/// Extra divisor applied to the block depth
pub const BLOCK_DEPTH_DIVISOR: usize = 8;

/// Mip level that is meshed
pub const MESH_MIP: usize = 0;

/// Sub-directory of the store holding mesh fragments and manifests
pub const MESH_DIR: &str = "mesh";

/// Name of the volume descriptor file inside a store
pub const INFO_FILE: &str = "info";

/// Environment variable overriding the mesh converter location
pub const CONVERTER_ENV: &str = "KNEUROVIZ_CTMCONV";

/// Converter looked up on PATH when nothing else is configured
pub const DEFAULT_CONVERTER: &str = "ctmconv";

/// Progress bar template shared by the long running stages
pub const PROGRESS_TEMPLATE: &str = "[{bar:40.green/blue}] {pos}/{len} {msg} ({percent}%)";

/// Progress bar fill characters
pub const PROGRESS_CHARS: &str = "▉▊▋▌▍▎▏ ";
