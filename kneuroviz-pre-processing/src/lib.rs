/// KNeuroViz volume pre-processing and segment mesh export.
pub mod bounds;
pub mod cli;
pub mod config;
pub mod constants;
pub mod converter;
pub mod ctmconv;
pub mod error;
pub mod exporter;
pub mod info;
pub mod manifest;
pub mod mesh;
pub mod source;
pub mod surface;
pub mod task_creation;
pub mod task_queue;
pub mod volume;
pub mod voxel;

pub use error::{Error, Result};

/// Installs the stderr log subscriber, `info` unless `RUST_LOG` says otherwise.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
