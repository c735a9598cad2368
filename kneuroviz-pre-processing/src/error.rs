/// Error types shared by the pre-processing and mesh export pipelines.
use std::path::PathBuf;
use std::process::ExitStatus;

/// Exit code for rejected command-line values (image type, resolution, ids).
pub const EXIT_INVALID_INPUT: i32 = 1;
/// Exit code for dataset, store and mesh task failures.
pub const EXIT_DATA: i32 = 3;
/// Exit code for external converter failures.
pub const EXIT_CONVERSION: i32 = 4;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("File does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Malformed dataset: {0}")]
    MalformedDataset(String),

    #[error("Invalid resolution '{0}': expected three positive numbers as \"x,y,z\"")]
    InvalidResolution(String),

    #[error("Invalid image type '{0}': select channel or segmentation")]
    InvalidImageType(String),

    #[error("Invalid segmentation id '{0}': expected a non-negative integer")]
    InvalidSegmentId(String),

    #[error("Invalid shape '{0}': expected three positive integers as \"x,y,z\"")]
    InvalidShape(String),

    #[error("Failed to create volume store at {}: {source}", path.display())]
    StoreCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Volume store error: {0}")]
    Store(String),

    #[error("Data type mismatch: volume stores {expected}, got {actual}")]
    DataTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("No mesh manifest found for segment {0}")]
    MeshNotFound(u64),

    #[error("Mesh converter not found: {}", .0.display())]
    ToolNotFound(PathBuf),

    #[error("Failed to launch mesh converter {}: {source}", tool.display())]
    ConversionSpawn {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Mesh converter {} exited with {status}", tool.display())]
    ConversionFailed { tool: PathBuf, status: ExitStatus },

    #[error("Task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code reported by the command-line tools for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidResolution(_)
            | Error::InvalidImageType(_)
            | Error::InvalidSegmentId(_)
            | Error::InvalidShape(_) => EXIT_INVALID_INPUT,
            Error::ToolNotFound(_)
            | Error::ConversionSpawn { .. }
            | Error::ConversionFailed { .. } => EXIT_CONVERSION,
            _ => EXIT_DATA,
        }
    }
}

/// Exit code for an error that reached a binary's `main`.
/// Errors raised outside this crate count as data failures.
pub fn exit_code_of(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map_or(EXIT_DATA, Error::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_exit_with_one() {
        assert_eq!(Error::InvalidImageType("rgb".into()).exit_code(), 1);
        assert_eq!(Error::InvalidResolution("4,4".into()).exit_code(), 1);
        assert_eq!(Error::InvalidSegmentId("abc".into()).exit_code(), 1);
    }

    #[test]
    fn runtime_errors_are_distinct_from_input_errors() {
        assert_eq!(Error::MeshNotFound(7).exit_code(), EXIT_DATA);
        assert_eq!(
            Error::ToolNotFound(PathBuf::from("/missing/ctmconv")).exit_code(),
            EXIT_CONVERSION
        );
    }

    #[test]
    fn wrapped_errors_keep_their_exit_code() {
        let err = anyhow::Error::new(Error::InvalidImageType("rgb".into()))
            .context("Could not configure the run");
        assert_eq!(exit_code_of(&err), EXIT_INVALID_INPUT);
        assert_eq!(exit_code_of(&anyhow::anyhow!("other")), EXIT_DATA);
    }
}
