/// External OpenCTM converter invocation.
use crate::constants::DEFAULT_CONVERTER;
use crate::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Resolved `ctmconv` style converter: `<program> <input> <output>`.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshConverter {
    program: PathBuf,
}

impl MeshConverter {
    /// Resolves the converter location.
    ///
    /// A configured value containing a path separator must name an existing
    /// file; a bare program name (including the default) is searched on `PATH`.
    pub fn resolve(configured: Option<&Path>) -> Result<Self> {
        let requested = configured.unwrap_or(Path::new(DEFAULT_CONVERTER));

        let program = if requested.components().count() > 1 {
            requested
                .is_file()
                .then(|| requested.to_path_buf())
                .ok_or_else(|| Error::ToolNotFound(requested.to_path_buf()))?
        } else {
            find_on_path(requested).ok_or_else(|| Error::ToolNotFound(requested.to_path_buf()))?
        };

        Ok(Self { program })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs the converter and waits for it; a non-zero exit is an error.
    pub fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        info!(
            "Converting {} -> {} with {}",
            input.display(),
            output.display(),
            self.program.display()
        );

        let status = Command::new(&self.program)
            .arg(input)
            .arg(output)
            .status()
            .map_err(|source| Error::ConversionSpawn {
                tool: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(Error::ConversionFailed {
                tool: self.program.clone(),
                status,
            });
        }
        Ok(())
    }
}

/// First `PATH` entry holding a file called `name`.
fn find_on_path(name: &Path) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
