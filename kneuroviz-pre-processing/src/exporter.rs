/// Segment mesh export to Wavefront OBJ followed by OpenCTM conversion.
use crate::config::MeshExportConfig;
use crate::ctmconv::MeshConverter;
use crate::error::Result;
use crate::manifest::{load_segment_mesh, mesh_dir};
use crate::volume::PrecomputedVolume;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// Files produced by one export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub obj_path: PathBuf,
    pub ctm_path: PathBuf,
    pub vertices: usize,
    pub faces: usize,
}

pub struct MeshExporter {
    config: MeshExportConfig,
}

impl MeshExporter {
    pub fn new(config: MeshExportConfig) -> Self {
        Self { config }
    }

    /// Writes `<destination>/<id>.obj` from the stored fragments, then runs
    /// the converter to produce `<destination>/<id>.ctm`.
    ///
    /// The converter is resolved before anything is written.
    pub fn export(&self) -> Result<ExportReport> {
        let converter = MeshConverter::resolve(self.config.converter.as_deref())?;
        info!(converter = %converter.program().display(), "Resolved mesh converter");

        let volume = PrecomputedVolume::open(&self.config.folder)?;
        let mesh = load_segment_mesh(&mesh_dir(&volume), self.config.segment_id)?;
        info!(
            segment = self.config.segment_id,
            vertices = mesh.vertices.len(),
            faces = mesh.faces.len(),
            "Loaded segment mesh"
        );

        fs::create_dir_all(&self.config.destination)?;
        let obj_path = self.config.obj_path();
        let mut out = BufWriter::new(File::create(&obj_path)?);
        mesh.write_obj(&mut out)?;
        out.flush()?;
        println!("Saved {}", obj_path.display());

        let ctm_path = self.config.ctm_path();
        converter.convert(&obj_path, &ctm_path)?;
        println!("Converted {}", ctm_path.display());

        Ok(ExportReport {
            obj_path,
            ctm_path,
            vertices: mesh.vertices.len(),
            faces: mesh.faces.len(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn fake_converter(dir: &Path) -> PathBuf {
        let path = dir.join("ctmconv");
        fs::write(&path, "#!/bin/sh\ncp \"$1\" \"$2\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn export_config(dir: &TempDir, segment_id: u64, converter: PathBuf) -> MeshExportConfig {
        MeshExportConfig {
            folder: dir.path().join("store"),
            segment_id,
            destination: dir.path().join("out"),
            converter: Some(converter),
        }
    }

    #[test]
    fn missing_store_is_reported() {
        let dir = TempDir::new().unwrap();
        let converter = fake_converter(dir.path());
        let err = MeshExporter::new(export_config(&dir, 5, converter))
            .export()
            .unwrap_err();
        assert!(matches!(err, Error::MissingFile(_)));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn unresolvable_converter_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let err = MeshExporter::new(export_config(&dir, 5, dir.path().join("bin/ctmconv")))
            .export()
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(_)));
        assert!(!dir.path().join("out").exists());
    }
}
