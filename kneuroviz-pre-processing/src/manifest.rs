/// Mesh directory layout: fragment naming, per-segment manifests and mesh info.
use crate::bounds::Bbox;
use crate::constants::{INFO_FILE, MESH_DIR};
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::volume::PrecomputedVolume;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Level of detail written by meshing tasks.
pub const MESH_LOD: u32 = 0;

/// Descriptor stored as `mesh/info`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MeshDirInfo {
    #[serde(rename = "@type")]
    pub kind: String,
}

impl Default for MeshDirInfo {
    fn default() -> Self {
        Self {
            kind: "neuroglancer_legacy_mesh".to_string(),
        }
    }
}

/// Per-segment manifest listing the fragment files that make up its mesh.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MeshManifest {
    pub fragments: Vec<String>,
}

/// Fragment file name `<label>:<lod>:<bbox>`.
pub fn fragment_name(label: u64, bbox: &Bbox) -> String {
    format!("{}:{}:{}", label, MESH_LOD, bbox.to_filename())
}

/// Manifest file name `<label>:<lod>`.
pub fn manifest_name(label: u64) -> String {
    format!("{}:{}", label, MESH_LOD)
}

/// Label of a fragment file name, `None` for manifests and other files.
pub fn parse_fragment_label(name: &str) -> Option<u64> {
    let mut parts = name.splitn(3, ':');
    let label = parts.next()?.parse().ok()?;
    let lod: u32 = parts.next()?.parse().ok()?;
    let bbox = parts.next()?;
    (lod == MESH_LOD && !bbox.is_empty()).then_some(label)
}

/// Mesh directory of a store, as recorded in its info.
pub fn mesh_dir(volume: &PrecomputedVolume) -> PathBuf {
    volume
        .path()
        .join(volume.info().mesh.as_deref().unwrap_or(MESH_DIR))
}

/// Recreates the mesh directory holding only its info file.
/// Fragments and manifests of earlier runs are discarded.
pub fn init_mesh_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(&MeshDirInfo::default())?;
    fs::write(dir.join(INFO_FILE), json)?;
    Ok(())
}

/// Groups fragment files starting with `prefix` by label.
pub fn collect_fragments(dir: &Path, prefix: &str) -> Result<BTreeMap<u64, Vec<String>>> {
    let mut by_label: BTreeMap<u64, Vec<String>> = BTreeMap::new();

    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().to_string();
        if !name.starts_with(prefix) {
            continue;
        }
        if let Some(label) = parse_fragment_label(&name) {
            by_label.entry(label).or_default().push(name);
        }
    }

    for fragments in by_label.values_mut() {
        fragments.sort();
    }
    Ok(by_label)
}

/// Writes `<dir>/<label>:0`.
pub fn write_manifest(dir: &Path, label: u64, manifest: &MeshManifest) -> Result<()> {
    let json = serde_json::to_string(manifest)?;
    fs::write(dir.join(manifest_name(label)), json)?;
    Ok(())
}

/// Reads the manifest of `label`, `MeshNotFound` when it was never generated.
pub fn read_manifest(dir: &Path, label: u64) -> Result<MeshManifest> {
    match fs::read_to_string(dir.join(manifest_name(label))) {
        Ok(text) => Ok(serde_json::from_str(&text)?),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(Error::MeshNotFound(label)),
        Err(err) => Err(err.into()),
    }
}

/// Loads every fragment listed for `label` and merges them into one mesh.
pub fn load_segment_mesh(dir: &Path, label: u64) -> Result<Mesh> {
    let manifest = read_manifest(dir, label)?;
    let mut fragments = Vec::with_capacity(manifest.fragments.len());
    for name in &manifest.fragments {
        let bytes = fs::read(dir.join(name))?;
        fragments.push(Mesh::from_precomputed(&bytes)?);
    }
    Ok(Mesh::merge(fragments))
}
