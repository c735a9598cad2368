/// Triangle meshes: precomputed fragment codec, merging and OBJ output.
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::Write;

/// Indexed triangle mesh in physical coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Encodes the legacy precomputed fragment layout:
    /// `u32` vertex count, `f32` xyz triples, `u32` triangle indices, little endian.
    pub fn to_precomputed(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.vertices.len() * 12 + self.faces.len() * 12);
        bytes.extend_from_slice(&(self.vertices.len() as u32).to_le_bytes());
        for vertex in &self.vertices {
            for component in vertex {
                bytes.extend_from_slice(&component.to_le_bytes());
            }
        }
        for face in &self.faces {
            for index in face {
                bytes.extend_from_slice(&index.to_le_bytes());
            }
        }
        bytes
    }

    /// Decodes a legacy precomputed fragment.
    pub fn from_precomputed(bytes: &[u8]) -> Result<Self> {
        let malformed = |msg: &str| Error::Store(format!("Malformed mesh fragment: {}", msg));

        let header: [u8; 4] = bytes
            .get(..4)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| malformed("missing vertex count"))?;
        let vertex_count = u32::from_le_bytes(header) as usize;

        let vertex_end = 4 + vertex_count * 12;
        let vertex_bytes = bytes
            .get(4..vertex_end)
            .ok_or_else(|| malformed("truncated vertex block"))?;
        let index_bytes = &bytes[vertex_end..];
        if index_bytes.len() % 12 != 0 {
            return Err(malformed("index block is not a whole number of triangles"));
        }

        let floats: Vec<f32> = vertex_bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let vertices = floats.chunks_exact(3).map(|v| [v[0], v[1], v[2]]).collect();

        let indices: Vec<u32> = index_bytes
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if indices.iter().any(|&i| i as usize >= vertex_count) {
            return Err(malformed("triangle index out of range"));
        }
        let faces = indices.chunks_exact(3).map(|f| [f[0], f[1], f[2]]).collect();

        Ok(Self { vertices, faces })
    }

    /// Concatenates meshes and welds vertices shared between them.
    pub fn merge<I: IntoIterator<Item = Mesh>>(meshes: I) -> Mesh {
        let mut merged = Mesh::default();
        for mesh in meshes {
            let base = merged.vertices.len() as u32;
            merged.vertices.extend(mesh.vertices);
            merged
                .faces
                .extend(mesh.faces.into_iter().map(|f| f.map(|i| i + base)));
        }
        merged.deduplicate_vertices();
        merged
    }

    /// Welds bit-identical vertices and drops triangles that collapse as a result.
    pub fn deduplicate_vertices(&mut self) {
        let mut lookup: HashMap<[u32; 3], u32> = HashMap::with_capacity(self.vertices.len());
        let mut vertices = Vec::with_capacity(self.vertices.len());
        let remap: Vec<u32> = self
            .vertices
            .iter()
            .map(|v| {
                *lookup.entry(v.map(f32::to_bits)).or_insert_with(|| {
                    vertices.push(*v);
                    vertices.len() as u32 - 1
                })
            })
            .collect();

        self.vertices = vertices;
        self.faces = self
            .faces
            .iter()
            .map(|f| f.map(|i| remap[i as usize]))
            .filter(|[a, b, c]| a != b && b != c && a != c)
            .collect();
    }

    /// Writes Wavefront OBJ text with 1-based face indices.
    pub fn write_obj<W: Write>(&self, mut out: W) -> Result<()> {
        for [x, y, z] in &self.vertices {
            writeln!(out, "v {} {} {}", x, y, z)?;
        }
        for [a, b, c] in &self.faces {
            writeln!(out, "f {} {} {}", a + 1, b + 1, c + 1)?;
        }
        out.flush()?;
        Ok(())
    }
}
