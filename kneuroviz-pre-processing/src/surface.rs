/// Label surface extraction for meshing tasks.
use crate::bounds::Bbox;
use crate::mesh::Mesh;
use fast_surface_nets::ndshape::{RuntimeShape, Shape};
use fast_surface_nets::{SurfaceNetsBuffer, surface_nets};
use ndarray::{ArrayView3, s};
use std::collections::{BTreeMap, HashMap};

/// Samples a task grid needs past its high face.
pub const GRID_HIGH_PADDING: usize = 2;

/// Region of the volume a task must read to mesh `task`.
/// One sample below and `GRID_HIGH_PADDING` above, clipped to `volume`.
pub fn task_data_region(task: &Bbox, volume: &Bbox) -> Bbox {
    let mut min = [0usize; 3];
    let mut max = [0usize; 3];
    for axis in 0..3 {
        min[axis] = task.min[axis].saturating_sub(1).max(volume.min[axis]);
        max[axis] = (task.max[axis] + GRID_HIGH_PADDING).min(volume.max[axis]);
    }
    Bbox::new(min, max)
}

/// Grid samples `[min, max)` holding one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LabelExtent {
    min: [u32; 3],
    max: [u32; 3],
}

/// Surface nets grid covering one meshing task.
///
/// The grid spans `[task.min - 1, task.max + GRID_HIGH_PADDING)`; samples
/// outside the volume count as background. A quad is kept only when the grid
/// edge that produced it starts inside the task, so adjacent tasks emit
/// disjoint faces whose shared vertices coincide exactly.
///
/// Each label is meshed on a crop of the grid around its own samples, so a
/// task costs roughly one pass over its data plus the extents of its labels.
pub struct TaskSurface<'a> {
    labels: ArrayView3<'a, u64>,
    task: Bbox,
    volume: Bbox,
    dims: [u32; 3],
    /// Grid coordinate of `labels[[0, 0, 0]]`.
    data_origin: [u32; 3],
    extents: BTreeMap<u64, LabelExtent>,
}

impl<'a> TaskSurface<'a> {
    /// `labels` is indexed `[x, y, z]` and covers `data`, normally
    /// `task_data_region(task, volume)`.
    pub fn new(labels: ArrayView3<'a, u64>, data: Bbox, task: Bbox, volume: Bbox) -> Self {
        let task_shape = task.shape();
        let mut dims = [0u32; 3];
        let mut data_origin = [0u32; 3];
        for axis in 0..3 {
            dims[axis] = (task_shape[axis] + 1 + GRID_HIGH_PADDING) as u32;
            // data.min >= task.min - 1, so grid coordinates stay non-negative.
            data_origin[axis] = (data.min[axis] + 1 - task.min[axis]) as u32;
        }

        let mut extents: BTreeMap<u64, LabelExtent> = BTreeMap::new();
        for ((x, y, z), &value) in labels.indexed_iter() {
            if value == 0 {
                continue;
            }
            let grid = [
                data_origin[0] + x as u32,
                data_origin[1] + y as u32,
                data_origin[2] + z as u32,
            ];
            let extent = extents.entry(value).or_insert(LabelExtent {
                min: grid,
                max: grid.map(|g| g + 1),
            });
            for axis in 0..3 {
                extent.min[axis] = extent.min[axis].min(grid[axis]);
                extent.max[axis] = extent.max[axis].max(grid[axis] + 1);
            }
        }

        Self {
            labels,
            task,
            volume,
            dims,
            data_origin,
            extents,
        }
    }

    /// Distinct non-zero labels present in the task data, ascending.
    pub fn labels(&self) -> impl Iterator<Item = u64> + '_ {
        self.extents.keys().copied()
    }

    /// Mesh of `label` scaled by `resolution`; empty when the label has no
    /// surface owned by this task.
    pub fn extract(&self, label: u64, resolution: [f64; 3]) -> Mesh {
        let Some(extent) = self.extents.get(&label) else {
            return Mesh::default();
        };

        // One background sample around the label is enough for every
        // sign change; the rest of the grid is uniformly outside.
        let mut origin = [0u32; 3];
        let mut crop = [0u32; 3];
        for axis in 0..3 {
            origin[axis] = extent.min[axis].saturating_sub(1);
            crop[axis] = (extent.max[axis] + 1).min(self.dims[axis]) - origin[axis];
        }
        let shape = RuntimeShape::<u32, 3>::new(crop);
        let sdf = self.signed_field(label, origin, &shape);

        let mut buffer = SurfaceNetsBuffer::default();
        surface_nets(
            &sdf,
            &shape,
            [0; 3],
            [crop[0] - 1, crop[1] - 1, crop[2] - 1],
            &mut buffer,
        );

        // Owned grid edges start in [task.min, task.max), extended by the
        // outside sample on faces touching the volume's low boundary.
        let mut lower = [1u32; 3];
        let mut upper = [0u32; 3];
        for axis in 0..3 {
            if self.task.min[axis] == self.volume.min[axis] {
                lower[axis] = 0;
            }
            upper[axis] = (self.task.shape()[axis] + 1) as u32;
        }

        let mut mesh = Mesh::default();
        let mut remap: HashMap<u32, u32> = HashMap::new();

        for quad in buffer.indices.chunks_exact(6) {
            let mut edge = origin;
            for &index in quad {
                let cell = buffer.surface_points[index as usize];
                for axis in 0..3 {
                    edge[axis] = edge[axis].max(origin[axis] + cell[axis]);
                }
            }
            if !(0..3).all(|a| edge[a] >= lower[a] && edge[a] < upper[a]) {
                continue;
            }

            for triangle in quad.chunks_exact(3) {
                let face = [triangle[0], triangle[1], triangle[2]].map(|index| {
                    *remap.entry(index).or_insert_with(|| {
                        let cell = buffer.surface_points[index as usize];
                        let position = self.cell_vertex(&sdf, &shape, origin, cell);
                        mesh.vertices.push([
                            (position[0] * resolution[0]) as f32,
                            (position[1] * resolution[1]) as f32,
                            (position[2] * resolution[2]) as f32,
                        ]);
                        mesh.vertices.len() as u32 - 1
                    })
                });
                mesh.faces.push(face);
            }
        }

        mesh
    }

    /// Volume space vertex of a surface cell: the mean of its sign changing
    /// edge midpoints.
    ///
    /// Computed from integer volume coordinates so that neighbouring tasks
    /// produce bit-identical vertices for the cells they share.
    fn cell_vertex(
        &self,
        sdf: &[f32],
        shape: &RuntimeShape<u32, 3>,
        origin: [u32; 3],
        cell: [u32; 3],
    ) -> [f64; 3] {
        let corner = |bits: u32| [bits & 1, (bits >> 1) & 1, (bits >> 2) & 1];
        let inside = |offset: [u32; 3]| {
            let sample = [cell[0] + offset[0], cell[1] + offset[1], cell[2] + offset[2]];
            sdf[shape.linearize(sample) as usize] < 0.0
        };

        let mut sum = [0.0f64; 3];
        let mut crossings = 0u32;
        for bits in 0..8u32 {
            for axis in 0..3 {
                if bits & (1 << axis) != 0 {
                    continue;
                }
                let a = corner(bits);
                let b = corner(bits | (1 << axis));
                if inside(a) != inside(b) {
                    for i in 0..3 {
                        sum[i] += f64::from(a[i] + b[i]) * 0.5;
                    }
                    crossings += 1;
                }
            }
        }

        let mut position = [0.0f64; 3];
        for axis in 0..3 {
            let offset = if crossings > 0 {
                sum[axis] / f64::from(crossings)
            } else {
                0.5
            };
            // Grid sample zero sits one voxel below the task.
            let grid = (origin[axis] + cell[axis]) as usize;
            position[axis] = (self.task.min[axis] + grid) as f64 - 1.0 + offset;
        }
        position
    }

    /// Binary field over the crop at `origin`: -1 inside `label`, +1
    /// elsewhere and outside the volume.
    fn signed_field(&self, label: u64, origin: [u32; 3], shape: &RuntimeShape<u32, 3>) -> Vec<f32> {
        let mut sdf = vec![1.0f32; shape.size() as usize];
        let crop = shape.as_array();

        // Crop window in `labels` indices; samples past the data stay background.
        let mut lo = [0usize; 3];
        let mut hi = [0usize; 3];
        for axis in 0..3 {
            let start = origin[axis].saturating_sub(self.data_origin[axis]) as usize;
            let end = (origin[axis] + crop[axis]).saturating_sub(self.data_origin[axis]) as usize;
            lo[axis] = start.min(self.labels.shape()[axis]);
            hi[axis] = end.min(self.labels.shape()[axis]).max(lo[axis]);
        }

        let window = self.labels.slice(s![lo[0]..hi[0], lo[1]..hi[1], lo[2]..hi[2]]);
        for ((x, y, z), &value) in window.indexed_iter() {
            if value != label {
                continue;
            }
            let local = [
                (lo[0] + x) as u32 + self.data_origin[0] - origin[0],
                (lo[1] + y) as u32 + self.data_origin[1] - origin[1],
                (lo[2] + z) as u32 + self.data_origin[2] - origin[2],
            ];
            sdf[shape.linearize(local) as usize] = -1.0;
        }

        sdf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// Cube of `label` filling [lo, hi) in a volume of `size`.
    fn cube_volume(size: [usize; 3], lo: usize, hi: usize, label: u64) -> Array3<u64> {
        Array3::from_shape_fn(size, |(x, y, z)| {
            let inside = [x, y, z].iter().all(|&c| c >= lo && c < hi);
            if inside { label } else { 0 }
        })
    }

    fn mesh_task(volume_data: &Array3<u64>, task: Bbox, label: u64) -> Mesh {
        let dims = volume_data.dim();
        let volume = Bbox::from_shape([dims.0, dims.1, dims.2]);
        let data = task_data_region(&task, &volume);
        let view = volume_data.slice(ndarray::s![
            data.min[0]..data.max[0],
            data.min[1]..data.max[1],
            data.min[2]..data.max[2]
        ]);
        TaskSurface::new(view, data, task, volume).extract(label, [1.0, 1.0, 1.0])
    }

    /// Every undirected edge of a closed surface is shared by exactly two triangles.
    fn is_watertight(mesh: &Mesh) -> bool {
        let mut edges: HashMap<(u32, u32), usize> = HashMap::new();
        for face in &mesh.faces {
            for i in 0..3 {
                let (a, b) = (face[i], face[(i + 1) % 3]);
                *edges.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        !edges.is_empty() && edges.values().all(|&count| count == 2)
    }

    #[test]
    fn data_region_adds_padding_inside_volume() {
        let volume = Bbox::from_shape([16, 16, 16]);
        let task = Bbox::new([4, 0, 8], [8, 4, 16]);
        assert_eq!(
            task_data_region(&task, &volume),
            Bbox::new([3, 0, 7], [10, 6, 16])
        );
    }

    #[test]
    fn single_task_cube_is_closed() {
        let data = cube_volume([8, 8, 8], 2, 6, 5);
        let mesh = mesh_task(&data, Bbox::from_shape([8, 8, 8]), 5);
        assert!(!mesh.is_empty());
        assert!(is_watertight(&mesh));
    }

    #[test]
    fn cube_touching_volume_faces_is_closed() {
        let data = cube_volume([4, 4, 4], 0, 4, 1);
        let mesh = mesh_task(&data, Bbox::from_shape([4, 4, 4]), 1);
        assert!(is_watertight(&mesh));
    }

    #[test]
    fn split_tasks_stitch_into_one_surface() {
        let data = cube_volume([8, 8, 8], 2, 6, 3);
        let whole = mesh_task(&data, Bbox::from_shape([8, 8, 8]), 3);

        let pieces: Vec<Mesh> = Bbox::from_shape([8, 8, 8])
            .blocks([4, 4, 4])
            .map(|task| mesh_task(&data, task, 3))
            .collect();
        let merged = Mesh::merge(pieces);

        assert!(is_watertight(&merged));
        assert_eq!(merged.faces.len(), whole.faces.len());
    }

    #[test]
    fn absent_label_gives_empty_mesh() {
        let data = cube_volume([4, 4, 4], 1, 3, 2);
        assert!(mesh_task(&data, Bbox::from_shape([4, 4, 4]), 9).is_empty());
    }

    #[test]
    fn labels_skip_background() {
        let mut data = cube_volume([4, 4, 4], 1, 3, 2);
        data[[0, 0, 0]] = 9;
        let volume = Bbox::from_shape([4, 4, 4]);
        let surface = TaskSurface::new(data.view(), volume, volume, volume);
        assert_eq!(surface.labels().collect::<Vec<_>>(), vec![2, 9]);
    }

    /// Small cubes of distinct labels on a lattice, `count` per axis.
    fn lattice_volume(count: usize) -> Array3<u64> {
        let size = count * 4;
        Array3::from_shape_fn((size, size, size), |(x, y, z)| {
            let inside = [x, y, z].iter().all(|&c| c % 4 >= 1 && c % 4 < 3);
            if inside {
                (1 + x / 4 + count * (y / 4) + count * count * (z / 4)) as u64
            } else {
                0
            }
        })
    }

    #[test]
    fn many_labels_mesh_on_their_own_extent() {
        let data = lattice_volume(4);
        let volume = Bbox::from_shape([16, 16, 16]);
        let surface = TaskSurface::new(data.view(), volume, volume, volume);
        assert_eq!(surface.labels().count(), 64);

        // Label 1 is the cube [1, 3) at the origin.
        let first = surface.extract(1, [1.0, 1.0, 1.0]);
        assert!(is_watertight(&first));
        for vertex in &first.vertices {
            assert!(vertex.iter().all(|&c| (0.0..=3.0).contains(&c)), "{vertex:?}");
        }

        let reference = mesh_task(&cube_volume([4, 4, 4], 1, 3, 7), Bbox::from_shape([4, 4, 4]), 7);
        for label in surface.labels() {
            let mesh = surface.extract(label, [1.0, 1.0, 1.0]);
            assert!(is_watertight(&mesh), "label {label}");
            assert_eq!(mesh.faces.len(), reference.faces.len(), "label {label}");
        }
    }

    #[test]
    fn split_tasks_stitch_every_label() {
        let data = lattice_volume(3);
        let volume = Bbox::from_shape([12, 12, 12]);
        let whole = TaskSurface::new(data.view(), volume, volume, volume);

        for label in whole.labels() {
            let reference = whole.extract(label, [1.0, 1.0, 1.0]);
            let pieces: Vec<Mesh> = volume
                .blocks([5, 5, 5])
                .map(|task| mesh_task(&data, task, label))
                .collect();
            let merged = Mesh::merge(pieces);
            assert!(is_watertight(&merged), "label {label}");
            assert_eq!(merged.faces.len(), reference.faces.len(), "label {label}");
        }
    }
}
