/// Axis aligned voxel boxes and block iteration over a volume
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open voxel box `[min, max)` in (x, y, z) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bbox {
    pub min: [usize; 3],
    pub max: [usize; 3],
}

impl Bbox {
    /// Create a box, raising `max` to `min` on any inverted axis
    pub fn new(min: [usize; 3], max: [usize; 3]) -> Self {
        Self {
            min,
            max: [
                max[0].max(min[0]),
                max[1].max(min[1]),
                max[2].max(min[2]),
            ],
        }
    }

    /// Box starting at the origin with the given extent
    pub fn from_shape(shape: [usize; 3]) -> Self {
        Self::new([0; 3], shape)
    }

    /// Edge lengths along x, y, z
    pub fn shape(&self) -> [usize; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Number of voxels covered
    pub fn volume(&self) -> usize {
        self.shape().iter().product()
    }

    /// True when any axis has zero length
    pub fn is_subvoxel(&self) -> bool {
        self.shape().contains(&0)
    }

    /// True when `other` lies entirely inside this box
    pub fn contains_box(&self, other: &Bbox) -> bool {
        (0..3).all(|i| other.min[i] >= self.min[i] && other.max[i] <= self.max[i])
    }

    /// Overlapping region of two boxes, `None` when they do not overlap
    pub fn intersection(&self, other: &Bbox) -> Option<Bbox> {
        let min = [
            self.min[0].max(other.min[0]),
            self.min[1].max(other.min[1]),
            self.min[2].max(other.min[2]),
        ];
        let max = [
            self.max[0].min(other.max[0]),
            self.max[1].min(other.max[1]),
            self.max[2].min(other.max[2]),
        ];

        let bbox = Bbox::new(min, max);
        (!bbox.is_subvoxel()).then_some(bbox)
    }

    /// Translate the box into coordinates relative to `origin`
    pub fn relative_to(&self, origin: [usize; 3]) -> Bbox {
        Bbox::new(
            [
                self.min[0] - origin[0],
                self.min[1] - origin[1],
                self.min[2] - origin[2],
            ],
            [
                self.max[0] - origin[0],
                self.max[1] - origin[1],
                self.max[2] - origin[2],
            ],
        )
    }

    /// Iterate blocks of `block_shape` covering this box
    pub fn blocks(&self, block_shape: [usize; 3]) -> BlockIter {
        BlockIter::new(*self, block_shape)
    }

    /// Chunk style file name `x0-x1_y0-y1_z0-z1`
    pub fn to_filename(&self) -> String {
        format!(
            "{}-{}_{}-{}_{}-{}",
            self.min[0], self.max[0], self.min[1], self.max[1], self.min[2], self.max[2]
        )
    }
}

impl fmt::Display for Bbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bbox({:?}, {:?})", self.min, self.max)
    }
}

/// Walks a box in blocks, x fastest, clipping the last block on every axis.
///
/// Every yielded block is non-empty: the cursor only visits points strictly
/// inside the bounds, so clipping never produces a sub-voxel block.
#[derive(Debug, Clone)]
pub struct BlockIter {
    bounds: Bbox,
    step: [usize; 3],
    cursor: Option<[usize; 3]>,
}

impl BlockIter {
    /// Zero components of `block_shape` are treated as 1 so iteration always advances.
    pub fn new(bounds: Bbox, block_shape: [usize; 3]) -> Self {
        let step = [
            block_shape[0].max(1),
            block_shape[1].max(1),
            block_shape[2].max(1),
        ];
        let cursor = (!bounds.is_subvoxel()).then_some(bounds.min);

        Self {
            bounds,
            step,
            cursor,
        }
    }

    /// Number of grid positions along each axis
    pub fn grid_shape(&self) -> [usize; 3] {
        let shape = self.bounds.shape();
        [
            shape[0].div_ceil(self.step[0]),
            shape[1].div_ceil(self.step[1]),
            shape[2].div_ceil(self.step[2]),
        ]
    }

    /// Total number of blocks this iterator produces from the start
    pub fn total(&self) -> usize {
        if self.bounds.is_subvoxel() {
            return 0;
        }
        self.grid_shape().iter().product()
    }
}

impl Iterator for BlockIter {
    type Item = Bbox;

    fn next(&mut self) -> Option<Bbox> {
        let pt = self.cursor?;

        let max = [
            (pt[0] + self.step[0]).min(self.bounds.max[0]),
            (pt[1] + self.step[1]).min(self.bounds.max[1]),
            (pt[2] + self.step[2]).min(self.bounds.max[2]),
        ];

        // Advance x, then y, then z.
        let mut next = pt;
        next[0] += self.step[0];
        if next[0] >= self.bounds.max[0] {
            next[0] = self.bounds.min[0];
            next[1] += self.step[1];
            if next[1] >= self.bounds.max[1] {
                next[1] = self.bounds.min[1];
                next[2] += self.step[2];
            }
        }
        self.cursor = (next[2] < self.bounds.max[2]).then_some(next);

        Some(Bbox::new(pt, max))
    }
}

/// Parse `"x,y,z"` into three positive integers.
/// Surrounding brackets or parentheses and whitespace are ignored.
pub fn parse_shape(text: &str) -> Option<[usize; 3]> {
    let values = split_triple(text)?;
    let mut shape = [0usize; 3];
    for (slot, value) in shape.iter_mut().zip(values) {
        *slot = value.parse().ok().filter(|v| *v > 0)?;
    }
    Some(shape)
}

/// Split a bracketed or bare comma separated triple into its trimmed parts.
pub(crate) fn split_triple(text: &str) -> Option<[&str; 3]> {
    let inner = text
        .trim()
        .trim_start_matches(['[', '('])
        .trim_end_matches([']', ')']);
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [x, y, z] => Some([x, y, z]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn blocks_cover_ragged_volume_exactly_once() {
        let bounds = Bbox::from_shape([10, 7, 5]);
        let mut seen = HashSet::new();

        for block in bounds.blocks([4, 4, 2]) {
            assert!(bounds.contains_box(&block));
            for z in block.min[2]..block.max[2] {
                for y in block.min[1]..block.max[1] {
                    for x in block.min[0]..block.max[0] {
                        assert!(seen.insert((x, y, z)), "voxel visited twice");
                    }
                }
            }
        }

        assert_eq!(seen.len(), bounds.volume());
    }

    #[test]
    fn blocks_iterate_x_fastest() {
        let starts: Vec<[usize; 3]> = Bbox::from_shape([4, 4, 2])
            .blocks([2, 2, 2])
            .map(|b| b.min)
            .collect();
        assert_eq!(starts, vec![[0, 0, 0], [2, 0, 0], [0, 2, 0], [2, 2, 0]]);
    }

    #[test]
    fn trailing_blocks_are_clipped() {
        let blocks: Vec<Bbox> = Bbox::from_shape([5, 1, 1]).blocks([2, 1, 1]).collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2], Bbox::new([4, 0, 0], [5, 1, 1]));
        assert_eq!(Bbox::from_shape([5, 1, 1]).blocks([2, 1, 1]).total(), 3);
    }

    #[test]
    fn zero_block_edge_still_advances() {
        let count = Bbox::from_shape([3, 2, 1]).blocks([0, 2, 0]).count();
        assert_eq!(count, 3);
    }

    #[test]
    fn empty_bounds_yield_nothing() {
        assert_eq!(Bbox::from_shape([0, 4, 4]).blocks([2, 2, 2]).count(), 0);
        assert_eq!(Bbox::from_shape([0, 4, 4]).blocks([2, 2, 2]).total(), 0);
    }

    #[test]
    fn clipped_blocks_are_never_subvoxel() {
        for (shape, block) in [
            ([10, 7, 5], [4, 4, 2]),
            ([1, 1, 1], [64, 64, 8]),
            ([129, 65, 9], [64, 64, 8]),
            ([3, 2, 1], [0, 2, 0]),
        ] {
            let bounds = Bbox::from_shape(shape);
            let blocks: Vec<Bbox> = bounds.blocks(block).collect();
            assert_eq!(blocks.len(), bounds.blocks(block).total());
            assert!(blocks.iter().all(|b| !b.is_subvoxel()), "{shape:?} / {block:?}");
        }
    }

    #[test]
    fn subvoxel_detection() {
        assert!(Bbox::new([3, 0, 0], [3, 4, 4]).is_subvoxel());
        assert!(!Bbox::new([0, 0, 0], [1, 1, 1]).is_subvoxel());
    }

    #[test]
    fn intersection_and_relative_boxes() {
        let a = Bbox::new([0, 0, 0], [64, 64, 64]);
        let b = Bbox::new([60, 10, 0], [80, 20, 4]);
        let overlap = a.intersection(&b).unwrap();
        assert_eq!(overlap, Bbox::new([60, 10, 0], [64, 20, 4]));
        assert_eq!(overlap.relative_to([60, 10, 0]).shape(), [4, 10, 4]);
        assert!(a.intersection(&Bbox::new([64, 0, 0], [70, 4, 4])).is_none());
    }

    #[test]
    fn filename_lists_ranges() {
        assert_eq!(
            Bbox::new([0, 64, 128], [64, 128, 130]).to_filename(),
            "0-64_64-128_128-130"
        );
    }

    #[test]
    fn parses_shapes() {
        assert_eq!(parse_shape("64,64,8"), Some([64, 64, 8]));
        assert_eq!(parse_shape("[ 1, 2 ,3 ]"), Some([1, 2, 3]));
        assert_eq!(parse_shape("1,2"), None);
        assert_eq!(parse_shape("1,0,2"), None);
    }
}
