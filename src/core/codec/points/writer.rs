//! Builds the balanced KD-tree in memory, then serializes leaves and the
//! packed split index, per spec.md §4.5.

use super::{POINTS_DATA_CODEC, POINTS_DATA_EXTENSION, POINTS_INDEX_CODEC, POINTS_INDEX_EXTENSION, POINTS_VERSION};
use crate::core::store::{codec_util, Directory, IOContext, IndexOutput};
use crate::error::{Error, Result};

struct Point {
    packed: Vec<u8>,
    doc_id: i32,
}

/// Accumulates `(packedValue, docId)` pairs for one field across a
/// segment's lifetime, then builds and flushes the BKD tree once on
/// `finish` — matching the per-segment in-memory builder scope of
/// spec.md §2 ("per-segment indexer ... buffer docs in RAM").
pub struct BkdWriter {
    num_dims: usize,
    bytes_per_dim: usize,
    max_points_in_leaf: usize,
    points: Vec<Point>,
}

impl BkdWriter {
    pub fn new(num_dims: usize, bytes_per_dim: usize, max_points_in_leaf: usize) -> Result<Self> {
        if num_dims == 0 || num_dims > super::MAX_DIMS {
            return Err(Error::IllegalArgument(format!(
                "numDims must be in [1,{}], got {num_dims}",
                super::MAX_DIMS
            )));
        }
        Ok(BkdWriter {
            num_dims,
            bytes_per_dim,
            max_points_in_leaf: max_points_in_leaf.max(1),
            points: Vec::new(),
        })
    }

    pub fn add(&mut self, packed_value: &[u8], doc_id: i32) -> Result<()> {
        if packed_value.len() != self.num_dims * self.bytes_per_dim {
            return Err(Error::IllegalArgument(format!(
                "packed value length {} != numDims*bytesPerDim {}",
                packed_value.len(),
                self.num_dims * self.bytes_per_dim
            )));
        }
        self.points.push(Point {
            packed: packed_value.to_vec(),
            doc_id,
        });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    fn dim_bytes<'a>(&self, p: &'a Point, dim: usize) -> &'a [u8] {
        let start = dim * self.bytes_per_dim;
        &p.packed[start..start + self.bytes_per_dim]
    }

    fn cell_bounds(&self, points: &[Point]) -> (Vec<u8>, Vec<u8>) {
        let mut min = vec![0xffu8; self.num_dims * self.bytes_per_dim];
        let mut max = vec![0x00u8; self.num_dims * self.bytes_per_dim];
        for p in points {
            for d in 0..self.num_dims {
                let start = d * self.bytes_per_dim;
                let bytes = self.dim_bytes(p, d);
                if bytes < &min[start..start + self.bytes_per_dim] {
                    min[start..start + self.bytes_per_dim].copy_from_slice(bytes);
                }
                if bytes > &max[start..start + self.bytes_per_dim] {
                    max[start..start + self.bytes_per_dim].copy_from_slice(bytes);
                }
            }
        }
        (min, max)
    }

    /// Picks the dimension with the largest min-to-max byte span at this
    /// node — spec.md §4.5's fallback split-dimension rule, applied
    /// uniformly rather than also tracking "splits so far per path"
    /// balancing (a documented simplification).
    fn choose_split_dim(&self, min: &[u8], max: &[u8]) -> usize {
        let mut best_dim = 0;
        let mut best_span: i32 = -1;
        for d in 0..self.num_dims {
            let start = d * self.bytes_per_dim;
            let lo = &min[start..start + self.bytes_per_dim];
            let hi = &max[start..start + self.bytes_per_dim];
            if lo == hi {
                continue;
            }
            // byte-lexicographic span approximated by the first differing byte.
            let span = lo
                .iter()
                .zip(hi.iter())
                .find(|(a, b)| a != b)
                .map(|(a, b)| (*b as i32) - (*a as i32))
                .unwrap_or(0);
            if span > best_span {
                best_span = span;
                best_dim = d;
            }
        }
        best_dim
    }

    fn build(&self, mut points: Vec<Point>) -> Node {
        let (min, max) = self.cell_bounds(&points);
        if points.len() <= self.max_points_in_leaf {
            return Node::Leaf { min, max, points };
        }
        let split_dim = self.choose_split_dim(&min, &max);
        points.sort_by(|a, b| self.dim_bytes(a, split_dim).cmp(self.dim_bytes(b, split_dim)));
        let mid = points.len() / 2;
        let split_value = self.dim_bytes(&points[mid], split_dim).to_vec();
        let right = points.split_off(mid);
        let left = points;

        let left_node = self.build(left);
        let right_node = self.build(right);
        Node::Internal {
            min,
            max,
            split_dim,
            split_value,
            left: Box::new(left_node),
            right: Box::new(right_node),
        }
    }

    /// Builds the tree and writes `<segment>[_fieldSuffix].kdd` (leaves)
    /// and `.kdi` (packed index + metadata). `field_suffix` disambiguates
    /// multiple point fields sharing one segment (empty string is fine
    /// for a segment with a single point field). Returns the total point
    /// count written.
    pub fn finish(self, dir: &dyn Directory, segment_name: &str, field_suffix: &str, segment_id: &[u8]) -> Result<u64> {
        let num_dims = self.num_dims;
        let bytes_per_dim = self.bytes_per_dim;
        let total = self.points.len() as u64;
        let base = if field_suffix.is_empty() {
            segment_name.to_string()
        } else {
            format!("{segment_name}_{field_suffix}")
        };

        let data_file = format!("{base}.{}", POINTS_DATA_EXTENSION);
        let mut data_out = dir.create_output(&data_file, &IOContext::Flush)?;
        codec_util::write_index_header(data_out.as_mut(), POINTS_DATA_CODEC, POINTS_VERSION, segment_id, "")?;

        let root = if self.points.is_empty() {
            None
        } else {
            Some(self.build(self.points))
        };

        let mut index_bytes = Vec::new();
        if let Some(root) = &root {
            write_node(root, data_out.as_mut(), &mut index_bytes)?;
        }
        codec_util::write_footer(data_out.as_mut())?;

        let index_file = format!("{base}.{}", POINTS_INDEX_EXTENSION);
        let mut index_out = dir.create_output(&index_file, &IOContext::Flush)?;
        codec_util::write_index_header(index_out.as_mut(), POINTS_INDEX_CODEC, POINTS_VERSION, segment_id, "")?;
        index_out.write_vint(num_dims as i32)?;
        index_out.write_vint(bytes_per_dim as i32)?;
        index_out.write_vlong(total as i64)?;
        index_out.write_vint(index_bytes.len() as i32)?;
        index_out.write_bytes(&index_bytes)?;
        codec_util::write_footer(index_out.as_mut())?;

        Ok(total)
    }
}

enum Node {
    Leaf {
        min: Vec<u8>,
        max: Vec<u8>,
        points: Vec<Point>,
    },
    Internal {
        min: Vec<u8>,
        max: Vec<u8>,
        split_dim: usize,
        split_value: Vec<u8>,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Depth-first: writes leaf point data to `data_out` as encountered,
/// and appends this node's encoding (including recorded leaf file
/// pointers) to `index_bytes`, matching `reader::parse_node`.
fn write_node(node: &Node, data_out: &mut dyn IndexOutput, index_bytes: &mut Vec<u8>) -> Result<()> {
    match node {
        Node::Leaf { min, max, points } => {
            index_bytes.push(0);
            index_bytes.extend_from_slice(min);
            index_bytes.extend_from_slice(max);

            let leaf_fp = data_out.file_pointer() as u64;
            index_bytes.extend_from_slice(&leaf_fp.to_be_bytes());
            index_bytes.extend_from_slice(&(points.len() as u32).to_be_bytes());

            data_out.write_vint(points.len() as i32)?;
            for p in points {
                data_out.write_vint(p.doc_id)?;
                data_out.write_bytes(&p.packed)?;
            }
            Ok(())
        }
        Node::Internal {
            min,
            max,
            split_dim,
            split_value,
            left,
            right,
        } => {
            index_bytes.push(1);
            index_bytes.extend_from_slice(min);
            index_bytes.extend_from_slice(max);
            index_bytes.push(*split_dim as u8);
            index_bytes.extend_from_slice(split_value);
            write_node(left, data_out, index_bytes)?;
            write_node(right, data_out, index_bytes)
        }
    }
}
