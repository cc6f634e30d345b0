//! Loads the packed split index into memory and answers range-style
//! queries via a caller-supplied `IntersectVisitor`, per spec.md §4.5.

use super::{POINTS_DATA_CODEC, POINTS_DATA_EXTENSION, POINTS_INDEX_CODEC, POINTS_INDEX_EXTENSION, POINTS_VERSION};
use crate::core::store::{codec_util, Directory, IOContext, IndexInput};
use crate::error::Result;

/// Outcome of comparing a query against one node's cell bounds, per
/// spec.md §4.5: `INSIDE` visits every doc in the subtree without
/// decoding point values, `OUTSIDE` prunes the whole subtree, `CROSSES`
/// recurses (or, at a leaf, checks every point individually).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Inside,
    Outside,
    Crosses,
}

/// The traversal callback contract: `compare` decides how a subtree
/// relates to the query, `visit`/`visit_with_value` receive matching
/// doc ids.
pub trait IntersectVisitor {
    fn visit(&mut self, doc_id: i32);
    fn visit_with_value(&mut self, doc_id: i32, packed_value: &[u8]);
    fn compare(&self, min_packed_value: &[u8], max_packed_value: &[u8]) -> Relation;
}

enum RNode {
    Leaf {
        min: Vec<u8>,
        max: Vec<u8>,
        leaf_fp: u64,
        count: u32,
    },
    Internal {
        min: Vec<u8>,
        max: Vec<u8>,
        left: Box<RNode>,
        right: Box<RNode>,
    },
}

pub struct BkdReader {
    num_dims: usize,
    bytes_per_dim: usize,
    total_points: u64,
    root: Option<RNode>,
    data_input: Box<dyn IndexInput>,
}

impl BkdReader {
    pub fn open(dir: &dyn Directory, segment_name: &str, field_suffix: &str, segment_id: &[u8]) -> Result<Self> {
        let base = if field_suffix.is_empty() {
            segment_name.to_string()
        } else {
            format!("{segment_name}_{field_suffix}")
        };
        let index_file = format!("{base}.{}", POINTS_INDEX_EXTENSION);
        let mut index_input = dir.open_input(&index_file, &IOContext::Read(true))?;
        codec_util::check_index_header(
            index_input.as_mut(),
            POINTS_INDEX_CODEC,
            POINTS_VERSION,
            POINTS_VERSION,
            segment_id,
            "",
        )?;
        let num_dims = index_input.read_vint()? as usize;
        let bytes_per_dim = index_input.read_vint()? as usize;
        let total_points = index_input.read_vlong()? as u64;
        let blob_len = index_input.read_vint()? as usize;
        let mut blob = vec![0u8; blob_len];
        index_input.read_bytes(&mut blob)?;

        let root = if blob.is_empty() {
            None
        } else {
            let mut pos = 0usize;
            Some(parse_node(&blob, &mut pos, num_dims, bytes_per_dim))
        };

        let data_file = format!("{base}.{}", POINTS_DATA_EXTENSION);
        let mut data_input = dir.open_input(&data_file, &IOContext::Read(false))?;
        codec_util::check_index_header(
            data_input.as_mut(),
            POINTS_DATA_CODEC,
            POINTS_VERSION,
            POINTS_VERSION,
            segment_id,
            "",
        )?;

        Ok(BkdReader {
            num_dims,
            bytes_per_dim,
            total_points,
            root,
            data_input,
        })
    }

    pub fn num_dims(&self) -> usize {
        self.num_dims
    }

    pub fn bytes_per_dim(&self) -> usize {
        self.bytes_per_dim
    }

    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    /// Walks the tree, invoking `visitor` per spec.md §4.5's traversal
    /// rule. A fresh clone of the data input is used so concurrent
    /// intersections over the same reader don't interfere (cloning an
    /// `IndexInput` is O(1), per spec.md §4.1).
    pub fn intersect(&self, visitor: &mut dyn IntersectVisitor) -> Result<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        let mut input = self.data_input.clone_input();
        visit_node(root, input.as_mut(), visitor)
    }
}

fn parse_node(buf: &[u8], pos: &mut usize, num_dims: usize, bytes_per_dim: usize) -> RNode {
    let dim_width = num_dims * bytes_per_dim;
    let tag = buf[*pos];
    *pos += 1;
    let min = buf[*pos..*pos + dim_width].to_vec();
    *pos += dim_width;
    let max = buf[*pos..*pos + dim_width].to_vec();
    *pos += dim_width;

    if tag == 0 {
        let leaf_fp = u64::from_be_bytes(buf[*pos..*pos + 8].try_into().unwrap());
        *pos += 8;
        let count = u32::from_be_bytes(buf[*pos..*pos + 4].try_into().unwrap());
        *pos += 4;
        RNode::Leaf { min, max, leaf_fp, count }
    } else {
        *pos += 1; // split_dim, unused by the reader (cell bounds already embed it)
        *pos += bytes_per_dim; // split_value, likewise unused
        let left = Box::new(parse_node(buf, pos, num_dims, bytes_per_dim));
        let right = Box::new(parse_node(buf, pos, num_dims, bytes_per_dim));
        RNode::Internal { min, max, left, right }
    }
}

fn visit_node(node: &RNode, input: &mut dyn IndexInput, visitor: &mut dyn IntersectVisitor) -> Result<()> {
    match node {
        RNode::Leaf { min, max, leaf_fp, count } => match visitor.compare(min, max) {
            Relation::Outside => Ok(()),
            Relation::Inside => {
                input.seek(*leaf_fp as i64)?;
                let n = input.read_vint()? as u32;
                debug_assert_eq!(n, *count);
                let dim_width = min.len();
                let mut scratch = vec![0u8; dim_width];
                for _ in 0..n {
                    let doc_id = input.read_vint()?;
                    input.read_bytes(&mut scratch)?;
                    visitor.visit(doc_id);
                }
                Ok(())
            }
            Relation::Crosses => {
                input.seek(*leaf_fp as i64)?;
                let n = input.read_vint()? as u32;
                debug_assert_eq!(n, *count);
                let dim_width = min.len();
                let mut scratch = vec![0u8; dim_width];
                for _ in 0..n {
                    let doc_id = input.read_vint()?;
                    input.read_bytes(&mut scratch)?;
                    visitor.visit_with_value(doc_id, &scratch);
                }
                Ok(())
            }
        },
        RNode::Internal { min, max, left, right } => match visitor.compare(min, max) {
            Relation::Outside => Ok(()),
            Relation::Inside | Relation::Crosses => {
                visit_node(left, input, visitor)?;
                visit_node(right, input, visitor)
            }
        },
    }
}
