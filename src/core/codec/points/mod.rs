//! BKD point codec: a balanced block-KD tree over fixed-width N-dimensional
//! byte vectors, per spec.md §4.5. Grounded structurally on the recursive
//! partition-by-dimension approach in
//! `examples/arclabs561-rank-rank/crates/rank-retrieve/.../trees/kdtree.rs`
//! (alternating/heuristic split dimension, recursive build over index
//! arrays, leaf-size cutoff), generalized from float vectors + cosine
//! distance to fixed-width sortable byte dimensions + range containment.

mod reader;
mod writer;

pub use reader::{BkdReader, IntersectVisitor, Relation};
pub use writer::BkdWriter;

pub const POINTS_DATA_EXTENSION: &str = "kdd";
pub const POINTS_INDEX_EXTENSION: &str = "kdi";
pub const POINTS_DATA_CODEC: &str = "FerroBkdData";
pub const POINTS_INDEX_CODEC: &str = "FerroBkdIndex";
pub const POINTS_VERSION: i32 = 1;

/// Default leaf size, per spec.md §4.5 (`maxPointsInLeafNode`).
pub const DEFAULT_MAX_POINTS_IN_LEAF_NODE: usize = 1024;

pub const MAX_DIMS: usize = 8;

/// Encodes a signed 32-bit integer into 4 sortable bytes: unsigned
/// byte-order comparison of the output agrees with numeric comparison of
/// the input, by flipping the sign bit (the conventional trick behind
/// `IntPoint` in spec.md §3/§8 S3).
pub fn encode_i32(value: i32) -> [u8; 4] {
    ((value as u32) ^ 0x8000_0000).to_be_bytes()
}

pub fn decode_i32(bytes: &[u8]) -> i32 {
    let bits = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    (bits ^ 0x8000_0000) as i32
}

/// Same trick for 64-bit integers (`LongPoint`).
pub fn encode_i64(value: i64) -> [u8; 8] {
    ((value as u64) ^ 0x8000_0000_0000_0000).to_be_bytes()
}

pub fn decode_i64(bytes: &[u8]) -> i64 {
    let bits = u64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]);
    (bits ^ 0x8000_0000_0000_0000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i32_roundtrip_preserves_order() {
        let values = [-100, -1, 0, 1, 100, i32::MIN, i32::MAX];
        let mut encoded: Vec<([u8; 4], i32)> = values.iter().map(|&v| (encode_i32(v), v)).collect();
        encoded.sort_by(|a, b| a.0.cmp(&b.0));
        let sorted_values: Vec<i32> = encoded.iter().map(|(_, v)| *v).collect();
        let mut expected = values.to_vec();
        expected.sort_unstable();
        assert_eq!(sorted_values, expected);
        for (bytes, v) in encoded {
            assert_eq!(decode_i32(&bytes), v);
        }
    }

    #[test]
    fn i64_roundtrip() {
        for v in [i64::MIN, -1, 0, 1, i64::MAX] {
            assert_eq!(decode_i64(&encode_i64(v)), v);
        }
    }
}
