//! Small shared utilities: the block integer codec ("ForUtil"), a fixed
//! bitset for live-docs, and the handful of type aliases the teacher's
//! `core::util` module exposes (`DocId`, `Bits`, `Version`,
//! `Count`/`Counter`) that the rest of the crate's signatures depend on.

pub mod bit_set;
pub mod for_util;

pub use bit_set::FixedBitSet;
pub use for_util::ForUtil;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A dense, 0-based document identifier, valid within one segment
/// (spec.md §3, "docId is a dense 0-based integer per segment").
pub type DocId = i32;

pub const NO_MORE_DOCS: DocId = i32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: i32,
    pub minor: i32,
    pub bugfix: i32,
}

pub const VERSION_LATEST: Version = Version {
    major: 1,
    minor: 0,
    bugfix: 0,
};

/// A bit-addressable read view, implemented by `FixedBitSet` and by
/// "all docs live" placeholders.
pub trait Bits: Send + Sync {
    fn get(&self, index: usize) -> bool;
    fn len(&self) -> usize;
}

pub type BitsRef = Arc<dyn Bits>;

/// A thread-safe counter shared between a segment builder and its RAM
/// accounting, mirroring the teacher's `Counter`/`Count` pair
/// (`core::util::{Count, Counter}` used from `thread_doc_writer.rs`).
#[derive(Clone)]
pub struct Counter {
    value: Arc<AtomicI64>,
}

impl Counter {
    pub fn new() -> Self {
        Counter {
            value: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn add_and_get(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::SeqCst) + delta
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn set(&self, v: i64) {
        self.value.store(v, Ordering::SeqCst);
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

pub fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap()
}

pub mod string_util {
    pub const ID_LENGTH: usize = 16;

    /// A random 16-byte segment id, matching spec.md §3
    /// ("each file carries a codec header [...] segment-id").
    pub fn random_id() -> [u8; ID_LENGTH] {
        use rand::RngCore;
        let mut id = [0u8; ID_LENGTH];
        rand::thread_rng().fill_bytes(&mut id);
        id
    }
}
