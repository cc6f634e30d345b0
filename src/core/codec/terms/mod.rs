//! Term dictionary: an FST term index (via the `fst` crate — the same
//! finite-state-transducer crate `evanxg852000-clicktsdb/fts` depends on)
//! over a block-structured term-data file, per spec.md §4.4.
//!
//! The FST maps each full term to the byte offset of the leaf block that
//! contains it (the `fst` crate already performs the shared-suffix /
//! shared-output minimization spec.md describes by hand — "arcs carry
//! outputs [...] pushed toward the root to maximize sharing" is exactly
//! what `fst::MapBuilder` does for us). The term-data file groups sorted
//! terms into blocks that share a common prefix, each term stored as
//! `(shared-prefix-length-with-previous-term, suffix bytes, vlong-delta
//! posting metadata)`, reconstructing the full term bytes during a block
//! scan — the same idea as the teacher's `core::index::prefix_code_terms`
//! module (referenced from `core/index/mod.rs`, not itself retrieved).

mod reader;
mod writer;

pub use reader::TermDictReader;
pub use writer::TermDictWriter;

pub const TERM_INDEX_EXTENSION: &str = "tip";
pub const TERM_DATA_EXTENSION: &str = "tim";
pub const TERM_DATA_CODEC: &str = "FerroTermData";
pub const TERM_DATA_VERSION: i32 = 1;

/// Target leaf-block size, per spec.md §4.4 ("leaf blocks of between
/// minItemsInBlock (default 25) and maxItemsInBlock (default 48)").
pub const MIN_ITEMS_IN_BLOCK: usize = 25;
pub const MAX_ITEMS_IN_BLOCK: usize = 48;
