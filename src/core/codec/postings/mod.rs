//! Postings codec: three coordinated files per segment (`.doc`, `.pos`,
//! `.pay`) plus an inline multi-level skip list, per spec.md §4.3.

mod reader;
mod skip;
mod writer;

pub use reader::{PostingsIterator, PostingsReader};
pub use skip::{SkipReader, SkipWriter};
pub use writer::PostingsWriter;

use crate::core::util::for_util::BLOCK_SIZE;

pub const DOC_EXTENSION: &str = "doc";
pub const POS_EXTENSION: &str = "pos";
pub const PAY_EXTENSION: &str = "pay";

pub const DOC_CODEC: &str = "FerroPostingsDoc";
pub const POS_CODEC: &str = "FerroPostingsPos";
pub const PAY_CODEC: &str = "FerroPostingsPay";
pub const POSTINGS_VERSION: i32 = 1;

/// Every higher skip level covers 8x as many blocks as the one below it
/// (spec.md §4.3: "each higher level skips 8× more").
pub const SKIP_MULTIPLIER: usize = 8;

pub(crate) const _ASSERT_BLOCK_SIZE: usize = BLOCK_SIZE;

/// Per-term metadata handed to the term dictionary, per spec.md §4.3.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermMetadata {
    pub doc_start_fp: i64,
    pub pos_start_fp: i64,
    pub pay_start_fp: i64,
    /// `Some(id)` when doc-frequency is 1: the docId is inlined here and
    /// no `.doc` block was allocated (spec.md §4.3).
    pub singleton_doc_id: Option<i32>,
    pub last_pos_block_offset: i64,
    /// `None` when doc-frequency <= BLOCK_SIZE: no skip list was written.
    pub skip_offset: Option<i64>,
    pub doc_freq: i32,
    pub total_term_freq: i64,
}
