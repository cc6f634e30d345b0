//! `ferrosearch`: a segment-structured full-text search core — a
//! per-segment in-memory builder, a codec layer (postings with skip
//! lists, an FST term dictionary, BKD points, stored fields, doc-values,
//! norms), segment lifecycle (flush/commit/reopen), and boolean/BM25
//! query evaluation over `DocIdSetIterator` compositions.

pub mod core;
pub mod error;
