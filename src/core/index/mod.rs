//! Segment lifecycle: per-segment metadata (`segment`), the in-memory
//! per-segment builder (`segment_writer`), the per-thread state pool
//! (`thread_pool`), live-docs/deletes persistence (`live_docs`), segment
//! merging (`merge`), the read-only segment/index view (`reader`), and the
//! top-level `IndexWriter` (`writer`) that ties them together, per
//! spec.md §4.7 and §6.

pub mod live_docs;
pub mod merge;
pub mod reader;
pub mod segment;
pub mod segment_writer;
pub mod thread_pool;
pub mod writer;
