//! Stored fields: chunked, LZ4-compressed row store keyed by docId, per
//! spec.md §4.6. Uses `lz4_flex` for the block compression the teacher's
//! corpus reaches for via the native `lz4` crate (a documented
//! substitution — see DESIGN.md).

mod reader;
mod writer;

pub use reader::StoredFieldsReader;
pub use writer::StoredFieldsWriter;

pub const DATA_EXTENSION: &str = "fdt";
pub const INDEX_EXTENSION: &str = "fdx";
pub const DATA_CODEC: &str = "FerroStoredFieldsData";
pub const INDEX_CODEC: &str = "FerroStoredFieldsIndex";
pub const VERSION: i32 = 1;

/// Flush threshold, per spec.md §4.6 (`chunkSize`, default 16 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;
/// Flush threshold, per spec.md §4.6 (`maxDocsPerChunk`, default 128).
pub const DEFAULT_MAX_DOCS_PER_CHUNK: usize = 128;

pub(crate) const TYPE_STRING: u8 = 0;
pub(crate) const TYPE_BYTES: u8 = 1;
pub(crate) const TYPE_I64: u8 = 2;
pub(crate) const TYPE_F64: u8 = 3;
