//! Directory abstraction and low-level IO primitives.
//!
//! Grounded on the teacher's `core::store` module (`Directory`,
//! `DirectoryRc`, `IOContext`, `IndexInput`, `IndexOutput`, `Lock`), with
//! trait shapes rebuilt from their call sites across the codec readers
//! and writers (`dir.create_output`, `dir.open_input`, `input.slice`,
//! `data.file_pointer`, `data.write_vint` / `write_long` / `write_string`,
//! `input.as_data_input`).

mod codec_util;
mod directory;
mod io;
mod mmap_directory;
mod ram_directory;

pub use codec_util::*;
pub use directory::*;
pub use io::*;
pub use mmap_directory::MmapDirectory;
pub use ram_directory::RamDirectory;

use std::sync::Arc;

pub type DirectoryRc = Arc<dyn Directory>;

/// Hints about how a file will be accessed, mirroring the teacher's
/// `IOContext` enum (used as `&IOContext::Read(true)` / `IO_CONTEXT_READONCE`
/// in `compound.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IOContext {
    /// Normal read, `bool` says whether the whole file will be read once.
    Read(bool),
    /// A merge reads sequentially and only once.
    Merge,
    /// A flush writes sequentially.
    Flush,
    Default,
}

pub const IO_CONTEXT_READONCE: IOContext = IOContext::Read(true);
pub const IO_CONTEXT_DEFAULT: IOContext = IOContext::Default;

#[derive(Debug, Clone, Copy)]
pub struct FlushInfo {
    pub num_docs: u32,
    pub estimated_size_in_bytes: u64,
}
