//! The `Directory` trait: a flat namespace of named byte files, matching
//! spec.md §4.1. Method names (`list_all`, `file_length`, `obtain_lock`,
//! `create_temp_output`, `delete_file`, `sync`, `sync_meta_data`,
//! `create_output`, `rename`, `open_input`) match the teacher's
//! `core::store::Directory` trait.

use std::collections::HashSet;
use std::fmt;

use super::{ChecksumIndexInput, IOContext, IndexInput, IndexOutput};
use crate::error::Result;

/// A held advisory lock on a directory, released on drop. Matches the
/// teacher's `obtain_lock(&self, name) -> Result<Box<Lock>>`.
pub trait Lock: Send {
    fn release(&mut self) -> Result<()>;
}

pub trait Directory: fmt::Display + Send + Sync {
    fn list_all(&self) -> Result<Vec<String>>;

    fn file_length(&self, name: &str) -> Result<i64>;

    fn create_output(&self, name: &str, ctx: &IOContext) -> Result<Box<dyn IndexOutput>>;

    fn create_temp_output(
        &self,
        prefix: &str,
        suffix: &str,
        ctx: &IOContext,
    ) -> Result<Box<dyn IndexOutput>>;

    fn open_input(&self, name: &str, ctx: &IOContext) -> Result<Box<dyn IndexInput>>;

    fn open_checksum_input(
        &self,
        name: &str,
        ctx: &IOContext,
    ) -> Result<Box<dyn ChecksumIndexInput>>;

    fn delete_file(&self, name: &str) -> Result<()>;

    fn rename(&self, source: &str, dest: &str) -> Result<()>;

    fn sync(&self, names: &HashSet<String>) -> Result<()>;

    fn sync_meta_data(&self) -> Result<()>;

    fn obtain_lock(&self, name: &str) -> Result<Box<dyn Lock>>;
}
