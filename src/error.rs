//! Crate-wide error type.
//!
//! The teacher (`bigxu-rucene`) built this around `error_chain`'s
//! `ErrorKind`/`Result` pair; `error_chain` is effectively unmaintained, so
//! this follows the rest of the retrieval pack (`sitegui-tantivy`,
//! `rustmailer-tantivy`, `motedb-motedb`) in expressing the same shape with
//! `thiserror`. The variant set matches spec.md §7 one-to-one.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("corrupt index in file {file}: {detail}")]
    CorruptIndex { file: String, detail: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("too many boolean clauses: limit is {limit}")]
    TooManyClauses { limit: usize },

    #[error("lock obtain failed for {0}")]
    LockObtainFailed(PathBuf),

    #[error("this writer or reader is already closed")]
    AlreadyClosed,

    #[error("search was cancelled")]
    Cancelled,

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("no segments_* file found in directory")]
    IndexNotFound,

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl Error {
    pub fn corrupt(file: impl Into<String>, detail: impl Into<String>) -> Error {
        Error::CorruptIndex {
            file: file.into(),
            detail: detail.into(),
        }
    }
}
