//! Error types for shard index persistence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{path}: invalid magic bytes")]
    BadMagic { path: PathBuf },
    #[error("{path}: unsupported index version {found} (expected {expected})")]
    BadVersion {
        path: PathBuf,
        expected: u32,
        found: u32,
    },
    #[error("{path}: corrupt index: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("index key too long ({len} bytes, max {max})")]
    KeyTooLong { len: usize, max: usize },
    #[error("shard index not found: {0}")]
    NotFound(PathBuf),
}
