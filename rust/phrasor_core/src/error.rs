//! Pipeline-level errors: preconditions and orchestration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::index::IndexError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("input path not found: {0}")]
    MissingInput(PathBuf),
    #[error("output directory missing: {0} (create it before running)")]
    MissingOutputDir(PathBuf),
    #[error("no input files matched {0}")]
    EmptyInput(String),
    #[error("invalid input pattern {pattern}: {reason}")]
    BadPattern { pattern: String, reason: String },
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("worker pool: {0}")]
    Pool(String),
    #[error("manifest: {0}")]
    Manifest(String),
    #[error("{failed} of {total} shards failed")]
    Partial { failed: usize, total: usize },
}
