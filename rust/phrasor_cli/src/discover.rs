//! Input discovery: a path argument may be a single file, a directory, or
//! a glob pattern over one directory.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use phrasor_core::PipelineError;

/// Resolve an input argument to a sorted list of files. Discovery order is
/// lexicographic, so shard positions (and with them cache keys and
/// manifest order) are reproducible across runs.
pub fn discover(input: &str) -> Result<Vec<PathBuf>, PipelineError> {
    let path = Path::new(input);
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if path.is_dir() {
        let files = list_files(path, None)?;
        if files.is_empty() {
            return Err(PipelineError::EmptyInput(input.to_string()));
        }
        return Ok(files);
    }

    // Treat the last path component as a glob over its parent directory.
    let pattern = match path.file_name().and_then(|n| n.to_str()) {
        Some(p) => p,
        None => return Err(PipelineError::MissingInput(path.to_path_buf())),
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(PipelineError::MissingInput(parent.to_path_buf()));
    }
    let matcher = Glob::new(pattern)
        .map_err(|e| PipelineError::BadPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?
        .compile_matcher();
    let files = list_files(parent, Some(&matcher))?;
    if files.is_empty() {
        return Err(PipelineError::EmptyInput(input.to_string()));
    }
    Ok(files)
}

fn list_files(dir: &Path, matcher: Option<&GlobMatcher>) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(m) = matcher {
            match path.file_name() {
                Some(name) if m.is_match(name) => {}
                _ => continue,
            }
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}
