//! Parallel shard index construction and persistence.
//!
//! One task per gram file on a bounded pool; every task owns its own trie
//! pair and persists independently, so no locking happens during build.
//! The manifest written at the end lists exactly the shards whose index
//! pair is on disk, which makes partial completion observable: a re-run
//! with `resume` set skips those shards and rebuilds only the rest.

use std::fs;
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::index::{self, builder, writer, Direction, IndexError};
use crate::prepare::{ensure_dir, shard_name, worker_pool, DEFAULT_WORKERS};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Worker-pool cap; the pool is sized `min(#shards, workers)`.
    pub workers: usize,
    /// Skip shards already recorded in the manifest whose index files are
    /// still present.
    pub resume: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            workers: DEFAULT_WORKERS,
            resume: false,
        }
    }
}

/// Per-shard entry in the build manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub shard: String,
    /// Forward / reverse index file names inside the index directory.
    pub forward: String,
    pub reverse: String,
    #[serde(flatten)]
    pub stats: builder::ShardStats,
}

/// The shards whose index pair was persisted successfully, in shard order.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub shards: Vec<ManifestEntry>,
}

impl Manifest {
    pub const FILE_NAME: &'static str = "manifest.json";

    pub fn path(index_dir: &Path) -> PathBuf {
        index_dir.join(Self::FILE_NAME)
    }

    pub fn save(&self, index_dir: &Path) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Manifest(e.to_string()))?;
        fs::write(Self::path(index_dir), json)?;
        Ok(())
    }

    pub fn load(index_dir: &Path) -> Result<Manifest, PipelineError> {
        let json = fs::read_to_string(Self::path(index_dir))?;
        serde_json::from_str(&json).map_err(|e| PipelineError::Manifest(e.to_string()))
    }

    fn load_or_default(index_dir: &Path) -> Manifest {
        Self::load(index_dir).unwrap_or_default()
    }

    /// Shard names in manifest order, for `IndexSet::load`.
    pub fn shard_names(&self) -> Vec<String> {
        self.shards.iter().map(|e| e.shard.clone()).collect()
    }
}

/// Outcome of one build run.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Shards built and persisted by this run.
    pub built: Vec<ManifestEntry>,
    /// Shards skipped because a previous run already persisted them.
    pub skipped: Vec<String>,
    /// (shard, error) for every shard that failed.
    pub failed: Vec<(String, String)>,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Outcome {
    Built(ManifestEntry),
    Skipped(ManifestEntry),
    Failed(String, String),
}

/// Build and persist the forward/reverse index pair for every gram file.
/// The run finishes only once every task has completed or failed; failed
/// shards are reported and left out of the manifest, never fatal to their
/// siblings.
pub fn build_shards(
    gram_files: &[PathBuf],
    index_dir: &Path,
    opts: &BuildOptions,
) -> Result<BuildReport, PipelineError> {
    ensure_dir(index_dir)?;

    let previous: AHashMap<String, ManifestEntry> = if opts.resume {
        Manifest::load_or_default(index_dir)
            .shards
            .into_iter()
            .map(|e| (e.shard.clone(), e))
            .collect()
    } else {
        AHashMap::new()
    };

    let pool = worker_pool(gram_files.len(), opts.workers)?;
    let outcomes: Vec<Outcome> = pool.install(|| {
        gram_files
            .par_iter()
            .map(|src| {
                let shard = shard_name(src);
                let fwd = index::index_path(index_dir, &shard, Direction::Forward);
                let rev = index::index_path(index_dir, &shard, Direction::Reverse);
                if let Some(entry) = previous.get(&shard) {
                    if fwd.is_file() && rev.is_file() {
                        return Outcome::Skipped(entry.clone());
                    }
                }
                match build_one(src, &fwd, &rev) {
                    Ok(stats) => Outcome::Built(ManifestEntry {
                        shard,
                        forward: shard_name(&fwd),
                        reverse: shard_name(&rev),
                        stats,
                    }),
                    Err(e) => Outcome::Failed(shard, e.to_string()),
                }
            })
            .collect()
    });

    let mut report = BuildReport::default();
    let mut manifest = Manifest::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Built(entry) => {
                manifest.shards.push(entry.clone());
                report.built.push(entry);
            }
            Outcome::Skipped(entry) => {
                report.skipped.push(entry.shard.clone());
                manifest.shards.push(entry);
            }
            Outcome::Failed(shard, error) => {
                tracing::warn!(shard = %shard, error = %error, "shard build failed");
                report.failed.push((shard, error));
            }
        }
    }
    manifest.save(index_dir)?;
    tracing::info!(
        built = report.built.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "build finished"
    );
    Ok(report)
}

fn build_one(src: &Path, fwd: &Path, rev: &Path) -> Result<builder::ShardStats, IndexError> {
    let (indexes, stats) = builder::build_from_grams(src)?;
    writer::persist(&indexes.forward, fwd)?;
    writer::persist(&indexes.reverse, rev)?;
    Ok(stats)
}
