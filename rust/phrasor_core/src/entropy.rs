//! Boundary entropy of candidate spans.
//!
//! A span that is a free-standing phrase tends to see many different
//! tokens on both sides; a span that is a fragment of a larger fixed
//! phrase sees few. Right context comes from the forward index set; left
//! context from the reverse set, whose rotated keys put the preceding
//! token into prefix-queryable position.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::aggregate::IndexSet;
use crate::error::PipelineError;
use crate::prepare::{ensure_dir, shard_name, worker_pool};
use crate::score::ScoreReport;
use crate::SEP;

/// Shannon entropy (bits) of a branching distribution. Zero when the
/// distribution is empty or carries no mass.
pub fn shannon_entropy(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let mut h = 0.0;
    for &c in counts {
        if c == 0 {
            continue;
        }
        let p = c as f64 / total;
        h -= p * p.log2();
    }
    h
}

/// One scored candidate span.
#[derive(Debug, Clone, PartialEq)]
pub struct EntropyRecord {
    pub key: String,
    pub left: f64,
    pub right: f64,
    /// Occurrence mass of the left/right continuation distributions.
    pub left_mass: u64,
    pub right_mass: u64,
}

impl EntropyRecord {
    /// On-disk line: candidate, entropies to 4 decimals, branch masses.
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{:.4}\t{:.4}\t{}\t{}",
            self.key, self.left, self.right, self.left_mass, self.right_mass
        )
    }
}

/// Left/right boundary entropy over a forward/reverse index set pair.
pub struct BoundaryEntropy<'a> {
    forward: &'a IndexSet,
    reverse: &'a IndexSet,
}

impl<'a> BoundaryEntropy<'a> {
    pub fn new(forward: &'a IndexSet, reverse: &'a IndexSet) -> Self {
        BoundaryEntropy { forward, reverse }
    }

    /// Entropy of the tokens immediately following `key`, with the total
    /// continuation mass.
    pub fn right(&self, key: &str) -> (f64, u64) {
        distribution_entropy(self.forward, key)
    }

    /// Entropy of the tokens immediately preceding `key`, with the total
    /// continuation mass.
    pub fn left(&self, key: &str) -> (f64, u64) {
        distribution_entropy(self.reverse, key)
    }

    /// Score one candidate line. `None` rejects malformed lines: fewer
    /// than two tokens, or any token shorter than two characters.
    pub fn record(&self, line: &str) -> Option<EntropyRecord> {
        let words: Vec<&str> = line.split(SEP).collect();
        if words.len() < 2 || words.iter().any(|w| w.len() < 2) {
            return None;
        }
        let (left, left_mass) = self.left(line);
        let (right, right_mass) = self.right(line);
        Some(EntropyRecord {
            key: line.to_string(),
            left,
            right,
            left_mass,
            right_mass,
        })
    }

    /// Stream one candidate file into one entropy file, skipping rejected
    /// lines. Returns the number of records written.
    pub fn score_file(&self, candidates: &Path, out: &Path) -> io::Result<u64> {
        let input = BufReader::new(File::open(candidates)?);
        let mut output = BufWriter::new(File::create(out)?);
        let mut written = 0u64;
        for line in input.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            if let Some(record) = self.record(&line) {
                writeln!(output, "{}", record.to_line())?;
                written += 1;
            }
        }
        output.flush()?;
        tracing::debug!(
            candidates = %candidates.display(),
            written,
            "entropy records emitted"
        );
        Ok(written)
    }
}

/// Emit entropy records for every candidate file into `out_dir`,
/// preserving base names. Same fan-out and report shape as PMI scoring.
pub fn entropy_files(
    forward: &IndexSet,
    reverse: &IndexSet,
    candidates: &[PathBuf],
    out_dir: &Path,
    workers: usize,
) -> Result<ScoreReport, PipelineError> {
    ensure_dir(out_dir)?;
    let scorer = BoundaryEntropy::new(forward, reverse);

    let pool = worker_pool(candidates.len(), workers)?;
    let results: Vec<(String, io::Result<u64>)> = pool.install(|| {
        candidates
            .par_iter()
            .map(|cand| {
                let shard = shard_name(cand);
                let out = out_dir.join(&shard);
                (shard, scorer.score_file(cand, &out))
            })
            .collect()
    });

    let mut report = ScoreReport::default();
    for (shard, outcome) in results {
        match outcome {
            Ok(written) => report.scored.push((shard, written)),
            Err(e) => {
                tracing::warn!(shard = %shard, error = %e, "entropy scoring failed");
                report.failed.push((shard, e.to_string()));
            }
        }
    }
    tracing::info!(
        scored = report.scored.len(),
        failed = report.failed.len(),
        "entropy finished"
    );
    Ok(report)
}

fn distribution_entropy(set: &IndexSet, key: &str) -> (f64, u64) {
    let branches = set.branch_counts(key);
    let counts: Vec<u64> = branches.into_iter().map(|(_, mass)| mass).collect();
    let mass = counts.iter().sum();
    (shannon_entropy(&counts), mass)
}
