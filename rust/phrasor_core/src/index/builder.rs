//! Per-shard index construction from a gram file.
//!
//! Feeding n-grams into a counting trie loses frequency mass for the
//! trailing window positions of each shard: a token that only ever appears
//! in the last `k - 1` positions of the stream never starts a key. The
//! scoring engine's zero-frequency guard accounts for this.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::trie::CountTrie;
use crate::SEP;

use super::error::IndexError;

/// Forward and reverse (rotated-key) tries built from one shard's gram
/// stream in a single pass.
#[derive(Debug, Default)]
pub struct ShardIndexes {
    pub forward: CountTrie,
    pub reverse: CountTrie,
}

/// Ingest statistics for one shard, recorded in the build manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardStats {
    /// Gram lines ingested (including the short trailing record).
    pub lines: u64,
    /// Distinct keys in the forward trie.
    pub distinct: u64,
    /// Total occurrences in the forward trie.
    pub occurrences: u64,
}

/// Build the index pair for one shard by streaming its gram file. Every
/// non-empty line is inserted as-is; the short trailing record contributes
/// prefix mass exactly like any other key.
pub fn build_from_grams(path: &Path) -> Result<(ShardIndexes, ShardStats), IndexError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut indexes = ShardIndexes::default();
    let mut lines = 0u64;
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split(SEP).collect();
        indexes.forward.insert(&tokens);
        let rotated = rotate(&tokens);
        indexes.reverse.insert(&rotated);
        lines += 1;
        if lines % 100_000 == 0 {
            tracing::debug!(grams = lines, file = %path.display(), "ingesting");
        }
    }

    let stats = ShardStats {
        lines,
        distinct: indexes.forward.distinct_keys(),
        occurrences: indexes.forward.occurrences(),
    };
    Ok((indexes, stats))
}

/// Rotate `(t1, …, tn)` to `(t2, …, tn, t1)`.
fn rotate<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    if tokens.len() < 2 {
        return tokens.to_vec();
    }
    let mut out = Vec::with_capacity(tokens.len());
    out.extend_from_slice(&tokens[1..]);
    out.push(tokens[0]);
    out
}
