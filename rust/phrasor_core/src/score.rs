//! Frequency-weighted PMI scoring of candidate n-grams.
//!
//! The score is `log2(P(XY) / (P(X)·P(Y))) * XYFreq`: pointwise mutual
//! information weighted by the raw joint frequency, which favors frequent
//! strongly-associated pairs over rare-but-high-PMI noise. All frequencies
//! are aggregate prefix sums; all probabilities are normalized by the
//! index set's grand total.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::aggregate::IndexSet;
use crate::error::PipelineError;
use crate::prepare::{ensure_dir, shard_name, worker_pool};
use crate::SEP;

/// Inclusive joint-frequency band; candidates outside it are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyBand {
    pub min: u64,
    pub max: u64,
}

impl FrequencyBand {
    /// Bounds used when the filter is enabled without explicit limits.
    pub const DEFAULT: FrequencyBand = FrequencyBand { min: 2, max: 24 };

    pub fn contains(&self, freq: u64) -> bool {
        freq >= self.min && freq <= self.max
    }
}

/// One surviving candidate with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub key: String,
    pub score: f64,
}

impl ScoreRecord {
    /// On-disk line: candidate, tab, score to exactly 2 decimals.
    pub fn to_line(&self) -> String {
        format!("{}\t{:.2}", self.key, self.score)
    }
}

/// PMI scoring engine over a loaded (forward) index set.
pub struct PmiScorer<'a> {
    index: &'a IndexSet,
    band: Option<FrequencyBand>,
}

impl<'a> PmiScorer<'a> {
    pub fn new(index: &'a IndexSet) -> Self {
        PmiScorer { index, band: None }
    }

    /// Enable the joint-frequency band filter.
    pub fn with_band(index: &'a IndexSet, band: FrequencyBand) -> Self {
        PmiScorer {
            index,
            band: Some(band),
        }
    }

    /// Score one candidate line. `None` rejects the candidate, never an
    /// error: malformed line (fewer than two tokens, or a token shorter
    /// than two characters), a head/tail token with no frequency mass
    /// (trailing windows lose tail-token mass by construction), an unseen
    /// joint key, or a joint frequency outside the band.
    pub fn score_line(&self, line: &str) -> Option<ScoreRecord> {
        let words: Vec<&str> = line.split(SEP).collect();
        if words.len() < 2 || words.iter().any(|w| w.len() < 2) {
            return None;
        }

        let x_freq = self.index.prefix_sum(words[0]);
        let y_freq = self.index.prefix_sum(words[1]);
        let xy_freq = self.index.prefix_sum(line);
        if x_freq == 0 || y_freq == 0 || xy_freq == 0 {
            return None;
        }
        if let Some(band) = self.band {
            if !band.contains(xy_freq) {
                return None;
            }
        }

        let total = self.index.grand_total() as f64;
        let px = x_freq as f64 / total;
        let py = y_freq as f64 / total;
        let pxy = xy_freq as f64 / total;
        let score = (pxy / (px * py)).log2() * xy_freq as f64;
        Some(ScoreRecord {
            key: line.to_string(),
            score,
        })
    }

    /// Stream one candidate file into one score file, skipping rejected
    /// candidates. Returns the number of score lines written.
    pub fn score_file(&self, candidates: &Path, scores: &Path) -> io::Result<u64> {
        let input = BufReader::new(File::open(candidates)?);
        let mut output = BufWriter::new(File::create(scores)?);
        let mut written = 0u64;
        for line in input.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            if let Some(record) = self.score_line(&line) {
                writeln!(output, "{}", record.to_line())?;
                written += 1;
            }
        }
        output.flush()?;
        tracing::debug!(
            candidates = %candidates.display(),
            written,
            "score lines emitted"
        );
        Ok(written)
    }
}

/// Outcome of scoring a set of candidate files.
#[derive(Debug, Default)]
pub struct ScoreReport {
    /// (shard, score lines written) per scored candidate file.
    pub scored: Vec<(String, u64)>,
    /// (shard, error) for every candidate file that failed.
    pub failed: Vec<(String, String)>,
}

impl ScoreReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Score every candidate file into `score_dir`, preserving base names.
/// Files fan out over a pool of `min(#files, workers)` threads; the index
/// set's caches are shared across workers.
pub fn score_files(
    index: &IndexSet,
    candidates: &[PathBuf],
    score_dir: &Path,
    band: Option<FrequencyBand>,
    workers: usize,
) -> Result<ScoreReport, PipelineError> {
    ensure_dir(score_dir)?;
    let scorer = match band {
        Some(band) => PmiScorer::with_band(index, band),
        None => PmiScorer::new(index),
    };

    let pool = worker_pool(candidates.len(), workers)?;
    let results: Vec<(String, io::Result<u64>)> = pool.install(|| {
        candidates
            .par_iter()
            .map(|cand| {
                let shard = shard_name(cand);
                let out = score_dir.join(&shard);
                (shard, scorer.score_file(cand, &out))
            })
            .collect()
    });

    let mut report = ScoreReport::default();
    for (shard, outcome) in results {
        match outcome {
            Ok(written) => report.scored.push((shard, written)),
            Err(e) => {
                tracing::warn!(shard = %shard, error = %e, "scoring failed");
                report.failed.push((shard, e.to_string()));
            }
        }
    }
    tracing::info!(
        scored = report.scored.len(),
        failed = report.failed.len(),
        "scoring finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::CountTrie;

    /// A set where prefix_sum("xx") = 10, prefix_sum("yy") = 10,
    /// prefix_sum("xx\tyy") = 5, grand_total = 100.
    fn fixture() -> IndexSet {
        let mut t = CountTrie::new();
        t.insert_count(&["xx", "yy"], 5);
        t.insert_count(&["xx", "zz"], 5);
        t.insert_count(&["yy", "qq"], 10);
        t.insert_count(&["ff", "gg"], 80);
        IndexSet::new(vec![t])
    }

    #[test]
    fn pmi_matches_the_worked_example() {
        let set = fixture();
        let scorer = PmiScorer::new(&set);
        let record = scorer.score_line("xx\tyy").expect("candidate survives");
        // log2((5/100) / ((10/100)*(10/100))) * 5 = log2(5) * 5
        let expected = 5f64.log2() * 5.0;
        assert!((record.score - expected).abs() < 1e-12);
        assert_eq!(record.to_line(), "xx\tyy\t11.61");
    }

    #[test]
    fn short_tokens_and_short_lines_are_rejected() {
        let set = fixture();
        let scorer = PmiScorer::new(&set);
        assert!(scorer.score_line("xx").is_none());
        assert!(scorer.score_line("x\tyy").is_none());
        assert!(scorer.score_line("xx\ty").is_none());
    }

    #[test]
    fn zero_frequency_heads_and_tails_are_rejected() {
        let set = fixture();
        let scorer = PmiScorer::new(&set);
        // "qq" never starts a key: its mass was lost to the trailing
        // position, exactly the case the guard exists for.
        assert!(scorer.score_line("qq\txx").is_none());
        assert!(scorer.score_line("absent\txx").is_none());
    }

    #[test]
    fn unseen_joint_key_is_rejected() {
        let set = fixture();
        let scorer = PmiScorer::new(&set);
        // Both halves exist, the pair was never observed.
        assert!(scorer.score_line("xx\tff").is_none());
    }

    #[test]
    fn band_filter_drops_out_of_band_candidates() {
        let set = fixture();
        let banded = PmiScorer::with_band(&set, FrequencyBand { min: 2, max: 4 });
        // xy_freq = 5 > 4.
        assert!(banded.score_line("xx\tyy").is_none());

        let wide = PmiScorer::with_band(&set, FrequencyBand::DEFAULT);
        assert!(wide.score_line("xx\tyy").is_some());
    }

    #[test]
    fn default_band_bounds() {
        assert!(FrequencyBand::DEFAULT.contains(2));
        assert!(FrequencyBand::DEFAULT.contains(24));
        assert!(!FrequencyBand::DEFAULT.contains(1));
        assert!(!FrequencyBand::DEFAULT.contains(25));
    }

    #[test]
    fn score_file_streams_and_skips() {
        use std::io::Write as _;
        let dir = tempfile::TempDir::new().unwrap();
        let cand = dir.path().join("cand.txt");
        let out = dir.path().join("scores.txt");
        let mut f = File::create(&cand).unwrap();
        writeln!(f, "xx\tyy").unwrap();
        writeln!(f, "x\tyy").unwrap();
        writeln!(f, "absent\tpair").unwrap();
        drop(f);

        let set = fixture();
        let scorer = PmiScorer::new(&set);
        let written = scorer.score_file(&cand, &out).unwrap();
        assert_eq!(written, 1);
        let content = std::fs::read_to_string(&out).unwrap();
        assert_eq!(content, "xx\tyy\t11.61\n");
    }

    #[test]
    fn score_files_reports_per_shard_outcomes() {
        use std::io::Write as _;
        let dir = tempfile::TempDir::new().unwrap();
        let score_dir = dir.path().join("scores");
        std::fs::create_dir_all(&score_dir).unwrap();
        let cand = dir.path().join("cand.txt");
        let mut f = File::create(&cand).unwrap();
        writeln!(f, "xx\tyy").unwrap();
        drop(f);

        let set = fixture();
        let report = score_files(
            &set,
            &[cand, PathBuf::from("/no/such/cand.txt")],
            &score_dir,
            None,
            4,
        )
        .unwrap();
        assert_eq!(report.scored, vec![("cand.txt".to_string(), 1)]);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_complete());
        assert!(score_dir.join("cand.txt").is_file());
    }
}
