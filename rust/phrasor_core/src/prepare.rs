//! Gram and candidate file generation, one task per source shard.
//!
//! Each source file is tokenized once; the same cleaned token stream feeds
//! two window emitters (gram width and candidate width), writing one gram
//! file and one candidate file that preserve the source base name. Shards
//! are independent: no token-window state crosses file boundaries.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::PipelineError;
use crate::join_tokens;
use crate::token::Tokenizer;
use crate::window::WindowEmitter;

/// Default worker-pool cap.
pub const DEFAULT_WORKERS: usize = 20;

#[derive(Debug, Clone)]
pub struct PrepareOptions {
    /// Width of index grams.
    pub gram_width: usize,
    /// Width of scoring candidates; independent of `gram_width`.
    pub candidate_width: usize,
    /// Worker-pool cap; the pool is sized `min(#shards, workers)`.
    pub workers: usize,
    /// Strict token rules (reject in-word character runs longer than two).
    pub strict: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        PrepareOptions {
            gram_width: 3,
            candidate_width: 2,
            workers: DEFAULT_WORKERS,
            strict: true,
        }
    }
}

/// Outcome of one prepare run. A failed shard never aborts its siblings.
#[derive(Debug, Default)]
pub struct PrepareReport {
    /// Shard base names whose gram and candidate files were written.
    pub prepared: Vec<String>,
    /// (shard, error) for every shard that failed.
    pub failed: Vec<(String, String)>,
}

impl PrepareReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Tokenize every source file and write its gram and candidate files into
/// the given directories (which must already exist). One task per shard on
/// a pool of `min(#shards, workers)` threads.
pub fn prepare_shards(
    sources: &[PathBuf],
    gram_dir: &Path,
    candidate_dir: &Path,
    opts: &PrepareOptions,
) -> Result<PrepareReport, PipelineError> {
    ensure_dir(gram_dir)?;
    ensure_dir(candidate_dir)?;

    let pool = worker_pool(sources.len(), opts.workers)?;
    let results: Vec<(String, io::Result<()>)> = pool.install(|| {
        sources
            .par_iter()
            .map(|src| {
                let shard = shard_name(src);
                let outcome = prepare_one(src, gram_dir, candidate_dir, opts);
                (shard, outcome)
            })
            .collect()
    });

    let mut report = PrepareReport::default();
    for (shard, outcome) in results {
        match outcome {
            Ok(()) => report.prepared.push(shard),
            Err(e) => {
                tracing::warn!(shard = %shard, error = %e, "prepare failed");
                report.failed.push((shard, e.to_string()));
            }
        }
    }
    tracing::info!(
        prepared = report.prepared.len(),
        failed = report.failed.len(),
        "prepare finished"
    );
    Ok(report)
}

fn prepare_one(
    src: &Path,
    gram_dir: &Path,
    candidate_dir: &Path,
    opts: &PrepareOptions,
) -> io::Result<()> {
    let name = shard_name(src);
    let input = BufReader::new(File::open(src)?);
    let mut gram_out = BufWriter::new(File::create(gram_dir.join(&name))?);
    let mut cand_out = BufWriter::new(File::create(candidate_dir.join(&name))?);

    let tokenizer = if opts.strict {
        Tokenizer::strict()
    } else {
        Tokenizer::relaxed()
    };
    let mut grams = WindowEmitter::new(opts.gram_width);
    let mut cands = WindowEmitter::new(opts.candidate_width);

    for line in input.lines() {
        let line = line?;
        let tokens = tokenizer.tokenize(&line);
        grams.advance(tokens.clone(), |w| writeln!(gram_out, "{}", join_tokens(w)))?;
        cands.advance(tokens, |w| writeln!(cand_out, "{}", join_tokens(w)))?;
    }
    grams.flush(|w| writeln!(gram_out, "{}", join_tokens(w)))?;
    cands.flush(|w| writeln!(cand_out, "{}", join_tokens(w)))?;
    gram_out.flush()?;
    cand_out.flush()?;
    Ok(())
}

/// Base name used to key a shard's outputs to its source file.
pub(crate) fn shard_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Fail fast when an output directory is missing (precondition, checked
/// before any processing).
pub(crate) fn ensure_dir(dir: &Path) -> Result<(), PipelineError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(PipelineError::MissingOutputDir(dir.to_path_buf()))
    }
}

/// Build a pool of `min(shards, cap)` threads, at least one.
pub(crate) fn worker_pool(shards: usize, cap: usize) -> Result<rayon::ThreadPool, PipelineError> {
    let threads = shards.min(cap).max(1);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| PipelineError::Pool(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup(sources: &[(&str, &str)]) -> (tempfile::TempDir, Vec<PathBuf>, PathBuf, PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let src_dir = dir.path().join("sources");
        let gram_dir = dir.path().join("grams");
        let cand_dir = dir.path().join("candidates");
        fs::create_dir_all(&src_dir).unwrap();
        fs::create_dir_all(&gram_dir).unwrap();
        fs::create_dir_all(&cand_dir).unwrap();
        let mut paths = Vec::new();
        for (name, content) in sources {
            let p = src_dir.join(name);
            fs::write(&p, content).unwrap();
            paths.push(p);
        }
        (dir, paths, gram_dir, cand_dir)
    }

    #[test]
    fn writes_gram_and_candidate_files_per_shard() {
        let (_dir, sources, gram_dir, cand_dir) =
            setup(&[("one.txt", "the quick brown fox jumps\n")]);
        let report =
            prepare_shards(&sources, &gram_dir, &cand_dir, &PrepareOptions::default()).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.prepared, vec!["one.txt".to_string()]);

        let grams = fs::read_to_string(gram_dir.join("one.txt")).unwrap();
        assert_eq!(
            grams,
            "the\tquick\tbrown\nquick\tbrown\tfox\nbrown\tfox\tjumps\nfox\tjumps\n"
        );
        let cands = fs::read_to_string(cand_dir.join("one.txt")).unwrap();
        assert_eq!(
            cands,
            "the\tquick\nquick\tbrown\nbrown\tfox\nfox\tjumps\njumps\n"
        );
    }

    #[test]
    fn windows_span_source_lines() {
        let (_dir, sources, gram_dir, cand_dir) =
            setup(&[("two.txt", "alpha beta\ngamma delta\n")]);
        prepare_shards(&sources, &gram_dir, &cand_dir, &PrepareOptions::default()).unwrap();
        let grams = fs::read_to_string(gram_dir.join("two.txt")).unwrap();
        assert_eq!(
            grams,
            "alpha\tbeta\tgamma\nbeta\tgamma\tdelta\ngamma\tdelta\n"
        );
    }

    #[test]
    fn failed_shard_is_reported_not_fatal() {
        let (_dir, mut sources, gram_dir, cand_dir) = setup(&[("ok.txt", "alpha beta gamma\n")]);
        sources.push(PathBuf::from("/no/such/source.txt"));
        let report =
            prepare_shards(&sources, &gram_dir, &cand_dir, &PrepareOptions::default()).unwrap();
        assert_eq!(report.prepared, vec!["ok.txt".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "source.txt");
        assert!(!report.is_complete());
    }

    #[test]
    fn missing_output_dir_fails_fast() {
        let (_dir, sources, gram_dir, _cand) = setup(&[("a.txt", "alpha beta\n")]);
        let err = prepare_shards(
            &sources,
            &gram_dir,
            Path::new("/no/such/dir"),
            &PrepareOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::MissingOutputDir(_)));
    }

    #[test]
    fn tokenizer_filters_apply_before_windowing() {
        let (_dir, sources, gram_dir, cand_dir) =
            setup(&[("f.txt", "The 123 a1b aaaa Quick-Fox\n")]);
        prepare_shards(&sources, &gram_dir, &cand_dir, &PrepareOptions::default()).unwrap();
        // Survivors: "the", "quick", "fox".
        let grams = fs::read_to_string(gram_dir.join("f.txt")).unwrap();
        assert_eq!(grams, "the\tquick\tfox\n");
    }

    #[test]
    fn pool_size_is_bounded_by_shards_and_cap() {
        assert_eq!(worker_pool(5, 20).unwrap().current_num_threads(), 5);
        assert_eq!(worker_pool(40, 4).unwrap().current_num_threads(), 4);
        assert_eq!(worker_pool(0, 4).unwrap().current_num_threads(), 1);
    }
}
