//! phrasor — unsupervised phrase discovery over text corpora.
//!
//! # Usage
//!
//! ```bash
//! # One-shot pipeline over a directory of raw text files
//! phrasor run --input ./data/sources --grams ./data/grams \
//!   --candidates ./data/candidates --index ./data/index \
//!   --scores ./data/scores
//!
//! # Phase by phase
//! phrasor prepare --input './data/sources/*.txt' \
//!   --grams ./data/grams --candidates ./data/candidates
//! phrasor build --grams ./data/grams --index ./data/index
//! phrasor score --candidates ./data/candidates --index ./data/index \
//!   --scores ./data/scores --min-freq 2 --max-freq 24
//! phrasor entropy --candidates ./data/candidates --index ./data/index \
//!   --out ./data/entropy
//! ```
//!
//! All output directories must exist before a phase runs. `RUST_LOG`
//! controls log verbosity (e.g. `RUST_LOG=phrasor_core=debug`).

mod discover;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use phrasor_core::prepare::DEFAULT_WORKERS;
use phrasor_core::{
    build_shards, entropy_files, prepare_shards, score_files, BuildOptions, Direction,
    FrequencyBand, IndexSet, Manifest, PipelineError, PrepareOptions,
};

use discover::discover;

#[derive(Parser)]
#[command(
    name = "phrasor",
    version,
    about = "Discover significant multi-word phrases with PMI and boundary entropy"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate gram and candidate files from raw text
    Prepare(PrepareArgs),
    /// Build and persist one index pair per gram file
    Build(BuildArgs),
    /// Score candidate pairs with frequency-weighted PMI
    Score(ScoreArgs),
    /// Emit left/right boundary entropy for candidates
    Entropy(EntropyArgs),
    /// Prepare, build, and score in one go
    Run(RunArgs),
}

#[derive(Args)]
struct WorkerArgs {
    /// Worker-pool cap; the pool is sized min(#shards, workers)
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,
}

#[derive(Args)]
struct BandArgs {
    /// Reject candidates with joint frequency below this bound
    #[arg(long)]
    min_freq: Option<u64>,
    /// Reject candidates with joint frequency above this bound
    #[arg(long)]
    max_freq: Option<u64>,
}

impl BandArgs {
    fn band(&self) -> Option<FrequencyBand> {
        if self.min_freq.is_none() && self.max_freq.is_none() {
            return None;
        }
        Some(FrequencyBand {
            min: self.min_freq.unwrap_or(FrequencyBand::DEFAULT.min),
            max: self.max_freq.unwrap_or(FrequencyBand::DEFAULT.max),
        })
    }
}

#[derive(Args)]
struct PrepareArgs {
    /// Raw text input: file, directory, or glob pattern
    #[arg(long, env = "PHRASOR_INPUT")]
    input: String,
    /// Output directory for gram files (must exist)
    #[arg(long)]
    grams: PathBuf,
    /// Output directory for candidate files (must exist)
    #[arg(long)]
    candidates: PathBuf,
    /// n-gram width for the index
    #[arg(long, default_value_t = 3)]
    gram_width: usize,
    /// Window width for scoring candidates
    #[arg(long, default_value_t = 2)]
    candidate_width: usize,
    /// Keep words containing character runs longer than two
    #[arg(long)]
    relaxed: bool,
    #[command(flatten)]
    workers: WorkerArgs,
}

#[derive(Args)]
struct BuildArgs {
    /// Gram files: file, directory, or glob pattern
    #[arg(long)]
    grams: String,
    /// Index output directory (must exist)
    #[arg(long)]
    index: PathBuf,
    /// Skip shards already recorded in the manifest
    #[arg(long)]
    resume: bool,
    #[command(flatten)]
    workers: WorkerArgs,
}

#[derive(Args)]
struct ScoreArgs {
    /// Candidate files: file, directory, or glob pattern
    #[arg(long)]
    candidates: String,
    /// Index directory holding the persisted shards and manifest.json
    #[arg(long)]
    index: PathBuf,
    /// Output directory for score files (must exist)
    #[arg(long)]
    scores: PathBuf,
    #[command(flatten)]
    band: BandArgs,
    #[command(flatten)]
    workers: WorkerArgs,
}

#[derive(Args)]
struct EntropyArgs {
    /// Candidate files: file, directory, or glob pattern
    #[arg(long)]
    candidates: String,
    /// Index directory holding the persisted shards and manifest.json
    #[arg(long)]
    index: PathBuf,
    /// Output directory for entropy files (must exist)
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    workers: WorkerArgs,
}

#[derive(Args)]
struct RunArgs {
    /// Raw text input: file, directory, or glob pattern
    #[arg(long, env = "PHRASOR_INPUT")]
    input: String,
    /// Output directory for gram files (must exist)
    #[arg(long)]
    grams: PathBuf,
    /// Output directory for candidate files (must exist)
    #[arg(long)]
    candidates: PathBuf,
    /// Index output directory (must exist)
    #[arg(long)]
    index: PathBuf,
    /// Output directory for score files (must exist)
    #[arg(long)]
    scores: PathBuf,
    /// n-gram width for the index
    #[arg(long, default_value_t = 3)]
    gram_width: usize,
    /// Window width for scoring candidates
    #[arg(long, default_value_t = 2)]
    candidate_width: usize,
    /// Keep words containing character runs longer than two
    #[arg(long)]
    relaxed: bool,
    #[command(flatten)]
    band: BandArgs,
    #[command(flatten)]
    workers: WorkerArgs,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli.command) {
        error!("{e}");
        process::exit(1);
    }
}

fn dispatch(command: Command) -> Result<(), PipelineError> {
    match command {
        Command::Prepare(args) => cmd_prepare(&args),
        Command::Build(args) => cmd_build(&args),
        Command::Score(args) => cmd_score(&args),
        Command::Entropy(args) => cmd_entropy(&args),
        Command::Run(args) => cmd_run(&args),
    }
}

fn cmd_prepare(args: &PrepareArgs) -> Result<(), PipelineError> {
    let sources = discover(&args.input)?;
    info!(shards = sources.len(), "preparing");
    let opts = PrepareOptions {
        gram_width: args.gram_width,
        candidate_width: args.candidate_width,
        workers: args.workers.workers,
        strict: !args.relaxed,
    };
    let report = prepare_shards(&sources, &args.grams, &args.candidates, &opts)?;
    finish(report.failed.len(), sources.len())
}

fn cmd_build(args: &BuildArgs) -> Result<(), PipelineError> {
    let grams = discover(&args.grams)?;
    info!(shards = grams.len(), "building indexes");
    let opts = BuildOptions {
        workers: args.workers.workers,
        resume: args.resume,
    };
    let report = build_shards(&grams, &args.index, &opts)?;
    finish(report.failed.len(), grams.len())
}

fn cmd_score(args: &ScoreArgs) -> Result<(), PipelineError> {
    let candidates = discover(&args.candidates)?;
    let manifest = Manifest::load(&args.index)?;
    let shards = manifest.shard_names();
    info!(
        shards = shards.len(),
        candidates = candidates.len(),
        "scoring"
    );
    let index = IndexSet::load(&args.index, &shards, Direction::Forward)?;
    let report = score_files(
        &index,
        &candidates,
        &args.scores,
        args.band.band(),
        args.workers.workers,
    )?;
    finish(report.failed.len(), candidates.len())
}

fn cmd_entropy(args: &EntropyArgs) -> Result<(), PipelineError> {
    let candidates = discover(&args.candidates)?;
    let manifest = Manifest::load(&args.index)?;
    let shards = manifest.shard_names();
    info!(
        shards = shards.len(),
        candidates = candidates.len(),
        "entropy"
    );
    let forward = IndexSet::load(&args.index, &shards, Direction::Forward)?;
    let reverse = IndexSet::load(&args.index, &shards, Direction::Reverse)?;
    let report = entropy_files(
        &forward,
        &reverse,
        &candidates,
        &args.out,
        args.workers.workers,
    )?;
    finish(report.failed.len(), candidates.len())
}

fn cmd_run(args: &RunArgs) -> Result<(), PipelineError> {
    let sources = discover(&args.input)?;
    info!(shards = sources.len(), "running full pipeline");

    let opts = PrepareOptions {
        gram_width: args.gram_width,
        candidate_width: args.candidate_width,
        workers: args.workers.workers,
        strict: !args.relaxed,
    };
    let prep = prepare_shards(&sources, &args.grams, &args.candidates, &opts)?;

    let gram_files: Vec<PathBuf> = prep.prepared.iter().map(|n| args.grams.join(n)).collect();
    let build = build_shards(
        &gram_files,
        &args.index,
        &BuildOptions {
            workers: args.workers.workers,
            resume: false,
        },
    )?;

    let manifest = Manifest::load(&args.index)?;
    let index = IndexSet::load(&args.index, &manifest.shard_names(), Direction::Forward)?;
    let candidate_files: Vec<PathBuf> = prep
        .prepared
        .iter()
        .map(|n| args.candidates.join(n))
        .collect();
    let score = score_files(
        &index,
        &candidate_files,
        &args.scores,
        args.band.band(),
        args.workers.workers,
    )?;

    let failed = prep.failed.len() + build.failed.len() + score.failed.len();
    finish(failed, sources.len())
}

fn finish(failed: usize, total: usize) -> Result<(), PipelineError> {
    if failed == 0 {
        Ok(())
    } else {
        Err(PipelineError::Partial { failed, total })
    }
}
