use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use sessionizer::config::{BuildConfig, parse_seed_list};
use sessionizer::pipeline;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "session-builder",
    about = "Build session-based train/valid/test datasets and LLM prompts from review logs"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full build and write every artifact to the output directory.
    Build(BuildArgs),

    /// Load and segment the logs, then print dataset statistics without writing anything.
    Stats(BuildArgs),
}

/// Overrides applied on top of `SESSIONIZER_*` environment settings.
#[derive(Args, Debug, Default)]
struct BuildArgs {
    /// Ratings log (gzip or plain JSON lines).
    #[arg(long)]
    ratings: Option<PathBuf>,

    /// Item metadata log (gzip or plain JSON lines).
    #[arg(long)]
    meta: Option<PathBuf>,

    /// Output directory; replaced atomically on success.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dataset tag used in artifact file names (e.g. games).
    #[arg(long)]
    dataset: Option<String>,

    /// Maximum session length; longer same-day runs are windowed.
    #[arg(long)]
    window_size: Option<usize>,

    /// Candidate list size for prompts (target plus negatives).
    #[arg(long)]
    candidate_size: Option<usize>,

    /// Number of train sessions to sample.
    #[arg(long)]
    train_sample: Option<usize>,

    /// Number of valid and test sessions to sample.
    #[arg(long)]
    eval_sample: Option<usize>,

    /// Number of valid prompts kept in the smaller valid prompt file.
    #[arg(long)]
    valid_subsample: Option<usize>,

    /// Seed for the main sampling pass.
    #[arg(long)]
    seed: Option<u64>,

    /// Comma-separated seeds, one test prompt set each (e.g. 0,10,42).
    #[arg(long)]
    eval_seeds: Option<String>,
}

impl BuildArgs {
    fn into_config(self) -> Result<BuildConfig> {
        let mut config = BuildConfig::from_env()?;
        if let Some(path) = self.ratings {
            config.ratings_path = path;
        }
        if let Some(path) = self.meta {
            config.meta_path = path;
        }
        if let Some(path) = self.output {
            config.output_dir = path;
        }
        if let Some(dataset) = self.dataset {
            config.dataset = dataset;
        }
        if let Some(n) = self.window_size {
            config.window_size = n;
        }
        if let Some(n) = self.candidate_size {
            config.candidate_size = n;
        }
        if let Some(n) = self.train_sample {
            config.train_sample_n = n;
        }
        if let Some(n) = self.eval_sample {
            config.eval_sample_n = n;
        }
        if let Some(n) = self.valid_subsample {
            config.valid_prompt_subsample_n = n;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(raw) = self.eval_seeds {
            config.eval_seeds = parse_seed_list(&raw)?;
        }
        config.validate()?;
        Ok(config)
    }
}

pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => run_build(BuildArgs::default()),
        Some(Commands::Build(args)) => run_build(args),
        Some(Commands::Stats(args)) => run_stats(args),
    }
}

fn run_build(args: BuildArgs) -> Result<()> {
    let config = args.into_config()?;
    tracing::info!(
        ratings = %config.ratings_path.display(),
        meta = %config.meta_path.display(),
        output = %config.output_dir.display(),
        "starting build"
    );

    let summary = pipeline::build(&config)?;
    println!(
        "Build complete: items={} sessions={} train={} valid={} test={} artifacts={} -> {}",
        summary.items,
        summary.sessions,
        summary.splits.train,
        summary.splits.valid,
        summary.splits.test,
        summary.artifacts,
        summary.output_dir.display(),
    );
    Ok(())
}

fn run_stats(args: BuildArgs) -> Result<()> {
    let config = args.into_config()?;
    let prepared = pipeline::prepare(&config)?;
    let sizes = pipeline::split_sizes(&prepared, &config);
    let stats = &prepared.segment_stats;

    println!(
        "interactions={} users={} users_skipped={} items={}",
        prepared.interactions,
        stats.users,
        prepared.users_skipped,
        prepared.mapping.len(),
    );
    println!(
        "day_groups={} single_event_days={} windowed_days={} sessions={}",
        stats.day_groups, stats.single_event_days, stats.windowed_days, stats.sessions,
    );
    println!(
        "train={} valid={} test={}",
        sizes.train, sizes.valid, sizes.test
    );
    for (len, count) in pipeline::length_histogram(&prepared.sessions) {
        println!("  len {len:>3}: {count}");
    }
    Ok(())
}
