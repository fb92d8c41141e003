use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

// ── Default path constants ──────────────────────────────────────────────

/// Ratings log relative to the working directory.
const DEFAULT_RATINGS_REL: &str = "raw_data/Video_Games_5.json.gz";

/// Item metadata log relative to the working directory.
const DEFAULT_META_REL: &str = "raw_data/meta_Video_Games.json.gz";

/// Output root relative to the working directory.
const DEFAULT_OUTPUT_REL: &str = "final_dataset";

const DEFAULT_DATASET: &str = "games";

// ── Default sizes and seeds ─────────────────────────────────────────────

pub const DEFAULT_WINDOW_SIZE: usize = 10;
pub const DEFAULT_CANDIDATE_SIZE: usize = 20;
const DEFAULT_TRAIN_SAMPLE: usize = 150;
const DEFAULT_EVAL_SAMPLE: usize = 1000;
const DEFAULT_VALID_PROMPT_SUBSAMPLE: usize = 100;
const DEFAULT_SEED: u64 = 42;
const DEFAULT_EVAL_SEEDS: [u64; 5] = [0, 10, 42, 625, 2023];

/// Days with fewer events than this never produce a session.
pub const MIN_EVENTS_PER_DAY: usize = 2;

// ── Split ratios ────────────────────────────────────────────────────────

/// Positional train/valid/test fractions over the time-sorted session list.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct SplitRatios {
    pub train: f64,
    pub valid: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.8,
            valid: 0.1,
            test: 0.1,
        }
    }
}

impl SplitRatios {
    /// Validate that ratios are non-negative and sum to `1.0` (within epsilon).
    pub fn normalized(self) -> Result<Self, PipelineError> {
        if self.train < 0.0 || self.valid < 0.0 || self.test < 0.0 {
            return Err(PipelineError::InvalidConfig(
                "split ratios must be non-negative".to_string(),
            ));
        }
        let sum = self.train + self.valid + self.test;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(PipelineError::InvalidConfig(
                "split ratios must sum to 1.0".to_string(),
            ));
        }
        Ok(self)
    }
}

// ── Config struct ───────────────────────────────────────────────────────

#[derive(Clone, Debug, serde::Serialize)]
pub struct BuildConfig {
    pub ratings_path: PathBuf,
    pub meta_path: PathBuf,
    pub output_dir: PathBuf,
    /// Short dataset tag used in artifact file names.
    pub dataset: String,
    pub window_size: usize,
    pub candidate_size: usize,
    pub train_sample_n: usize,
    pub eval_sample_n: usize,
    pub valid_prompt_subsample_n: usize,
    pub split_ratios: SplitRatios,
    /// Seed for the main split/sampling pass.
    pub seed: u64,
    /// One test prompt set is generated per seed.
    pub eval_seeds: Vec<u64>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            ratings_path: PathBuf::from(DEFAULT_RATINGS_REL),
            meta_path: PathBuf::from(DEFAULT_META_REL),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_REL),
            dataset: DEFAULT_DATASET.to_string(),
            window_size: DEFAULT_WINDOW_SIZE,
            candidate_size: DEFAULT_CANDIDATE_SIZE,
            train_sample_n: DEFAULT_TRAIN_SAMPLE,
            eval_sample_n: DEFAULT_EVAL_SAMPLE,
            valid_prompt_subsample_n: DEFAULT_VALID_PROMPT_SUBSAMPLE,
            split_ratios: SplitRatios::default(),
            seed: DEFAULT_SEED,
            eval_seeds: DEFAULT_EVAL_SEEDS.to_vec(),
        }
    }
}

impl BuildConfig {
    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir().context("could not resolve home directory")?;
        Ok(Self::from_lookup(|key| env::var(key).ok(), &home)?)
    }

    /// Build a config from `SESSIONIZER_*` values returned by `lookup`.
    /// Unset or blank keys keep their defaults; unparsable values are errors.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        home: &Path,
    ) -> Result<Self, PipelineError> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            ratings_path: var("SESSIONIZER_RATINGS_PATH")
                .map(|v| expand_tilde(&v, home))
                .unwrap_or(defaults.ratings_path),
            meta_path: var("SESSIONIZER_META_PATH")
                .map(|v| expand_tilde(&v, home))
                .unwrap_or(defaults.meta_path),
            output_dir: var("SESSIONIZER_OUTPUT_DIR")
                .map(|v| expand_tilde(&v, home))
                .unwrap_or(defaults.output_dir),
            dataset: var("SESSIONIZER_DATASET")
                .map(|v| v.trim().to_string())
                .unwrap_or(defaults.dataset),
            window_size: parse_var("SESSIONIZER_WINDOW_SIZE", var("SESSIONIZER_WINDOW_SIZE"))?
                .unwrap_or(defaults.window_size),
            candidate_size: parse_var(
                "SESSIONIZER_CANDIDATE_SIZE",
                var("SESSIONIZER_CANDIDATE_SIZE"),
            )?
            .unwrap_or(defaults.candidate_size),
            train_sample_n: parse_var("SESSIONIZER_TRAIN_SAMPLE", var("SESSIONIZER_TRAIN_SAMPLE"))?
                .unwrap_or(defaults.train_sample_n),
            eval_sample_n: parse_var("SESSIONIZER_EVAL_SAMPLE", var("SESSIONIZER_EVAL_SAMPLE"))?
                .unwrap_or(defaults.eval_sample_n),
            valid_prompt_subsample_n: parse_var(
                "SESSIONIZER_VALID_PROMPT_SUBSAMPLE",
                var("SESSIONIZER_VALID_PROMPT_SUBSAMPLE"),
            )?
            .unwrap_or(defaults.valid_prompt_subsample_n),
            split_ratios: defaults.split_ratios,
            seed: parse_var("SESSIONIZER_SEED", var("SESSIONIZER_SEED"))?.unwrap_or(defaults.seed),
            eval_seeds: match var("SESSIONIZER_EVAL_SEEDS") {
                Some(raw) => parse_seed_list(&raw)?,
                None => defaults.eval_seeds,
            },
        })
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.window_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "window_size must be at least 1".to_string(),
            ));
        }
        if self.candidate_size < 2 {
            return Err(PipelineError::InvalidConfig(
                "candidate_size must be at least 2".to_string(),
            ));
        }
        if self.valid_prompt_subsample_n > self.eval_sample_n {
            return Err(PipelineError::InvalidConfig(format!(
                "valid prompt subsample ({}) cannot exceed eval sample ({})",
                self.valid_prompt_subsample_n, self.eval_sample_n
            )));
        }
        if self.eval_seeds.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one evaluation seed is required".to_string(),
            ));
        }
        if self.dataset.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "dataset tag must not be empty".to_string(),
            ));
        }
        self.split_ratios.normalized()?;
        Ok(())
    }
}

/// Parse a comma-separated seed list such as `0,10,42`.
pub fn parse_seed_list(raw: &str) -> Result<Vec<u64>, PipelineError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|e| PipelineError::InvalidConfig(format!("invalid seed '{s}': {e}")))
        })
        .collect()
}

fn parse_var<T>(key: &str, value: Option<String>) -> Result<Option<T>, PipelineError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                PipelineError::InvalidConfig(format!("invalid {key} value '{raw}': {e}"))
            })
        })
        .transpose()
}

pub fn expand_tilde(input: &str, home: &Path) -> PathBuf {
    if let Some(rest) = input.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(input)
}
