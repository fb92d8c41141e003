//! Turns review logs into session-based recommendation datasets.
//!
//! Stages run in order: [`ingest`] and [`clean`] load the two logs,
//! [`segment`] cuts per-user sessions, [`reindex`] and [`split`] assign dense
//! ids and partitions, [`candidates`] and [`prompt`] build evaluation
//! prompts, and [`output`] stages the artifacts. [`pipeline`] wires them up.

pub mod candidates;
pub mod clean;
pub mod config;
pub mod error;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod reindex;
pub mod segment;
pub mod split;

pub use config::{BuildConfig, SplitRatios};
pub use error::PipelineError;
pub use pipeline::{BuildSummary, PreparedDataset, build, prepare};
