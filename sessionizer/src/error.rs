use thiserror::Error;

use session_types::SplitLabel;

/// Fatal data-integrity and configuration failures raised by the pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{path}:{line}: {reason}")]
    MalformedRecord {
        path: String,
        line: usize,
        reason: String,
    },
    #[error("timestamp {0} is outside the representable date range")]
    TimestampOutOfRange(i64),
    #[error("no title for item '{0}'")]
    MissingTitle(String),
    #[error("candidate pool has {available} items, need {needed} negatives")]
    InsufficientCandidates { needed: usize, available: usize },
    #[error("cannot sample {requested} sessions from {split} split of {available}")]
    SampleTooLarge {
        split: SplitLabel,
        requested: usize,
        available: usize,
    },
    #[error("item '{0}' is not in the item mapping")]
    UnmappedItem(String),
    #[error("configuration error: {0}")]
    InvalidConfig(String),
}
