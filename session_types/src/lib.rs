use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ── Raw input records ───────────────────────────────────────────────────

/// One review event, as read from the ratings log.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub user_id: String,
    pub item_id: String,
    /// Unix seconds.
    pub timestamp: i64,
}

/// UTC calendar day of a Unix-seconds timestamp, if representable.
pub fn utc_day(timestamp: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ItemTitle {
    pub item_id: String,
    pub title: String,
}

// ── Derived records ─────────────────────────────────────────────────────

/// A bounded, time-ordered run of one user's items.
///
/// `I` is the item id type: original string ids before reindexing, dense
/// `u32` indices after.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Session<I = String> {
    pub session: Vec<I>,
    /// Timestamp of the last interaction in the session.
    pub time: i64,
}

impl<I> Session<I> {
    pub fn len(&self) -> usize {
        self.session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.session.is_empty()
    }

    /// Every item except the last one.
    pub fn history(&self) -> &[I] {
        match self.session.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    /// The item the model is asked to predict.
    pub fn target(&self) -> Option<&I> {
        self.session.last()
    }
}

/// One text example for the language-model recommender.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PromptRecord {
    pub input: String,
    pub target: String,
    /// 1-based position of the target inside the candidate list.
    pub target_index: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SplitLabel {
    Train,
    Valid,
    Test,
}

impl SplitLabel {
    pub const ALL: [SplitLabel; 3] = [SplitLabel::Train, SplitLabel::Valid, SplitLabel::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            SplitLabel::Train => "train",
            SplitLabel::Valid => "valid",
            SplitLabel::Test => "test",
        }
    }
}

impl std::fmt::Display for SplitLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Raw line schemas ────────────────────────────────────────────────────

/// Validate one ratings-log line and turn it into an `Interaction`.
///
/// Expected fields: `reviewerID` (string), `asin` (string),
/// `unixReviewTime` (integer seconds). Anything else on the line is ignored.
pub fn parse_rating_value(value: &serde_json::Value) -> Result<Interaction> {
    let obj = value
        .as_object()
        .context("rating entry must be a JSON object")?;

    let user_id = ensure_string(obj, "reviewerID")?;
    let item_id = ensure_string(obj, "asin")?;
    let timestamp = obj
        .get("unixReviewTime")
        .and_then(|v| v.as_i64())
        .context("unixReviewTime missing or not an integer")?;

    Ok(Interaction {
        user_id: user_id.to_string(),
        item_id: item_id.to_string(),
        timestamp,
    })
}

/// Validate one metadata line and turn it into an `ItemTitle` (title uncleaned).
pub fn parse_meta_value(value: &serde_json::Value) -> Result<ItemTitle> {
    let obj = value
        .as_object()
        .context("metadata entry must be a JSON object")?;

    let item_id = ensure_string(obj, "asin")?;
    let title = obj
        .get("title")
        .and_then(|v| v.as_str())
        .context("title missing or not a string")?;

    Ok(ItemTitle {
        item_id: item_id.to_string(),
        title: title.to_string(),
    })
}

fn ensure_string<'a>(
    map: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<&'a str> {
    map.get(key)
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("{key} missing or not a non-empty string"))
}
