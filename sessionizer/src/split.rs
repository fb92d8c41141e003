//! Positional train/valid/test split and random subsampling.

use rand::seq::SliceRandom;
use rand::Rng;
use session_types::SplitLabel;

use crate::config::SplitRatios;
use crate::error::PipelineError;

/// Borrowed views over a time-sorted session list.
#[derive(Debug, Clone, Copy)]
pub struct Splits<'a, T> {
    pub train: &'a [T],
    pub valid: &'a [T],
    pub test: &'a [T],
}

impl<'a, T> Splits<'a, T> {
    pub fn get(&self, label: SplitLabel) -> &'a [T] {
        match label {
            SplitLabel::Train => self.train,
            SplitLabel::Valid => self.valid,
            SplitLabel::Test => self.test,
        }
    }
}

/// Cut `items` by position: the first `train` fraction, then `valid`, then the rest.
///
/// Boundaries are floored, so the test split absorbs rounding leftovers.
pub fn split_positional<T>(items: &[T], ratios: SplitRatios) -> Splits<'_, T> {
    let n = items.len();
    let train_end = boundary(n, ratios.train);
    let valid_end = boundary(n, ratios.train + ratios.valid).max(train_end);
    Splits {
        train: &items[..train_end],
        valid: &items[train_end..valid_end],
        test: &items[valid_end..],
    }
}

fn boundary(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction).floor() as usize).min(n)
}

/// Draw `n` distinct elements uniformly at random, in random order.
pub fn sample_without_replacement<T: Clone, R: Rng + ?Sized>(
    rng: &mut R,
    items: &[T],
    n: usize,
    label: SplitLabel,
) -> Result<Vec<T>, PipelineError> {
    if n > items.len() {
        return Err(PipelineError::SampleTooLarge {
            split: label,
            requested: n,
            available: items.len(),
        });
    }
    Ok(items.choose_multiple(rng, n).cloned().collect())
}
