//! Negative sampling for evaluation candidate sets.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::error::PipelineError;

/// Build a candidate list of exactly `candidate_size` ids: the target at a
/// uniformly random position plus `candidate_size - 1` distinct negatives
/// drawn from `universe` minus (`history` ∪ {`target`}).
///
/// `universe` must be in a fixed order for the draw to be reproducible from
/// the RNG seed.
pub fn build_candidate_set<R: Rng + ?Sized>(
    rng: &mut R,
    history: &[String],
    target: &str,
    universe: &[String],
    candidate_size: usize,
) -> Result<Vec<String>, PipelineError> {
    if candidate_size < 2 {
        return Err(PipelineError::InvalidConfig(format!(
            "candidate_size must be at least 2, got {candidate_size}"
        )));
    }

    let mut excluded: HashSet<&str> = history.iter().map(String::as_str).collect();
    excluded.insert(target);

    let pool: Vec<&String> = universe
        .iter()
        .filter(|item| !excluded.contains(item.as_str()))
        .collect();

    let needed = candidate_size - 1;
    if pool.len() < needed {
        return Err(PipelineError::InsufficientCandidates {
            needed,
            available: pool.len(),
        });
    }

    let mut candidates: Vec<String> = pool
        .choose_multiple(rng, needed)
        .map(|item| (*item).clone())
        .collect();
    let position = rng.gen_range(0..candidate_size);
    candidates.insert(position, target.to_string());
    Ok(candidates)
}

/// 1-based position of `target` in `candidates`.
pub fn target_position(candidates: &[String], target: &str) -> Option<usize> {
    candidates.iter().position(|c| c == target).map(|i| i + 1)
}
