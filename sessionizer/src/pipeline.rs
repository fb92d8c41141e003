//! End-to-end dataset build: ingest, segment, split, sample, write.

use anyhow::{Context, Result};
use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use session_types::{PromptRecord, Session, SplitLabel};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use crate::clean::TitleTable;
use crate::config::{BuildConfig, MIN_EVENTS_PER_DAY};
use crate::ingest::{load_interactions, load_titles, retain_titled};
use crate::output::{OutputStage, WrittenArtifact};
use crate::prompt::{PromptExample, build_prompts};
use crate::reindex::ItemMapping;
use crate::segment::{SegmentConfig, SegmentStats, build_timelines, segment_all};
use crate::split::{sample_without_replacement, split_positional};

const MANIFEST_FILE: &str = "manifest.json";

/// Everything derived from the inputs before any sampling happens.
#[derive(Debug)]
pub struct PreparedDataset {
    pub titles: TitleTable,
    pub mapping: ItemMapping,
    /// All sessions, ascending by `time`.
    pub sessions: Vec<Session>,
    pub interactions: usize,
    pub users_skipped: usize,
    pub segment_stats: SegmentStats,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SplitSizes {
    pub train: usize,
    pub valid: usize,
    pub test: usize,
}

#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub output_dir: PathBuf,
    pub items: usize,
    pub sessions: usize,
    pub splits: SplitSizes,
    pub artifacts: usize,
}

#[derive(Serialize)]
struct Manifest<'a> {
    created_at: String,
    config: &'a BuildConfig,
    interactions: usize,
    users: usize,
    users_skipped: usize,
    items: usize,
    sessions: usize,
    single_event_days: usize,
    splits: SplitSizes,
    artifacts: &'a [WrittenArtifact],
}

/// Load both logs and segment sessions; nothing is written.
pub fn prepare(config: &BuildConfig) -> Result<PreparedDataset> {
    config.validate()?;

    let titles = load_titles(&config.meta_path)
        .with_context(|| format!("load item metadata {}", config.meta_path.display()))?;
    let interactions = load_interactions(&config.ratings_path)
        .with_context(|| format!("load ratings {}", config.ratings_path.display()))?;
    let interactions = retain_titled(interactions, &titles);

    let mapping = ItemMapping::from_interactions(&interactions);
    let interaction_count = interactions.len();

    let (timelines, users_skipped) = build_timelines(interactions);
    info!(
        users = timelines.len(),
        users_skipped,
        items = mapping.len(),
        "grouped interactions by user"
    );

    let segment_config = SegmentConfig {
        window_size: config.window_size,
        min_events_per_day: MIN_EVENTS_PER_DAY,
    };
    let (sessions, segment_stats) = segment_all(&timelines, segment_config)?;

    Ok(PreparedDataset {
        titles,
        mapping,
        sessions,
        interactions: interaction_count,
        users_skipped,
        segment_stats,
    })
}

pub fn split_sizes(prepared: &PreparedDataset, config: &BuildConfig) -> SplitSizes {
    let splits = split_positional(&prepared.sessions, config.split_ratios);
    SplitSizes {
        train: splits.train.len(),
        valid: splits.valid.len(),
        test: splits.test.len(),
    }
}

/// Session count per session length.
pub fn length_histogram(sessions: &[Session]) -> BTreeMap<usize, usize> {
    let mut histogram = BTreeMap::new();
    for session in sessions {
        *histogram.entry(session.len()).or_insert(0) += 1;
    }
    histogram
}

/// Run the full build and commit the output directory.
pub fn build(config: &BuildConfig) -> Result<BuildSummary> {
    let prepared = prepare(config)?;
    let mut stage = OutputStage::create(&config.output_dir)?;
    let summary = materialize(&prepared, config, &mut stage)?;
    let output_dir = stage.commit()?;
    Ok(BuildSummary {
        output_dir,
        ..summary
    })
}

/// Sample, render, and write every artifact into `stage`.
pub fn materialize(
    prepared: &PreparedDataset,
    config: &BuildConfig,
    stage: &mut OutputStage,
) -> Result<BuildSummary> {
    let mapping = &prepared.mapping;
    let universe = mapping.items();
    let dataset = config.dataset.as_str();
    let item_num = mapping.len();

    stage.write_json(
        format!("item_map_{dataset}.json"),
        &mapping.as_map(),
        item_num,
    )?;
    stage.write_json(
        format!("ID/total_id_{dataset}.json"),
        &prepared.sessions,
        prepared.sessions.len(),
    )?;

    let splits = split_positional(&prepared.sessions, config.split_ratios);
    let sizes = SplitSizes {
        train: splits.train.len(),
        valid: splits.valid.len(),
        test: splits.test.len(),
    };
    info!(
        train = sizes.train,
        valid = sizes.valid,
        test = sizes.test,
        "split sessions by time"
    );
    for label in SplitLabel::ALL {
        let part = splits.get(label);
        stage.write_json(
            format!("ID/{label}_itemnum_{item_num}_{dataset}.json"),
            part,
            part.len(),
        )?;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    // train
    let train_n = config.train_sample_n;
    let train_sample =
        sample_without_replacement(&mut rng, splits.train, train_n, SplitLabel::Train)?;
    write_reindexed(
        stage,
        mapping,
        format!("ID/train_itemnum_{item_num}_sample_{train_n}_{dataset}.json"),
        &train_sample,
    )?;
    let train_prompts = build_prompts(
        &mut rng,
        &train_sample,
        &prepared.titles,
        universe,
        config.candidate_size,
    )?;
    write_prompts(stage, format!("LLM/train_{train_n}.json"), &train_prompts)?;

    // valid
    let eval_n = config.eval_sample_n;
    let valid_sample =
        sample_without_replacement(&mut rng, splits.valid, eval_n, SplitLabel::Valid)?;
    write_reindexed(
        stage,
        mapping,
        format!("ID/valid_itemnum_{item_num}_sample_{eval_n}_{dataset}.json"),
        &valid_sample,
    )?;
    let valid_prompts = build_prompts(
        &mut rng,
        &valid_sample,
        &prepared.titles,
        universe,
        config.candidate_size,
    )?;
    write_prompts(stage, format!("LLM/valid_{eval_n}.json"), &valid_prompts)?;
    write_candidates(
        stage,
        mapping,
        format!("ID/valid_candidate_sample_{eval_n}_{dataset}.json"),
        &valid_prompts,
    )?;

    let sub_n = config.valid_prompt_subsample_n;
    let valid_records: Vec<PromptRecord> =
        valid_prompts.iter().map(|p| p.record.clone()).collect();
    let valid_subsample =
        sample_without_replacement(&mut rng, &valid_records, sub_n, SplitLabel::Valid)?;
    stage.write_json(
        format!("LLM/valid_{sub_n}.json"),
        &valid_subsample,
        valid_subsample.len(),
    )?;

    // test
    let test_sample = sample_without_replacement(&mut rng, splits.test, eval_n, SplitLabel::Test)?;
    write_reindexed(
        stage,
        mapping,
        format!("ID/test_itemnum_{item_num}_sample_{eval_n}_{dataset}.json"),
        &test_sample,
    )?;

    for &seed in &config.eval_seeds {
        let mut seed_rng = ChaCha8Rng::seed_from_u64(seed);
        let test_prompts = build_prompts(
            &mut seed_rng,
            &test_sample,
            &prepared.titles,
            universe,
            config.candidate_size,
        )?;
        write_candidates(
            stage,
            mapping,
            format!("ID/test_candidate_{seed}_{dataset}.json"),
            &test_prompts,
        )?;
        write_prompts(stage, format!("LLM/test_seed_{seed}.json"), &test_prompts)?;
    }

    let artifacts = stage.written().len() + 1;
    let manifest = Manifest {
        created_at: Utc::now().to_rfc3339(),
        config,
        interactions: prepared.interactions,
        users: prepared.segment_stats.users,
        users_skipped: prepared.users_skipped,
        items: item_num,
        sessions: prepared.sessions.len(),
        single_event_days: prepared.segment_stats.single_event_days,
        splits: sizes,
        artifacts: stage.written(),
    };
    let manifest_value = serde_json::to_value(&manifest).context("serialize manifest")?;
    stage.write_json(MANIFEST_FILE, &manifest_value, 1)?;

    Ok(BuildSummary {
        output_dir: stage.staging_path().to_path_buf(),
        items: item_num,
        sessions: prepared.sessions.len(),
        splits: sizes,
        artifacts,
    })
}

fn write_reindexed(
    stage: &mut OutputStage,
    mapping: &ItemMapping,
    rel: String,
    sessions: &[Session],
) -> Result<()> {
    let reindexed = mapping.reindex_sessions(sessions)?;
    stage.write_json(rel, &reindexed, reindexed.len())
}

fn write_prompts(stage: &mut OutputStage, rel: String, prompts: &[PromptExample]) -> Result<()> {
    let records: Vec<&PromptRecord> = prompts.iter().map(|p| &p.record).collect();
    stage.write_json(rel, &records, records.len())
}

fn write_candidates(
    stage: &mut OutputStage,
    mapping: &ItemMapping,
    rel: String,
    prompts: &[PromptExample],
) -> Result<()> {
    let candidates = prompts
        .iter()
        .map(|p| mapping.reindex_items(&p.candidates))
        .collect::<Result<Vec<_>, _>>()?;
    stage.write_json(rel, &candidates, candidates.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_counts_lengths() {
        let sessions = vec![
            Session {
                session: vec!["a".to_string(), "b".to_string()],
                time: 1,
            },
            Session {
                session: vec!["c".to_string(), "d".to_string()],
                time: 2,
            },
            Session {
                session: vec!["e".to_string(); 10],
                time: 3,
            },
        ];
        let histogram = length_histogram(&sessions);
        assert_eq!(histogram.get(&2), Some(&2));
        assert_eq!(histogram.get(&10), Some(&1));
        assert_eq!(histogram.len(), 2);
    }
}
