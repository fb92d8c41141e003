//! Text prompts for the language-model recommender.

use rand::Rng;
use session_types::{PromptRecord, Session};

use crate::candidates::{build_candidate_set, target_position};
use crate::clean::TitleTable;
use crate::error::PipelineError;

const SESSION_HEADER: &str = "Current session interactions";
const CANDIDATE_HEADER: &str = "Candidate set";

/// Render items as `1."title",2."title",...`.
pub fn render_titles(items: &[String], titles: &TitleTable) -> Result<String, PipelineError> {
    let rendered = items
        .iter()
        .enumerate()
        .map(|(i, item)| -> Result<String, PipelineError> {
            Ok(format!("{}.\"{}\"", i + 1, titles.title(item)?))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rendered.join(","))
}

pub fn compose_input(history: &str, candidates: &str) -> String {
    format!("{SESSION_HEADER}: [{history}]\n{CANDIDATE_HEADER}: [{candidates}]")
}

/// A prompt plus the candidate ids it was rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptExample {
    pub record: PromptRecord,
    pub candidates: Vec<String>,
}

/// Draw a candidate set for `session` and render its prompt.
pub fn build_prompt<R: Rng + ?Sized>(
    rng: &mut R,
    session: &Session,
    titles: &TitleTable,
    universe: &[String],
    candidate_size: usize,
) -> Result<PromptExample, PipelineError> {
    let target = session.target().ok_or_else(|| {
        PipelineError::InvalidConfig("cannot build a prompt for an empty session".to_string())
    })?;
    let history = session.history();

    let history_text = render_titles(history, titles)?;
    let target_title = titles.title(target)?.to_string();

    let candidates = build_candidate_set(rng, history, target, universe, candidate_size)?;
    let candidate_text = render_titles(&candidates, titles)?;
    let target_index = target_position(&candidates, target)
        .ok_or_else(|| PipelineError::InvalidConfig("target missing from candidates".to_string()))?;

    Ok(PromptExample {
        record: PromptRecord {
            input: compose_input(&history_text, &candidate_text),
            target: target_title,
            target_index,
        },
        candidates,
    })
}

/// Build prompts for every session in order, drawing from one RNG stream.
pub fn build_prompts<R: Rng + ?Sized>(
    rng: &mut R,
    sessions: &[Session],
    titles: &TitleTable,
    universe: &[String],
    candidate_size: usize,
) -> Result<Vec<PromptExample>, PipelineError> {
    sessions
        .iter()
        .map(|session| build_prompt(rng, session, titles, universe, candidate_size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use session_types::ItemTitle;

    fn titles(n: usize) -> (TitleTable, Vec<String>) {
        let ids: Vec<String> = (0..n).map(|i| format!("g{i}")).collect();
        let table = TitleTable::from_raw(
            ids.iter()
                .map(|id| ItemTitle {
                    item_id: id.clone(),
                    title: format!("Game {id}"),
                })
                .collect(),
        );
        (table, ids)
    }

    #[test]
    fn renders_one_indexed_quoted_titles() {
        let (table, ids) = titles(3);
        let text = render_titles(&ids, &table).unwrap();
        assert_eq!(text, r#"1."Game g0",2."Game g1",3."Game g2""#);
        assert_eq!(render_titles(&[], &table).unwrap(), "");
    }

    #[test]
    fn prompt_points_at_target() {
        let (table, ids) = titles(30);
        let session = Session {
            session: vec![ids[3].clone(), ids[5].clone(), ids[8].clone()],
            time: 10,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let example = build_prompt(&mut rng, &session, &table, &ids, 5).unwrap();

        assert_eq!(example.record.target, "Game g8");
        assert_eq!(example.candidates.len(), 5);
        assert_eq!(example.candidates[example.record.target_index - 1], ids[8]);
        assert!(example.record.input.starts_with(
            "Current session interactions: [1.\"Game g3\",2.\"Game g5\"]\nCandidate set: ["
        ));
        let target_entry = format!("{}.\"Game g8\"", example.record.target_index);
        assert!(example.record.input.contains(&target_entry));
    }

    #[test]
    fn missing_title_is_fatal() {
        let (table, mut ids) = titles(10);
        ids.push("ghost".to_string());
        let session = Session {
            session: vec![ids[0].clone(), "ghost".to_string()],
            time: 1,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = build_prompt(&mut rng, &session, &table, &ids, 3).unwrap_err();
        assert!(matches!(err, PipelineError::MissingTitle(id) if id == "ghost"));
    }

    #[test]
    fn single_item_session_has_empty_history() {
        let (table, ids) = titles(10);
        let session = Session {
            session: vec![ids[2].clone()],
            time: 1,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let example = build_prompt(&mut rng, &session, &table, &ids, 3).unwrap();
        assert!(example.record.input.starts_with("Current session interactions: []\n"));
    }
}
