//! Dense item ids.

use session_types::{Interaction, Session};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::PipelineError;

/// Bijection between original item ids and `0..N`.
///
/// Indices follow the lexicographic order of the original ids, so the
/// mapping depends only on the set of items present.
#[derive(Debug, Clone, Default)]
pub struct ItemMapping {
    index: HashMap<String, u32>,
    items: Vec<String>,
}

impl ItemMapping {
    pub fn from_interactions(interactions: &[Interaction]) -> Self {
        let distinct: BTreeSet<&str> = interactions.iter().map(|i| i.item_id.as_str()).collect();
        Self::from_sorted(distinct.into_iter().map(str::to_string).collect())
    }

    fn from_sorted(items: Vec<String>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.clone(), i as u32))
            .collect();
        Self { index, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every mapped item id, in index order.
    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn index_of(&self, item_id: &str) -> Result<u32, PipelineError> {
        self.index
            .get(item_id)
            .copied()
            .ok_or_else(|| PipelineError::UnmappedItem(item_id.to_string()))
    }

    pub fn item(&self, index: u32) -> Option<&str> {
        self.items.get(index as usize).map(String::as_str)
    }

    pub fn reindex_items(&self, items: &[String]) -> Result<Vec<u32>, PipelineError> {
        items.iter().map(|item| self.index_of(item)).collect()
    }

    pub fn reindex_session(&self, session: &Session) -> Result<Session<u32>, PipelineError> {
        Ok(Session {
            session: self.reindex_items(&session.session)?,
            time: session.time,
        })
    }

    pub fn reindex_sessions(&self, sessions: &[Session]) -> Result<Vec<Session<u32>>, PipelineError> {
        sessions.iter().map(|s| self.reindex_session(s)).collect()
    }

    /// Map a reindexed session back to original ids.
    pub fn restore_session(&self, session: &Session<u32>) -> Option<Session> {
        let items = session
            .session
            .iter()
            .map(|&idx| self.item(idx).map(str::to_string))
            .collect::<Option<Vec<_>>>()?;
        Some(Session {
            session: items,
            time: session.time,
        })
    }

    /// Ordered `item id -> index` view for serialization.
    pub fn as_map(&self) -> BTreeMap<&str, u32> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.as_str(), i as u32))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interaction(item: &str) -> Interaction {
        Interaction {
            user_id: "u".to_string(),
            item_id: item.to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn mapping_is_a_bijection_over_distinct_items() {
        let interactions: Vec<Interaction> = ["d", "a", "c", "a", "b", "d", "e"]
            .iter()
            .map(|i| interaction(i))
            .collect();
        let mapping = ItemMapping::from_interactions(&interactions);

        assert_eq!(mapping.len(), 5);
        let mut seen = BTreeSet::new();
        for item in ["a", "b", "c", "d", "e"] {
            let idx = mapping.index_of(item).unwrap();
            assert!((idx as usize) < mapping.len());
            assert!(seen.insert(idx), "index {idx} assigned twice");
            assert_eq!(mapping.item(idx), Some(item));
        }
        assert!(mapping.index_of("z").is_err());
    }

    #[test]
    fn mapping_ignores_input_order() {
        let a = ItemMapping::from_interactions(&[interaction("x"), interaction("y")]);
        let b = ItemMapping::from_interactions(&[interaction("y"), interaction("x"), interaction("y")]);
        assert_eq!(a.as_map(), b.as_map());
    }

    #[test]
    fn reindex_round_trips() {
        let interactions: Vec<Interaction> =
            ["p", "q", "r", "s"].iter().map(|i| interaction(i)).collect();
        let mapping = ItemMapping::from_interactions(&interactions);
        let session = Session {
            session: vec!["s".to_string(), "p".to_string(), "r".to_string()],
            time: 77,
        };
        let reindexed = mapping.reindex_session(&session).unwrap();
        assert_eq!(reindexed.time, 77);
        assert_eq!(mapping.restore_session(&reindexed), Some(session));
    }

    #[test]
    fn unknown_item_fails_reindexing() {
        let mapping = ItemMapping::from_interactions(&[interaction("p")]);
        let session = Session {
            session: vec!["p".to_string(), "nope".to_string()],
            time: 1,
        };
        assert!(matches!(
            mapping.reindex_session(&session),
            Err(PipelineError::UnmappedItem(item)) if item == "nope"
        ));
    }
}
