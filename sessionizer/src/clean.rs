//! Title normalization.

use session_types::ItemTitle;
use std::collections::HashMap;

use crate::error::PipelineError;

/// HTML entity replacements, applied in order before trimming.
/// `&ndash` is matched without its semicolon, so `&ndash;` leaves a `;` behind.
const ENTITY_REPLACEMENTS: [(&str, &str); 12] = [
    ("&amp;", " and "),
    ("&lt;", ""),
    ("&gt;", ""),
    ("&ndash", ""),
    ("&mdash;", ""),
    ("&ensp;", ""),
    ("&nbsp;", " "),
    ("&shy;", ""),
    ("&copy;", ""),
    ("&trade;", ""),
    ("&reg;", ""),
    ("&quot;", ""),
];

pub fn clean_title(raw: &str) -> String {
    let mut title = raw.to_string();
    for (entity, replacement) in ENTITY_REPLACEMENTS {
        if title.contains(entity) {
            title = title.replace(entity, replacement);
        }
    }
    title
        .trim()
        .trim_matches('\'')
        .trim_matches('"')
        .to_string()
}

/// Cleaned item titles keyed by item id. The first title seen for an id wins.
#[derive(Debug, Default, Clone)]
pub struct TitleTable {
    titles: HashMap<String, String>,
}

impl TitleTable {
    pub fn from_raw(raw: Vec<ItemTitle>) -> Self {
        let mut titles = HashMap::with_capacity(raw.len());
        for entry in raw {
            titles
                .entry(entry.item_id)
                .or_insert_with(|| clean_title(&entry.title));
        }
        Self { titles }
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.titles.contains_key(item_id)
    }

    /// Title for `item_id`. A miss means upstream filtering let an unknown item through.
    pub fn title(&self, item_id: &str) -> Result<&str, PipelineError> {
        self.titles
            .get(item_id)
            .map(String::as_str)
            .ok_or_else(|| PipelineError::MissingTitle(item_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_entities() {
        assert_eq!(clean_title("Mario &amp; Luigi"), "Mario  and  Luigi");
        assert_eq!(clean_title("Halo&trade; 3"), "Halo 3");
        assert_eq!(clean_title("A&nbsp;B"), "A B");
        assert_eq!(clean_title("x &ndash; y"), "x ; y");
    }

    #[test]
    fn strips_whitespace_then_quotes() {
        assert_eq!(clean_title("  'Zelda'  "), "Zelda");
        assert_eq!(clean_title("\"Metroid\""), "Metroid");
        // single quotes come off before double quotes
        assert_eq!(clean_title("\"'Kirby'\""), "'Kirby'");
    }

    #[test]
    fn quot_entity_is_dropped_before_trimming() {
        assert_eq!(clean_title("&quot;Tetris&quot; "), "Tetris");
    }

    #[test]
    fn first_title_wins_and_misses_are_errors() {
        let table = TitleTable::from_raw(vec![
            ItemTitle {
                item_id: "a".to_string(),
                title: "First &amp; Best".to_string(),
            },
            ItemTitle {
                item_id: "a".to_string(),
                title: "Second".to_string(),
            },
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.title("a").unwrap(), "First  and  Best");
        assert!(matches!(
            table.title("b"),
            Err(PipelineError::MissingTitle(id)) if id == "b"
        ));
    }
}
