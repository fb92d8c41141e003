//! Line-delimited JSON readers for the ratings and metadata logs.
//!
//! Both inputs are usually gzip-compressed; plain files are accepted too and
//! told apart by the gzip magic bytes. Any malformed line aborts the load.

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use serde_json::Value;
use session_types::{Interaction, ItemTitle, parse_meta_value, parse_rating_value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

use crate::clean::TitleTable;
use crate::error::PipelineError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Default, Clone)]
pub struct IngestStats {
    pub read: usize,
    pub blank: usize,
}

/// Open `path` as a line reader, transparently decompressing gzip.
pub fn open_lines(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let is_gzip = reader
        .fill_buf()
        .with_context(|| format!("read header of {}", path.display()))?
        .starts_with(&GZIP_MAGIC);

    if is_gzip {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Parse every non-blank line of `path` with `parse`, failing on the first bad line.
pub fn read_records<T>(
    path: &Path,
    parse: impl Fn(&Value) -> Result<T>,
) -> Result<(Vec<T>, IngestStats)> {
    let reader = open_lines(path)?;
    let mut records = Vec::new();
    let mut stats = IngestStats::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("read {}:{line_no}", path.display()))?;
        if line.trim().is_empty() {
            stats.blank += 1;
            continue;
        }

        let json: Value = serde_json::from_str(&line).map_err(|e| PipelineError::MalformedRecord {
            path: path.display().to_string(),
            line: line_no,
            reason: format!("invalid JSON: {e}"),
        })?;
        let record = parse(&json).map_err(|e| PipelineError::MalformedRecord {
            path: path.display().to_string(),
            line: line_no,
            reason: e.to_string(),
        })?;

        records.push(record);
        stats.read += 1;
    }

    Ok((records, stats))
}

pub fn load_interactions(path: &Path) -> Result<Vec<Interaction>> {
    let (interactions, stats) = read_records(path, parse_rating_value)?;
    info!(
        path = %path.display(),
        records = stats.read,
        blank = stats.blank,
        "loaded ratings"
    );
    Ok(interactions)
}

pub fn load_titles(path: &Path) -> Result<TitleTable> {
    let (titles, stats): (Vec<ItemTitle>, _) = read_records(path, parse_meta_value)?;
    let table = TitleTable::from_raw(titles);
    info!(
        path = %path.display(),
        records = stats.read,
        items = table.len(),
        "loaded item titles"
    );
    Ok(table)
}

/// Keep only interactions whose item has a title.
pub fn retain_titled(interactions: Vec<Interaction>, titles: &TitleTable) -> Vec<Interaction> {
    let before = interactions.len();
    let kept: Vec<Interaction> = interactions
        .into_iter()
        .filter(|i| titles.contains(&i.item_id))
        .collect();
    info!(
        kept = kept.len(),
        dropped = before - kept.len(),
        "filtered ratings to titled items"
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_gz(lines: &[&str]) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        let mut encoder = GzEncoder::new(file.reopen().unwrap(), Compression::default());
        for line in lines {
            writeln!(encoder, "{line}").unwrap();
        }
        encoder.finish().unwrap();
        file
    }

    fn write_plain(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn reads_gzip_ratings() {
        let file = write_gz(&[
            r#"{"reviewerID":"A","asin":"x","unixReviewTime":100}"#,
            "",
            r#"{"reviewerID":"B","asin":"y","unixReviewTime":200,"overall":4.0}"#,
        ]);
        let interactions = load_interactions(file.path()).unwrap();
        assert_eq!(interactions.len(), 2);
        assert_eq!(interactions[1].user_id, "B");
        assert_eq!(interactions[1].timestamp, 200);
    }

    #[test]
    fn reads_plain_metadata() {
        let file = write_plain(&[
            r#"{"asin":"x","title":" 'Halo' "}"#,
            r#"{"asin":"x","title":"duplicate"}"#,
        ]);
        let titles = load_titles(file.path()).unwrap();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles.title("x").unwrap(), "Halo");
    }

    #[test]
    fn malformed_line_reports_position() {
        let file = write_plain(&[
            r#"{"reviewerID":"A","asin":"x","unixReviewTime":100}"#,
            r#"{"reviewerID":"A","asin":"x"}"#,
        ]);
        let err = load_interactions(file.path()).unwrap_err();
        let Some(PipelineError::MalformedRecord { line, reason, .. }) =
            err.downcast_ref::<PipelineError>()
        else {
            panic!("expected MalformedRecord, got {err:?}");
        };
        assert_eq!(*line, 2);
        assert!(reason.contains("unixReviewTime"));
    }

    #[test]
    fn short_plain_files_are_not_sniffed_as_gzip() {
        let empty = write_plain(&[]);
        assert_eq!(open_lines(empty.path()).unwrap().lines().count(), 0);

        let mut one_byte = NamedTempFile::new().unwrap();
        one_byte.write_all(&[0x1f]).unwrap();
        one_byte.flush().unwrap();
        let mut buf = Vec::new();
        open_lines(one_byte.path())
            .unwrap()
            .read_until(b'\n', &mut buf)
            .unwrap();
        assert_eq!(buf, vec![0x1f]);
    }

    #[test]
    fn invalid_json_fails_fast() {
        let file = write_plain(&["{broken"]);
        assert!(load_interactions(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_interactions(&dir.path().join("absent.json.gz")).is_err());
    }

    #[test]
    fn drops_ratings_without_titles() {
        let titles = TitleTable::from_raw(vec![ItemTitle {
            item_id: "x".to_string(),
            title: "X".to_string(),
        }]);
        let kept = retain_titled(
            vec![
                Interaction {
                    user_id: "A".to_string(),
                    item_id: "x".to_string(),
                    timestamp: 1,
                },
                Interaction {
                    user_id: "A".to_string(),
                    item_id: "y".to_string(),
                    timestamp: 2,
                },
            ],
            &titles,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].item_id, "x");
    }
}
