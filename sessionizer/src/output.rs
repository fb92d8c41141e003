//! Staged artifact output.
//!
//! Every artifact of a run is written into a hidden staging directory next to
//! the final output directory. `commit` swaps the staging directory into
//! place; dropping an uncommitted stage deletes it, so a failed run leaves the
//! previous output (or nothing) behind.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WrittenArtifact {
    /// Path relative to the output directory.
    pub path: PathBuf,
    /// Top-level entries in the JSON document.
    pub records: usize,
}

pub struct OutputStage {
    staging: TempDir,
    target: PathBuf,
    written: Vec<WrittenArtifact>,
}

/// Create `dir` and its parents; a no-op when it already exists.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))
}

impl OutputStage {
    pub fn create(target: &Path) -> Result<Self> {
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ensure_dir(&parent)?;

        let name = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("output");
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{name}.staging-"))
            .tempdir_in(&parent)
            .with_context(|| format!("create staging directory in {}", parent.display()))?;
        debug!(staging = %staging.path().display(), "opened output stage");

        Ok(Self {
            staging,
            target: target.to_path_buf(),
            written: Vec::new(),
        })
    }

    pub fn staging_path(&self) -> &Path {
        self.staging.path()
    }

    pub fn written(&self) -> &[WrittenArtifact] {
        &self.written
    }

    /// Serialize `value` as JSON to `rel` inside the stage.
    pub fn write_json<T: Serialize + ?Sized>(
        &mut self,
        rel: impl AsRef<Path>,
        value: &T,
        records: usize,
    ) -> Result<()> {
        let rel = rel.as_ref();
        let path = self.staging.path().join(rel);
        if let Some(dir) = path.parent() {
            ensure_dir(dir)?;
        }

        let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value)
            .with_context(|| format!("serialize {}", rel.display()))?;
        writer
            .flush()
            .with_context(|| format!("flush {}", rel.display()))?;

        info!(path = %rel.display(), records, "wrote artifact");
        self.written.push(WrittenArtifact {
            path: rel.to_path_buf(),
            records,
        });
        Ok(())
    }

    /// Move the staged artifacts to the target directory, replacing any
    /// previous run's output.
    pub fn commit(self) -> Result<PathBuf> {
        let Self {
            staging,
            target,
            written,
        } = self;

        let mut previous: Option<TempDir> = None;
        if target.exists() {
            let parent = staging
                .path()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let holder = tempfile::Builder::new()
                .prefix(".previous-")
                .tempdir_in(&parent)
                .context("create holding directory for previous output")?;
            let moved = holder.path().join("output");
            fs::rename(&target, &moved).with_context(|| {
                format!("move previous output {} aside", target.display())
            })?;
            previous = Some(holder);
        }

        let staged = staging.keep();
        if let Err(err) = fs::rename(&staged, &target) {
            let moved = previous.as_ref().map(|holder| holder.path().join("output"));
            roll_back_swap(&staged, &target, moved.as_deref());
            return Err(err).with_context(|| format!("move output into {}", target.display()));
        }
        drop(previous);

        info!(
            target = %target.display(),
            artifacts = written.len(),
            "committed output"
        );
        Ok(target)
    }
}

/// Put the previous output back at `target` and remove the kept staging
/// directory. Cleanup failures are logged; the swap error is what the caller
/// reports.
fn roll_back_swap(staged: &Path, target: &Path, previous: Option<&Path>) {
    if let Some(moved) = previous {
        if let Err(err) = fs::rename(moved, target) {
            warn!(
                previous = %moved.display(),
                target = %target.display(),
                error = %err,
                "failed to restore previous output"
            );
        }
    }
    if let Err(err) = fs::remove_dir_all(staged) {
        warn!(
            staging = %staged.display(),
            error = %err,
            "failed to remove staging directory"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn commit_moves_artifacts_into_place() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("final_dataset");

        let mut stage = OutputStage::create(&target).unwrap();
        stage.write_json("ID/a.json", &json!([1, 2, 3]), 3).unwrap();
        stage.write_json("b.json", &json!({"k": 1}), 1).unwrap();
        assert!(!target.exists());
        assert_eq!(stage.written().len(), 2);

        stage.commit().unwrap();
        let a: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(target.join("ID/a.json")).unwrap()).unwrap();
        assert_eq!(a, json!([1, 2, 3]));
        assert!(target.join("b.json").exists());
    }

    #[test]
    fn dropped_stage_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out");
        {
            let mut stage = OutputStage::create(&target).unwrap();
            stage.write_json("x.json", &json!([]), 0).unwrap();
        }
        assert!(!target.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn commit_replaces_previous_output() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("stale.json"), "[]").unwrap();

        let mut stage = OutputStage::create(&target).unwrap();
        stage.write_json("fresh.json", &json!([]), 0).unwrap();
        stage.commit().unwrap();

        assert!(target.join("fresh.json").exists());
        assert!(!target.join("stale.json").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn roll_back_restores_previous_output() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out");
        let staged = dir.path().join(".out.staging");
        let moved = dir.path().join(".previous/output");
        fs::create_dir_all(&staged).unwrap();
        fs::create_dir_all(&moved).unwrap();
        fs::write(moved.join("old.json"), "[]").unwrap();

        roll_back_swap(&staged, &target, Some(&moved));

        assert!(target.join("old.json").exists());
        assert!(!staged.exists());
    }

    #[test]
    fn roll_back_tolerates_missing_paths() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out");

        roll_back_swap(
            &dir.path().join("gone"),
            &target,
            Some(&dir.path().join("also-gone")),
        );

        assert!(!target.exists());
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir(&nested).unwrap();
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
