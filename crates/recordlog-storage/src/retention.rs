//! Deletion of old record files
//!
//! Runs once, in the background, when a hub starts. Whole files are removed;
//! records are never pruned one by one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::RECORD_FILE_EXTENSION;
use crate::error::StorageError;

/// How many directory levels below the root are scanned
///
/// Root, date directories, channel directories.
const SCAN_DEPTH: usize = 2;

/// Outcome of one sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Candidate files looked at
    pub scanned: usize,
    /// Files removed
    pub deleted: Vec<PathBuf>,
    /// Files that were old enough but could not be removed
    pub failed: usize,
}

/// Delete record files created before a cutoff
#[derive(Debug, Clone)]
pub struct RetentionSweep {
    root: PathBuf,
    cutoff: SystemTime,
    extension: String,
}

impl RetentionSweep {
    /// Sweep `.rec` files below `root` created before `cutoff`
    pub fn new(root: impl Into<PathBuf>, cutoff: SystemTime) -> Self {
        Self {
            root: root.into(),
            cutoff,
            extension: RECORD_FILE_EXTENSION.to_string(),
        }
    }

    /// Match a different file extension (without the dot)
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// List files with the swept extension, up to the scan depth
    ///
    /// A missing root yields no candidates.
    pub async fn candidates(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut found = Vec::new();
        let mut dirs = vec![(self.root.clone(), 0usize)];

        while let Some((dir, depth)) = dirs.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    if depth < SCAN_DEPTH {
                        dirs.push((path, depth + 1));
                    }
                } else if file_type.is_file() && self.matches_extension(&path) {
                    found.push(path);
                }
            }
        }

        Ok(found)
    }

    /// Delete every candidate whose creation time is before the cutoff
    ///
    /// Files without a creation time on this platform use their
    /// modification time. Files that vanish mid-sweep are ignored.
    pub async fn run(&self) -> Result<SweepReport, StorageError> {
        let mut report = SweepReport::default();

        for path in self.candidates().await? {
            report.scanned += 1;

            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let Ok(created) = metadata.created().or_else(|_| metadata.modified()) else {
                continue;
            };
            if created >= self.cutoff {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "Deleted old record file");
                    report.deleted.push(path);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to delete old record file");
                    report.failed += 1;
                }
            }
        }

        info!(
            root = %self.root.display(),
            scanned = report.scanned,
            deleted = report.deleted.len(),
            failed = report.failed,
            "Retention sweep finished"
        );
        Ok(report)
    }

    /// Run the sweep on a background task
    pub fn spawn(self) -> JoinHandle<Result<SweepReport, StorageError>> {
        tokio::spawn(async move { self.run().await })
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    async fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.unwrap();
        }
        tokio::fs::write(path, b"x").await.unwrap();
    }

    #[tokio::test]
    async fn test_candidates_respect_depth_and_extension() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("top.rec")).await;
        touch(&root.join("19_10_26").join("all.rec")).await;
        touch(&root.join("19_10_26").join("all.log")).await;
        touch(&root.join("19_10_26").join("ERROR").join("err.rec")).await;
        touch(&root.join("19_10_26").join("ERROR").join("deep").join("x.rec")).await;

        let mut found = RetentionSweep::new(root, SystemTime::now())
            .candidates()
            .await
            .unwrap();
        found.sort();

        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|p| p.extension().unwrap() == "rec"));
        assert!(!found.iter().any(|p| p.ends_with("deep/x.rec")));
    }

    #[tokio::test]
    async fn test_old_files_are_deleted() {
        let temp = TempDir::new().unwrap();
        let old = temp.path().join("d").join("old.rec");
        let text = temp.path().join("d").join("old.log");
        touch(&old).await;
        touch(&text).await;

        let cutoff = SystemTime::now() + Duration::from_secs(60);
        let report = RetentionSweep::new(temp.path(), cutoff).run().await.unwrap();

        assert_eq!(report.deleted, vec![old.clone()]);
        assert!(!old.exists());
        assert!(text.exists());
    }

    #[tokio::test]
    async fn test_new_files_are_kept() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fresh.rec");
        touch(&path).await;

        let handle = RetentionSweep::new(temp.path(), UNIX_EPOCH).spawn();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report.scanned, 1);
        assert!(report.deleted.is_empty());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let report = RetentionSweep::new(temp.path().join("nope"), SystemTime::now())
            .run()
            .await
            .unwrap();
        assert_eq!(report, SweepReport::default());
    }
}
