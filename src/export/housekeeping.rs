//! Advisory housekeeping for the export directory.
//!
//! Completed exports are handed to the caller, but abandoned downloads and
//! crashed runs can leave files behind. The sweep deletes export artifacts
//! older than a threshold; it runs at process startup and opportunistically
//! after each run. It is not part of run correctness: every failure here is
//! logged and swallowed.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

/// Delete stale export artifacts from `dir`.
///
/// Only files this pipeline produces (`.xlsx` and `.tmp`) are considered,
/// and only when their modification time is older than `max_age`.
///
/// # Arguments
/// * `dir` - Export directory
/// * `max_age` - Age threshold beyond which files are removed
///
/// # Returns
/// * `usize` - Number of files deleted
pub fn sweep_stale_exports(dir: &Path, max_age: Duration) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        // Missing directory means nothing to sweep
        Err(_) => return 0,
    };

    let now = SystemTime::now();
    let mut deleted = 0;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if !(name.ends_with(".xlsx") || name.ends_with(".tmp")) {
            continue;
        }

        let stale = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|modified| now.duration_since(modified).ok())
            .map(|age| age > max_age)
            .unwrap_or(false);

        if !stale {
            continue;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed stale export file");
                deleted += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), "could not remove stale export file: {e}");
            }
        }
    }

    if deleted > 0 {
        info!(deleted, dir = %dir.display(), "swept stale export files");
    }

    deleted
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sweeps_old_artifacts_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("old.xlsx"), b"x").unwrap();
        std::fs::write(dir.path().join("old.xlsx.tmp"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let deleted = sweep_stale_exports(dir.path(), Duration::from_millis(10));
        assert_eq!(deleted, 2);
        assert!(dir.path().join("notes.txt").exists());
        assert!(!dir.path().join("old.xlsx").exists());
    }

    #[test]
    fn test_fresh_files_are_kept() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fresh.xlsx"), b"x").unwrap();

        let deleted = sweep_stale_exports(dir.path(), Duration::from_secs(3600));
        assert_eq!(deleted, 0);
        assert!(dir.path().join("fresh.xlsx").exists());
    }

    #[test]
    fn test_missing_directory_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("never_created");
        assert_eq!(sweep_stale_exports(&missing, Duration::from_secs(1)), 0);
    }
}
