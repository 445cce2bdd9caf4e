use crate::backup::artifact::parse_artifact_name;
use crate::error::{BackupError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

const SECS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionPolicy {
    pub max_age_days: u32,
}

impl RetentionPolicy {
    pub fn new(max_age_days: u32) -> Self {
        Self { max_age_days }
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days as u64 * SECS_PER_DAY)
    }

    /// A file exactly `max_age_days` old is still kept. Modification times in
    /// the future never expire.
    pub fn is_expired(&self, modified: SystemTime, now: SystemTime) -> bool {
        match now.duration_since(modified) {
            Ok(age) => age > self.max_age(),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct PruneReport {
    pub removed: Vec<PathBuf>,
    pub kept: usize,
    pub failures: Vec<(PathBuf, String)>,
}

impl PruneReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Deletes every regular file in `dir` (non-recursive) that `policy` considers
/// expired at `now`. Paths in `protected` are never touched.
///
/// Any file qualifies, not only backup artifacts. A failure on one entry is
/// logged and recorded, and the remaining entries are still processed.
pub fn prune(
    dir: &Path,
    policy: &RetentionPolicy,
    now: SystemTime,
    protected: &[&Path],
) -> Result<PruneReport> {
    prune_with(dir, policy, now, protected, |path| fs::remove_file(path))
}

fn prune_with<F>(
    dir: &Path,
    policy: &RetentionPolicy,
    now: SystemTime,
    protected: &[&Path],
    mut remove: F,
) -> Result<PruneReport>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    info!(
        "Pruning {} (keeping files up to {} day(s) old)",
        dir.display(),
        policy.max_age_days
    );

    let entries = fs::read_dir(dir)
        .map_err(|e| BackupError::Prune(format!("cannot list {}: {}", dir.display(), e)))?;

    let mut report = PruneReport::default();

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Failed to read entry in {}: {}", dir.display(), e);
                report.failures.push((dir.to_path_buf(), e.to_string()));
                continue;
            }
        };
        let path = entry.path();

        if protected.iter().any(|p| *p == path.as_path()) {
            report.kept += 1;
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to stat {}: {}", path.display(), e);
                report.failures.push((path, e.to_string()));
                continue;
            }
        };
        if metadata.is_dir() {
            debug!("Skipping directory {}", path.display());
            continue;
        }

        let modified = match metadata.modified() {
            Ok(m) => m,
            Err(e) => {
                warn!("No modification time for {}: {}", path.display(), e);
                report.failures.push((path, e.to_string()));
                continue;
            }
        };

        if !policy.is_expired(modified, now) {
            report.kept += 1;
            continue;
        }

        let name = entry.file_name();
        if parse_artifact_name(&name.to_string_lossy()).is_none() {
            warn!("Deleting expired file that is not a backup: {}", path.display());
        }

        match remove(&path) {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                report.removed.push(path);
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", path.display(), e);
                report.failures.push((path, e.to_string()));
            }
        }
    }

    info!(
        "Pruning finished: {} removed, {} kept, {} failed",
        report.removed.len(),
        report.kept,
        report.failures.len()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::UNIX_EPOCH;
    use tempfile::tempdir;

    const DAY: u64 = SECS_PER_DAY;

    // Whole seconds so mtimes survive a round trip through the filesystem.
    fn fixed_now() -> SystemTime {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn file_aged(dir: &Path, name: &str, now: SystemTime, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(now - Duration::from_secs(age_secs)).unwrap();
        path
    }

    fn remaining(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_is_expired_boundary() {
        let policy = RetentionPolicy::new(4);
        let now = fixed_now();
        let exactly = now - Duration::from_secs(4 * DAY);

        assert!(!policy.is_expired(exactly, now));
        assert!(policy.is_expired(exactly - Duration::from_secs(1), now));
        assert!(!policy.is_expired(now + Duration::from_secs(60), now));
    }

    #[test]
    fn test_keep_four_days_scenario() {
        let dir = tempdir().unwrap();
        let now = fixed_now();
        for days in [1, 3, 4, 5, 10] {
            file_aged(dir.path(), &format!("age_{:02}d.sql", days), now, days * DAY);
        }

        let report = prune(dir.path(), &RetentionPolicy::new(4), now, &[]).unwrap();

        assert_eq!(remaining(dir.path()), vec!["age_01d.sql", "age_03d.sql", "age_04d.sql"]);
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.kept, 3);
        assert!(report.is_clean());
    }

    #[test]
    fn test_boundary_to_the_second() {
        let dir = tempdir().unwrap();
        let now = fixed_now();
        file_aged(dir.path(), "exact.sql", now, 2 * DAY);
        file_aged(dir.path(), "over.sql", now, 2 * DAY + 1);

        prune(dir.path(), &RetentionPolicy::new(2), now, &[]).unwrap();

        assert_eq!(remaining(dir.path()), vec!["exact.sql"]);
    }

    #[test]
    fn test_zero_days_keeps_only_current() {
        let dir = tempdir().unwrap();
        let now = fixed_now();
        file_aged(dir.path(), "old.sql", now, 60);
        let current = file_aged(dir.path(), "current.sql", now, 0);

        prune(dir.path(), &RetentionPolicy::new(0), now, &[]).unwrap();

        assert!(current.exists());
        assert_eq!(remaining(dir.path()), vec!["current.sql"]);
    }

    #[test]
    fn test_protected_path_survives() {
        let dir = tempdir().unwrap();
        let now = fixed_now();
        let fresh = file_aged(dir.path(), "all_backup_2020-01-01T00-00-00.sql", now, 30 * DAY);

        let report = prune(dir.path(), &RetentionPolicy::new(1), now, &[fresh.as_path()]).unwrap();

        assert!(fresh.exists());
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_deletes_foreign_files_and_skips_directories() {
        let dir = tempdir().unwrap();
        let now = fixed_now();
        file_aged(dir.path(), "notes.txt", now, 9 * DAY);
        let sub = dir.path().join("archive");
        fs::create_dir(&sub).unwrap();
        file_aged(&sub, "nested.sql", now, 9 * DAY);

        prune(dir.path(), &RetentionPolicy::new(4), now, &[]).unwrap();

        assert_eq!(remaining(dir.path()), vec!["archive"]);
        assert!(sub.join("nested.sql").exists());
    }

    #[test]
    fn test_prune_is_idempotent() {
        let dir = tempdir().unwrap();
        let now = fixed_now();
        for days in [2, 6, 8] {
            file_aged(dir.path(), &format!("f{}.sql", days), now, days * DAY);
        }
        let policy = RetentionPolicy::new(5);

        prune(dir.path(), &policy, now, &[]).unwrap();
        let after_first = remaining(dir.path());
        let second = prune(dir.path(), &policy, now, &[]).unwrap();

        assert_eq!(remaining(dir.path()), after_first);
        assert!(second.removed.is_empty());
    }

    #[test]
    fn test_missing_directory_is_prune_error() {
        let dir = tempdir().unwrap();
        let result = prune(&dir.path().join("gone"), &RetentionPolicy::new(1), fixed_now(), &[]);
        assert!(matches!(result, Err(BackupError::Prune(_))));
    }

    #[test]
    fn test_delete_failure_does_not_stop_pruning() {
        let dir = tempdir().unwrap();
        let now = fixed_now();
        let stuck = file_aged(dir.path(), "b_stuck.sql", now, 10 * DAY);
        file_aged(dir.path(), "a_old.sql", now, 10 * DAY);
        file_aged(dir.path(), "c_old.sql", now, 8 * DAY);
        file_aged(dir.path(), "fresh.sql", now, DAY);

        let mut attempted = Vec::new();
        let report = prune_with(dir.path(), &RetentionPolicy::new(4), now, &[], |path| {
            attempted.push(path.to_path_buf());
            if path == stuck.as_path() {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "file in use"))
            } else {
                fs::remove_file(path)
            }
        })
        .unwrap();

        assert_eq!(attempted.len(), 3);
        assert_eq!(remaining(dir.path()), vec!["b_stuck.sql", "fresh.sql"]);
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.kept, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, stuck);
        assert!(report.failures[0].1.contains("file in use"));
        assert!(!report.is_clean());
    }
}
