use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};

/// Timestamp layout embedded in artifact names. Sorts lexicographically and
/// avoids characters that are awkward on common filesystems.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

const NAME_MARKER: &str = "_backup_";
const EXTENSION: &str = ".sql";

#[derive(Debug, Clone, PartialEq)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl BackupArtifact {
    pub fn new(output_directory: &Path, prefix: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            path: output_directory.join(artifact_file_name(prefix, created_at)),
            created_at,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub fn artifact_file_name(prefix: &str, created_at: DateTime<Utc>) -> String {
    format!(
        "{}{}{}{}",
        prefix,
        NAME_MARKER,
        created_at.format(TIMESTAMP_FORMAT),
        EXTENSION
    )
}

/// Splits an artifact file name back into its prefix and capture time.
pub fn parse_artifact_name(name: &str) -> Option<(String, DateTime<Utc>)> {
    let stem = name.strip_suffix(EXTENSION)?;
    let (prefix, stamp) = stem.rsplit_once(NAME_MARKER)?;
    if prefix.is_empty() {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
    Some((prefix.to_string(), naive.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_artifact_file_name() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 4, 5, 6).unwrap();
        assert_eq!(
            artifact_file_name("all", at),
            "all_backup_2026-03-07T04-05-06.sql"
        );
        let artifact = BackupArtifact::new(Path::new("/var/backups"), "shop", at);
        assert_eq!(
            artifact.path,
            PathBuf::from("/var/backups/shop_backup_2026-03-07T04-05-06.sql")
        );
        assert_eq!(artifact.file_name(), "shop_backup_2026-03-07T04-05-06.sql");
    }

    #[test]
    fn test_names_sort_chronologically() {
        let times = [
            Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 2, 9, 0, 0).unwrap(),
        ];
        let mut names: Vec<String> = times.iter().rev().map(|t| artifact_file_name("all", *t)).collect();
        names.sort();
        let expected: Vec<String> = times.iter().map(|t| artifact_file_name("all", *t)).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_parse_artifact_name() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 4, 5, 6).unwrap();
        assert_eq!(
            parse_artifact_name("my_shop_backup_2026-03-07T04-05-06.sql"),
            Some(("my_shop".to_string(), at))
        );
        assert_eq!(parse_artifact_name("notes.txt"), None);
        assert_eq!(parse_artifact_name("_backup_2026-03-07T04-05-06.sql"), None);
        assert_eq!(parse_artifact_name("all_backup_yesterday.sql"), None);
    }
}
