//! Fixtures shared by the unit tests.

use crate::config::{BackupConfig, DumpMethod, Secret, TargetScope};
use std::path::{Path, PathBuf};

/// Emits DDL unless `--no-create-info` is given, and reports whether the
/// password arrived through the environment.
pub const SUCCESSFUL_DUMP: &str = r#"
data_only=0
for arg in "$@"; do
  if [ "$arg" = "--no-create-info" ]; then data_only=1; fi
done
echo "-- fake mysqldump"
if [ -n "$MYSQL_PWD" ]; then echo "-- password seen: yes"; fi
if [ "$data_only" = "0" ]; then
  echo "CREATE TABLE \`orders\` (\`id\` int NOT NULL);"
fi
echo "INSERT INTO \`orders\` VALUES (1),(2);"
"#;

pub const REFUSED_CONNECTION: &str = r#"
echo "-- partial output"
echo "mysqldump: Got error: 2003: Can't connect to MySQL server on 'db.internal:3306' (111)" >&2
exit 2
"#;

#[cfg(unix)]
pub fn fake_mysqldump(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("mysqldump");
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn config_for(output_directory: &Path, mysqldump_bin: &Path) -> BackupConfig {
    BackupConfig {
        host: "db.internal".to_string(),
        port: 3306,
        user: "backup".to_string(),
        password: Secret::new("s3cret"),
        scope: TargetScope::AllDatabases,
        output_directory: output_directory.to_path_buf(),
        retention_days: 4,
        dump_method: DumpMethod::Mysqldump,
        mysqldump_bin: mysqldump_bin.to_path_buf(),
        schedule: None,
    }
}
