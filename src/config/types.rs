use crate::error::BackupError;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_KEEP_DAYS: u32 = 4;
pub const DEFAULT_MYSQLDUMP_BIN: &str = "mysqldump";
/// Longest accepted `RUN_EVERY` interval.
pub const MAX_SCHEDULE_SECS: u64 = 365 * 86_400;

/// A password that never shows up in logs or debug output.
#[derive(Clone, PartialEq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(****)")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "****")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DumpOptions {
    /// Skip DDL and dump rows only.
    pub data_only: bool,
    /// Restrict the dump to these tables; empty means the whole schema.
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TargetScope {
    AllDatabases,
    NamedSchema { name: String, options: DumpOptions },
}

impl TargetScope {
    /// Filename prefix used for artifacts of this scope.
    pub fn prefix(&self) -> &str {
        match self {
            TargetScope::AllDatabases => "all",
            TargetScope::NamedSchema { name, .. } => name,
        }
    }
}

impl std::fmt::Display for TargetScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetScope::AllDatabases => write!(f, "all databases"),
            TargetScope::NamedSchema { name, options } => {
                write!(f, "schema '{}'", name)?;
                if !options.tables.is_empty() {
                    write!(f, " (tables: {})", options.tables.join(", "))?;
                }
                if options.data_only {
                    write!(f, " [data only]")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpMethod {
    Mysqldump,
    Native,
}

impl FromStr for DumpMethod {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysqldump" => Ok(DumpMethod::Mysqldump),
            "native" => Ok(DumpMethod::Native),
            other => Err(BackupError::Config(format!(
                "unknown dump method '{}' (expected 'mysqldump' or 'native')",
                other
            ))),
        }
    }
}

impl std::fmt::Display for DumpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DumpMethod::Mysqldump => write!(f, "mysqldump"),
            DumpMethod::Native => write!(f, "native"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    Minutes(u32),
    Hours(u32),
    Days(u32),
}

impl Schedule {
    pub fn as_seconds(&self) -> u64 {
        match self {
            Schedule::Minutes(n) => *n as u64 * 60,
            Schedule::Hours(n) => *n as u64 * 3600,
            Schedule::Days(n) => *n as u64 * 86400,
        }
    }
}

impl FromStr for Schedule {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || {
            BackupError::Config(format!(
                "invalid schedule '{}' (expected e.g. '30m', '6h' or '1d')",
                s
            ))
        };
        let Some(unit) = s.chars().last() else {
            return Err(invalid());
        };
        let count = &s[..s.len() - unit.len_utf8()];
        let n: u32 = count.parse().map_err(|_| invalid())?;
        if n == 0 {
            return Err(invalid());
        }
        let schedule = match unit {
            'm' => Schedule::Minutes(n),
            'h' => Schedule::Hours(n),
            'd' => Schedule::Days(n),
            _ => return Err(invalid()),
        };
        if schedule.as_seconds() > MAX_SCHEDULE_SECS {
            return Err(BackupError::Config(format!(
                "schedule '{}' exceeds the maximum of 365 days",
                s
            )));
        }
        Ok(schedule)
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Minutes(n) => write!(f, "Every {} minute(s)", n),
            Schedule::Hours(n) => write!(f, "Every {} hour(s)", n),
            Schedule::Days(n) => write!(f, "Every {} day(s)", n),
        }
    }
}

/// Everything one backup cycle needs. Built fresh for every run.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret,
    pub scope: TargetScope,
    pub output_directory: PathBuf,
    pub retention_days: u32,
    pub dump_method: DumpMethod,
    /// Resolved path of the mysqldump executable.
    pub mysqldump_bin: PathBuf,
    pub schedule: Option<Schedule>,
}

/// Optional TOML layer. Every field can be overridden from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    #[serde(default)]
    pub tables: Vec<String>,
    pub data_only: Option<bool>,
    pub out_path: Option<PathBuf>,
    pub keep_days: Option<u32>,
    pub dump_method: Option<DumpMethod>,
    pub mysqldump_bin: Option<PathBuf>,
    pub run_every: Option<String>,
}
