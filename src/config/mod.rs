mod types;

pub use types::*;

use crate::error::{BackupError, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Points at an optional TOML file holding defaults for every setting.
pub const CONFIG_FILE_VAR: &str = "BACKUP_CONFIG";

/// Builds the run configuration from the process environment.
pub fn load() -> Result<BackupConfig> {
    let lookup = |key: &str| env::var(key).ok();
    let file = match lookup(CONFIG_FILE_VAR).filter(|v| !v.trim().is_empty()) {
        Some(path) => load_from(Path::new(path.trim()))?,
        None => FileConfig::default(),
    };
    from_sources(file, lookup)
}

pub fn load_from(path: &Path) -> Result<FileConfig> {
    if !path.is_file() {
        return Err(BackupError::Config(format!(
            "config file {} does not exist",
            path.display()
        )));
    }

    info!("Loading configuration from {:?}", path);
    let contents = fs::read_to_string(path).map_err(|e| {
        BackupError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    toml::from_str(&contents)
        .map_err(|e| BackupError::Config(format!("invalid {}: {}", path.display(), e)))
}

/// Merges the file layer with variables from `lookup`; variables win.
///
/// Required settings (host, user, password, output directory) are checked
/// before anything touches the network or the filesystem beyond a stat of
/// the output directory.
pub fn from_sources<F>(file: FileConfig, lookup: F) -> Result<BackupConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let host = var("DB_HOST").or(file.host).ok_or_else(|| missing("DB_HOST"))?;
    let user = var("DB_USER").or(file.user).ok_or_else(|| missing("DB_USER"))?;
    // Passwords keep surrounding whitespace.
    let password = lookup("DB_PASSWORD")
        .filter(|v| !v.is_empty())
        .or(file.password)
        .map(Secret::new)
        .ok_or_else(|| missing("DB_PASSWORD"))?;
    let output_directory = var("OUT_PATH")
        .map(PathBuf::from)
        .or(file.out_path)
        .ok_or_else(|| missing("OUT_PATH"))?;

    let port = match var("DB_PORT") {
        Some(raw) => parse_number::<u16>("DB_PORT", &raw)?,
        None => file.port.unwrap_or(DEFAULT_PORT),
    };
    if port == 0 {
        return Err(BackupError::Config("DB_PORT must not be 0".to_string()));
    }

    let retention_days = match var("KEEP_DAYS") {
        Some(raw) => parse_number::<u32>("KEEP_DAYS", &raw)?,
        None => file.keep_days.unwrap_or(DEFAULT_KEEP_DAYS),
    };

    if !output_directory.is_dir() {
        return Err(BackupError::Config(format!(
            "OUT_PATH {} does not exist or is not a directory",
            output_directory.display()
        )));
    }

    let scope = target_scope(&var, file.database, file.tables, file.data_only)?;

    let dump_method = match var("DUMP_METHOD") {
        Some(raw) => raw.parse()?,
        None => file.dump_method.unwrap_or(DumpMethod::Mysqldump),
    };
    let mysqldump_bin = var("MYSQLDUMP_BIN")
        .map(PathBuf::from)
        .or(file.mysqldump_bin)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MYSQLDUMP_BIN));
    let mysqldump_bin = if dump_method == DumpMethod::Mysqldump {
        let resolved = which::which(&mysqldump_bin).map_err(|e| {
            BackupError::Config(format!(
                "mysqldump executable '{}' not usable: {}",
                mysqldump_bin.display(),
                e
            ))
        })?;
        debug!("Using mysqldump at {}", resolved.display());
        resolved
    } else {
        mysqldump_bin
    };

    let schedule = var("RUN_EVERY")
        .or(file.run_every)
        .map(|raw| raw.parse::<Schedule>())
        .transpose()?;

    Ok(BackupConfig {
        host,
        port,
        user,
        password,
        scope,
        output_directory,
        retention_days,
        dump_method,
        mysqldump_bin,
        schedule,
    })
}

fn target_scope<V>(
    var: &V,
    file_database: Option<String>,
    file_tables: Vec<String>,
    file_data_only: Option<bool>,
) -> Result<TargetScope>
where
    V: Fn(&str) -> Option<String>,
{
    let database = var("DB_NAME").or(file_database);
    let tables = match var("DB_TABLES") {
        Some(raw) => split_list(&raw),
        None => file_tables,
    };
    let data_only = match var("DATA_ONLY") {
        Some(raw) => parse_bool("DATA_ONLY", &raw)?,
        None => file_data_only.unwrap_or(false),
    };

    match database {
        Some(name) => {
            validate_identifier("DB_NAME", &name)?;
            for table in &tables {
                validate_identifier("DB_TABLES", table)?;
            }
            Ok(TargetScope::NamedSchema {
                name,
                options: DumpOptions { data_only, tables },
            })
        }
        None => {
            if !tables.is_empty() {
                return Err(BackupError::Config(
                    "DB_TABLES requires DB_NAME to be set".to_string(),
                ));
            }
            if data_only {
                return Err(BackupError::Config(
                    "DATA_ONLY requires DB_NAME to be set".to_string(),
                ));
            }
            Ok(TargetScope::AllDatabases)
        }
    }
}

fn missing(key: &str) -> BackupError {
    BackupError::Config(format!("{} must be set", key))
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| BackupError::Config(format!("{} has invalid value '{}'", key, raw)))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(BackupError::Config(format!(
            "{} has invalid value '{}'",
            key, raw
        ))),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Names end up in mysqldump arguments and artifact filenames.
fn validate_identifier(key: &str, name: &str) -> Result<()> {
    let valid = !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(BackupError::Config(format!(
            "{} contains an invalid name '{}'",
            key, name
        )))
    }
}
