use crate::backup::artifact::BackupArtifact;
use crate::backup::retention::{prune, PruneReport, RetentionPolicy};
use crate::config::BackupConfig;
use crate::database::create_producer;
use crate::error::{BackupError, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug)]
pub struct BackupOutcome {
    pub artifact: BackupArtifact,

    pub file_size: u64,

    pub duration_secs: u64,

    /// `None` when the directory could not be listed at all.
    pub prune: Option<PruneReport>,
}

/// Runs one dump-and-prune cycle.
///
/// Pruning only happens after the dump finished successfully, so a failed
/// run never removes older backups.
pub async fn run_backup_cycle(config: &BackupConfig) -> Result<BackupOutcome> {
    run_backup_cycle_at(config, Utc::now()).await
}

async fn run_backup_cycle_at(
    config: &BackupConfig,
    started_at: DateTime<Utc>,
) -> Result<BackupOutcome> {
    let start = Instant::now();
    info!(
        "Starting backup of {} on {}:{} via {}",
        config.scope, config.host, config.port, config.dump_method
    );

    let producer = create_producer(config)?;
    let artifact = BackupArtifact::new(&config.output_directory, config.scope.prefix(), started_at);

    let file = File::create(&artifact.path).map_err(|e| {
        BackupError::DumpWrite(format!("cannot create {}: {}", artifact.path.display(), e))
    })?;

    if let Err(e) = producer.dump(file).await {
        let e = e.into_dump_error();
        error!("{} dump failed: {}", producer.method_name(), e);
        if let Err(rm) = fs::remove_file(&artifact.path) {
            warn!("Could not remove partial dump {}: {}", artifact.path.display(), rm);
        }
        return Err(e);
    }

    let file_size = fs::metadata(&artifact.path).map(|m| m.len()).unwrap_or(0);
    info!(
        "Wrote {} ({:.2} MB)",
        artifact.file_name(),
        file_size as f64 / 1024.0 / 1024.0
    );

    let policy = RetentionPolicy::new(config.retention_days);
    let prune = match prune(
        &config.output_directory,
        &policy,
        started_at.into(),
        &[artifact.path.as_path()],
    ) {
        Ok(report) => {
            if !report.is_clean() {
                warn!(
                    "{} file(s) could not be pruned; they will be retried next run",
                    report.failures.len()
                );
            }
            Some(report)
        }
        Err(e) => {
            error!("{}", e);
            None
        }
    };

    let duration_secs = start.elapsed().as_secs();
    info!("Backup cycle completed in {} seconds", duration_secs);

    Ok(BackupOutcome {
        artifact,
        file_size,
        duration_secs,
        prune,
    })
}
