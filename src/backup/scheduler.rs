use crate::backup::job::run_backup_cycle;
use crate::config::{BackupConfig, Schedule};
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::select;
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SchedulerSummary {
    pub runs: u64,
    pub failures: u64,
}

fn next_run_after(now: DateTime<Utc>, interval_secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(interval_secs).ok()?;
    now.checked_add_signed(Duration::try_seconds(secs)?)
}

/// Runs backup cycles back to back, sleeping `schedule` between the end of one
/// cycle and the start of the next, until `shutdown` becomes non-zero.
///
/// Cycles run on this task only, so two never overlap. A failed cycle is
/// logged and retried at the next tick.
pub async fn run_scheduler(
    config: Arc<BackupConfig>,
    schedule: Schedule,
    shutdown: Arc<AtomicUsize>,
) -> SchedulerSummary {
    let interval_secs = schedule.as_seconds();
    info!("Starting backup scheduler ({})", schedule);

    let mut summary = SchedulerSummary::default();

    loop {
        if shutdown.load(Ordering::Relaxed) > 0 {
            info!("Scheduler shutdown requested");
            break;
        }

        summary.runs += 1;
        match run_backup_cycle(&config).await {
            Ok(outcome) => {
                info!(
                    "Backup {} completed: {:.2} MB in {} sec",
                    outcome.artifact.file_name(),
                    outcome.file_size as f64 / 1024.0 / 1024.0,
                    outcome.duration_secs
                );
            }
            Err(e) => {
                summary.failures += 1;
                error!("Backup failed: {}", e);
            }
        }

        match next_run_after(Utc::now(), interval_secs) {
            Some(next_run) => {
                info!("Next backup at {}", next_run.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            None => warn!("Next backup in {} seconds", interval_secs),
        }

        select! {
            _ = sleep(std::time::Duration::from_secs(interval_secs)) => {}
            _ = async {
                while shutdown.load(Ordering::Relaxed) == 0 {
                    sleep(std::time::Duration::from_millis(100)).await;
                }
            } => {
                info!("Scheduler shutdown requested during wait");
                break;
            }
        }
    }

    if summary.failures > 0 {
        warn!(
            "Scheduler stopped: {} of {} runs failed",
            summary.failures, summary.runs
        );
    } else {
        info!("Scheduler stopped after {} runs", summary.runs);
    }
    summary
}
