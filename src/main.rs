mod backup;
mod config;
mod database;
mod error;
mod log;
#[cfg(test)]
mod test_support;

use config::{BackupConfig, Schedule};
use error::BackupError;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    log::init();

    let config = match config::load() {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    match config.schedule {
        Some(schedule) => run_scheduled(config, schedule).await,
        None => match backup::run_backup_cycle(&config).await {
            Ok(outcome) => {
                let removed = outcome.prune.map(|p| p.removed.len()).unwrap_or(0);
                info!(
                    "Backup taken at {} stored as {}; {} expired file(s) removed",
                    outcome.artifact.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    outcome.artifact.path.display(),
                    removed
                );
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        },
    }
}

async fn run_scheduled(config: BackupConfig, schedule: Schedule) -> ExitCode {
    let shutdown = Arc::new(AtomicUsize::new(0));
    let shutdown_clone = shutdown.clone();

    let handler = ctrlc::set_handler(move || {
        let count = shutdown_clone.fetch_add(1, Ordering::SeqCst);

        if count == 0 {
            eprintln!("\nShutdown signal received. Press Ctrl+C again to force exit...");
        } else {
            eprintln!("\nForce exiting...");
            std::process::exit(130);
        }
    });
    if let Err(e) = handler {
        return fail(BackupError::Config(format!(
            "cannot install signal handler: {}",
            e
        )));
    }

    let summary = backup::run_scheduler(Arc::new(config), schedule, shutdown).await;
    info!("Exiting after {} scheduled runs", summary.runs);
    ExitCode::SUCCESS
}

fn fail(e: BackupError) -> ExitCode {
    error!("{}", e);
    ExitCode::from(e.exit_code())
}
