use super::driver::DumpProducer;
use crate::config::{BackupConfig, Secret, TargetScope};
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// mysqldump's exit status when writing the dump failed.
const EX_EOF: i32 = 5;

/// Runs the `mysqldump` client and streams its stdout straight into the artifact.
pub struct MysqldumpProducer {
    program: PathBuf,
    host: String,
    port: u16,
    user: String,
    password: Secret,
    scope: TargetScope,
}

impl MysqldumpProducer {
    pub fn new(config: &BackupConfig) -> Self {
        Self {
            program: config.mysqldump_bin.clone(),
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            password: config.password.clone(),
            scope: config.scope.clone(),
        }
    }

    /// The password is passed through `MYSQL_PWD`, never on the command line.
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            format!("--host={}", self.host),
            format!("--port={}", self.port),
            format!("--user={}", self.user),
            "--single-transaction".to_string(),
            "--quick".to_string(),
        ];

        match &self.scope {
            TargetScope::AllDatabases => args.push("--all-databases".to_string()),
            TargetScope::NamedSchema { name, options } => {
                if options.data_only {
                    args.push("--no-create-info".to_string());
                    args.push("--skip-triggers".to_string());
                }
                args.push(name.clone());
                args.extend(options.tables.iter().cloned());
            }
        }

        args
    }
}

fn classify_failure(code: Option<i32>, stderr: &str) -> BackupError {
    match code {
        Some(EX_EOF) => {
            BackupError::DumpWrite(format!("mysqldump could not write the dump: {}", stderr))
        }
        Some(code) => {
            BackupError::Connection(format!("mysqldump exited with status {}: {}", code, stderr))
        }
        None => BackupError::Connection(format!("mysqldump was terminated by a signal: {}", stderr)),
    }
}

#[async_trait]
impl DumpProducer for MysqldumpProducer {
    async fn dump(&self, destination: File) -> Result<()> {
        info!(
            "Running mysqldump against {}:{} for {}",
            self.host, self.port, self.scope
        );
        let args = self.arguments();
        debug!("{} {}", self.program.display(), args.join(" "));

        let child = Command::new(&self.program)
            .args(&args)
            .env("MYSQL_PWD", self.password.expose())
            .stdin(Stdio::null())
            .stdout(Stdio::from(destination))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BackupError::Config(format!(
                    "failed to start {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        let output = child.wait_with_output().await?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(classify_failure(output.status.code(), &stderr));
        }
        if !stderr.is_empty() {
            warn!("mysqldump: {}", stderr);
        }
        Ok(())
    }

    fn method_name(&self) -> &'static str {
        "mysqldump"
    }
}
