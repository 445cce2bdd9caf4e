use std::fmt;
use std::io;
#[derive(Debug)]
pub enum BackupError {
    Config(String),
    Connection(String),
    DumpWrite(String),
    Prune(String),
    Io(io::Error),
}

impl BackupError {
    pub fn exit_code(&self) -> u8 {
        match self {
            BackupError::Config(_) => 2,
            BackupError::Connection(_) => 3,
            BackupError::DumpWrite(_) => 4,
            _ => 1,
        }
    }

    /// Plain IO failures raised while producing a dump are write failures.
    pub fn into_dump_error(self) -> Self {
        match self {
            BackupError::Io(err) => BackupError::DumpWrite(err.to_string()),
            other => other,
        }
    }
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupError::Config(msg) => write!(f, "Configuration error: {}", msg),
            BackupError::Connection(msg) => write!(f, "Database connection error: {}", msg),
            BackupError::DumpWrite(msg) => write!(f, "Dump write error: {}", msg),
            BackupError::Prune(msg) => write!(f, "Prune error: {}", msg),
            BackupError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for BackupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackupError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for BackupError {
    fn from(err: io::Error) -> Self {
        BackupError::Io(err)
    }
}

impl From<mysql_async::Error> for BackupError {
    fn from(err: mysql_async::Error) -> Self {
        BackupError::Connection(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
