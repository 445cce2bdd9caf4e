pub mod artifact;
pub mod job;
pub mod retention;
pub mod scheduler;

pub use job::run_backup_cycle;
pub use scheduler::run_scheduler;
