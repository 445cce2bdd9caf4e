mod driver;
mod mysql;
mod mysqldump;

pub use driver::DumpProducer;
pub use mysql::MysqlDriver;
pub use mysqldump::MysqldumpProducer;

use crate::config::{BackupConfig, DumpMethod};
use crate::error::Result;
pub fn create_producer(config: &BackupConfig) -> Result<Box<dyn DumpProducer>> {
    match config.dump_method {
        DumpMethod::Mysqldump => Ok(Box::new(MysqldumpProducer::new(config))),
        DumpMethod::Native => {
            let driver = MysqlDriver::new(config)?;
            Ok(Box::new(driver))
        }
    }
}
