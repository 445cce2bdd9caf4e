use crate::error::Result;
use async_trait::async_trait;
use std::fs::File;

/// Produces one consistent export of the configured scope into `destination`.
#[async_trait]
pub trait DumpProducer: Send + Sync {
    async fn dump(&self, destination: File) -> Result<()>;
    fn method_name(&self) -> &'static str;
}
