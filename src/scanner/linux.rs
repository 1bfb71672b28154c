use async_trait::async_trait;
use std::path::PathBuf;

use super::{ScanError, Scanner};

/// Placeholder until a SANE backend exists.
pub struct LinuxScanner;

#[async_trait]
impl Scanner for LinuxScanner {
    fn name(&self) -> &'static str {
        "linux"
    }

    async fn list_scanners(&self) -> Result<Vec<String>, ScanError> {
        Ok(vec!["Scanner 1".to_string(), "Scanner 2".to_string()])
    }

    async fn scan_image(&self) -> Result<Option<PathBuf>, ScanError> {
        tracing::debug!("Linux scanning is not implemented; reporting cancel");
        Ok(None)
    }
}
