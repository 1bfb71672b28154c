//! Hardware scanner access.
//!
//! One [`Scanner`] implementation per platform, picked once by [`detect`]
//! and handed to the shell. Nothing re-detects at runtime.

mod linux;
mod windows;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use linux::LinuxScanner;
pub use windows::WindowsScanner;

/// Substring every temporary scan file carries in its name. Cleanup only
/// ever deletes paths containing it.
pub const TEMP_SCAN_MARKER: &str = "tmp_scan";

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Scanner functions not initialized. Make sure you are on Windows.")]
    NotInitialized,

    #[error("scanner driver error: {0}")]
    Driver(String),
}

#[async_trait]
pub trait Scanner: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_scanners(&self) -> Result<Vec<String>, ScanError>;

    /// `Ok(None)` means the user cancelled the acquisition.
    async fn scan_image(&self) -> Result<Option<PathBuf>, ScanError>;
}

/// Stands in on platforms without a backend.
pub struct UnsupportedScanner;

#[async_trait]
impl Scanner for UnsupportedScanner {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    async fn list_scanners(&self) -> Result<Vec<String>, ScanError> {
        Ok(Vec::new())
    }

    async fn scan_image(&self) -> Result<Option<PathBuf>, ScanError> {
        Ok(None)
    }
}

pub async fn detect(wia_helper: &Path) -> Arc<dyn Scanner> {
    for_os(std::env::consts::OS, wia_helper).await
}

pub async fn for_os(os: &str, wia_helper: &Path) -> Arc<dyn Scanner> {
    let scanner: Arc<dyn Scanner> = match os {
        "windows" => Arc::new(WindowsScanner::probe(wia_helper).await),
        "linux" => Arc::new(LinuxScanner),
        _ => Arc::new(UnsupportedScanner),
    };
    tracing::info!(os, backend = scanner.name(), "Scanner backend selected");
    scanner
}

/// Fresh path in the system temp dir carrying [`TEMP_SCAN_MARKER`].
pub fn temp_scan_path() -> PathBuf {
    std::env::temp_dir().join(format!("{}_{}.jpg", TEMP_SCAN_MARKER, uuid::Uuid::new_v4()))
}

pub fn is_temp_scan(path: &Path) -> bool {
    path.to_string_lossy().contains(TEMP_SCAN_MARKER)
}
