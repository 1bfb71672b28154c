//! WIA integration point.
//!
//! The WIA device manager and acquisition dialog are driven by an external
//! helper executable shipped with the desktop app. This side only speaks
//! its command-line contract:
//!
//! - `helper probe` exits 0 when WIA is usable;
//! - `helper list` prints one scanner name per line;
//! - `helper acquire <path>` shows the scan dialog and writes a JPEG to
//!   `<path>`; any non-zero exit or missing file means the user cancelled.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{ScanError, Scanner, temp_scan_path};

/// How long `helper probe` may take before the bridge is given up on.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
struct WiaBridge {
    program: PathBuf,
    leading_args: Vec<String>,
}

impl WiaBridge {
    fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.leading_args);
        cmd.kill_on_drop(true);
        cmd
    }
}

pub struct WindowsScanner {
    bridge: Option<WiaBridge>,
}

impl WindowsScanner {
    pub async fn probe(helper: &Path) -> Self {
        Self::probe_command(helper, Vec::new(), PROBE_TIMEOUT).await
    }

    /// Like [`probe`](Self::probe) but runs `program leading_args.. <verb>`,
    /// for helpers launched through an interpreter.
    pub async fn probe_command(
        program: impl Into<PathBuf>,
        leading_args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        let bridge = WiaBridge {
            program: program.into(),
            leading_args,
        };
        let probe = tokio::time::timeout(timeout, bridge.command().arg("probe").output()).await;
        match probe {
            Ok(Ok(output)) if output.status.success() => {
                tracing::info!(helper = %bridge.program.display(), "WIA bridge ready");
                Self { bridge: Some(bridge) }
            }
            Ok(Ok(output)) => {
                tracing::error!(
                    helper = %bridge.program.display(),
                    status = %output.status,
                    "Failed to initialize scanner functions: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                Self::uninitialized()
            }
            Ok(Err(e)) => {
                tracing::error!(
                    helper = %bridge.program.display(),
                    "Failed to initialize scanner functions: {}",
                    e
                );
                Self::uninitialized()
            }
            Err(_) => {
                tracing::error!(
                    helper = %bridge.program.display(),
                    "Failed to initialize scanner functions: probe timed out after {:?}",
                    timeout
                );
                Self::uninitialized()
            }
        }
    }

    pub fn uninitialized() -> Self {
        Self { bridge: None }
    }

    pub fn is_initialized(&self) -> bool {
        self.bridge.is_some()
    }

    fn bridge(&self) -> Result<&WiaBridge, ScanError> {
        self.bridge.as_ref().ok_or(ScanError::NotInitialized)
    }
}

#[async_trait]
impl Scanner for WindowsScanner {
    fn name(&self) -> &'static str {
        "windows-wia"
    }

    async fn list_scanners(&self) -> Result<Vec<String>, ScanError> {
        let bridge = self.bridge()?;
        let output = match bridge.command().arg("list").output().await {
            Ok(o) if o.status.success() => o,
            Ok(o) => {
                tracing::warn!(status = %o.status, "Error listing scanners");
                return Ok(Vec::new());
            }
            Err(e) => {
                tracing::warn!("Error listing scanners: {}", e);
                return Ok(Vec::new());
            }
        };
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn scan_image(&self) -> Result<Option<PathBuf>, ScanError> {
        let bridge = self.bridge()?;
        let target = temp_scan_path();
        let status = bridge
            .command()
            .arg("acquire")
            .arg(&target)
            .status()
            .await
            .map_err(|e| ScanError::Driver(format!("failed to start WIA helper: {}", e)))?;

        if status.success() && target.is_file() {
            tracing::info!(path = %target.display(), "Scan acquired");
            Ok(Some(target))
        } else {
            tracing::info!(%status, "Scan dialog closed without an image");
            Ok(None)
        }
    }
}
