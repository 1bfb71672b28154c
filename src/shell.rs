//! Workflow operations behind every user command.
//!
//! Settings are re-read from disk for each suggestion and upload. The
//! session lock is never held across an await.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::advisor::FilenameAdvisor;
use crate::config::AppConfig;
use crate::paperless::{PaperlessClient, UploadResult};
use crate::scanner::{self, ScanError, Scanner};
use crate::session::{ScanSession, SessionError, SessionState};
use crate::settings::{ConfigError, ConfigStore, Settings};

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Paperless-ngx configuration missing. Please configure in Settings.")]
    MissingUploadSettings,

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScanOutcome {
    Scanned { image: PathBuf, suggestion: String },
    Cancelled,
}

pub struct Shell {
    store: ConfigStore,
    scanner: Arc<dyn Scanner>,
    advisor: FilenameAdvisor,
    uploader: PaperlessClient,
    session: Mutex<ScanSession>,
}

/// Holds the session in `Scanning`/`Uploading` for one call. If that call
/// is dropped before [`disarm`](Self::disarm), the session is released.
struct InFlight<'a> {
    session: &'a Mutex<ScanSession>,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(session: &'a Mutex<ScanSession>) -> Self {
        Self { session, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("Operation dropped before completion, releasing session");
            self.session.lock().abandon();
        }
    }
}

impl Shell {
    pub async fn new(config: &AppConfig) -> Self {
        Self::with_scanner(config, scanner::detect(&config.wia_helper).await)
    }

    pub fn with_scanner(config: &AppConfig, scanner: Arc<dyn Scanner>) -> Self {
        Self {
            store: ConfigStore::new(&config.settings_path),
            scanner,
            advisor: FilenameAdvisor::new(config),
            uploader: PaperlessClient::new(),
            session: Mutex::new(ScanSession::new()),
        }
    }

    pub fn session_snapshot(&self) -> SessionState {
        self.session.lock().state().clone()
    }

    pub async fn list_scanners(&self) -> Result<Vec<String>, ShellError> {
        Ok(self.scanner.list_scanners().await?)
    }

    /// Acquires an image and, when one arrives, asks for a name right away.
    pub async fn scan(&self) -> Result<ScanOutcome, ShellError> {
        self.session.lock().begin_scan()?;
        let in_flight = InFlight::new(&self.session);

        let scanned = self.scanner.scan_image().await;
        in_flight.disarm();
        let image = match scanned {
            Ok(image) => image,
            Err(e) => {
                tracing::error!("Scan failed: {}", e);
                self.session.lock().scan_failed();
                return Err(e.into());
            }
        };
        self.session.lock().scan_finished(image.clone())?;

        let Some(image) = image else {
            tracing::info!("Scan cancelled");
            return Ok(ScanOutcome::Cancelled);
        };

        let suggestion = self.suggest(&image).await;
        // The user may already have named or replaced the image meanwhile.
        if let Err(e) = self.session.lock().offer_suggestion(suggestion.clone()) {
            tracing::debug!("Suggestion not applied: {}", e);
        }
        Ok(ScanOutcome::Scanned { image, suggestion })
    }

    /// Empty when no provider is configured, settings can't be loaded or
    /// the provider call fails.
    pub async fn suggest(&self, image: &Path) -> String {
        let Some(settings) = self.store.load() else {
            return String::new();
        };
        self.advisor.suggest(image, &settings).await
    }

    pub fn approve_name(&self, name: &str) -> Result<String, ShellError> {
        Ok(self.session.lock().approve_name(name)?)
    }

    pub fn skip_naming(&self) -> Result<(), ShellError> {
        Ok(self.session.lock().skip_naming()?)
    }

    pub fn select_file(&self, path: PathBuf) -> Result<PathBuf, ShellError> {
        if !path.is_file() {
            return Err(ShellError::FileNotFound(path));
        }
        self.session.lock().select_file(path.clone())?;
        Ok(path)
    }

    fn paperless_settings(&self) -> Result<(String, String), ShellError> {
        let settings = self.store.load().unwrap_or_default();
        settings
            .paperless()
            .map(|(url, token)| (url.to_string(), token.to_string()))
            .ok_or(ShellError::MissingUploadSettings)
    }

    /// Uploads a file outside the session, as the GUI's direct upload does.
    pub async fn upload_file(&self, path: &Path, filename: Option<&str>) -> Result<UploadResult, ShellError> {
        let (api_url, api_token) = self.paperless_settings()?;
        Ok(self.uploader.upload(path, &api_url, &api_token, filename).await)
    }

    /// Uploads the session's image under its approved name. Success clears
    /// the session and removes temp scans; failure keeps both for a retry.
    pub async fn upload_current(&self) -> Result<UploadResult, ShellError> {
        let (api_url, api_token) = self.paperless_settings()?;
        let (image, filename) = self.session.lock().begin_upload()?;
        let in_flight = InFlight::new(&self.session);

        let result = self
            .uploader
            .upload(&image, &api_url, &api_token, filename.as_deref())
            .await;
        in_flight.disarm();

        let outcome = if result.success {
            Ok(())
        } else {
            Err(match result.status_code {
                Some(code) => format!("HTTP {}: {}", code, result.response),
                None => result.response.to_string(),
            })
        };
        let uploaded = self.session.lock().upload_finished(outcome)?;
        if let Some(image) = uploaded {
            self.cleanup_temp(&image).await;
            self.session.lock().reset();
        }
        Ok(result)
    }

    pub fn load_config(&self) -> Settings {
        self.store.load().unwrap_or_default()
    }

    pub fn save_config(&self, settings: &Settings) -> Result<(), ShellError> {
        Ok(self.store.save(settings)?)
    }

    /// Deletes `path` only if it is a temp scan. Returns whether a file was
    /// removed; errors are logged, never raised.
    pub async fn cleanup_temp(&self, path: &Path) -> bool {
        if !scanner::is_temp_scan(path) {
            return false;
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed temp scan");
                true
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Error cleaning up temp file: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Returns a fixed answer for every scan.
    struct FakeScanner {
        result: fn() -> Result<Option<PathBuf>, ScanError>,
    }

    #[async_trait]
    impl Scanner for FakeScanner {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn list_scanners(&self) -> Result<Vec<String>, ScanError> {
            Ok(vec!["Fake Flatbed".into()])
        }

        async fn scan_image(&self) -> Result<Option<PathBuf>, ScanError> {
            (self.result)()
        }
    }

    /// Never finishes, like a scan dialog nobody closes.
    struct StalledScanner;

    #[async_trait]
    impl Scanner for StalledScanner {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn list_scanners(&self) -> Result<Vec<String>, ScanError> {
            Ok(Vec::new())
        }

        async fn scan_image(&self) -> Result<Option<PathBuf>, ScanError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
    }

    fn shell_with(dir: &tempfile::TempDir, result: fn() -> Result<Option<PathBuf>, ScanError>) -> Shell {
        let config = AppConfig {
            settings_path: dir.path().join("config.yaml"),
            ..AppConfig::default()
        };
        Shell::with_scanner(&config, Arc::new(FakeScanner { result }))
    }

    #[tokio::test]
    async fn cancelled_scan_reports_cancel_and_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell_with(&dir, || Ok(None));
        let file = dir.path().join("picked.pdf");
        std::fs::write(&file, b"%PDF").unwrap();
        shell.select_file(file.clone()).unwrap();
        let before = shell.session_snapshot();

        assert_eq!(shell.scan().await.unwrap(), ScanOutcome::Cancelled);
        assert_eq!(shell.session_snapshot(), before);
    }

    #[tokio::test]
    async fn scan_without_provider_offers_empty_suggestion() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell_with(&dir, || Ok(Some(PathBuf::from("/tmp/tmp_scan_fake.jpg"))));

        let outcome = shell.scan().await.unwrap();
        assert_eq!(
            outcome,
            ScanOutcome::Scanned {
                image: PathBuf::from("/tmp/tmp_scan_fake.jpg"),
                suggestion: String::new(),
            }
        );
        assert!(matches!(shell.session_snapshot(), SessionState::NamingPending { .. }));
    }

    #[tokio::test]
    async fn scanner_not_ready_surfaces_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell_with(&dir, || Err(ScanError::NotInitialized));

        let err = shell.scan().await.unwrap_err();
        assert!(matches!(err, ShellError::Scan(ScanError::NotInitialized)));
        assert_eq!(shell.session_snapshot(), SessionState::Idle);
    }

    #[tokio::test]
    async fn upload_needs_paperless_settings() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell_with(&dir, || Ok(None));
        shell
            .save_config(&Settings {
                api_url: Some("http://paperless".into()),
                ..Settings::default()
            })
            .unwrap();

        let err = shell.upload_current().await.unwrap_err();
        assert!(matches!(err, ShellError::MissingUploadSettings));
        assert_eq!(
            err.to_string(),
            "Paperless-ngx configuration missing. Please configure in Settings."
        );
    }

    #[tokio::test]
    async fn select_file_rejects_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell_with(&dir, || Ok(None));
        let err = shell.select_file(dir.path().join("ghost.pdf")).unwrap_err();
        assert!(matches!(err, ShellError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn cleanup_only_touches_temp_scans() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell_with(&dir, || Ok(None));
        let keep = dir.path().join("Report.pdf");
        let temp = dir.path().join("tmp_scan_123.jpg");
        std::fs::write(&keep, b"x").unwrap();
        std::fs::write(&temp, b"x").unwrap();

        assert!(!shell.cleanup_temp(&keep).await);
        assert!(shell.cleanup_temp(&temp).await);
        assert!(keep.exists());
        assert!(!temp.exists());
        assert!(!shell.cleanup_temp(&temp).await);
    }

    #[tokio::test]
    async fn dropped_scan_releases_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            settings_path: dir.path().join("config.yaml"),
            ..AppConfig::default()
        };
        let shell = Shell::with_scanner(&config, Arc::new(StalledScanner));

        let timed_out = tokio::time::timeout(Duration::from_millis(50), shell.scan()).await;
        assert!(timed_out.is_err());
        assert_eq!(shell.session_snapshot(), SessionState::Idle);

        let file = dir.path().join("picked.pdf");
        std::fs::write(&file, b"%PDF").unwrap();
        shell.select_file(file).unwrap();
    }

    #[tokio::test]
    async fn dropped_upload_leaves_a_retryable_failure() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell_with(&dir, || Ok(None));
        // Accepts connections but never answers.
        let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        shell
            .save_config(&Settings {
                api_url: Some(format!("http://{}", silent.local_addr().unwrap())),
                api_token: Some("tok".into()),
                ..Settings::default()
            })
            .unwrap();
        let file = dir.path().join("picked.pdf");
        std::fs::write(&file, b"%PDF").unwrap();
        shell.select_file(file.clone()).unwrap();
        shell.approve_name("Report").unwrap();

        let timed_out = tokio::time::timeout(Duration::from_millis(200), shell.upload_current()).await;
        assert!(timed_out.is_err());
        match shell.session_snapshot() {
            SessionState::Failed { image, filename, error } => {
                assert_eq!(image, file);
                assert_eq!(filename.as_deref(), Some("Report.jpg"));
                assert_eq!(error, "Upload interrupted");
            }
            other => panic!("unexpected state: {:?}", other),
        }
        assert_eq!(shell.approve_name("Report 2").unwrap(), "Report 2.jpg");
    }
}
