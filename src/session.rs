//! Scan session state machine.
//!
//! `Idle -> Scanning -> Scanned -> NamingPending -> Named|Skipped ->
//! Uploading -> Done|Failed`. All transitions are driven by user commands;
//! the shell holds one session behind a mutex.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Extensions a user-approved name may already carry.
pub const DOCUMENT_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tiff", "pdf"];
pub const DEFAULT_EXTENSION: &str = "jpg";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Please enter a filename")]
    EmptyName,

    #[error("No document selected. Scan or select a file first.")]
    NoImage,

    #[error("Another scan or upload is already in progress")]
    Busy,

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Scanning,
    Scanned {
        image: PathBuf,
    },
    NamingPending {
        image: PathBuf,
        suggestion: String,
    },
    Named {
        image: PathBuf,
        filename: String,
    },
    Skipped {
        image: PathBuf,
    },
    Uploading {
        image: PathBuf,
        filename: Option<String>,
    },
    Done,
    Failed {
        image: PathBuf,
        filename: Option<String>,
        error: String,
    },
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Scanning => "scanning",
            SessionState::Scanned { .. } => "scanned",
            SessionState::NamingPending { .. } => "naming pending",
            SessionState::Named { .. } => "named",
            SessionState::Skipped { .. } => "skipped",
            SessionState::Uploading { .. } => "uploading",
            SessionState::Done => "done",
            SessionState::Failed { .. } => "failed",
        }
    }

    fn is_busy(&self) -> bool {
        matches!(self, SessionState::Scanning | SessionState::Uploading { .. })
    }
}

/// Appends `.jpg` unless the name already ends in a known document
/// extension (case-insensitive).
pub fn with_default_extension(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let known = DOCUMENT_EXTENSIONS
        .iter()
        .any(|ext| lower.strip_suffix(ext).is_some_and(|rest| rest.ends_with('.')));
    if known {
        name.to_string()
    } else {
        format!("{}.{}", name, DEFAULT_EXTENSION)
    }
}

#[derive(Debug)]
pub struct ScanSession {
    state: SessionState,
    // State to restore if the scan in flight is cancelled.
    before_scan: Option<SessionState>,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            before_scan: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn current_image_path(&self) -> Option<&Path> {
        match &self.state {
            SessionState::Scanned { image }
            | SessionState::NamingPending { image, .. }
            | SessionState::Named { image, .. }
            | SessionState::Skipped { image }
            | SessionState::Uploading { image, .. }
            | SessionState::Failed { image, .. } => Some(image),
            SessionState::Idle | SessionState::Scanning | SessionState::Done => None,
        }
    }

    /// The approved name. It is never applied to the file on disk, only
    /// sent as the upload title.
    pub fn current_filename(&self) -> Option<&str> {
        match &self.state {
            SessionState::Named { filename, .. } => Some(filename),
            SessionState::Uploading { filename, .. } | SessionState::Failed { filename, .. } => {
                filename.as_deref()
            }
            _ => None,
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            state: self.state.label(),
        }
    }

    fn ensure_idle_enough(&self) -> Result<(), SessionError> {
        if self.state.is_busy() {
            Err(SessionError::Busy)
        } else {
            Ok(())
        }
    }

    pub fn begin_scan(&mut self) -> Result<(), SessionError> {
        self.ensure_idle_enough()?;
        let previous = std::mem::replace(&mut self.state, SessionState::Scanning);
        self.before_scan = Some(previous);
        Ok(())
    }

    /// `None` means the user cancelled: whatever was held before the scan
    /// is restored unchanged.
    pub fn scan_finished(&mut self, image: Option<PathBuf>) -> Result<(), SessionError> {
        if self.state != SessionState::Scanning {
            return Err(self.invalid("finish a scan"));
        }
        let previous = self.before_scan.take().unwrap_or(SessionState::Idle);
        self.state = match image {
            Some(image) => SessionState::Scanned { image },
            None => previous,
        };
        Ok(())
    }

    pub fn scan_failed(&mut self) {
        if self.state == SessionState::Scanning {
            self.before_scan = None;
            self.state = SessionState::Idle;
        }
    }

    pub fn offer_suggestion(&mut self, suggestion: String) -> Result<(), SessionError> {
        match &self.state {
            SessionState::Scanned { image } => {
                self.state = SessionState::NamingPending {
                    image: image.clone(),
                    suggestion,
                };
                Ok(())
            }
            _ => Err(self.invalid("offer a suggestion")),
        }
    }

    /// Records the approved name and returns it with its extension.
    pub fn approve_name(&mut self, name: &str) -> Result<String, SessionError> {
        self.ensure_idle_enough()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }
        let image = self
            .current_image_path()
            .ok_or(SessionError::NoImage)?
            .to_path_buf();
        let filename = with_default_extension(name);
        self.state = SessionState::Named {
            image,
            filename: filename.clone(),
        };
        Ok(filename)
    }

    pub fn skip_naming(&mut self) -> Result<(), SessionError> {
        self.ensure_idle_enough()?;
        let image = self
            .current_image_path()
            .ok_or(SessionError::NoImage)?
            .to_path_buf();
        self.state = SessionState::Skipped { image };
        Ok(())
    }

    /// Makes a user-picked file the subject of the session.
    pub fn select_file(&mut self, path: PathBuf) -> Result<(), SessionError> {
        self.ensure_idle_enough()?;
        self.state = SessionState::Scanned { image: path };
        Ok(())
    }

    /// Returns what to upload: the image and the approved name, if any.
    pub fn begin_upload(&mut self) -> Result<(PathBuf, Option<String>), SessionError> {
        self.ensure_idle_enough()?;
        let image = self
            .current_image_path()
            .ok_or(SessionError::NoImage)?
            .to_path_buf();
        let filename = self.current_filename().map(String::from);
        self.state = SessionState::Uploading {
            image: image.clone(),
            filename: filename.clone(),
        };
        Ok((image, filename))
    }

    /// On success the session is cleared and the uploaded image is handed
    /// back for temp cleanup. On failure image and name are kept for retry.
    pub fn upload_finished(&mut self, outcome: Result<(), String>) -> Result<Option<PathBuf>, SessionError> {
        let SessionState::Uploading { image, filename } = &self.state else {
            return Err(self.invalid("finish an upload"));
        };
        let (image, filename) = (image.clone(), filename.clone());
        match outcome {
            Ok(()) => {
                self.state = SessionState::Done;
                Ok(Some(image))
            }
            Err(error) => {
                self.state = SessionState::Failed {
                    image,
                    filename,
                    error,
                };
                Ok(None)
            }
        }
    }

    /// Releases a scan or upload whose caller went away before it finished.
    /// An abandoned scan counts as cancelled; an abandoned upload as failed.
    pub fn abandon(&mut self) {
        match &self.state {
            SessionState::Scanning => {
                self.state = self.before_scan.take().unwrap_or(SessionState::Idle);
            }
            SessionState::Uploading { image, filename } => {
                let (image, filename) = (image.clone(), filename.clone());
                self.state = SessionState::Failed {
                    image,
                    filename,
                    error: "Upload interrupted".to_string(),
                };
            }
            _ => {}
        }
    }

    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.before_scan = None;
    }
}
