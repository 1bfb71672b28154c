//! Command surface for the desktop GUI.
//!
//! Every command answers `{success: true, ...}`, `{success: false, error}`
//! or `{success: false, cancelled: true}`; failures are data, not HTTP
//! errors. That includes request bodies that are missing or malformed.
//!
//! The API can read, upload and delete local files and rewrite where
//! uploads go, so browsers only get a CORS grant for the GUI's own origin.

use axum::{
    Json, Router,
    extract::{FromRequest, OptionalFromRequest, Request, State},
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::shell::{ScanOutcome, Shell};
use crate::settings::Settings;

pub fn router(shell: Arc<Shell>, gui_origin: Option<&str>) -> Router {
    Router::new()
        .route("/list-scanners", post(list_scanners))
        .route("/scan-document", post(scan_document))
        .route("/get-filename-suggestion", post(get_filename_suggestion))
        .route("/upload-to-paperless", post(upload_to_paperless))
        .route("/load-config", post(load_config))
        .route("/save-config", post(save_config))
        .route("/select-file", post(select_file))
        .route("/cleanup-temp", post(cleanup_temp))
        .route("/session", get(session))
        .route("/session/name", post(session_name))
        .route("/session/skip", post(session_skip))
        .route("/session/upload", post(session_upload))
        .layer(cors(gui_origin))
        .with_state(shell)
}

fn cors(gui_origin: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = gui_origin
        .and_then(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin, "Ignoring invalid GUI origin: {}", e);
                None
            }
        })
        .into_iter()
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// JSON request body whose rejections answer in the `{success: false}` shape.
struct Payload<T>(T);

impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Json<Value>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match <Json<T> as FromRequest<S>>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(failure(rejection.body_text())),
        }
    }
}

/// A request without a `Content-Type` is an absent body.
impl<S, T> OptionalFromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Json<Value>;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        match <Json<T> as OptionalFromRequest<S>>::from_request(req, state).await {
            Ok(body) => Ok(body.map(|Json(value)| Self(value))),
            Err(rejection) => Err(failure(rejection.body_text())),
        }
    }
}

fn failure(error: impl Display) -> Json<Value> {
    Json(json!({ "success": false, "error": error.to_string() }))
}

fn cancelled() -> Json<Value> {
    Json(json!({ "success": false, "cancelled": true }))
}

async fn list_scanners(State(shell): State<Arc<Shell>>) -> Json<Value> {
    match shell.list_scanners().await {
        Ok(scanners) => Json(json!({ "success": true, "scanners": scanners })),
        Err(e) => failure(e),
    }
}

async fn scan_document(State(shell): State<Arc<Shell>>) -> Json<Value> {
    match shell.scan().await {
        Ok(ScanOutcome::Scanned { image, suggestion }) => Json(json!({
            "success": true,
            "imagePath": image.to_string_lossy(),
            "suggestion": suggestion,
        })),
        Ok(ScanOutcome::Cancelled) => cancelled(),
        Err(e) => failure(e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionRequest {
    image_path: PathBuf,
}

async fn get_filename_suggestion(
    State(shell): State<Arc<Shell>>,
    Payload(req): Payload<SuggestionRequest>,
) -> Json<Value> {
    let filename = shell.suggest(&req.image_path).await;
    Json(json!({ "success": true, "filename": filename }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest {
    file_path: PathBuf,
    #[serde(default)]
    filename: Option<String>,
}

async fn upload_to_paperless(
    State(shell): State<Arc<Shell>>,
    Payload(req): Payload<UploadRequest>,
) -> Json<Value> {
    match shell.upload_file(&req.file_path, req.filename.as_deref()).await {
        Ok(result) => Json(json!(result)),
        Err(e) => failure(e),
    }
}

async fn load_config(State(shell): State<Arc<Shell>>) -> Json<Value> {
    Json(json!({ "success": true, "config": shell.load_config() }))
}

#[derive(Deserialize)]
struct SaveConfigRequest {
    config: Settings,
}

async fn save_config(
    State(shell): State<Arc<Shell>>,
    Payload(req): Payload<SaveConfigRequest>,
) -> Json<Value> {
    match shell.save_config(&req.config) {
        Ok(()) => Json(json!({ "success": true })),
        Err(e) => {
            tracing::error!("Error saving config: {}", e);
            Json(json!({ "success": false }))
        }
    }
}

/// The native picker runs in the GUI; an absent path means it was dismissed.
#[derive(Deserialize)]
struct SelectFileRequest {
    #[serde(default)]
    path: Option<PathBuf>,
}

async fn select_file(
    State(shell): State<Arc<Shell>>,
    req: Option<Payload<SelectFileRequest>>,
) -> Json<Value> {
    let Some(path) = req.and_then(|Payload(req)| req.path) else {
        return cancelled();
    };
    match shell.select_file(path) {
        Ok(path) => Json(json!({ "success": true, "filePath": path.to_string_lossy() })),
        Err(e) => failure(e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanupRequest {
    file_path: PathBuf,
}

async fn cleanup_temp(
    State(shell): State<Arc<Shell>>,
    Payload(req): Payload<CleanupRequest>,
) -> Json<Value> {
    let removed = shell.cleanup_temp(&req.file_path).await;
    Json(json!({ "success": true, "removed": removed }))
}

async fn session(State(shell): State<Arc<Shell>>) -> Json<Value> {
    Json(json!({ "success": true, "session": shell.session_snapshot() }))
}

#[derive(Deserialize)]
struct NameRequest {
    name: String,
}

async fn session_name(
    State(shell): State<Arc<Shell>>,
    Payload(req): Payload<NameRequest>,
) -> Json<Value> {
    match shell.approve_name(&req.name) {
        Ok(filename) => Json(json!({ "success": true, "filename": filename })),
        Err(e) => failure(e),
    }
}

async fn session_skip(State(shell): State<Arc<Shell>>) -> Json<Value> {
    match shell.skip_naming() {
        Ok(()) => Json(json!({ "success": true })),
        Err(e) => failure(e),
    }
}

async fn session_upload(State(shell): State<Arc<Shell>>) -> Json<Value> {
    match shell.upload_current().await {
        Ok(result) => Json(json!(result)),
        Err(e) => failure(e),
    }
}
