#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::post,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use paperscan::config::AppConfig;
use paperscan::scanner::{ScanError, Scanner};

pub const GOOD_TOKEN: &str = "good-token";

/// Binds on an ephemeral port and returns the base URL.
pub async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn app_config(dir: &tempfile::TempDir, ai_base: &str) -> AppConfig {
    AppConfig {
        settings_path: dir.path().join("config.yaml"),
        openai_base_url: ai_base.to_string(),
        gemini_base_url: ai_base.to_string(),
        ..AppConfig::default()
    }
}

// Paperless

#[derive(Clone, Debug, Default)]
pub struct ReceivedUpload {
    pub authorization: Option<String>,
    /// field name -> (file name, content)
    pub fields: HashMap<String, (Option<String>, Vec<u8>)>,
}

impl ReceivedUpload {
    pub fn text(&self, field: &str) -> Option<String> {
        self.fields
            .get(field)
            .map(|(_, data)| String::from_utf8_lossy(data).into_owned())
    }
}

#[derive(Clone, Default)]
pub struct FakePaperless {
    pub uploads: Arc<Mutex<Vec<ReceivedUpload>>>,
}

impl FakePaperless {
    pub async fn start(&self) -> String {
        let router = Router::new()
            .route("/api/documents/post_document/", post(post_document))
            .with_state(self.clone());
        spawn(router).await
    }

    pub fn received(&self) -> Vec<ReceivedUpload> {
        self.uploads.lock().clone()
    }
}

async fn post_document(
    State(fake): State<FakePaperless>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let mut upload = ReceivedUpload {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        ..ReceivedUpload::default()
    };
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(String::from);
        let data = field.bytes().await.unwrap().to_vec();
        upload.fields.insert(name, (file_name, data));
    }

    let expected = format!("Token {}", GOOD_TOKEN);
    let authorized = upload.authorization.as_deref() == Some(expected.as_str());
    fake.uploads.lock().push(upload);

    if authorized {
        (StatusCode::OK, Json(json!("3f1c2a9e-task")))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Invalid token." })))
    }
}

// OpenAI + Gemini on one server

#[derive(Clone, Debug)]
pub struct ProviderCall {
    pub provider: &'static str,
    pub authorization: Option<String>,
    pub query: HashMap<String, String>,
    pub path: String,
    pub body: Value,
}

#[derive(Clone)]
pub struct FakeProviders {
    pub calls: Arc<Mutex<Vec<ProviderCall>>>,
    pub openai_reply: String,
    pub gemini_reply: String,
    pub status: StatusCode,
}

impl FakeProviders {
    pub fn new(openai_reply: &str, gemini_reply: &str) -> Self {
        Self {
            calls: Arc::default(),
            openai_reply: openai_reply.to_string(),
            gemini_reply: gemini_reply.to_string(),
            status: StatusCode::OK,
        }
    }

    pub fn failing(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::new("", "")
        }
    }

    pub async fn start(&self) -> String {
        let router = Router::new()
            .route("/v1/chat/completions", post(openai_chat))
            .route("/v1beta/models/{model}", post(gemini_generate))
            .with_state(self.clone());
        spawn(router).await
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }
}

async fn openai_chat(
    State(fake): State<FakeProviders>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.calls.lock().push(ProviderCall {
        provider: "openai",
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        query: HashMap::new(),
        path: "/v1/chat/completions".to_string(),
        body,
    });
    if !fake.status.is_success() {
        return (fake.status, Json(json!({ "error": { "message": "boom" } })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "choices": [{ "message": { "role": "assistant", "content": fake.openai_reply } }]
        })),
    )
}

async fn gemini_generate(
    State(fake): State<FakeProviders>,
    Path(model): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.calls.lock().push(ProviderCall {
        provider: "gemini",
        authorization: None,
        query,
        path: format!("/v1beta/models/{}", model),
        body,
    });
    if !fake.status.is_success() {
        return (fake.status, Json(json!({ "error": { "message": "boom" } })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{ "content": { "parts": [{ "text": fake.gemini_reply }] } }]
        })),
    )
}

// Scanner

/// Copies a fixture into a fresh temp-scan path on every scan, or reports
/// cancel when no fixture is set.
pub struct FakeScanner {
    pub fixture: Option<PathBuf>,
}

#[async_trait]
impl Scanner for FakeScanner {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn list_scanners(&self) -> Result<Vec<String>, ScanError> {
        Ok(vec!["Fake Flatbed".to_string()])
    }

    async fn scan_image(&self) -> Result<Option<PathBuf>, ScanError> {
        let Some(fixture) = &self.fixture else {
            return Ok(None);
        };
        let target = paperscan::scanner::temp_scan_path();
        std::fs::copy(fixture, &target).map_err(|e| ScanError::Driver(e.to_string()))?;
        Ok(Some(target))
    }
}
