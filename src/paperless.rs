//! Paperless-ngx document upload.

use serde::Serialize;
use std::path::Path;

use crate::http::get_client;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub response: serde_json::Value,
}

impl UploadResult {
    fn failed(status_code: Option<u16>, response: impl Into<serde_json::Value>) -> Self {
        Self {
            success: false,
            status_code,
            response: response.into(),
        }
    }
}

/// Title Paperless shows for the document: the name minus its extension.
pub fn title_from_filename(filename: &str) -> Option<String> {
    let stem = Path::new(filename.trim()).file_stem()?.to_string_lossy();
    (!stem.is_empty()).then(|| stem.into_owned())
}

async fn open_document(path: &Path) -> std::io::Result<(tokio::fs::File, u64)> {
    let file = tokio::fs::File::open(path).await?;
    let length = file.metadata().await?.len();
    Ok((file, length))
}

#[derive(Clone, Debug, Default)]
pub struct PaperlessClient;

impl PaperlessClient {
    pub fn new() -> Self {
        Self
    }

    /// Single attempt, no retry. Transport and file errors come back as
    /// `success: false` with no status code.
    pub async fn upload(
        &self,
        file_path: &Path,
        api_url: &str,
        api_token: &str,
        filename: Option<&str>,
    ) -> UploadResult {
        let (file, length) = match open_document(file_path).await {
            Ok(opened) => opened,
            Err(e) => {
                tracing::error!(path = %file_path.display(), "Upload failed: {}", e);
                return UploadResult::failed(None, format!("could not read {}: {}", file_path.display(), e));
            }
        };

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let document = reqwest::multipart::Part::stream_with_length(file, length).file_name(file_name);
        let mut form = reqwest::multipart::Form::new().part("document", document);
        if let Some(title) = filename.and_then(title_from_filename) {
            form = form.text("title", title);
        }

        let url = format!("{}/api/documents/post_document/", api_url.trim_end_matches('/'));
        let response = match get_client()
            .post(&url)
            .header("Authorization", format!("Token {}", api_token))
            .multipart(form)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(%url, "Upload failed: {}", e);
                return UploadResult::failed(None, e.to_string());
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body));

        if status.is_success() {
            tracing::info!(status = status.as_u16(), "Upload successful: {}", parsed);
            UploadResult {
                success: true,
                status_code: Some(status.as_u16()),
                response: parsed,
            }
        } else {
            tracing::error!(status = status.as_u16(), "Upload failed: {}", parsed);
            UploadResult::failed(Some(status.as_u16()), parsed)
        }
    }
}
