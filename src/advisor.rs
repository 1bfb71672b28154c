//! AI filename suggestions.
//!
//! Best effort only: every failure is logged and turns into an empty
//! suggestion. Callers must not treat `""` as an error.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::AppConfig;
use crate::http::get_client;
use crate::settings::Settings;

const MAX_FILENAME_LEN: usize = 50;
const FALLBACK_FILENAME: &str = "document";

const SYSTEM_PROMPT: &str = "You are a helpful assistant that analyzes documents and suggests appropriate filenames. Generate a concise, descriptive filename (without extension) based on the document content. Focus on the main subject, document type, and key identifiers. Use underscores instead of spaces and keep it under 50 characters.";
const USER_PROMPT: &str = "Analyze this document and suggest a filename (without extension) that describes its content. Return only the filename, nothing else.";
const GEMINI_PROMPT: &str = "Analyze this document and suggest a filename (without extension) that describes its content. Return only the filename, nothing else. Use underscores instead of spaces and keep it under 25 characters.";

/// Turn raw model output into a safe filename stem.
///
/// Quotes are stripped, spaces become underscores, anything outside
/// `[A-Za-z0-9_-]` is dropped and the result is capped at 50 characters.
/// An empty result becomes `"document"`. Applying it twice changes nothing.
pub fn sanitize_filename(raw: &str) -> String {
    let unquoted: String = raw.chars().filter(|c| *c != '"' && *c != '\'').collect();
    let cleaned: String = unquoted
        .trim()
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_FILENAME_LEN)
        .collect();

    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
}

/// OpenAI wins when both keys are present.
pub fn select_provider(settings: &Settings) -> Option<(Provider, &str)> {
    if let Some(key) = settings.openai_key() {
        Some((Provider::OpenAi, key))
    } else {
        settings.gemini_key().map(|key| (Provider::Gemini, key))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("could not read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unexpected response: {0}")]
    Malformed(String),
}

// OpenAI chat completions

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Multimodal(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// Gemini generateContent

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Clone, Debug)]
pub struct FilenameAdvisor {
    openai_base_url: String,
    openai_model: String,
    gemini_base_url: String,
    gemini_model: String,
}

impl FilenameAdvisor {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            openai_base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            openai_model: config.openai_model.clone(),
            gemini_base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            gemini_model: config.gemini_model.clone(),
        }
    }

    /// Suggested filename stem for the image, or `""` when no provider is
    /// configured or the provider call fails.
    pub async fn suggest(&self, image_path: &Path, settings: &Settings) -> String {
        let Some((provider, key)) = select_provider(settings) else {
            tracing::debug!("No AI provider configured; skipping filename suggestion");
            return String::new();
        };

        let result = match provider {
            Provider::OpenAi => self.ask_openai(image_path, key).await,
            Provider::Gemini => self.ask_gemini(image_path, key).await,
        };

        match result {
            Ok(raw) => {
                let name = sanitize_filename(raw.trim());
                tracing::info!(?provider, %name, "Filename suggested");
                name
            }
            Err(e) => {
                tracing::warn!(?provider, "Error getting filename recommendation: {}", e);
                String::new()
            }
        }
    }

    async fn ask_openai(&self, image_path: &Path, api_key: &str) -> Result<String, AdvisorError> {
        let image_base64 = read_base64(image_path).await?;
        let request = ChatRequest {
            model: &self.openai_model,
            messages: vec![
                Message {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
                },
                Message {
                    role: "user",
                    content: MessageContent::Multimodal(vec![
                        ContentPart::Text { text: USER_PROMPT.to_string() },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: format!("data:image/jpeg;base64,{}", image_base64),
                            },
                        },
                    ]),
                },
            ],
            max_tokens: 50,
            temperature: 0.3,
        };

        let url = format!("{}/v1/chat/completions", self.openai_base_url);
        let response = get_client()
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;
        let body = checked_body(response).await?;

        let chat: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| AdvisorError::Malformed(format!("{} - {}", e, preview(&body))))?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AdvisorError::Malformed("no choices in response".to_string()))
    }

    async fn ask_gemini(&self, image_path: &Path, api_key: &str) -> Result<String, AdvisorError> {
        let image_base64 = read_base64(image_path).await?;
        let request = GenerateRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::Text { text: GEMINI_PROMPT.to_string() },
                    GeminiPart::Inline {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: image_base64,
                        },
                    },
                ],
            }],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.gemini_base_url, self.gemini_model
        );
        let response = get_client()
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;
        let body = checked_body(response).await?;

        let generated: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| AdvisorError::Malformed(format!("{} - {}", e, preview(&body))))?;
        let text: String = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(AdvisorError::Malformed("no candidates in response".to_string()));
        }
        Ok(text)
    }
}

async fn read_base64(path: &Path) -> Result<String, AdvisorError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(BASE64.encode(bytes))
}

async fn checked_body(response: reqwest::Response) -> Result<String, AdvisorError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(AdvisorError::Status {
            status,
            body: preview(&body).to_string(),
        });
    }
    Ok(body)
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(500) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
