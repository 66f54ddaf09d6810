//! Remote AI tier
//!
//! Last resort of the pipeline: ship the document to a chat-completions
//! endpoint and decode the structured JSON it returns. Images go as vision
//! input (downscaled, JPEG, base64 data URL); PDFs and text go as extracted
//! text. Transient failures retry with backoff; a 429 honors the server's
//! `Retry-After` hint.

use super::{document_data_from_json, ocr::pdf_text};
use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::retry::{retry_with_backoff, Attempt, RetryPolicy};
use crate::types::{DocType, DocumentData};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::FilterType;
use image::GenericImageView;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Largest edge sent to the vision endpoint; bigger inputs are downscaled
const MAX_DIMENSION: u32 = 1600;

const JPEG_QUALITY: u8 = 85;

/// Fallback wait when a 429 carries no usable Retry-After header
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(5);

// Shared pooled client; per-request timeout comes from RemoteConfig
static REMOTE_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
        .expect("Failed to create remote HTTP client")
});

/// Analyzes a document via an external AI model
///
/// An empty result is a valid answer (the model saw no rows); errors are
/// transport or protocol failures.
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    async fn analyze(
        &self,
        bytes: &[u8],
        mime: &str,
        doc_type: DocType,
    ) -> Result<DocumentData, RemoteError>;
}

/// Chat-completions provider with retry and rate-limit handling
pub struct HttpRemoteProvider {
    client: Client,
    config: RemoteConfig,
    policy: RetryPolicy,
}

impl HttpRemoteProvider {
    pub fn new(config: RemoteConfig) -> Self {
        let policy = RetryPolicy::new(
            config.max_retries,
            Duration::from_secs(2),
            Duration::from_secs(60),
        );
        Self {
            client: REMOTE_CLIENT.clone(),
            config,
            policy,
        }
    }

    /// Provider from environment configuration, `None` when unconfigured
    pub fn from_env() -> Option<Self> {
        RemoteConfig::from_env().map(Self::new)
    }

    fn prompt(doc_type: DocType) -> String {
        let schema = match doc_type {
            DocType::Income | DocType::Outcome => {
                r#"{"destination": "<recipient or null>", "items": [{"name": "<item name>", "quantity": <integer>, "type": "CHAPA" | "MODULO"}]}"#
            }
            DocType::Control => {
                r#"{"rows": [{"date": "<dd/mm/yyyy>", "quantity": <integer>, "destination": "<place>", "model": "<model code>"}]}"#
            }
        };
        format!(
            "You are reading a warehouse delivery note (remito). Extract every \
             line item into this exact JSON shape:\n{}\n\
             Respond with the JSON only, no prose. Use an empty list when the \
             document has no line items.",
            schema
        )
    }

    fn build_user_content(
        &self,
        bytes: &[u8],
        mime: &str,
        doc_type: DocType,
    ) -> Result<serde_json::Value, RemoteError> {
        let prompt = Self::prompt(doc_type);

        if mime.starts_with("image/") {
            let jpeg = prepare_image(bytes)
                .map_err(|e| RemoteError::MalformedResponse(format!("image prep: {}", e)))?;
            let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg));
            return Ok(json!([
                { "type": "text", "text": prompt },
                { "type": "image_url", "image_url": { "url": data_url } },
            ]));
        }

        let text = if mime == "application/pdf" {
            pdf_text(bytes)
                .map_err(|e| RemoteError::MalformedResponse(format!("document prep: {}", e)))?
        } else {
            String::from_utf8_lossy(bytes).into_owned()
        };

        Ok(json!([
            { "type": "text", "text": format!("{}\n\nDocument text:\n{}", prompt, text) },
        ]))
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<String, Attempt<RemoteError>> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .timeout(self.config.timeout)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| Attempt::Retry(RemoteError::Network(e.to_string())))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let wait = retry_after(&response).unwrap_or(DEFAULT_RATE_LIMIT_WAIT);
            let body = response.text().await.unwrap_or_default();
            warn!("[RemoteProvider] Rate limited, server asked to wait {:?}", wait);
            return Err(Attempt::RetryAfter(
                wait,
                RemoteError::Api {
                    status: 429,
                    body,
                },
            ));
        }

        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(Attempt::Retry(RemoteError::Api {
                status: status.as_u16(),
                body,
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Attempt::Fatal(RemoteError::Api {
                status: status.as_u16(),
                body,
            }));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            Attempt::Retry(RemoteError::MalformedResponse(format!(
                "invalid response body: {}",
                e
            )))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                Attempt::Retry(RemoteError::MalformedResponse(
                    "response had no choices".to_string(),
                ))
            })
    }
}

#[async_trait]
impl RemoteProvider for HttpRemoteProvider {
    async fn analyze(
        &self,
        bytes: &[u8],
        mime: &str,
        doc_type: DocType,
    ) -> Result<DocumentData, RemoteError> {
        let content = self.build_user_content(bytes, mime, doc_type)?;
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": 2000,
            "temperature": 0.0,
        });

        info!(
            "[RemoteProvider] Analyzing {} document with {}",
            doc_type, self.config.model
        );

        let reply = retry_with_backoff(&self.policy, || self.send_once(&body)).await?;

        let payload = extract_json_payload(&reply).map_err(RemoteError::MalformedResponse)?;
        debug!("[RemoteProvider] Extracted payload: {} chars", payload.len());

        document_data_from_json(&payload, doc_type).map_err(RemoteError::MalformedResponse)
    }
}

/// Parse a Retry-After header (delay-seconds form only)
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Downscale to `MAX_DIMENSION` and re-encode as JPEG for vision input
fn prepare_image(bytes: &[u8]) -> Result<Vec<u8>, String> {
    let img = image::load_from_memory(bytes).map_err(|e| format!("invalid image: {}", e))?;

    let (width, height) = img.dimensions();
    let img = if width > MAX_DIMENSION || height > MAX_DIMENSION {
        debug!(
            "[RemoteProvider] Downscaling {}x{} image for vision input",
            width, height
        );
        img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .map_err(|e| format!("JPEG encode failed: {}", e))?;
    Ok(out)
}

/// Pull the JSON object or array out of a model reply
///
/// Models wrap JSON in markdown fences or prose despite instructions; accept
/// fenced blocks first, then the outermost `{...}` or `[...]` span.
fn extract_json_payload(text: &str) -> Result<String, String> {
    let trimmed = text.trim();

    for fence in ["```json", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let after = &trimmed[start + fence.len()..];
            if let Some(end) = after.find("```") {
                let inner = after[..end].trim();
                if inner.starts_with('{') || inner.starts_with('[') {
                    return Ok(inner.to_string());
                }
            }
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                return Ok(trimmed[start..=end].to_string());
            }
        }
    }

    Err(format!(
        "no JSON found in response: {}",
        &trimmed[..trimmed.len().min(120)]
    ))
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}
