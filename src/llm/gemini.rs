use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::{GenerationOutcome, ImageComparator, ImageGenerator, ImagePart, LanguageModel};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

const MAX_RETRY_ATTEMPTS: usize = 2;
const RETRY_BASE_DELAY_MS: u64 = 900;
const REQUEST_TIMEOUT_SECS: u64 = 90;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn retry_delay(attempt: usize) -> Duration {
    let attempt = attempt.max(1) as u64;
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(attempt))
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn image_data_part(part: &ImagePart) -> Value {
    json!({
        "inlineData": {
            "mimeType": part.mime_type,
            "data": general_purpose::STANDARD.encode(&part.bytes)
        }
    })
}

/// Reference images first, instruction text last: the generator follows the
/// trailing instruction against everything it has already seen.
fn build_parts(references: &[ImagePart], prompt: &str) -> Vec<Value> {
    let mut parts: Vec<Value> = references.iter().map(image_data_part).collect();
    parts.push(json!({ "text": prompt }));
    parts
}

fn extract_text(response: GeminiResponse) -> String {
    let mut text_parts = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            if let Some(parts) = content.parts {
                for part in parts {
                    if let GeminiPart::Text { text } = part {
                        if !text.trim().is_empty() {
                            text_parts.push(text);
                        }
                    }
                }
            }
        }
    }
    text_parts.join("\n")
}

fn extract_first_image(response: &GeminiResponse) -> Option<Vec<u8>> {
    for candidate in response.candidates.as_deref().unwrap_or(&[]) {
        if let Some(content) = &candidate.content {
            if let Some(parts) = &content.parts {
                for part in parts {
                    if let GeminiPart::InlineData { inline_data } = part {
                        if inline_data.mime_type.starts_with("image/") {
                            if let Ok(bytes) =
                                general_purpose::STANDARD.decode(&inline_data.data)
                            {
                                return Some(bytes);
                            }
                        }
                    }
                }
            }
        }
    }
    None
}

/// REST client for the Gemini `generateContent` endpoint. Serves all three
/// model roles the pipeline needs: text completion (debate, extraction,
/// description), image generation and visual comparison.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    text_model: String,
    image_model: String,
    temperature: f32,
    top_k: i32,
    top_p: f32,
    max_output_tokens: i32,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        GeminiClient {
            api_key: config.gemini_api_key.clone(),
            text_model: config.gemini_model.clone(),
            image_model: config.gemini_image_model.clone(),
            temperature: config.gemini_temperature,
            top_k: config.gemini_top_k,
            top_p: config.gemini_top_p,
            max_output_tokens: config.gemini_max_output_tokens,
        }
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn generation_config(&self) -> Value {
        json!({
            "temperature": self.temperature,
            "topK": self.top_k,
            "topP": self.top_p,
            "maxOutputTokens": self.max_output_tokens,
        })
    }

    async fn call_api(&self, model: &str, payload: Value) -> Result<GeminiResponse> {
        let client = get_http_client();
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            model, self.api_key
        );

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let response = match client
                .post(&url)
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .json(&payload)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    let err_text = self.redact_api_key(&err.to_string());
                    let should_retry = should_retry_error(&err) && attempt < MAX_RETRY_ATTEMPTS;
                    warn!(
                        "Gemini request failed to send: {} (timeout={}, connect={}, retrying={})",
                        err_text,
                        err.is_timeout(),
                        err.is_connect(),
                        should_retry
                    );
                    if should_retry {
                        tokio::time::sleep(retry_delay(attempt)).await;
                        continue;
                    }
                    return Err(anyhow!("Gemini request failed: {}", err_text));
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let (message, body_summary) = summarize_error_body(&body);
                let should_retry = should_retry_status(status) && attempt < MAX_RETRY_ATTEMPTS;
                warn!(
                    "Gemini API error: status={}, body={}, retrying={}",
                    status, body_summary, should_retry
                );
                if should_retry {
                    tokio::time::sleep(retry_delay(attempt)).await;
                    continue;
                }
                let detail = message.unwrap_or(body_summary);
                return Err(anyhow!(
                    "Gemini request failed with status {}: {}",
                    status,
                    detail
                ));
            }

            let value = response.json::<GeminiResponse>().await?;
            return Ok(value);
        }
    }

    async fn complete_text(&self, parts: Vec<Value>, operation: &str) -> Result<String> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": self.generation_config(),
        });

        let model = self.text_model.clone();
        log_llm_timing("gemini", &model, operation, None, || async {
            let response = self.call_api(&model, payload).await?;
            Ok(extract_text(response))
        })
        .await
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.complete_text(vec![json!({ "text": prompt })], "complete")
            .await
    }

    async fn complete_with_images(
        &self,
        references: &[ImagePart],
        prompt: &str,
    ) -> Result<String> {
        self.complete_text(build_parts(references, prompt), "complete_with_images")
            .await
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(
        &self,
        references: &[ImagePart],
        prompt: &str,
    ) -> Result<GenerationOutcome> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": build_parts(references, prompt) }],
            "generationConfig": { "responseModalities": ["IMAGE"] },
        });

        let model = self.image_model.clone();
        let metadata = json!({ "references": references.len() });
        log_llm_timing("gemini", &model, "generate_image", Some(metadata), || async {
            let response = self.call_api(&model, payload).await?;

            if let Some(reason) = response
                .prompt_feedback
                .as_ref()
                .and_then(|feedback| feedback.block_reason.clone())
            {
                debug!("generation blocked: {reason}");
                return Ok(GenerationOutcome::Blocked(reason));
            }

            match extract_first_image(&response) {
                Some(bytes) => Ok(GenerationOutcome::Image(bytes)),
                None => Ok(GenerationOutcome::Empty),
            }
        })
        .await
    }
}

#[async_trait]
impl ImageComparator for GeminiClient {
    async fn compare(
        &self,
        references: &[ImagePart],
        candidate: &ImagePart,
        prompt: &str,
    ) -> Result<String> {
        let mut parts: Vec<Value> = references.iter().map(image_data_part).collect();
        parts.push(image_data_part(candidate));
        parts.push(json!({ "text": prompt }));

        let payload = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": self.generation_config(),
        });

        let model = self.text_model.clone();
        let metadata = json!({ "references": references.len() });
        log_llm_timing("gemini", &model, "compare_images", Some(metadata), || async {
            let response = self.call_api(&model, payload).await?;
            Ok(extract_text(response))
        })
        .await
    }
}
