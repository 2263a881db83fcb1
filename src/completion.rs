//! Outbound call to the text-completion oracle (OpenAI Responses API).
//!
//! The oracle is treated as text-in/text-out: we send a prompt string and
//! extract plain text from whatever response shape comes back. SDK revisions
//! have moved the answer between a top-level `output_text` field and a
//! nested `output[].content[]` list, so [`extract_output_text`] decodes the
//! known shapes explicitly and falls back to raw stringification rather
//! than failing the request.

use anyhow::Result;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::{self, CompletionConfig};
use crate::error::AnalysisError;

/// Sends `prompt` to the configured model and returns the extracted text.
pub async fn complete(config: &CompletionConfig, prompt: &str) -> Result<String> {
    let api_key = config::api_key().ok_or_else(|| {
        AnalysisError::Configuration("OPENAI_API_KEY no está configurada en .env".to_string())
    })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let url = format!("{}/v1/responses", config.api_base.trim_end_matches('/'));
    let body = serde_json::json!({
        "model": config.model,
        "input": prompt,
    });

    debug!(model = %config.model, prompt_chars = prompt.chars().count(), "calling completion model");

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| AnalysisError::Provider(format!("Fallo de red al llamar al modelo: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(AnalysisError::Provider(format!(
            "Error del API del modelo ({}): {}",
            status, body_text
        ))
        .into());
    }

    let json: Value = response
        .json()
        .await
        .map_err(|e| AnalysisError::Provider(format!("Respuesta del modelo ilegible: {}", e)))?;

    Ok(extract_output_text(&json))
}

/// Extracts the answer text from a Responses API payload.
///
/// Shapes handled, in order:
/// 1. a top-level `output_text` string;
/// 2. `output[]` items carrying `content`: either a list of objects with a
///    `text`, `value`, or `content` string, or a bare string;
/// 3. fallback: the whole payload stringified.
pub fn extract_output_text(response: &Value) -> String {
    if let Some(text) = response.get("output_text").and_then(Value::as_str) {
        return text.to_string();
    }

    if let Some(items) = response.get("output").and_then(Value::as_array) {
        for item in items {
            let Some(content) = item.get("content") else {
                continue;
            };
            if let Some(text) = content.as_str() {
                return text.to_string();
            }
            let parts = match content.as_array() {
                Some(parts) => parts.iter().collect::<Vec<_>>(),
                None => vec![content],
            };
            for part in parts {
                for key in ["text", "value", "content"] {
                    if let Some(text) = part.get(key).and_then(Value::as_str) {
                        return text.to_string();
                    }
                }
                if let Some(text) = part.as_str() {
                    return text.to_string();
                }
            }
        }
    }

    response.to_string()
}
