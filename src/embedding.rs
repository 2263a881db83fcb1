//! Embedding provider and vector math.
//!
//! [`embed_texts`] is the single entry point for turning text into vectors.
//! It dispatches on the config's `provider` field: `"openai"` calls the
//! OpenAI embeddings API, `"disabled"` fails fast (useful in tests and for
//! configs without a credential).
//!
//! # Retry Strategy
//!
//! Transient failures on the embeddings call retry with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Retrying is safe: embedding a chunk is idempotent.

use anyhow::Result;
use std::time::Duration;

use crate::config::{self, EmbeddingConfig};
use crate::error::AnalysisError;

/// Embed a batch of texts, returning one vector per input in input order.
///
/// Newlines are flattened to spaces before submission, matching the
/// provider's documented preference for single-line input.
pub async fn embed_texts(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    match config.provider.as_str() {
        "openai" => embed_openai(config, texts).await,
        "disabled" => Err(AnalysisError::Configuration(
            "El proveedor de embeddings está deshabilitado".to_string(),
        )
        .into()),
        other => Err(AnalysisError::Configuration(format!(
            "Proveedor de embeddings desconocido: {}",
            other
        ))
        .into()),
    }
}

/// Embed a single text. Convenience wrapper around [`embed_texts`] used for
/// queries and for the sequential per-chunk build loop.
pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>> {
    let results = embed_texts(config, &[text.to_string()]).await?;
    results.into_iter().next().ok_or_else(|| {
        AnalysisError::Provider("Respuesta de embeddings vacía".to_string()).into()
    })
}

/// Call `POST {api_base}/v1/embeddings` with retry/backoff.
async fn embed_openai(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_key = config::api_key().ok_or_else(|| {
        AnalysisError::Configuration("OPENAI_API_KEY no está configurada en .env".to_string())
    })?;

    let inputs: Vec<String> = texts.iter().map(|t| t.replace('\n', " ")).collect();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let url = format!("{}/v1/embeddings", config.api_base.trim_end_matches('/'));
    let body = serde_json::json!({
        "model": config.model,
        "input": inputs,
    });

    let mut last_err: Option<anyhow::Error> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_embeddings_response(&json, texts.len());
                }

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(
                        AnalysisError::Provider(format!(
                            "Error del API de embeddings ({}): {}",
                            status, body_text
                        ))
                        .into(),
                    );
                    continue;
                }

                // Client error (not 429) — don't retry
                let body_text = response.text().await.unwrap_or_default();
                return Err(AnalysisError::Provider(format!(
                    "Error del API de embeddings ({}): {}",
                    status, body_text
                ))
                .into());
            }
            Err(e) => {
                last_err = Some(
                    AnalysisError::Provider(format!("Fallo de red en embeddings: {}", e)).into(),
                );
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        AnalysisError::Provider("Embeddings agotaron los reintentos".to_string()).into()
    }))
}

/// Parse the embeddings API response, restoring input order via the per-item
/// `index` field.
fn parse_embeddings_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
        AnalysisError::Provider("Respuesta de embeddings inválida: falta 'data'".to_string())
    })?;

    if data.len() != expected {
        return Err(AnalysisError::Provider(format!(
            "Respuesta de embeddings inválida: {} vectores para {} textos",
            data.len(),
            expected
        ))
        .into());
    }

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);

        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                AnalysisError::Provider(
                    "Respuesta de embeddings inválida: falta 'embedding'".to_string(),
                )
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);

    Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
