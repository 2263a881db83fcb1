//! Question answering over one or two knowledge bases.
//!
//! The orchestration here is deliberately thin: resolve the bases, retrieve
//! the top chunks from each, hand the chunk texts to prompt templating, and
//! relay the model's answer. All heavy lifting lives in [`crate::kb`] and
//! the two provider clients.

use anyhow::Result;
use tracing::debug;

use crate::completion;
use crate::config::Config;
use crate::error::AnalysisError;
use crate::kb::KnowledgeBase;
use crate::prompt;
use crate::registry::Registry;

/// Chunks retrieved from each side of a comparison.
pub const COMPARISON_TOP_K: usize = 3;
/// Chunks retrieved for a single-document answer.
pub const SINGLE_TOP_K: usize = 5;

/// Answers `question` by comparing the reference base against `target`.
///
/// `target` is either a preset base (caller holds its read lock) or an
/// ephemeral upload-derived base owned by the request. Fails with a
/// configuration error when the reference base is missing or unbuilt.
pub async fn answer_with_comparison(
    config: &Config,
    registry: &Registry,
    question: &str,
    target: &KnowledgeBase,
) -> Result<String> {
    let reference = registry.reference().ok_or_else(unbuilt_reference)?;
    let reference = reference.read().await;
    if !reference.is_built() {
        return Err(unbuilt_reference().into());
    }

    let reference_hits = reference.search(config, question, COMPARISON_TOP_K).await?;
    let target_hits = target.search(config, question, COMPARISON_TOP_K).await?;

    debug!(
        reference_hits = reference_hits.len(),
        target_hits = target_hits.len(),
        target = target.name(),
        "assembling comparison prompt"
    );

    let reference_fragments: Vec<String> =
        reference_hits.into_iter().map(|hit| hit.text).collect();
    let target_fragments: Vec<String> = target_hits.into_iter().map(|hit| hit.text).collect();

    let target_meta = target.metadata().ok_or_else(|| {
        AnalysisError::NotBuilt(format!(
            "La base '{}' no tiene metadatos",
            target.name()
        ))
    })?;

    let prompt = prompt::comparison_prompt(
        question,
        &reference_fragments,
        &target_fragments,
        target_meta,
    );

    completion::complete(&config.completion, &prompt).await
}

/// Answers `question` from the reference base alone.
pub async fn answer_from_reference(
    config: &Config,
    registry: &Registry,
    question: &str,
) -> Result<String> {
    let reference = registry.reference().ok_or_else(unbuilt_reference)?;
    let reference = reference.read().await;
    if !reference.is_built() {
        return Err(unbuilt_reference().into());
    }

    let hits = reference.search(config, question, SINGLE_TOP_K).await?;
    let fragments: Vec<String> = hits.into_iter().map(|hit| hit.text).collect();

    let prompt = prompt::single_document_prompt(question, &fragments);
    completion::complete(&config.completion, &prompt).await
}

fn unbuilt_reference() -> AnalysisError {
    AnalysisError::Configuration(
        "La base de conocimiento de referencia (Sura) no está inicializada".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn unbuilt_reference_is_a_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = tmp.path().join("kb");
        config.reference.path = tmp.path().join("SURA_COL_2024.pdf");

        let registry = Registry::initialize(&config).await;
        let err = answer_from_reference(&config, &registry, "¿pregunta?")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::Configuration(_))
        ));
    }
}
