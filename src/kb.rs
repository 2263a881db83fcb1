//! Persisted knowledge bases: build-or-load, snapshot round-trip, and
//! cosine similarity search.
//!
//! A [`KnowledgeBase`] owns one chunk sequence, one parallel embedding
//! sequence, and one metadata record, all persisted together as a single
//! JSON snapshot named after the base. The two sequences move in lockstep:
//! `chunks.len() == embeddings.len()` holds for every built base, and
//! nothing ever updates one without the other.
//!
//! # Lifecycle
//!
//! ```text
//! Unbuilt ──build(source, force=false)──▶ Built ──search(query, k)──▶ hits
//!    ▲            │ snapshot exists?                │
//!    │            └─ yes: load, no API calls        │ build(force=true)
//!    └── delete_snapshot (ephemeral bases)          ▼
//!                                            re-extract + re-embed
//! ```
//!
//! The cache-hit path is the reason startup stays cheap: a snapshot on disk
//! means no PDF parsing and zero embedding-provider calls.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::chunker;
use crate::config::Config;
use crate::embedding::{self, cosine_similarity};
use crate::error::AnalysisError;
use crate::extract;
use crate::metadata::KbMetadata;
use crate::normalize;

/// Suffix of every snapshot file under the data directory.
pub const SNAPSHOT_SUFFIX: &str = "_embeddings.json";

/// One similarity hit: the chunk text and its cosine score against the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub text: String,
    pub score: f32,
}

/// On-disk snapshot record. Exactly these three fields; the load path
/// rejects records whose sequences disagree in length.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    chunks: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    metadata: KbMetadata,
}

#[derive(Debug)]
pub struct KnowledgeBase {
    name: String,
    snapshot_path: PathBuf,
    chunks: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    metadata: Option<KbMetadata>,
}

impl KnowledgeBase {
    /// Creates an empty, unbuilt base whose snapshot lives at
    /// `<data_dir>/<name>_embeddings.json`.
    pub fn new(name: &str, data_dir: &Path) -> Self {
        let snapshot_path = data_dir.join(format!("{}{}", name, SNAPSHOT_SUFFIX));
        Self {
            name: name.to_string(),
            snapshot_path,
            chunks: Vec::new(),
            embeddings: Vec::new(),
            metadata: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_built(&self) -> bool {
        !self.chunks.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn metadata(&self) -> Option<&KbMetadata> {
        self.metadata.as_ref()
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Builds the base from `source`, or loads the persisted snapshot when
    /// one exists and `force_rebuild` is false.
    ///
    /// The load path performs no extraction and no embedding calls. The
    /// build path extracts the PDF exactly once, normalizes, chunks, embeds
    /// every chunk sequentially (keeping chunk/embedding indices aligned),
    /// and overwrites the snapshot.
    pub async fn build(&mut self, config: &Config, source: &Path, force_rebuild: bool) -> Result<()> {
        if !force_rebuild && self.snapshot_path.exists() {
            self.load()?;
            self.warn_if_stale(source);
            debug!(
                base = %self.name,
                chunks = self.chunks.len(),
                "loaded snapshot, skipping extraction and embedding"
            );
            return Ok(());
        }

        let bytes = std::fs::read(source)
            .with_context(|| format!("Failed to read source document: {}", source.display()))?;
        let raw = extract::extract_text(&bytes)?;
        let text = normalize::clean_text(&raw);
        if text.is_empty() {
            return Err(AnalysisError::Extraction(
                "El PDF no contiene texto utilizable tras la limpieza".to_string(),
            )
            .into());
        }

        let mut metadata = KbMetadata::from_source(source, config.metadata.default_year);
        metadata.source_sha256 = Some(format!("{:x}", Sha256::digest(&bytes)));

        let chunks = chunker::chunk_text(&text, config.chunking.token_limit);
        if chunks.is_empty() {
            return Err(AnalysisError::Extraction(
                "El PDF no produjo ningún fragmento de texto".to_string(),
            )
            .into());
        }

        let mut embeddings = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            debug!(base = %self.name, chunk = i + 1, total = chunks.len(), "embedding chunk");
            embeddings.push(embedding::embed_query(&config.embedding, chunk).await?);
        }

        metadata.built_at = Some(Utc::now());

        self.chunks = chunks;
        self.embeddings = embeddings;
        self.metadata = Some(metadata);
        self.save()?;

        info!(
            base = %self.name,
            chunks = self.chunks.len(),
            source = %source.display(),
            "knowledge base built"
        );
        Ok(())
    }

    /// Returns the `top_k` most similar chunks in descending score order.
    /// Ties keep original chunk order (the sort is stable).
    ///
    /// Fails with [`AnalysisError::NotBuilt`] on an unbuilt base, which is
    /// a call-ordering bug rather than a runtime condition.
    pub async fn search(&self, config: &Config, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        if !self.is_built() {
            return Err(AnalysisError::NotBuilt(format!(
                "La base de conocimiento '{}' no está construida",
                self.name
            ))
            .into());
        }

        let query_vec = embedding::embed_query(&config.embedding, query).await?;
        Ok(self.rank(&query_vec, top_k))
    }

    /// Linear cosine scan over the stored embeddings. Fine for the expected
    /// corpus of low hundreds of chunks per document.
    fn rank(&self, query_vec: &[f32], top_k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .zip(self.embeddings.iter())
            .map(|(chunk, vec)| ScoredChunk {
                text: chunk.clone(),
                score: cosine_similarity(query_vec, vec),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        scored
    }

    /// Persists the (chunks, embeddings, metadata) triple, overwriting any
    /// prior snapshot.
    pub fn save(&self) -> Result<()> {
        let metadata = self.metadata.clone().ok_or_else(|| {
            AnalysisError::NotBuilt(format!(
                "La base '{}' no tiene metadatos que persistir",
                self.name
            ))
        })?;

        let snapshot = Snapshot {
            chunks: self.chunks.clone(),
            embeddings: self.embeddings.clone(),
            metadata,
        };

        if let Some(parent) = self.snapshot_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create snapshot directory: {}", parent.display())
            })?;
        }

        let json = serde_json::to_vec(&snapshot).context("Failed to serialize snapshot")?;
        std::fs::write(&self.snapshot_path, json).with_context(|| {
            format!("Failed to write snapshot: {}", self.snapshot_path.display())
        })?;

        Ok(())
    }

    /// Restores chunks, embeddings, and metadata from the snapshot file.
    pub fn load(&mut self) -> Result<()> {
        let bytes = std::fs::read(&self.snapshot_path).with_context(|| {
            format!("Failed to read snapshot: {}", self.snapshot_path.display())
        })?;

        let snapshot: Snapshot = serde_json::from_slice(&bytes).with_context(|| {
            format!("Corrupt snapshot: {}", self.snapshot_path.display())
        })?;

        if snapshot.chunks.len() != snapshot.embeddings.len() {
            anyhow::bail!(
                "Corrupt snapshot {}: {} chunks vs {} embeddings",
                self.snapshot_path.display(),
                snapshot.chunks.len(),
                snapshot.embeddings.len()
            );
        }

        self.chunks = snapshot.chunks;
        self.embeddings = snapshot.embeddings;
        self.metadata = Some(snapshot.metadata);

        Ok(())
    }

    /// Best-effort removal of the persisted snapshot. Used for ephemeral
    /// upload-derived bases at the end of a request; failures are logged
    /// and swallowed.
    pub fn delete_snapshot(&self) {
        match std::fs::remove_file(&self.snapshot_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                snapshot = %self.snapshot_path.display(),
                error = %e,
                "failed to delete snapshot"
            ),
        }
    }

    /// Logs a warning when the loaded snapshot's source digest no longer
    /// matches the document on disk. The snapshot still serves queries; a
    /// force rebuild refreshes it.
    fn warn_if_stale(&self, source: &Path) {
        let Some(stored) = self
            .metadata
            .as_ref()
            .and_then(|m| m.source_sha256.as_deref())
        else {
            return;
        };
        let Ok(bytes) = std::fs::read(source) else {
            return;
        };
        let current = format!("{:x}", Sha256::digest(&bytes));
        if current != stored {
            warn!(
                base = %self.name,
                source = %source.display(),
                "source document changed since the snapshot was built; use a force rebuild to refresh"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn built_base(dir: &Path, chunks: Vec<&str>, embeddings: Vec<Vec<f32>>) -> KnowledgeBase {
        let mut kb = KnowledgeBase::new("prueba", dir);
        kb.chunks = chunks.into_iter().map(str::to_string).collect();
        kb.embeddings = embeddings;
        kb.metadata = Some(KbMetadata::from_source(
            Path::new("PRUEBA_COL_2024.pdf"),
            2024,
        ));
        kb
    }

    #[test]
    fn snapshot_path_is_derived_from_the_name() {
        let kb = KnowledgeBase::new("sura", Path::new("/tmp/kb"));
        assert_eq!(
            kb.snapshot_path(),
            Path::new("/tmp/kb/sura_embeddings.json")
        );
    }

    #[test]
    fn unbuilt_base_is_empty() {
        let kb = KnowledgeBase::new("sura", Path::new("/tmp/kb"));
        assert!(!kb.is_built());
        assert_eq!(kb.chunk_count(), 0);
    }

    #[tokio::test]
    async fn search_on_unbuilt_base_is_a_not_built_error() {
        let kb = KnowledgeBase::new("sura", Path::new("/tmp/kb"));
        let config = Config::default();
        let err = kb.search(&config, "pregunta", 3).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::NotBuilt(_))
        ));
    }

    #[test]
    fn rank_orders_by_descending_similarity() {
        let tmp = TempDir::new().unwrap();
        let kb = built_base(
            tmp.path(),
            vec!["a", "b", "c"],
            vec![
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![0.7, 0.7],
            ],
        );

        let hits = kb.rank(&[1.0, 0.0], 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].text, "b");
        assert_eq!(hits[1].text, "c");
        assert_eq!(hits[2].text, "a");
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn rank_truncates_to_top_k_and_breaks_ties_by_chunk_order() {
        let tmp = TempDir::new().unwrap();
        let kb = built_base(
            tmp.path(),
            vec!["primero", "segundo", "tercero"],
            vec![
                vec![1.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 0.0],
            ],
        );

        let hits = kb.rank(&[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "primero");
        assert_eq!(hits[1].text, "segundo");
    }

    #[test]
    fn rank_returns_at_most_the_corpus_size() {
        let tmp = TempDir::new().unwrap();
        let kb = built_base(tmp.path(), vec!["único"], vec![vec![1.0, 0.0]]);
        assert_eq!(kb.rank(&[1.0, 0.0], 5).len(), 1);
    }

    #[test]
    fn save_load_roundtrip_is_exact() {
        let tmp = TempDir::new().unwrap();
        let kb = built_base(
            tmp.path(),
            vec!["Política de efectivo.", "Pasivos financieros."],
            vec![vec![0.25, -1.5, 3.125], vec![0.1, 0.2, 0.3]],
        );
        kb.save().unwrap();

        let mut restored = KnowledgeBase::new("prueba", tmp.path());
        restored.load().unwrap();

        assert_eq!(restored.chunks, kb.chunks);
        assert_eq!(restored.embeddings, kb.embeddings);
        assert_eq!(restored.metadata, kb.metadata);
    }

    #[test]
    fn load_rejects_mismatched_sequences() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("roto_embeddings.json");
        std::fs::write(
            &path,
            r#"{"chunks":["a","b"],"embeddings":[[1.0]],"metadata":{"empresa":"X","pais":"Colombia","anio":2024,"source":"x.pdf"}}"#,
        )
        .unwrap();

        let mut kb = KnowledgeBase::new("roto", tmp.path());
        assert!(kb.load().is_err());
    }

    #[test]
    fn delete_snapshot_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let kb = built_base(tmp.path(), vec!["a"], vec![vec![1.0]]);
        kb.save().unwrap();
        assert!(kb.snapshot_path().exists());

        kb.delete_snapshot();
        assert!(!kb.snapshot_path().exists());
        // A second delete of a missing file stays silent.
        kb.delete_snapshot();
    }
}
