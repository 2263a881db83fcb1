use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the OpenAI credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub presets: Vec<PresetConfig>,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding persisted knowledge-base snapshots.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory where uploaded PDFs are staged for the request's lifetime.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            upload_dir: default_upload_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/kb")
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("data/uploads")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            token_limit: default_token_limit(),
        }
    }
}

fn default_token_limit() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Overridable so tests can point the client at a local mock server.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_api_base() -> String {
    "https://api.openai.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            api_base: default_api_base(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

fn default_completion_model() -> String {
    "gpt-5-nano".to_string()
}
fn default_completion_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReferenceConfig {
    /// Source document for the fixed Grupo Sura reference base.
    #[serde(default = "default_reference_path")]
    pub path: PathBuf,
    #[serde(default = "default_reference_label")]
    pub label: String,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            path: default_reference_path(),
            label: default_reference_label(),
        }
    }
}

fn default_reference_path() -> PathBuf {
    PathBuf::from("data/SURA_COL_2024.pdf")
}
fn default_reference_label() -> String {
    "Grupo Sura 2024".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PresetConfig {
    pub key: String,
    pub label: String,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetadataConfig {
    /// Fiscal year assumed when a filename carries no recognizable year.
    #[serde(default = "default_year")]
    pub default_year: i32,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            default_year: default_year(),
        }
    }
}

fn default_year() -> i32 {
    2024
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Reads the OpenAI credential from the environment. Empty values count as absent.
pub fn api_key() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.token_limit == 0 {
        anyhow::bail!("chunking.token_limit must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.embedding.is_enabled() && config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0 when provider is enabled");
    }

    let mut seen = std::collections::HashSet::new();
    for preset in &config.presets {
        if preset.key == crate::registry::REFERENCE_KEY {
            anyhow::bail!(
                "preset key '{}' is reserved for the reference base",
                preset.key
            );
        }
        if !seen.insert(preset.key.as_str()) {
            anyhow::bail!("duplicate preset key: '{}'", preset.key);
        }
    }

    Ok(())
}
