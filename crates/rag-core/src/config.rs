//! Configuration types for the question answering system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Index file locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Embedding backend.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generative model backend.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Splitter settings.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Fusion and context settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Intent router settings.
    #[serde(default)]
    pub router: RouterConfig,

    /// Tool agent settings.
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Index file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding the FTS5 keyword index.
    #[serde(default = "default_keyword_db")]
    pub keyword_db: PathBuf,

    /// SQLite file holding the vector index.
    #[serde(default = "default_vector_db")]
    pub vector_db: PathBuf,

    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            keyword_db: default_keyword_db(),
            vector_db: default_vector_db(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

/// Which embedder implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Ollama `/api/embed`.
    Ollama,
    /// Deterministic offline hash embedding.
    Hash,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProvider,

    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Ollama base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Vector dimension (used by the hash provider).
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Batch size for document embedding.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            base_url: default_base_url(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
        }
    }
}

/// Generative model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model name.
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Ollama base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

/// Chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Fusion and context configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// RRF constant K.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    /// Default semantic depth.
    #[serde(default = "default_semantic_depth")]
    pub semantic_depth: usize,

    /// Default keyword depth.
    #[serde(default = "default_keyword_depth")]
    pub keyword_depth: usize,

    /// Number of hits rendered into a context block.
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,

    /// Per-chunk character cap inside a context block.
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            semantic_depth: default_semantic_depth(),
            keyword_depth: default_keyword_depth(),
            context_limit: default_context_limit(),
            max_chunk_chars: default_max_chunk_chars(),
        }
    }
}

/// Intent router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Keyword depth for the file-lookup fast path.
    #[serde(default = "default_file_lookup_depth")]
    pub file_lookup_depth: usize,

    /// Maximum files in a file-lookup response.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            file_lookup_depth: default_file_lookup_depth(),
            max_files: default_max_files(),
        }
    }
}

/// Tool agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model turns per invocation.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Character cap on a serialized observation.
    #[serde(default = "default_observation_cap")]
    pub observation_cap: usize,

    /// Per-tool execution timeout in seconds.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            observation_cap: default_observation_cap(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

// Default value functions

fn default_busy_timeout() -> u32 {
    30000
}

fn default_embedding_provider() -> EmbeddingProvider {
    EmbeddingProvider::Ollama
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_dimension() -> usize {
    768
}

fn default_batch_size() -> usize {
    32
}

fn default_generation_model() -> String {
    "llama3".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_chunk_size() -> usize {
    800
}

fn default_chunk_overlap() -> usize {
    80
}

fn default_rrf_k() -> u32 {
    60
}

fn default_semantic_depth() -> usize {
    8
}

fn default_keyword_depth() -> usize {
    20
}

fn default_context_limit() -> usize {
    6
}

fn default_max_chunk_chars() -> usize {
    1200
}

fn default_file_lookup_depth() -> usize {
    100
}

fn default_max_files() -> usize {
    10
}

fn default_max_steps() -> usize {
    4
}

fn default_observation_cap() -> usize {
    4000
}

fn default_tool_timeout() -> u64 {
    60
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rag")
}

fn default_keyword_db() -> PathBuf {
    data_dir().join("keyword.db")
}

fn default_vector_db() -> PathBuf {
    data_dir().join("vector.db")
}

impl RagConfig {
    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RagError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would leave answers without any sources.
    pub fn validate(&self) -> Result<()> {
        if self.search.context_limit == 0 {
            return Err(RagError::invalid_argument(
                "search.context_limit must be at least 1",
            ));
        }
        Ok(())
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rag").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("rag.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Load from an explicit path if given, otherwise from the default paths.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load_default(),
        }
    }

    /// Splitter settings in the form the chunkers take.
    pub fn chunk_config(&self) -> crate::traits::ChunkConfig {
        crate::traits::ChunkConfig {
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RagConfig::default();
        assert_eq!(config.search.rrf_k, 60);
        assert_eq!(config.search.semantic_depth, 8);
        assert_eq!(config.search.keyword_depth, 20);
        assert_eq!(config.search.context_limit, 6);
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 80);
        assert_eq!(config.agent.max_steps, 4);
        assert_eq!(config.router.max_files, 10);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[search]\nrrf_k = 30\n\n[embedding]\nprovider = \"hash\"\ndimension = 64"
        )
        .unwrap();

        let config = RagConfig::load(file.path()).unwrap();
        assert_eq!(config.search.rrf_k, 30);
        assert_eq!(config.search.keyword_depth, 20);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hash);
        assert_eq!(config.embedding.dimension, 64);
        assert_eq!(config.generation.model, "llama3");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search\nrrf_k = ").unwrap();

        let err = RagConfig::load(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_zero_context_limit_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\ncontext_limit = 0").unwrap();

        let err = RagConfig::load(file.path()).unwrap_err();
        assert!(err.is_input_error());
        assert!(RagConfig::default().validate().is_ok());
    }
}
