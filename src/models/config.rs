use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::index::{IndexDescriptor, Metric};
use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_INDEX_NAME: &str = "docqa";
pub const DEFAULT_DIMENSION: u32 = 1536;
pub const DEFAULT_TOP_K: u32 = 10;
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_UPSERT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub language_model: LanguageModelConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("docqa").join("config.toml"))
    }

    /// Load from an explicit path, or from the platform config directory when
    /// `path` is `None`. A missing default file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load_from(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_from(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "index.name must not be empty".to_string(),
            ));
        }
        if self.index.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "index.dimension must be greater than 0".to_string(),
            ));
        }
        if self.index.poll_interval_ms > self.index.provisioning_timeout_secs.saturating_mul(1000) {
            return Err(ConfigError::ValidationError(
                "index.poll_interval_ms must not exceed the provisioning timeout".to_string(),
            ));
        }
        if self.ingestion.max_chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "ingestion.max_chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.ingestion.upsert_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "ingestion.upsert_batch_size must be greater than 0".to_string(),
            ));
        }
        if self.ingestion.upsert_max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "ingestion.upsert_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.query.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "query.top_k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn index_descriptor(&self) -> Result<IndexDescriptor, crate::error::IndexError> {
        IndexDescriptor::new(&self.index.name, self.index.dimension, self.index.metric)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_openai_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Falls back to `OPENAI_API_KEY` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum inputs per HTTP request to the provider.
    #[serde(default = "default_request_batch_size")]
    pub request_batch_size: usize,
}

fn default_openai_url() -> String {
    DEFAULT_OPENAI_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_request_batch_size() -> usize {
    512
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_openai_url(),
            model: default_embedding_model(),
            api_key: None,
            timeout_secs: default_timeout(),
            request_batch_size: default_request_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageModelConfig {
    #[serde(default = "default_openai_url")]
    pub url: String,

    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Falls back to `OPENAI_API_KEY` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub temperature: f32,
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

impl Default for LanguageModelConfig {
    fn default() -> Self {
        Self {
            url: default_openai_url(),
            model: default_chat_model(),
            api_key: None,
            timeout_secs: default_timeout(),
            temperature: 0.0,
        }
    }
}

/// Vector store backend driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    #[default]
    Qdrant,
    #[serde(alias = "postgres", alias = "pgvector")]
    PostgreSQL,
    /// Lives only as long as the process, so each CLI command starts empty.
    Memory,
}

impl VectorDriver {
    /// Whether stored vectors outlive the process that wrote them.
    pub fn is_persistent(&self) -> bool {
        !matches!(self, VectorDriver::Memory)
    }
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::PostgreSQL => write!(f, "postgresql"),
            VectorDriver::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Falls back to `QDRANT_API_KEY` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_pool_max() -> u32 {
    5
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            api_key: None,
            pool_max: default_pool_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub name: String,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default)]
    pub metric: Metric,

    #[serde(default = "default_provisioning_timeout")]
    pub provisioning_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_index_name() -> String {
    DEFAULT_INDEX_NAME.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_DIMENSION
}

fn default_provisioning_timeout() -> u64 {
    80
}

fn default_poll_interval() -> u64 {
    1000
}

impl IndexConfig {
    pub fn provisioning_timeout(&self) -> Duration {
        Duration::from_secs(self.provisioning_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            dimension: default_dimension(),
            metric: Metric::default(),
            provisioning_timeout_secs: default_provisioning_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Maximum chunk length in characters.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,

    #[serde(default = "default_upsert_max_attempts")]
    pub upsert_max_attempts: u32,

    #[serde(default = "default_upsert_initial_backoff")]
    pub upsert_initial_backoff_ms: u64,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./documents")
}

fn default_exclude_patterns() -> Vec<String> {
    vec!["**/.git/**".to_string(), "**/.DS_Store".to_string()]
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

fn default_upsert_batch_size() -> usize {
    DEFAULT_UPSERT_BATCH_SIZE
}

fn default_upsert_max_attempts() -> u32 {
    3
}

fn default_upsert_initial_backoff() -> u64 {
    200
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            exclude_patterns: default_exclude_patterns(),
            max_file_size: default_max_file_size(),
            max_chunk_size: default_max_chunk_size(),
            upsert_batch_size: default_upsert_batch_size(),
            upsert_max_attempts: default_upsert_max_attempts(),
            upsert_initial_backoff_ms: default_upsert_initial_backoff(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default)]
    pub default_format: OutputFormat,
}

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            default_format: OutputFormat::Text,
        }
    }
}
