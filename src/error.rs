//! Error types for the docqa pipeline.

use std::time::Duration;

use thiserror::Error;

use crate::models::Metric;
use crate::utils::retry::Retryable;

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding provider: {0}")]
    ConnectionError(String),

    #[error("embedding provider error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding provider returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("no API key configured for the embedding provider")]
    MissingApiKey,

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            // Connection and timeout errors are retryable
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            EmbeddingError::ServerError(msg) => is_transient_server_error(msg),
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_)
            | EmbeddingError::CountMismatch { .. }
            | EmbeddingError::MissingApiKey => false,
        }
    }
}

/// Rate limits and any 5xx, read from a `status <code>: ...` message.
fn is_transient_server_error(message: &str) -> bool {
    let code = message
        .strip_prefix("status ")
        .and_then(|rest| rest.split(|c: char| !c.is_ascii_digit()).next())
        .and_then(|digits| digits.parse::<u16>().ok());

    match code {
        Some(code) => code == 429 || (500..600).contains(&code),
        None => {
            let lower = message.to_lowercase();
            lower.contains("unavailable") || lower.contains("too many requests")
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("index error: {0}")]
    IndexOperation(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("query error: {0}")]
    QueryError(String),

    #[error("request rejected by vector store: {0}")]
    Rejected(String),

    #[error("PostgreSQL error: {0}")]
    PostgresError(String),

    #[error("pgvector extension error: {0}")]
    PgVectorExtensionError(String),
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::ConnectionError(_) | VectorStoreError::UpsertError(_) => true,
            VectorStoreError::IndexOperation(msg)
            | VectorStoreError::QueryError(msg)
            | VectorStoreError::PostgresError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
            VectorStoreError::IndexNotFound(_)
            | VectorStoreError::Rejected(_)
            | VectorStoreError::PgVectorExtensionError(_) => false,
        }
    }
}

/// A vector whose length disagrees with the index dimension.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("vector dimension mismatch for '{id}': expected {expected}, got {actual}")]
pub struct VectorDimensionMismatch {
    pub id: String,
    pub expected: usize,
    pub actual: usize,
}

impl VectorDimensionMismatch {
    /// Returns an error when `values` does not have exactly `expected` entries.
    pub fn check(id: &str, values: &[f32], expected: usize) -> Result<(), Self> {
        if values.len() == expected {
            Ok(())
        } else {
            Err(Self {
                id: id.to_string(),
                expected,
                actual: values.len(),
            })
        }
    }
}

/// Errors related to index provisioning.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index '{name}' was not ready after {waited:?}")]
    ProvisioningTimeout { name: String, waited: Duration },

    #[error(
        "index '{name}' exists with dimension {actual_dimension} ({actual_metric}), \
         expected dimension {expected_dimension} ({expected_metric})"
    )]
    DescriptorMismatch {
        name: String,
        expected_dimension: u32,
        expected_metric: Metric,
        actual_dimension: u32,
        actual_metric: Metric,
    },

    #[error("invalid index descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

/// Errors raised while writing records in batches.
#[derive(Debug, Error)]
pub enum UpsertError {
    #[error(transparent)]
    DimensionMismatch(#[from] VectorDimensionMismatch),

    #[error(
        "upsert batch {batch_index} ({} records) failed after {attempts} attempts: {source}",
        .record_ids.len()
    )]
    BatchFailed {
        batch_index: usize,
        record_ids: Vec<String>,
        attempts: u32,
        records_written: u64,
        #[source]
        source: VectorStoreError,
    },

    #[error("upsert cancelled after {records_written} records")]
    Cancelled { records_written: u64 },
}

impl UpsertError {
    /// Records that reached the store before the failure.
    pub fn records_written(&self) -> u64 {
        match self {
            UpsertError::DimensionMismatch(_) => 0,
            UpsertError::BatchFailed {
                records_written, ..
            }
            | UpsertError::Cancelled { records_written } => *records_written,
        }
    }
}

/// Errors related to ingesting documents.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("upsert error: {0}")]
    Upsert(#[from] UpsertError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

/// Errors related to retrieving matches for a question.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error(transparent)]
    DimensionMismatch(#[from] VectorDimensionMismatch),
}

/// Errors reported by the language model.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("failed to connect to language model: {0}")]
    ConnectionError(String),

    #[error("language model error: {0}")]
    ServerError(String),

    #[error("language model request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("context too large for language model: {0}")]
    ContextTooLarge(String),

    #[error("invalid language model response: {0}")]
    InvalidResponse(String),

    #[error("no API key configured for the language model")]
    MissingApiKey,

    #[error("language model timeout")]
    Timeout,
}

impl Retryable for SynthesisError {
    fn is_retryable(&self) -> bool {
        match self {
            SynthesisError::ConnectionError(_) | SynthesisError::Timeout => true,
            SynthesisError::ServerError(msg) => is_transient_server_error(msg),
            SynthesisError::RequestError(e) => e.is_timeout() || e.is_connect(),
            SynthesisError::ContextTooLarge(_)
            | SynthesisError::InvalidResponse(_)
            | SynthesisError::MissingApiKey => false,
        }
    }
}

/// Errors related to answering a question.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors related to loading documents.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("document directory not found: {0}")]
    NotFound(String),

    #[error("directory walk error: {0}")]
    WalkError(String),

    #[error("failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("failed to extract text from {path}: {message}")]
    ExtractError { path: String, message: String },
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("query error: {0}")]
    Query(#[from] QueryError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),
}
