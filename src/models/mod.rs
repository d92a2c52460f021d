mod config;
mod document;
mod index;
mod report;
mod search;

pub use config::{
    Config, DEFAULT_CHAT_MODEL, DEFAULT_DIMENSION, DEFAULT_EMBEDDING_MODEL, DEFAULT_INDEX_NAME,
    DEFAULT_MAX_CHUNK_SIZE, DEFAULT_OPENAI_URL, DEFAULT_QDRANT_URL, DEFAULT_TOP_K,
    DEFAULT_UPSERT_BATCH_SIZE, EmbeddingConfig, IndexConfig, IngestionConfig, LanguageModelConfig,
    QueryConfig, VectorDriver, VectorStoreConfig,
};
pub use document::{Chunk, ChunkLocation, Document, RecordMetadata, VectorRecord};
pub use index::{IndexDescriptor, IndexHandle, IndexStatus, Metric};
pub use report::{DocumentOutcome, DocumentReport, IngestionReport};
pub use search::{AnswerResult, OutputFormat, QueryMatch, QueryRequest};
