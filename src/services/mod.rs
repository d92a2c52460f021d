mod chunker;
mod embedding;
mod events;
mod index_manager;
mod ingest;
mod query;
mod retrieval;
mod synthesis;
mod upsert;
mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use chunker::ChunkSplitter;
pub use embedding::{EmbeddingClient, OpenAiEmbeddingClient};
pub use events::{EventSink, NoopEventSink, PipelineEvent, RecordingEventSink, TracingEventSink};
pub use index_manager::VectorIndexManager;
pub use ingest::IngestionPipeline;
pub use query::{QueryPipeline, QueryStage};
pub use retrieval::RetrievalEngine;
pub use synthesis::{LanguageModel, OpenAiChatModel, SynthesisEngine, stuff_prompt};
pub use upsert::{BatchUpserter, UpsertSummary};
pub use vector_store::{
    InMemoryVectorStore, PgVectorBackend, QdrantBackend, VectorStore, create_backend,
};
