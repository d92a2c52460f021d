//! Nearest-neighbour lookup for questions.

use std::sync::Arc;

use super::embedding::EmbeddingClient;
use super::events::{EventSink, PipelineEvent};
use super::vector_store::VectorStore;
use crate::error::{RetrievalError, VectorDimensionMismatch};
use crate::models::{DEFAULT_TOP_K, IndexHandle, QueryMatch, QueryRequest};

/// Finds the stored chunks nearest to a question.
pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    events: Arc<dyn EventSink>,
    top_k: u32,
}

impl RetrievalEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            embedder,
            store,
            events,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn top_k(&self) -> u32 {
        self.top_k
    }

    /// Up to `top_k` matches in the order the store ranks them.
    ///
    /// An empty index yields an empty list.
    pub async fn retrieve(
        &self,
        handle: &IndexHandle,
        question: &str,
    ) -> Result<Vec<QueryMatch>, RetrievalError> {
        let vector = self.embed_question(handle, question).await?;
        self.search(handle, vector).await
    }

    /// One embedding call, checked against the index dimension.
    pub async fn embed_question(
        &self,
        handle: &IndexHandle,
        question: &str,
    ) -> Result<Vec<f32>, RetrievalError> {
        let vector = self.embedder.embed_one(question).await?;
        VectorDimensionMismatch::check("query", &vector, handle.dimension())?;
        Ok(vector)
    }

    pub async fn search(
        &self,
        handle: &IndexHandle,
        vector: Vec<f32>,
    ) -> Result<Vec<QueryMatch>, RetrievalError> {
        let matches = self
            .store
            .query(handle, QueryRequest::new(vector, self.top_k))
            .await?;

        self.events.emit(PipelineEvent::QueryMatched {
            index: handle.name().to_string(),
            matches: matches.len(),
        });

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkLocation, IndexDescriptor, Metric, RecordMetadata, VectorRecord};
    use crate::services::events::RecordingEventSink;
    use crate::services::testing::FakeEmbedder;
    use crate::services::vector_store::InMemoryVectorStore;

    async fn setup(dim: usize) -> (Arc<InMemoryVectorStore>, IndexHandle) {
        let store = Arc::new(InMemoryVectorStore::new());
        let descriptor = IndexDescriptor::new("docs", dim as u32, Metric::Cosine).unwrap();
        store.create_index(&descriptor).await.unwrap();
        (store, IndexHandle::new(descriptor))
    }

    fn record(embedder: &FakeEmbedder, id: &str, text: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values: embedder.vector_for(text),
            metadata: RecordMetadata {
                source_id: "doc".to_string(),
                chunk_text: text.to_string(),
                location: ChunkLocation::default(),
            },
        }
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_matches() {
        let (store, handle) = setup(4).await;
        let embedder = Arc::new(FakeEmbedder::new(4));
        let engine = RetrievalEngine::new(
            embedder.clone(),
            store,
            Arc::new(RecordingEventSink::new()),
        );

        let matches = engine.retrieve(&handle, "anything?").await.unwrap();
        assert!(matches.is_empty());
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_top_k_limits_matches() {
        let (store, handle) = setup(4).await;
        let embedder = Arc::new(FakeEmbedder::new(4));
        let records = ["alpha", "bravo", "charlie", "delta", "echo"]
            .iter()
            .enumerate()
            .map(|(i, text)| record(&embedder, &format!("doc_{}", i), text))
            .collect();
        store.upsert(&handle, records).await.unwrap();

        let events = Arc::new(RecordingEventSink::new());
        let engine = RetrievalEngine::new(embedder.clone(), store, events.clone()).with_top_k(3);

        let matches = engine.retrieve(&handle, "charlie").await.unwrap();
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].id, "doc_2");
        assert!(matches.iter().all(|m| m.metadata.is_some() && m.values.is_some()));
        assert_eq!(
            events.events(),
            vec![PipelineEvent::QueryMatched {
                index: "docs".to_string(),
                matches: 3
            }]
        );
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        let (store, handle) = setup(4).await;
        let engine = RetrievalEngine::new(
            Arc::new(FakeEmbedder::new(3)),
            store,
            Arc::new(RecordingEventSink::new()),
        );

        let err = engine.retrieve(&handle, "question").await.unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch(VectorDimensionMismatch {
                expected: 4,
                actual: 3,
                ..
            })
        ));
    }
}
