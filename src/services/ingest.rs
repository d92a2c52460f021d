//! Document ingestion: split, embed, write.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::chunker::ChunkSplitter;
use super::embedding::EmbeddingClient;
use super::events::{EventSink, PipelineEvent};
use super::index_manager::VectorIndexManager;
use super::upsert::BatchUpserter;
use crate::error::{EmbeddingError, IngestError, UpsertError};
use crate::models::{Document, IndexDescriptor, IndexHandle, IngestionReport, VectorRecord};
use crate::utils::normalize_for_embedding;

/// Why one document could not be fully written.
enum DocumentFailure {
    Failed {
        error: IngestError,
        chunks_written: u64,
    },
    Cancelled {
        chunks_written: u64,
    },
}

impl From<EmbeddingError> for DocumentFailure {
    fn from(error: EmbeddingError) -> Self {
        DocumentFailure::Failed {
            error: error.into(),
            chunks_written: 0,
        }
    }
}

impl From<UpsertError> for DocumentFailure {
    fn from(error: UpsertError) -> Self {
        match error {
            UpsertError::Cancelled { records_written } => DocumentFailure::Cancelled {
                chunks_written: records_written,
            },
            error => DocumentFailure::Failed {
                chunks_written: error.records_written(),
                error: error.into(),
            },
        }
    }
}

/// Turns documents into stored vectors, one document at a time.
///
/// A failing document is recorded in the report and the run moves on.
pub struct IngestionPipeline {
    splitter: ChunkSplitter,
    embedder: Arc<dyn EmbeddingClient>,
    upserter: BatchUpserter,
    index_manager: VectorIndexManager,
    events: Arc<dyn EventSink>,
}

impl IngestionPipeline {
    pub fn new(
        splitter: ChunkSplitter,
        embedder: Arc<dyn EmbeddingClient>,
        upserter: BatchUpserter,
        index_manager: VectorIndexManager,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            splitter,
            embedder,
            upserter,
            index_manager,
            events,
        }
    }

    /// Provision the index, then ingest. Provisioning failures end the run.
    pub async fn run(
        &self,
        descriptor: &IndexDescriptor,
        documents: Vec<Document>,
        cancel: &CancellationToken,
    ) -> Result<IngestionReport, IngestError> {
        let handle = self.index_manager.ensure_index(descriptor).await?;
        Ok(self.ingest(&handle, documents, cancel).await)
    }

    /// Ingest every document into an existing index.
    pub async fn ingest(
        &self,
        handle: &IndexHandle,
        documents: Vec<Document>,
        cancel: &CancellationToken,
    ) -> IngestionReport {
        let mut report = IngestionReport::start(documents.len());

        for document in documents {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match self.ingest_document(handle, &document, cancel).await {
                Ok(chunks) => {
                    report.record_success(&document.source_id, chunks);
                    self.events.emit(PipelineEvent::DocumentProcessed {
                        source_id: document.source_id,
                        chunks_written: chunks,
                        success: true,
                    });
                }
                Err(DocumentFailure::Failed {
                    error,
                    chunks_written,
                }) => {
                    tracing::warn!(source = %document.source_id, error = %error, "document ingestion failed");
                    report.record_failure(&document.source_id, error.to_string(), chunks_written);
                    self.events.emit(PipelineEvent::DocumentProcessed {
                        source_id: document.source_id,
                        chunks_written,
                        success: false,
                    });
                }
                Err(DocumentFailure::Cancelled { chunks_written }) => {
                    report.record_failure(
                        &document.source_id,
                        "cancelled".to_string(),
                        chunks_written,
                    );
                    report.cancelled = true;
                    break;
                }
            }
        }

        report.finish()
    }

    async fn ingest_document(
        &self,
        handle: &IndexHandle,
        document: &Document,
        cancel: &CancellationToken,
    ) -> Result<u64, DocumentFailure> {
        let chunks = self.splitter.split_document(document);

        self.events.emit(PipelineEvent::ChunkCountComputed {
            source_id: document.source_id.clone(),
            chunks: chunks.len(),
        });

        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks
            .iter()
            .map(|chunk| normalize_for_embedding(&chunk.text))
            .collect();
        let embeddings = self.embedder.embed_many(texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: chunks.len(),
                actual: embeddings.len(),
            }
            .into());
        }

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, values)| VectorRecord::from_chunk(chunk, values))
            .collect();

        let summary = self.upserter.upsert(handle, records, cancel).await?;
        Ok(summary.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::models::{DocumentOutcome, Metric};
    use crate::services::events::{NoopEventSink, RecordingEventSink};
    use crate::services::testing::FakeEmbedder;
    use crate::services::vector_store::{InMemoryVectorStore, VectorStore};
    use crate::utils::RetryConfig;

    const DIM: usize = 4;

    struct Fixture {
        store: Arc<InMemoryVectorStore>,
        embedder: Arc<FakeEmbedder>,
        events: Arc<RecordingEventSink>,
        pipeline: IngestionPipeline,
    }

    fn fixture(max_chunk_size: usize, batch_size: usize, embedder: FakeEmbedder) -> Fixture {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = Arc::new(embedder);
        let events = Arc::new(RecordingEventSink::new());

        let upserter = BatchUpserter::new(
            store.clone(),
            events.clone(),
            batch_size,
            RetryConfig::new(1),
        );
        let index_manager = VectorIndexManager::new(
            store.clone(),
            Arc::new(NoopEventSink),
            Duration::from_secs(1),
            Duration::from_millis(5),
        );
        let pipeline = IngestionPipeline::new(
            ChunkSplitter::new(max_chunk_size).unwrap(),
            embedder.clone(),
            upserter,
            index_manager,
            events.clone(),
        );

        Fixture {
            store,
            embedder,
            events,
            pipeline,
        }
    }

    fn descriptor() -> IndexDescriptor {
        IndexDescriptor::new("docs", DIM as u32, Metric::Cosine).unwrap()
    }

    #[tokio::test]
    async fn test_sentence_chunks_are_written_with_ids() {
        let f = fixture(6, 100, FakeEmbedder::new(DIM));
        let report = f
            .pipeline
            .run(
                &descriptor(),
                vec![Document::new("doc1", "A. B. C.")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.chunks_written, 2);
        assert_eq!(f.store.record_ids("docs"), vec!["doc1_0", "doc1_1"]);

        let first = f.store.get("docs", "doc1_0").unwrap();
        assert_eq!(first.metadata.chunk_text, "A. B. ");
        assert_eq!(first.metadata.source_id, "doc1");
        assert_eq!(first.values, f.embedder.vector_for("A. B. "));
        assert_eq!(f.store.get("docs", "doc1_1").unwrap().metadata.chunk_text, "C.");
    }

    #[tokio::test]
    async fn test_reingest_overwrites_same_ids() {
        let f = fixture(20, 100, FakeEmbedder::new(DIM));
        let docs = vec![
            Document::new("a.txt", "first paragraph\n\nsecond paragraph"),
            Document::new("b.txt", "short"),
        ];

        let cancel = CancellationToken::new();
        f.pipeline.run(&descriptor(), docs.clone(), &cancel).await.unwrap();
        let ids_before = f.store.record_ids("docs");
        f.pipeline.run(&descriptor(), docs, &cancel).await.unwrap();

        assert_eq!(f.store.record_ids("docs"), ids_before);
        let handle = f.store.index_handle("docs").await.unwrap();
        assert_eq!(f.store.count(&handle).await.unwrap(), ids_before.len() as u64);
    }

    #[tokio::test]
    async fn test_newlines_are_replaced_only_for_embedding() {
        let f = fixture(100, 100, FakeEmbedder::new(DIM));
        f.pipeline
            .run(
                &descriptor(),
                vec![Document::new("doc", "line one\nline two")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(f.embedder.inputs(), vec!["line one line two"]);
        assert_eq!(
            f.store.get("docs", "doc_0").unwrap().metadata.chunk_text,
            "line one\nline two"
        );
    }

    #[tokio::test]
    async fn test_one_embedding_call_per_document() {
        let f = fixture(5, 2, FakeEmbedder::new(DIM));
        let report = f
            .pipeline
            .run(
                &descriptor(),
                vec![
                    Document::new("a", "one two three four five"),
                    Document::new("b", "six seven"),
                ],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(f.embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_document_does_not_stop_the_run() {
        let f = fixture(100, 100, FakeEmbedder::new(DIM).failing_on("poison"));
        let report = f
            .pipeline
            .run(
                &descriptor(),
                vec![
                    Document::new("a.txt", "fine"),
                    Document::new("b.txt", "poison pill"),
                    Document::new("c.txt", "also fine"),
                ],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.failed_sources(), vec!["b.txt"]);
        assert_eq!(report.succeeded().count(), 2);
        assert_eq!(f.store.record_ids("docs"), vec!["a.txt_0", "c.txt_0"]);

        let processed: Vec<bool> = f
            .events
            .events()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::DocumentProcessed { success, .. } => Some(success),
                _ => None,
            })
            .collect();
        assert_eq!(processed, vec![true, false, true]);
    }

    #[tokio::test]
    async fn test_empty_document_is_indexed_with_zero_chunks() {
        let f = fixture(100, 100, FakeEmbedder::new(DIM));
        let report = f
            .pipeline
            .run(
                &descriptor(),
                vec![Document::new("empty.txt", "")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            report.documents[0].outcome,
            DocumentOutcome::Indexed { chunks: 0 }
        );
        assert_eq!(f.embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_wrong_dimension_fails_document() {
        let f = fixture(100, 100, FakeEmbedder::new(DIM + 1));
        let report = f
            .pipeline
            .run(
                &descriptor(),
                vec![Document::new("a.txt", "text")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.failed_sources(), vec!["a.txt"]);
        assert!(f.store.record_ids("docs").is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_remaining_documents() {
        let f = fixture(100, 100, FakeEmbedder::new(DIM));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = f
            .pipeline
            .run(&descriptor(), vec![Document::new("a.txt", "text")], &cancel)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.unprocessed(), 1);
        assert!(f.store.record_ids("docs").is_empty());
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let f = fixture(6, 1, FakeEmbedder::new(DIM));
        f.pipeline
            .run(
                &descriptor(),
                vec![Document::new("doc1", "A. B. C.")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let events = f.events.events();
        assert!(matches!(
            events[0],
            PipelineEvent::ChunkCountComputed { chunks: 2, .. }
        ));
        assert!(matches!(
            events[1],
            PipelineEvent::BatchUpserted { batch_index: 0, .. }
        ));
        assert!(matches!(
            events[2],
            PipelineEvent::BatchUpserted { batch_index: 1, .. }
        ));
        assert!(matches!(
            events[3],
            PipelineEvent::DocumentProcessed { success: true, chunks_written: 2, .. }
        ));
    }
}
