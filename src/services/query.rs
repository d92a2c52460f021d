//! Question answering over an index.

use std::fmt;

use super::retrieval::RetrievalEngine;
use super::synthesis::SynthesisEngine;
use crate::error::QueryError;
use crate::models::{AnswerResult, IndexHandle};

/// Progress of a single `answer` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Idle,
    Embedding,
    Retrieving,
    Synthesizing,
    Done,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryStage::Idle => "idle",
            QueryStage::Embedding => "embedding",
            QueryStage::Retrieving => "retrieving",
            QueryStage::Synthesizing => "synthesizing",
            QueryStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Retrieve, then synthesize. The language model is skipped when nothing matches.
pub struct QueryPipeline {
    retrieval: RetrievalEngine,
    synthesis: SynthesisEngine,
}

impl QueryPipeline {
    pub fn new(retrieval: RetrievalEngine, synthesis: SynthesisEngine) -> Self {
        Self {
            retrieval,
            synthesis,
        }
    }

    pub async fn answer(
        &self,
        handle: &IndexHandle,
        question: &str,
    ) -> Result<AnswerResult, QueryError> {
        let mut stage = QueryStage::Idle;
        if question.trim().is_empty() {
            return Err(QueryError::EmptyQuestion);
        }

        advance(&mut stage, QueryStage::Embedding);
        let vector = self.retrieval.embed_question(handle, question).await?;

        advance(&mut stage, QueryStage::Retrieving);
        let matches = self.retrieval.search(handle, vector).await?;

        if matches.is_empty() {
            advance(&mut stage, QueryStage::Done);
            return Ok(AnswerResult::NoMatches);
        }

        let context = matches
            .iter()
            .map(|m| m.chunk_text())
            .collect::<Vec<_>>()
            .join(" ");

        advance(&mut stage, QueryStage::Synthesizing);
        let answer = self.synthesis.synthesize(&context, question).await?;

        advance(&mut stage, QueryStage::Done);
        Ok(AnswerResult::Answer(answer))
    }
}

fn advance(stage: &mut QueryStage, next: QueryStage) {
    tracing::debug!(from = %stage, to = %next, "query stage");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::{
        ChunkLocation, IndexDescriptor, Metric, RecordMetadata, VectorRecord,
    };
    use crate::error::{RetrievalError, SynthesisError};
    use crate::services::events::NoopEventSink;
    use crate::services::testing::{FakeEmbedder, FakeLanguageModel};
    use crate::services::vector_store::{InMemoryVectorStore, VectorStore};

    const DIM: usize = 4;

    struct Fixture {
        store: Arc<InMemoryVectorStore>,
        embedder: Arc<FakeEmbedder>,
        model: Arc<FakeLanguageModel>,
        handle: IndexHandle,
        pipeline: QueryPipeline,
    }

    async fn fixture(reply: &str) -> Fixture {
        fixture_with(FakeEmbedder::new(DIM), FakeLanguageModel::new(reply)).await
    }

    async fn fixture_with(embedder: FakeEmbedder, model: FakeLanguageModel) -> Fixture {
        let store = Arc::new(InMemoryVectorStore::new());
        let descriptor = IndexDescriptor::new("docs", DIM as u32, Metric::DotProduct).unwrap();
        store.create_index(&descriptor).await.unwrap();

        let embedder = Arc::new(embedder);
        let model = Arc::new(model);
        let pipeline = QueryPipeline::new(
            RetrievalEngine::new(embedder.clone(), store.clone(), Arc::new(NoopEventSink)),
            SynthesisEngine::new(model.clone(), Arc::new(NoopEventSink)),
        );

        Fixture {
            store,
            embedder,
            model,
            handle: IndexHandle::new(descriptor),
            pipeline,
        }
    }

    fn record(id: &str, values: Vec<f32>, text: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values,
            metadata: RecordMetadata {
                source_id: "doc".to_string(),
                chunk_text: text.to_string(),
                location: ChunkLocation::default(),
            },
        }
    }

    #[tokio::test]
    async fn test_no_matches_skips_language_model() {
        let f = fixture("unused").await;

        let result = f.pipeline.answer(&f.handle, "What is X?").await.unwrap();
        assert_eq!(result, AnswerResult::NoMatches);
        assert!(f.model.calls().is_empty());
        assert_eq!(f.embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_single_match_is_the_whole_context() {
        let f = fixture("X is a letter.").await;
        let values = f.embedder.vector_for("X is a letter.");
        f.store
            .upsert(&f.handle, vec![record("doc_0", values, "X is a letter.")])
            .await
            .unwrap();

        let result = f.pipeline.answer(&f.handle, "What is X?").await.unwrap();
        assert_eq!(result, AnswerResult::Answer("X is a letter.".to_string()));
        assert_eq!(
            f.model.calls(),
            vec![("X is a letter.".to_string(), "What is X?".to_string())]
        );
    }

    #[tokio::test]
    async fn test_context_joins_matches_in_rank_order() {
        let f = fixture("answer").await;
        // Dot product against any query vector with positive entries
        // ranks larger vectors first
        f.store
            .upsert(
                &f.handle,
                vec![
                    record("low", vec![0.1; DIM], "third"),
                    record("high", vec![10.0; DIM], "first"),
                    record("mid", vec![1.0; DIM], "second"),
                ],
            )
            .await
            .unwrap();

        f.pipeline.answer(&f.handle, "order?").await.unwrap();
        assert_eq!(f.model.calls()[0].0, "first second third");
    }

    #[tokio::test]
    async fn test_synthesis_failure_is_an_error_not_no_matches() {
        let f = fixture_with(FakeEmbedder::new(DIM), FakeLanguageModel::failing()).await;
        f.store
            .upsert(&f.handle, vec![record("doc_0", vec![1.0; DIM], "X is a letter.")])
            .await
            .unwrap();

        let err = f.pipeline.answer(&f.handle, "What is X?").await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::Synthesis(SynthesisError::ContextTooLarge(_))
        ));
        assert_eq!(f.model.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_skips_language_model() {
        let embedder = FakeEmbedder::new(DIM).failing_on("X");
        let f = fixture_with(embedder, FakeLanguageModel::new("unused")).await;
        f.store
            .upsert(&f.handle, vec![record("doc_0", vec![1.0; DIM], "X is a letter.")])
            .await
            .unwrap();

        let err = f.pipeline.answer(&f.handle, "What is X?").await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::Retrieval(RetrievalError::Embedding(_))
        ));
        assert!(f.model.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected_before_any_call() {
        let f = fixture("unused").await;

        let err = f.pipeline.answer(&f.handle, "   ").await.unwrap_err();
        assert!(matches!(err, QueryError::EmptyQuestion));
        assert_eq!(f.embedder.calls(), 0);
        assert!(f.model.calls().is_empty());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(QueryStage::Synthesizing.to_string(), "synthesizing");
        assert_eq!(QueryStage::Idle.to_string(), "idle");
    }
}
