//! Structured pipeline events.
//!
//! Pipelines report progress through an [`EventSink`] instead of printing.
//! Events are informational only; no pipeline behaviour depends on them.

use std::sync::Mutex;

use crate::models::Metric;

/// A notable step taken by an ingestion or query pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    IndexChecked {
        name: String,
        exists: bool,
    },
    IndexCreated {
        name: String,
        dimension: u32,
        metric: Metric,
    },
    ChunkCountComputed {
        source_id: String,
        chunks: usize,
    },
    BatchUpserted {
        index: String,
        batch_index: usize,
        records: usize,
        attempts: u32,
    },
    DocumentProcessed {
        source_id: String,
        chunks_written: u64,
        success: bool,
    },
    QueryMatched {
        index: String,
        matches: usize,
    },
    AnswerSynthesized {
        context_chars: usize,
        answer_chars: usize,
    },
}

/// Receiver of pipeline events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: PipelineEvent) {}
}

/// Renders events as `tracing` records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::IndexChecked { name, exists } => {
                tracing::info!(index = %name, exists, "index checked");
            }
            PipelineEvent::IndexCreated {
                name,
                dimension,
                metric,
            } => {
                tracing::info!(index = %name, dimension, metric = %metric, "index created");
            }
            PipelineEvent::ChunkCountComputed { source_id, chunks } => {
                tracing::debug!(source = %source_id, chunks, "text split into chunks");
            }
            PipelineEvent::BatchUpserted {
                index,
                batch_index,
                records,
                attempts,
            } => {
                tracing::debug!(index = %index, batch_index, records, attempts, "batch upserted");
            }
            PipelineEvent::DocumentProcessed {
                source_id,
                chunks_written,
                success,
            } => {
                if success {
                    tracing::info!(source = %source_id, chunks_written, "document processed");
                } else {
                    tracing::warn!(source = %source_id, chunks_written, "document failed");
                }
            }
            PipelineEvent::QueryMatched { index, matches } => {
                tracing::info!(index = %index, matches, "query matched");
            }
            PipelineEvent::AnswerSynthesized {
                context_chars,
                answer_chars,
            } => {
                tracing::info!(context_chars, answer_chars, "answer synthesized");
            }
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingEventSink::new();
        sink.emit(PipelineEvent::IndexChecked {
            name: "docs".to_string(),
            exists: false,
        });
        sink.emit(PipelineEvent::QueryMatched {
            index: "docs".to_string(),
            matches: 3,
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PipelineEvent::IndexChecked { exists: false, .. }));
        assert!(matches!(events[1], PipelineEvent::QueryMatched { matches: 3, .. }));
    }

    #[test]
    fn test_tracing_sink_accepts_all_events() {
        let sink = TracingEventSink;
        sink.emit(PipelineEvent::AnswerSynthesized {
            context_chars: 10,
            answer_chars: 2,
        });
        sink.emit(PipelineEvent::DocumentProcessed {
            source_id: "a".to_string(),
            chunks_written: 0,
            success: false,
        });
    }
}
