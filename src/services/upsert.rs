//! Fixed-size batch writes with retry.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::events::{EventSink, PipelineEvent};
use super::vector_store::VectorStore;
use crate::error::{UpsertError, VectorDimensionMismatch};
use crate::models::{IngestionConfig, IndexHandle, VectorRecord};
use crate::utils::{RetryConfig, RetryResult, with_retry};

/// What a successful upsert wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub batches: usize,
    pub records: u64,
}

/// Writes records in windows of `batch_size`, strictly in order.
pub struct BatchUpserter {
    store: Arc<dyn VectorStore>,
    events: Arc<dyn EventSink>,
    batch_size: usize,
    retry: RetryConfig,
}

impl BatchUpserter {
    pub fn new(
        store: Arc<dyn VectorStore>,
        events: Arc<dyn EventSink>,
        batch_size: usize,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            events,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    pub fn from_config(
        store: Arc<dyn VectorStore>,
        events: Arc<dyn EventSink>,
        config: &IngestionConfig,
    ) -> Self {
        let retry = RetryConfig::new(config.upsert_max_attempts)
            .with_initial_delay(Duration::from_millis(config.upsert_initial_backoff_ms));
        Self::new(store, events, config.upsert_batch_size, retry)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Write `records` to the index in `ceil(len / batch_size)` calls.
    ///
    /// Every record is checked against the index dimension before anything
    /// is written. Batches already written stay written when a later batch
    /// fails. Cancellation is observed between batches only.
    pub async fn upsert(
        &self,
        handle: &IndexHandle,
        records: Vec<VectorRecord>,
        cancel: &CancellationToken,
    ) -> Result<UpsertSummary, UpsertError> {
        for record in &records {
            VectorDimensionMismatch::check(&record.id, &record.values, handle.dimension())?;
        }

        let mut summary = UpsertSummary::default();

        for (batch_index, batch) in records.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(UpsertError::Cancelled {
                    records_written: summary.records,
                });
            }

            let result = with_retry(&self.retry, "upsert batch", || {
                self.store.upsert(handle, batch.to_vec())
            })
            .await;

            match result {
                RetryResult::Success { attempts, .. } => {
                    summary.batches += 1;
                    summary.records += batch.len() as u64;
                    self.events.emit(PipelineEvent::BatchUpserted {
                        index: handle.name().to_string(),
                        batch_index,
                        records: batch.len(),
                        attempts,
                    });
                }
                RetryResult::Failed {
                    last_error,
                    attempts,
                } => {
                    return Err(UpsertError::BatchFailed {
                        batch_index,
                        record_ids: batch.iter().map(|r| r.id.clone()).collect(),
                        attempts,
                        records_written: summary.records,
                        source: last_error,
                    });
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::VectorStoreError;
    use crate::models::{
        ChunkLocation, IndexDescriptor, IndexStatus, Metric, QueryMatch, QueryRequest,
        RecordMetadata, VectorDriver,
    };
    use crate::services::events::{NoopEventSink, RecordingEventSink};

    /// Counts upsert calls and fails the ones listed in `failures`
    /// (call number, 1-based).
    #[derive(Default)]
    struct CountingStore {
        calls: Mutex<Vec<usize>>,
        failures: Vec<usize>,
        permanent: bool,
    }

    impl CountingStore {
        fn failing(failures: Vec<usize>, permanent: bool) -> Self {
            Self {
                failures,
                permanent,
                ..Default::default()
            }
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VectorStore for CountingStore {
        async fn health_check(&self) -> Result<bool, VectorStoreError> {
            Ok(true)
        }

        async fn list_index_names(&self) -> Result<HashSet<String>, VectorStoreError> {
            Ok(HashSet::new())
        }

        async fn describe_index(
            &self,
            _name: &str,
        ) -> Result<Option<IndexStatus>, VectorStoreError> {
            Ok(None)
        }

        async fn create_index(&self, _: &IndexDescriptor) -> Result<(), VectorStoreError> {
            Ok(())
        }

        async fn upsert(
            &self,
            _handle: &IndexHandle,
            records: Vec<VectorRecord>,
        ) -> Result<(), VectorStoreError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(records.len());
                calls.len()
            };
            if self.failures.contains(&call) {
                return Err(if self.permanent {
                    VectorStoreError::Rejected("bad batch".to_string())
                } else {
                    VectorStoreError::UpsertError("transient".to_string())
                });
            }
            Ok(())
        }

        async fn query(
            &self,
            _: &IndexHandle,
            _: QueryRequest,
        ) -> Result<Vec<QueryMatch>, VectorStoreError> {
            Ok(Vec::new())
        }

        async fn count(&self, _: &IndexHandle) -> Result<u64, VectorStoreError> {
            Ok(0)
        }

        fn driver(&self) -> VectorDriver {
            VectorDriver::Memory
        }
    }

    fn handle() -> IndexHandle {
        IndexHandle::new(IndexDescriptor::new("docs", 2, Metric::Cosine).unwrap())
    }

    fn records(n: usize) -> Vec<VectorRecord> {
        (0..n)
            .map(|i| VectorRecord {
                id: format!("doc_{}", i),
                values: vec![1.0, 0.0],
                metadata: RecordMetadata {
                    source_id: "doc".to_string(),
                    chunk_text: format!("chunk {}", i),
                    location: ChunkLocation::default(),
                },
            })
            .collect()
    }

    fn fast_retry(attempts: u32) -> RetryConfig {
        RetryConfig::new(attempts).with_initial_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_writes_ceil_n_over_b_batches() {
        for (n, b, expected) in [(0, 100, 0), (1, 100, 1), (100, 100, 1), (101, 100, 2), (250, 100, 3)]
        {
            let store = Arc::new(CountingStore::default());
            let upserter =
                BatchUpserter::new(store.clone(), Arc::new(NoopEventSink), b, fast_retry(3));

            let summary = upserter
                .upsert(&handle(), records(n), &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(store.batch_sizes().len(), expected, "n={} b={}", n, b);
            assert_eq!(summary.batches, expected);
            assert_eq!(summary.records, n as u64);
            assert!(store.batch_sizes().iter().all(|&size| size <= b));
        }
    }

    #[tokio::test]
    async fn test_batches_keep_record_order() {
        let store = Arc::new(CountingStore::default());
        let upserter = BatchUpserter::new(store.clone(), Arc::new(NoopEventSink), 2, fast_retry(1));
        upserter
            .upsert(&handle(), records(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(store.batch_sizes(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_writes_nothing() {
        let store = Arc::new(CountingStore::default());
        let upserter = BatchUpserter::new(store.clone(), Arc::new(NoopEventSink), 2, fast_retry(3));

        let mut batch = records(3);
        batch[2].values = vec![1.0, 0.0, 0.0];

        let err = upserter
            .upsert(&handle(), batch, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UpsertError::DimensionMismatch(VectorDimensionMismatch {
                expected: 2,
                actual: 3,
                ..
            })
        ));
        assert!(store.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let store = Arc::new(CountingStore::failing(vec![2], false));
        let events = Arc::new(RecordingEventSink::new());
        let upserter = BatchUpserter::new(store.clone(), events.clone(), 2, fast_retry(3));

        let summary = upserter
            .upsert(&handle(), records(4), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.batches, 2);
        assert_eq!(store.batch_sizes().len(), 3);

        let attempts: Vec<u32> = events
            .events()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::BatchUpserted { attempts, .. } => Some(attempts),
                _ => None,
            })
            .collect();
        assert_eq!(attempts, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_the_batch() {
        let store = Arc::new(CountingStore::failing(vec![2, 3, 4], false));
        let upserter = BatchUpserter::new(store.clone(), Arc::new(NoopEventSink), 2, fast_retry(3));

        let err = upserter
            .upsert(&handle(), records(6), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            UpsertError::BatchFailed {
                batch_index,
                record_ids,
                attempts,
                records_written,
                ..
            } => {
                assert_eq!(batch_index, 1);
                assert_eq!(record_ids, vec!["doc_2", "doc_3"]);
                assert_eq!(attempts, 3);
                assert_eq!(records_written, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The third batch is never attempted
        assert_eq!(store.batch_sizes().len(), 4);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let store = Arc::new(CountingStore::failing(vec![1], true));
        let upserter = BatchUpserter::new(store.clone(), Arc::new(NoopEventSink), 2, fast_retry(3));

        let err = upserter
            .upsert(&handle(), records(2), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UpsertError::BatchFailed { attempts: 1, .. }));
        assert_eq!(store.batch_sizes().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_batch() {
        let store = Arc::new(CountingStore::default());
        let upserter = BatchUpserter::new(store.clone(), Arc::new(NoopEventSink), 2, fast_retry(3));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = upserter
            .upsert(&handle(), records(4), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, UpsertError::Cancelled { records_written: 0 }));
        assert!(store.batch_sizes().is_empty());
    }
}
