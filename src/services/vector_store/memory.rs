//! In-process vector store using exact (brute-force) search.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use super::VectorStore;
use crate::error::VectorStoreError;
use crate::models::{
    IndexDescriptor, IndexHandle, IndexStatus, Metric, QueryMatch, QueryRequest, VectorDriver,
    VectorRecord,
};

#[derive(Debug)]
struct MemoryIndex {
    descriptor: IndexDescriptor,
    records: BTreeMap<String, VectorRecord>,
}

/// Vector store held entirely in memory. Indexes are ready as soon as they
/// are created; contents are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids currently stored in `index`, sorted.
    pub fn record_ids(&self, index: &str) -> Vec<String> {
        self.indexes
            .read()
            .ok()
            .and_then(|indexes| {
                indexes
                    .get(index)
                    .map(|idx| idx.records.keys().cloned().collect())
            })
            .unwrap_or_default()
    }

    pub fn get(&self, index: &str, id: &str) -> Option<VectorRecord> {
        self.indexes
            .read()
            .ok()?
            .get(index)?
            .records
            .get(id)
            .cloned()
    }
}

fn poisoned() -> VectorStoreError {
    VectorStoreError::IndexOperation("memory store lock poisoned".to_string())
}

/// Similarity where larger is better, for every metric.
fn similarity(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match metric {
        Metric::DotProduct => dot,
        Metric::Cosine => {
            let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                0.0
            } else {
                dot / (norm_a * norm_b)
            }
        }
        Metric::Euclidean => {
            let dist = a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt();
            1.0 / (1.0 + dist)
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn list_index_names(&self) -> Result<HashSet<String>, VectorStoreError> {
        let indexes = self.indexes.read().map_err(|_| poisoned())?;
        Ok(indexes.keys().cloned().collect())
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexStatus>, VectorStoreError> {
        let indexes = self.indexes.read().map_err(|_| poisoned())?;
        Ok(indexes.get(name).map(|idx| IndexStatus {
            dimension: idx.descriptor.dimension,
            metric: idx.descriptor.metric,
            ready: true,
        }))
    }

    async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<(), VectorStoreError> {
        let mut indexes = self.indexes.write().map_err(|_| poisoned())?;
        indexes
            .entry(descriptor.name.clone())
            .or_insert_with(|| MemoryIndex {
                descriptor: descriptor.clone(),
                records: BTreeMap::new(),
            });
        Ok(())
    }

    async fn upsert(
        &self,
        handle: &IndexHandle,
        records: Vec<VectorRecord>,
    ) -> Result<(), VectorStoreError> {
        let mut indexes = self.indexes.write().map_err(|_| poisoned())?;
        let index = indexes
            .get_mut(handle.name())
            .ok_or_else(|| VectorStoreError::IndexNotFound(handle.name().to_string()))?;

        let dimension = index.descriptor.dimension as usize;
        if let Some(bad) = records.iter().find(|r| r.values.len() != dimension) {
            return Err(VectorStoreError::Rejected(format!(
                "record '{}' has dimension {}, index expects {}",
                bad.id,
                bad.values.len(),
                dimension
            )));
        }

        for record in records {
            index.records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query(
        &self,
        handle: &IndexHandle,
        request: QueryRequest,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let indexes = self.indexes.read().map_err(|_| poisoned())?;
        let index = indexes
            .get(handle.name())
            .ok_or_else(|| VectorStoreError::IndexNotFound(handle.name().to_string()))?;

        if request.vector.len() != index.descriptor.dimension as usize {
            return Err(VectorStoreError::Rejected(format!(
                "query vector has dimension {}, index expects {}",
                request.vector.len(),
                index.descriptor.dimension
            )));
        }

        let metric = index.descriptor.metric;
        let mut scored: Vec<(f32, &VectorRecord)> = index
            .records
            .values()
            .map(|record| (similarity(metric, &request.vector, &record.values), record))
            .collect();

        // Ties resolve by id so results are stable
        scored.sort_by(|(sa, ra), (sb, rb)| sb.total_cmp(sa).then_with(|| ra.id.cmp(&rb.id)));
        scored.truncate(request.top_k as usize);

        Ok(scored
            .into_iter()
            .map(|(score, record)| QueryMatch {
                id: record.id.clone(),
                score,
                metadata: request.include_metadata.then(|| record.metadata.clone()),
                values: request.include_values.then(|| record.values.clone()),
            })
            .collect())
    }

    async fn count(&self, handle: &IndexHandle) -> Result<u64, VectorStoreError> {
        let indexes = self.indexes.read().map_err(|_| poisoned())?;
        indexes
            .get(handle.name())
            .map(|idx| idx.records.len() as u64)
            .ok_or_else(|| VectorStoreError::IndexNotFound(handle.name().to_string()))
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkLocation, RecordMetadata};

    fn record(id: &str, values: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values,
            metadata: RecordMetadata {
                source_id: "doc".to_string(),
                chunk_text: format!("text of {}", id),
                location: ChunkLocation::default(),
            },
        }
    }

    async fn store_with_index(metric: Metric) -> (InMemoryVectorStore, IndexHandle) {
        let store = InMemoryVectorStore::new();
        let descriptor = IndexDescriptor::new("docs", 2, metric).unwrap();
        store.create_index(&descriptor).await.unwrap();
        (store, IndexHandle::new(descriptor))
    }

    #[tokio::test]
    async fn test_create_index_is_not_destructive() {
        let (store, handle) = store_with_index(Metric::Cosine).await;
        store
            .upsert(&handle, vec![record("a", vec![1.0, 0.0])])
            .await
            .unwrap();

        store.create_index(handle.descriptor()).await.unwrap();
        assert_eq!(store.count(&handle).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let (store, handle) = store_with_index(Metric::Cosine).await;
        store
            .upsert(&handle, vec![record("a", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert(&handle, vec![record("a", vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(store.count(&handle).await.unwrap(), 1);
        assert_eq!(store.get("docs", "a").unwrap().values, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let (store, handle) = store_with_index(Metric::Cosine).await;
        let err = store
            .upsert(&handle, vec![record("a", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Rejected(_)));
        assert_eq!(store.count(&handle).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let (store, handle) = store_with_index(Metric::Cosine).await;
        store
            .upsert(
                &handle,
                vec![
                    record("far", vec![0.0, 1.0]),
                    record("near", vec![1.0, 0.1]),
                    record("mid", vec![1.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let matches = store
            .query(&handle, QueryRequest::new(vec![1.0, 0.0], 2))
            .await
            .unwrap();

        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(matches[0].score >= matches[1].score);
        assert_eq!(matches[0].chunk_text(), "text of near");
        assert_eq!(matches[0].values.as_deref(), Some(&[1.0, 0.1][..]));
    }

    #[tokio::test]
    async fn test_query_empty_index() {
        let (store, handle) = store_with_index(Metric::Euclidean).await;
        let matches = store
            .query(&handle, QueryRequest::new(vec![1.0, 0.0], 10))
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_query_respects_include_flags() {
        let (store, handle) = store_with_index(Metric::DotProduct).await;
        store
            .upsert(&handle, vec![record("a", vec![1.0, 2.0])])
            .await
            .unwrap();

        let request = QueryRequest {
            include_metadata: false,
            include_values: false,
            ..QueryRequest::new(vec![1.0, 1.0], 5)
        };
        let matches = store.query(&handle, request).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, 3.0);
        assert!(matches[0].metadata.is_none());
        assert!(matches[0].values.is_none());
    }

    #[test]
    fn test_similarity_metrics() {
        assert_eq!(similarity(Metric::Cosine, &[1.0, 0.0], &[2.0, 0.0]), 1.0);
        assert_eq!(similarity(Metric::Cosine, &[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(similarity(Metric::DotProduct, &[1.0, 2.0], &[3.0, 4.0]), 11.0);
        assert_eq!(similarity(Metric::Euclidean, &[1.0, 1.0], &[1.0, 1.0]), 1.0);
        assert!(similarity(Metric::Euclidean, &[0.0, 0.0], &[3.0, 4.0]) < 0.2);
    }
}
