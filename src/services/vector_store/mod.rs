//! Vector store abstraction layer.
//!
//! This module provides a trait-based abstraction over different vector store backends
//! (Qdrant, PostgreSQL/pgvector, in-process memory) allowing seamless switching based on
//! configuration. Pipelines only ever see [`VectorStore`] and [`IndexHandle`].

mod memory;
mod pgvector;
mod qdrant;

pub use memory::InMemoryVectorStore;
pub use pgvector::PgVectorBackend;
pub use qdrant::QdrantBackend;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{
    IndexDescriptor, IndexHandle, IndexStatus, QueryMatch, QueryRequest, VectorDriver,
    VectorRecord, VectorStoreConfig,
};

/// Abstract trait for vector store operations.
///
/// All vector store backends must implement this trait to enable
/// backend-agnostic vector operations throughout the application.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the vector store is healthy and accessible.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Names of every index the store knows about.
    async fn list_index_names(&self) -> Result<HashSet<String>, VectorStoreError>;

    /// Dimension, metric and readiness of an index, or `None` if absent.
    async fn describe_index(&self, name: &str) -> Result<Option<IndexStatus>, VectorStoreError>;

    /// Create an index. Callers check existence first.
    async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<(), VectorStoreError>;

    /// Resolve a handle for an existing index.
    async fn index_handle(&self, name: &str) -> Result<IndexHandle, VectorStoreError> {
        let status = self
            .describe_index(name)
            .await?
            .ok_or_else(|| VectorStoreError::IndexNotFound(name.to_string()))?;

        let descriptor = IndexDescriptor::new(name, status.dimension, status.metric)
            .map_err(|e| VectorStoreError::IndexOperation(e.to_string()))?;
        Ok(IndexHandle::new(descriptor))
    }

    /// Insert or overwrite records by id.
    async fn upsert(
        &self,
        handle: &IndexHandle,
        records: Vec<VectorRecord>,
    ) -> Result<(), VectorStoreError>;

    /// Nearest neighbours of `request.vector`, best match first.
    async fn query(
        &self,
        handle: &IndexHandle,
        request: QueryRequest,
    ) -> Result<Vec<QueryMatch>, VectorStoreError>;

    /// Number of records stored in the index.
    async fn count(&self, handle: &IndexHandle) -> Result<u64, VectorStoreError>;

    fn driver(&self) -> VectorDriver;
}

/// Create a vector store backend based on configuration.
///
/// This is the main factory function that returns the appropriate backend
/// implementation based on the configuration.
pub async fn create_backend(
    config: &VectorStoreConfig,
) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        VectorDriver::Qdrant => {
            let backend = QdrantBackend::new(config)?;
            Ok(Arc::new(backend))
        }
        VectorDriver::PostgreSQL => {
            let backend = PgVectorBackend::new(config).await?;
            Ok(Arc::new(backend))
        }
        VectorDriver::Memory => {
            tracing::warn!("memory vector store: vectors are dropped when this process exits");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
    }
}
