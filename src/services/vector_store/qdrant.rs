//! Qdrant vector store backend implementation.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{
    CollectionStatus, CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct,
    ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use uuid::Uuid;

use super::VectorStore;
use crate::error::VectorStoreError;
use crate::models::{
    ChunkLocation, IndexDescriptor, IndexHandle, IndexStatus, Metric, QueryMatch, QueryRequest,
    RecordMetadata, VectorDriver, VectorRecord, VectorStoreConfig,
};

const RECORD_ID: &str = "record_id";
const SOURCE_ID: &str = "source_id";
const CHUNK_TEXT: &str = "chunk_text";
const LOCATION: &str = "location";

/// Qdrant vector store backend. One index maps to one collection.
pub struct QdrantBackend {
    client: Qdrant,
}

impl QdrantBackend {
    /// Create a new Qdrant backend from configuration.
    ///
    /// The API key falls back to `QDRANT_API_KEY` when not configured.
    pub fn new(config: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("QDRANT_API_KEY").ok());
        if let Some(api_key) = api_key {
            builder = builder.api_key(api_key);
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self { client })
    }

    /// Qdrant point ids must be UUIDs or integers, so record ids are hashed
    /// into a stable v5 UUID and kept verbatim in the payload.
    pub fn point_id(record_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string()
    }

    fn distance(metric: Metric) -> Distance {
        match metric {
            Metric::Cosine => Distance::Cosine,
            Metric::DotProduct => Distance::Dot,
            Metric::Euclidean => Distance::Euclid,
        }
    }

    fn metric(distance: i32) -> Result<Metric, VectorStoreError> {
        match Distance::try_from(distance) {
            Ok(Distance::Cosine) => Ok(Metric::Cosine),
            Ok(Distance::Dot) => Ok(Metric::DotProduct),
            Ok(Distance::Euclid) => Ok(Metric::Euclidean),
            _ => Err(VectorStoreError::IndexOperation(format!(
                "unsupported Qdrant distance: {}",
                distance
            ))),
        }
    }

    fn build_payload(record: VectorRecord) -> (String, Vec<f32>, HashMap<String, Value>) {
        let mut payload: HashMap<String, Value> = HashMap::new();
        let location =
            serde_json::to_string(&record.metadata.location).unwrap_or_else(|_| "{}".to_string());

        payload.insert(RECORD_ID.to_string(), record.id.clone().into());
        payload.insert(SOURCE_ID.to_string(), record.metadata.source_id.into());
        payload.insert(CHUNK_TEXT.to_string(), record.metadata.chunk_text.into());
        payload.insert(LOCATION.to_string(), location.into());

        (Self::point_id(&record.id), record.values, payload)
    }

    fn string_field(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
        payload.get(key).and_then(|v| match &v.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
    }

    #[allow(deprecated)]
    fn point_values(point: &ScoredPoint) -> Option<Vec<f32>> {
        match point.vectors.as_ref()?.vectors_options.as_ref()? {
            VectorsOptions::Vector(vector) => Some(vector.data.clone()),
            VectorsOptions::Vectors(_) => None,
        }
    }

    fn to_match(point: ScoredPoint, request: &QueryRequest) -> QueryMatch {
        let values = if request.include_values {
            Self::point_values(&point)
        } else {
            None
        };
        let payload = &point.payload;

        let id = Self::string_field(payload, RECORD_ID).unwrap_or_default();
        let metadata = request.include_metadata.then(|| RecordMetadata {
            source_id: Self::string_field(payload, SOURCE_ID).unwrap_or_default(),
            chunk_text: Self::string_field(payload, CHUNK_TEXT).unwrap_or_default(),
            location: Self::string_field(payload, LOCATION)
                .and_then(|loc| serde_json::from_str::<ChunkLocation>(&loc).ok())
                .unwrap_or_default(),
        });

        QueryMatch {
            id,
            score: point.score,
            metadata,
            values,
        }
    }

    /// Yellow and Grey collections serve reads and writes; only Red is unusable.
    fn is_ready(status: i32) -> bool {
        status == CollectionStatus::Green as i32
            || status == CollectionStatus::Yellow as i32
            || status == CollectionStatus::Grey as i32
    }

    fn is_not_found(message: &str) -> bool {
        let lower = message.to_lowercase();
        lower.contains("not found") || lower.contains("doesn't exist")
    }
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn list_index_names(&self) -> Result<HashSet<String>, VectorStoreError> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(response
            .collections
            .into_iter()
            .map(|collection| collection.name)
            .collect())
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexStatus>, VectorStoreError> {
        let info = match self.client.collection_info(name).await {
            Ok(response) => response.result,
            Err(e) => {
                let msg = e.to_string();
                if Self::is_not_found(&msg) {
                    return Ok(None);
                }
                return Err(VectorStoreError::IndexOperation(msg));
            }
        };

        let Some(info) = info else {
            return Ok(None);
        };

        let params = info
            .config
            .as_ref()
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|v| v.config.as_ref());

        let (dimension, metric) = match params {
            Some(VectorsConfigKind::Params(params)) => {
                (params.size as u32, Self::metric(params.distance)?)
            }
            _ => {
                return Err(VectorStoreError::IndexOperation(format!(
                    "collection '{}' does not use a single unnamed vector",
                    name
                )));
            }
        };

        Ok(Some(IndexStatus {
            dimension,
            metric,
            ready: Self::is_ready(info.status),
        }))
    }

    async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<(), VectorStoreError> {
        let create_collection = CreateCollectionBuilder::new(&descriptor.name).vectors_config(
            VectorParamsBuilder::new(
                u64::from(descriptor.dimension),
                Self::distance(descriptor.metric),
            ),
        );

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| VectorStoreError::IndexOperation(e.to_string()))?;

        Ok(())
    }

    async fn upsert(
        &self,
        handle: &IndexHandle,
        records: Vec<VectorRecord>,
    ) -> Result<(), VectorStoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| {
                let (id, values, payload) = Self::build_payload(record);
                PointStruct::new(id, values, payload)
            })
            .collect();

        let upsert = UpsertPointsBuilder::new(handle.name(), points).wait(true);

        self.client.upsert_points(upsert).await.map_err(|e| {
            let msg = e.to_string();
            if Self::is_not_found(&msg) {
                VectorStoreError::IndexNotFound(handle.name().to_string())
            } else if msg.to_lowercase().contains("dimension") {
                VectorStoreError::Rejected(msg)
            } else {
                VectorStoreError::UpsertError(msg)
            }
        })?;

        Ok(())
    }

    async fn query(
        &self,
        handle: &IndexHandle,
        request: QueryRequest,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let search = SearchPointsBuilder::new(
            handle.name(),
            request.vector.clone(),
            u64::from(request.top_k),
        )
        // Payload carries the record id, so it is always fetched
        .with_payload(true)
        .with_vectors(request.include_values);

        let response = self
            .client
            .search_points(search)
            .await
            .map_err(|e| VectorStoreError::QueryError(e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| Self::to_match(point, &request))
            .collect())
    }

    async fn count(&self, handle: &IndexHandle) -> Result<u64, VectorStoreError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(handle.name()).exact(true))
            .await
            .map_err(|e| VectorStoreError::QueryError(e.to_string()))?;

        Ok(response.result.map_or(0, |r| r.count))
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Qdrant
    }
}
