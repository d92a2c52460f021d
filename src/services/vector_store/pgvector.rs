use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};

use super::VectorStore;
use crate::error::VectorStoreError;
use crate::models::{
    ChunkLocation, IndexDescriptor, IndexHandle, IndexStatus, Metric, QueryMatch, QueryRequest,
    RecordMetadata, VectorDriver, VectorRecord, VectorStoreConfig,
};

/// Registry of every index created through this backend.
const REGISTRY_TABLE: &str = "docqa_indexes";
const TABLE_PREFIX: &str = "docqa_idx_";
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL backend using the pgvector extension. Each index is a table
/// registered in `docqa_indexes` with its dimension and metric.
pub struct PgVectorBackend {
    pool: PgPool,
}

impl PgVectorBackend {
    pub async fn new(config: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(&config.url)
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        let backend = Self { pool };
        backend.check_pgvector_extension().await?;
        backend.ensure_registry().await?;

        Ok(backend)
    }

    async fn check_pgvector_extension(&self) -> Result<(), VectorStoreError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        if result.is_none() {
            return Err(VectorStoreError::PgVectorExtensionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }

    async fn ensure_registry(&self) -> Result<(), VectorStoreError> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL,
                metric TEXT NOT NULL
            )",
            REGISTRY_TABLE
        );
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;
        Ok(())
    }

    /// Table backing an index. Index names are limited to lowercase ASCII
    /// alphanumerics and `_`, so every name maps to its own table.
    pub fn table_name(index: &str) -> Result<String, VectorStoreError> {
        if index.is_empty()
            || !index
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(VectorStoreError::IndexOperation(format!(
                "index name '{}' must use only lowercase letters, digits and '_' with PostgreSQL",
                index
            )));
        }
        Ok(format!("{}{}", TABLE_PREFIX, index))
    }

    fn operator_class(metric: Metric) -> &'static str {
        match metric {
            Metric::Cosine => "vector_cosine_ops",
            Metric::DotProduct => "vector_ip_ops",
            Metric::Euclidean => "vector_l2_ops",
        }
    }

    /// Distance operator and the expression turning its result into a
    /// similarity where larger is better.
    fn score_expression(metric: Metric) -> (&'static str, &'static str) {
        match metric {
            Metric::Cosine => ("<=>", "1 - (embedding <=> $1)"),
            Metric::DotProduct => ("<#>", "-(embedding <#> $1)"),
            Metric::Euclidean => ("<->", "1 / (1 + (embedding <-> $1))"),
        }
    }

    fn map_write_error(index: &str, e: sqlx::Error) -> VectorStoreError {
        let msg = e.to_string();
        if msg.contains("does not exist") {
            VectorStoreError::IndexNotFound(index.to_string())
        } else if msg.contains("dimensions") {
            VectorStoreError::Rejected(msg)
        } else {
            VectorStoreError::UpsertError(msg)
        }
    }
}

#[async_trait]
impl VectorStore for PgVectorBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn list_index_names(&self) -> Result<HashSet<String>, VectorStoreError> {
        let query = format!("SELECT name FROM {}", REGISTRY_TABLE);
        let rows: Vec<(String,)> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexStatus>, VectorStoreError> {
        let query = format!(
            "SELECT dimension, metric FROM {} WHERE name = $1",
            REGISTRY_TABLE
        );
        let row: Option<(i32, String)> = sqlx::query_as(&query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        let Some((dimension, metric)) = row else {
            return Ok(None);
        };

        let metric: Metric = metric
            .parse()
            .map_err(|e: String| VectorStoreError::IndexOperation(e))?;

        // DDL is transactional, so a registered index is usable immediately
        Ok(Some(IndexStatus {
            dimension: dimension as u32,
            metric,
            ready: true,
        }))
    }

    async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<(), VectorStoreError> {
        let table = Self::table_name(&descriptor.name)?;

        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                chunk_text TEXT NOT NULL,
                location TEXT NOT NULL,
                embedding vector({}) NOT NULL
            )
            "#,
            table, descriptor.dimension
        );
        let create_index = format!(
            "CREATE INDEX IF NOT EXISTS {}_embedding_idx ON {} USING hnsw (embedding {})",
            table,
            table,
            Self::operator_class(descriptor.metric)
        );
        let register = format!(
            "INSERT INTO {} (name, dimension, metric) VALUES ($1, $2, $3) ON CONFLICT (name) DO NOTHING",
            REGISTRY_TABLE
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VectorStoreError::IndexOperation(e.to_string()))?;

        for statement in [&create_table, &create_index] {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| VectorStoreError::IndexOperation(e.to_string()))?;
        }

        sqlx::query(&register)
            .bind(&descriptor.name)
            .bind(descriptor.dimension as i32)
            .bind(descriptor.metric.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| VectorStoreError::IndexOperation(e.to_string()))?;

        tx.commit()
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

        let table = Self::table_name(handle.name())?;
        let query = format!(
            r#"
            INSERT INTO {} (id, source_id, chunk_text, location, embedding)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                source_id = EXCLUDED.source_id,
                chunk_text = EXCLUDED.chunk_text,
                location = EXCLUDED.location,
                embedding = EXCLUDED.embedding
            "#,
            table
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        for record in records {
            let location = serde_json::to_string(&record.metadata.location)
                .map_err(|e| VectorStoreError::Rejected(e.to_string()))?;
            let embedding = Vector::from(record.values);

            sqlx::query(&query)
                .bind(&record.id)
                .bind(&record.metadata.source_id)
                .bind(&record.metadata.chunk_text)
                .bind(&location)
                .bind(&embedding)
                .execute(&mut *tx)
                .await
                .map_err(|e| Self::map_write_error(handle.name(), e))?;
        }

        tx.commit()
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        Ok(())
    }

    async fn query(
        &self,
        handle: &IndexHandle,
        request: QueryRequest,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let table = Self::table_name(handle.name())?;
        let (operator, score) = Self::score_expression(handle.metric());

        let query = format!(
            r#"
            SELECT id, {} AS score, source_id, chunk_text, location, embedding
            FROM {}
            ORDER BY embedding {} $1, id
            LIMIT {}
            "#,
            score, table, operator, request.top_k
        );

        let rows = sqlx::query(&query)
            .bind(Vector::from(request.vector.clone()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::QueryError(e.to_string()))?;

        let matches = rows
            .into_iter()
            .map(|row: PgRow| {
                let score: f64 = row.get("score");
                let metadata = request.include_metadata.then(|| {
                    let location: String = row.get("location");
                    RecordMetadata {
                        source_id: row.get("source_id"),
                        chunk_text: row.get("chunk_text"),
                        location: serde_json::from_str::<ChunkLocation>(&location)
                            .unwrap_or_default(),
                    }
                });
                let values = request.include_values.then(|| {
                    let embedding: Vector = row.get("embedding");
                    embedding.to_vec()
                });

                QueryMatch {
                    id: row.get("id"),
                    score: score as f32,
                    metadata,
                    values,
                }
            })
            .collect();

        Ok(matches)
    }

    async fn count(&self, handle: &IndexHandle) -> Result<u64, VectorStoreError> {
        let table = Self::table_name(handle.name())?;
        let query = format!("SELECT COUNT(*) FROM {}", table);
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VectorStoreError::QueryError(e.to_string()))?;

        Ok(row.0 as u64)
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::PostgreSQL
    }
}
