//! Index provisioning.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use super::events::{EventSink, PipelineEvent};
use super::vector_store::VectorStore;
use crate::error::IndexError;
use crate::models::{IndexConfig, IndexDescriptor, IndexHandle};

/// Makes sure an index exists and is ready before anything is written.
pub struct VectorIndexManager {
    store: Arc<dyn VectorStore>,
    events: Arc<dyn EventSink>,
    provisioning_timeout: Duration,
    poll_interval: Duration,
}

impl VectorIndexManager {
    pub fn new(
        store: Arc<dyn VectorStore>,
        events: Arc<dyn EventSink>,
        provisioning_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            events,
            provisioning_timeout,
            poll_interval,
        }
    }

    pub fn from_config(
        store: Arc<dyn VectorStore>,
        events: Arc<dyn EventSink>,
        config: &IndexConfig,
    ) -> Self {
        Self::new(
            store,
            events,
            config.provisioning_timeout(),
            config.poll_interval(),
        )
    }

    /// Create the index when absent and wait until it is ready.
    ///
    /// An existing index must match the descriptor's dimension and metric and
    /// is used as is, without polling.
    /// Calling this repeatedly with the same descriptor is harmless.
    pub async fn ensure_index(
        &self,
        descriptor: &IndexDescriptor,
    ) -> Result<IndexHandle, IndexError> {
        let names = self.store.list_index_names().await?;
        let exists = names.contains(&descriptor.name);

        self.events.emit(PipelineEvent::IndexChecked {
            name: descriptor.name.clone(),
            exists,
        });

        if exists {
            if let Some(status) = self.store.describe_index(&descriptor.name).await?
                && (status.dimension != descriptor.dimension || status.metric != descriptor.metric)
            {
                return Err(IndexError::DescriptorMismatch {
                    name: descriptor.name.clone(),
                    expected_dimension: descriptor.dimension,
                    expected_metric: descriptor.metric,
                    actual_dimension: status.dimension,
                    actual_metric: status.metric,
                });
            }
            // Readiness is only awaited for indexes created here
            return Ok(IndexHandle::new(descriptor.clone()));
        }

        self.store.create_index(descriptor).await?;
        self.events.emit(PipelineEvent::IndexCreated {
            name: descriptor.name.clone(),
            dimension: descriptor.dimension,
            metric: descriptor.metric,
        });

        self.wait_until_ready(descriptor).await?;
        Ok(IndexHandle::new(descriptor.clone()))
    }

    async fn wait_until_ready(&self, descriptor: &IndexDescriptor) -> Result<(), IndexError> {
        let started = Instant::now();

        loop {
            let ready = self
                .store
                .describe_index(&descriptor.name)
                .await?
                .is_some_and(|status| status.ready);
            if ready {
                tracing::debug!(
                    index = %descriptor.name,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "index ready"
                );
                return Ok(());
            }

            let waited = started.elapsed();
            if waited + self.poll_interval > self.provisioning_timeout {
                return Err(IndexError::ProvisioningTimeout {
                    name: descriptor.name.clone(),
                    waited,
                });
            }

            sleep(self.poll_interval).await;
        }
    }
}
