use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, VectorDriver};
use crate::services::create_backend;

pub async fn handle_status(config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    let mut status = StatusInfo {
        embedding_model: config.embedding.model.clone(),
        chat_model: config.language_model.model.clone(),
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_url: config.vector_store.url.clone(),
        vector_store_connected: false,
        index: config.index.name.clone(),
        index_exists: false,
        index_dimension: None,
        index_metric: None,
        index_ready: false,
        records: None,
    };

    match create_backend(&config.vector_store).await {
        Ok(store) => {
            status.vector_store_connected = store.health_check().await.unwrap_or(false);
            if status.vector_store_connected {
                if let Ok(Some(index)) = store.describe_index(&config.index.name).await {
                    status.index_exists = true;
                    status.index_dimension = Some(index.dimension);
                    status.index_metric = Some(index.metric);
                    status.index_ready = index.ready;
                }
                if status.index_exists
                    && let Ok(handle) = store.index_handle(&config.index.name).await
                {
                    status.records = store.count(&handle).await.ok();
                }
            }
        }
        Err(e) => tracing::debug!(error = %e, "vector store unavailable"),
    }

    print!("{}", formatter.format_status(&status));

    if !status.vector_store_connected {
        eprintln!();
        match config.vector_store.driver {
            VectorDriver::Qdrant => {
                eprintln!("Warning: Qdrant not running. Start with: docker compose up -d qdrant");
            }
            VectorDriver::PostgreSQL => {
                eprintln!("Warning: PostgreSQL not accessible. Check connection settings.");
            }
            VectorDriver::Memory => {}
        }
    } else if let Some(dimension) = status.index_dimension
        && dimension != config.index.dimension
    {
        eprintln!(
            "\nWarning: index dimension {} differs from configured {}.",
            dimension, config.index.dimension
        );
    }

    Ok(())
}
