use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::get_formatter;
use crate::error::VectorStoreError;
use crate::models::{Config, OutputFormat};
use crate::services::{
    OpenAiChatModel, OpenAiEmbeddingClient, QueryPipeline, RetrievalEngine, SynthesisEngine,
    TracingEventSink, create_backend,
};

#[derive(Debug, Args)]
pub struct AskArgs {
    #[arg(help = "Question to answer")]
    pub question: String,

    #[arg(long, short = 'k', help = "Number of chunks to retrieve")]
    pub top_k: Option<u32>,
}

pub async fn handle_ask(args: AskArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    let store = create_backend(&config.vector_store)
        .await
        .context("failed to connect to vector store")?;

    let handle = match store.index_handle(&config.index.name).await {
        Ok(handle) => handle,
        Err(VectorStoreError::IndexNotFound(name))
            if !config.vector_store.driver.is_persistent() =>
        {
            anyhow::bail!(
                "index '{}' does not exist; the {} driver keeps nothing between commands, \
                 configure qdrant or postgresql to ask after `docqa ingest`",
                name,
                config.vector_store.driver
            )
        }
        Err(VectorStoreError::IndexNotFound(name)) => {
            anyhow::bail!("index '{}' does not exist; run `docqa ingest` first", name)
        }
        Err(e) => return Err(e).context("failed to open index"),
    };

    let events = Arc::new(TracingEventSink);
    let embedder = Arc::new(
        OpenAiEmbeddingClient::new(&config.embedding)
            .context("failed to create embedding client")?,
    );
    let model = Arc::new(
        OpenAiChatModel::new(&config.language_model)
            .context("failed to create language model client")?,
    );

    let retrieval = RetrievalEngine::new(embedder, store, events.clone())
        .with_top_k(args.top_k.unwrap_or(config.query.top_k));
    let pipeline = QueryPipeline::new(retrieval, SynthesisEngine::new(model, events));

    let answer = pipeline.answer(&handle, &args.question).await?;
    print!("{}", formatter.format_answer(&args.question, &answer));

    Ok(())
}
