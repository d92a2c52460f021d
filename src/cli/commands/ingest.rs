use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::cli::output::get_formatter;
use crate::models::{Config, IngestionReport, OutputFormat};
use crate::services::{
    BatchUpserter, ChunkSplitter, EventSink, IngestionPipeline, OpenAiEmbeddingClient,
    PipelineEvent, TracingEventSink, VectorIndexManager, create_backend,
};
use crate::sources::{DirectoryLoader, DocumentLoader};

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[arg(
        long,
        short = 'd',
        help = "Documents directory (defaults to ingestion.documents_dir)"
    )]
    pub dir: Option<PathBuf>,
}

/// Advances a progress bar per processed document and forwards every event.
struct ProgressEventSink {
    bar: ProgressBar,
    inner: TracingEventSink,
}

impl EventSink for ProgressEventSink {
    fn emit(&self, event: PipelineEvent) {
        if let PipelineEvent::DocumentProcessed { source_id, .. } = &event {
            self.bar.set_message(source_id.clone());
            self.bar.inc(1);
        }
        self.bar.suspend(|| self.inner.emit(event));
    }
}

pub async fn handle_ingest(
    args: IngestArgs,
    config: &Config,
    format: OutputFormat,
    cancel: CancellationToken,
) -> Result<()> {
    let formatter = get_formatter(format);

    let mut ingestion = config.ingestion.clone();
    if let Some(dir) = args.dir {
        ingestion.documents_dir = dir;
    }

    let loader = DirectoryLoader::from_config(&ingestion);
    let documents = loader
        .load()
        .with_context(|| format!("failed to load documents from {}", loader.root().display()))?;

    if documents.is_empty() {
        println!(
            "{}",
            formatter.format_message(&format!(
                "No documents found in {}",
                loader.root().display()
            ))
        );
        return Ok(());
    }

    let descriptor = config.index_descriptor()?;
    let store = create_backend(&config.vector_store)
        .await
        .context("failed to connect to vector store")?;
    let embedder = Arc::new(
        OpenAiEmbeddingClient::new(&config.embedding)
            .context("failed to create embedding client")?,
    );

    let bar = ProgressBar::new(documents.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("invalid progress template")?
            .progress_chars("#>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let events: Arc<dyn EventSink> = Arc::new(ProgressEventSink {
        bar: bar.clone(),
        inner: TracingEventSink,
    });

    let pipeline = IngestionPipeline::new(
        ChunkSplitter::from_config(&ingestion)?,
        embedder,
        BatchUpserter::from_config(store.clone(), events.clone(), &ingestion),
        VectorIndexManager::from_config(store, events.clone(), &config.index),
        events,
    );

    let report = pipeline.run(&descriptor, documents, &cancel).await;
    bar.finish_and_clear();
    let report = report?;

    print!("{}", formatter.format_ingestion_report(&report));

    if !report.failed_sources().is_empty() && !report.cancelled {
        eprintln!("\nHint: re-run `docqa ingest` to retry the failed documents.");
    }
    check_outcome(&report)
}

/// A cancelled run or any failed document is an error for the caller.
fn check_outcome(report: &IngestionReport) -> Result<()> {
    if report.cancelled {
        anyhow::bail!("ingestion cancelled");
    }
    let failed = report.failed_sources();
    if !failed.is_empty() {
        anyhow::bail!("{} document(s) failed to index", failed.len());
    }
    Ok(())
}
