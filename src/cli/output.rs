use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{AnswerResult, DocumentOutcome, IngestionReport, Metric, OutputFormat};

pub trait Formatter {
    fn format_ingestion_report(&self, report: &IngestionReport) -> String;
    fn format_answer(&self, question: &str, answer: &AnswerResult) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_model: String,
    pub chat_model: String,
    pub vector_store_driver: String,
    pub vector_store_url: String,
    pub vector_store_connected: bool,
    pub index: String,
    pub index_exists: bool,
    pub index_dimension: Option<u32>,
    pub index_metric: Option<Metric>,
    pub index_ready: bool,
    pub records: Option<u64>,
}

const NO_MATCHES: &str = "No relevant content found in the index.";

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_ingestion_report(&self, report: &IngestionReport) -> String {
        let mut output = String::new();
        let title = if report.cancelled {
            "Ingestion Cancelled"
        } else {
            "Ingestion Complete"
        };
        writeln!(output, "{}", title).unwrap();
        writeln!(output, "{}", "-".repeat(title.len())).unwrap();
        writeln!(output, "Documents:     {}", report.total_documents).unwrap();
        writeln!(output, "Indexed:       {}", report.succeeded().count()).unwrap();
        writeln!(output, "Failed:        {}", report.failed_sources().len()).unwrap();
        if report.unprocessed() > 0 {
            writeln!(output, "Not processed: {}", report.unprocessed()).unwrap();
        }
        writeln!(output, "Chunks:        {}", report.chunks_written).unwrap();
        writeln!(output, "Duration:      {}ms", report.duration_ms()).unwrap();

        let failures: Vec<_> = report
            .documents
            .iter()
            .filter_map(|d| match &d.outcome {
                DocumentOutcome::Failed { error, .. } => Some((&d.source_id, error)),
                DocumentOutcome::Indexed { .. } => None,
            })
            .collect();
        if !failures.is_empty() {
            writeln!(output, "\nFailures:").unwrap();
            for (source, error) in failures {
                writeln!(output, "  {}: {}", source, error).unwrap();
            }
        }

        output
    }

    fn format_answer(&self, _question: &str, answer: &AnswerResult) -> String {
        match answer {
            AnswerResult::Answer(text) => format!("{}\n", text.trim_end()),
            AnswerResult::NoMatches => format!("{}\n", NO_MATCHES),
        }
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();
        writeln!(output, "Embedding:     {}", status.embedding_model).unwrap();
        writeln!(output, "Chat model:    {}", status.chat_model).unwrap();
        writeln!(output).unwrap();

        let vector_status = if status.vector_store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(
            output,
            "Vector Store:  {} ({})",
            status.vector_store_driver, vector_status
        )
        .unwrap();
        writeln!(output, "  URL:         {}", status.vector_store_url).unwrap();
        writeln!(output, "  Index:       {}", status.index).unwrap();

        if status.index_exists {
            if let (Some(dimension), Some(metric)) = (status.index_dimension, status.index_metric) {
                writeln!(output, "  Dimension:   {} ({})", dimension, metric).unwrap();
            }
            let ready = if status.index_ready { "yes" } else { "no" };
            writeln!(output, "  Ready:       {}", ready).unwrap();
            if let Some(records) = status.records {
                writeln!(output, "  Records:     {}", records).unwrap();
            }
        } else if status.vector_store_connected {
            writeln!(output, "  (index does not exist yet; run `docqa ingest`)").unwrap();
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_ingestion_report(&self, report: &IngestionReport) -> String {
        self.render(report)
    }

    fn format_answer(&self, question: &str, answer: &AnswerResult) -> String {
        self.render(&serde_json::json!({
            "question": question,
            "result": answer,
        }))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_ingestion_report(&self, report: &IngestionReport) -> String {
        let mut output = String::new();
        if report.cancelled {
            writeln!(output, "## Ingestion Cancelled\n").unwrap();
        } else {
            writeln!(output, "## Ingestion Complete\n").unwrap();
        }
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Documents | {} |", report.total_documents).unwrap();
        writeln!(output, "| Indexed | {} |", report.succeeded().count()).unwrap();
        writeln!(output, "| Failed | {} |", report.failed_sources().len()).unwrap();
        writeln!(output, "| Not processed | {} |", report.unprocessed()).unwrap();
        writeln!(output, "| Chunks | {} |", report.chunks_written).unwrap();
        writeln!(output, "| Duration | {}ms |", report.duration_ms()).unwrap();

        for doc in &report.documents {
            if let DocumentOutcome::Failed { error, .. } = &doc.outcome {
                writeln!(output, "\n- ❌ `{}`: {}", doc.source_id, error).unwrap();
            }
        }
        output
    }

    fn format_answer(&self, question: &str, answer: &AnswerResult) -> String {
        let mut output = String::new();
        writeln!(output, "## Answer\n").unwrap();
        writeln!(output, "**Question:** {}\n", question).unwrap();
        match answer {
            AnswerResult::Answer(text) => writeln!(output, "{}", text.trim_end()).unwrap(),
            AnswerResult::NoMatches => writeln!(output, "*{}*", NO_MATCHES).unwrap(),
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();
        writeln!(output, "- **Embedding:** {}", status.embedding_model).unwrap();
        writeln!(output, "- **Chat model:** {}\n", status.chat_model).unwrap();

        let vector_status = if status.vector_store_connected {
            "✅"
        } else {
            "❌"
        };
        writeln!(
            output,
            "### Vector Store ({}) {}\n",
            status.vector_store_driver, vector_status
        )
        .unwrap();
        writeln!(output, "- **URL:** `{}`", status.vector_store_url).unwrap();
        writeln!(output, "- **Index:** {}", status.index).unwrap();
        writeln!(output, "- **Exists:** {}", status.index_exists).unwrap();
        if let (Some(dimension), Some(metric)) = (status.index_dimension, status.index_metric) {
            writeln!(output, "- **Dimension:** {} ({})", dimension, metric).unwrap();
        }
        if let Some(records) = status.records {
            writeln!(output, "- **Records:** {}", records).unwrap();
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
