//! Query-side models: match results and answers.

use serde::{Deserialize, Serialize};

use super::document::RecordMetadata;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Nearest-neighbour request sent to a vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    pub top_k: u32,
    pub include_metadata: bool,
    pub include_values: bool,
}

impl QueryRequest {
    pub fn new(vector: Vec<f32>, top_k: u32) -> Self {
        Self {
            vector,
            top_k,
            include_metadata: true,
            include_values: true,
        }
    }
}

/// A single nearest-neighbour hit, in provider ranking order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Option<RecordMetadata>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub values: Option<Vec<f32>>,
}

impl QueryMatch {
    /// Stored chunk text, or an empty string when metadata was not returned.
    pub fn chunk_text(&self) -> &str {
        self.metadata
            .as_ref()
            .map(|m| m.chunk_text.as_str())
            .unwrap_or("")
    }
}

/// Outcome of answering a question.
///
/// `NoMatches` means retrieval found nothing and the language model was never
/// asked; it is never represented as an empty answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "answer", rename_all = "snake_case")]
pub enum AnswerResult {
    Answer(String),
    NoMatches,
}

impl AnswerResult {
    pub fn is_no_matches(&self) -> bool {
        matches!(self, AnswerResult::NoMatches)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            AnswerResult::Answer(text) => Some(text),
            AnswerResult::NoMatches => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkLocation;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "md".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_chunk_text_without_metadata() {
        let m = QueryMatch {
            id: "a_0".to_string(),
            score: 0.9,
            metadata: None,
            values: None,
        };
        assert_eq!(m.chunk_text(), "");

        let m = QueryMatch {
            metadata: Some(RecordMetadata {
                source_id: "a".to_string(),
                chunk_text: "hello".to_string(),
                location: ChunkLocation::default(),
            }),
            ..m
        };
        assert_eq!(m.chunk_text(), "hello");
    }

    #[test]
    fn test_no_matches_distinct_from_empty_answer() {
        let empty = AnswerResult::Answer(String::new());
        assert!(!empty.is_no_matches());
        assert_eq!(empty.text(), Some(""));
        assert!(AnswerResult::NoMatches.is_no_matches());
        assert_eq!(AnswerResult::NoMatches.text(), None);

        let json = serde_json::to_value(AnswerResult::NoMatches).unwrap();
        assert_eq!(json["status"], "no_matches");
    }
}
