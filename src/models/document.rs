use serde::{Deserialize, Serialize};

/// A loaded source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source_id: String,
    pub text: String,
}

impl Document {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

/// Where a chunk sits inside its parent document.
///
/// Offsets count characters, lines are 1-based and inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLocation {
    pub start_offset: u64,
    pub end_offset: u64,
    pub line_start: u32,
    pub line_end: u32,
}

/// A bounded slice of one document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub parent_source_id: String,
    pub sequence_index: u32,
    pub text: String,
    pub location: ChunkLocation,
}

impl Chunk {
    pub fn record_id(&self) -> String {
        VectorRecord::generate_id(&self.parent_source_id, self.sequence_index)
    }
}

/// Metadata stored next to every vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub source_id: String,
    pub chunk_text: String,
    pub location: ChunkLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl VectorRecord {
    pub fn generate_id(source_id: &str, sequence_index: u32) -> String {
        format!("{}_{}", source_id, sequence_index)
    }

    /// Pair a chunk with its embedding. The chunk text is kept verbatim.
    pub fn from_chunk(chunk: Chunk, values: Vec<f32>) -> Self {
        Self {
            id: chunk.record_id(),
            values,
            metadata: RecordMetadata {
                source_id: chunk.parent_source_id,
                chunk_text: chunk.text,
                location: chunk.location,
            },
        }
    }
}
