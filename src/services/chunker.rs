//! Boundary-aware text chunking without overlap.

use std::ops::Range;

use crate::error::ConfigError;
use crate::models::{Chunk, ChunkLocation, Document, IngestionConfig};
use crate::utils::char_len;

/// Break points, coarsest first: paragraph, line, sentence, word.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "? ", "! ", " "];

/// Splits text into contiguous chunks of at most `max_chunk_size` characters.
///
/// Separators stay attached to the piece they terminate, so concatenating the
/// chunks of a document reproduces its text exactly. Output is deterministic
/// for a given input and size.
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    max_chunk_size: usize,
}

impl ChunkSplitter {
    pub fn new(max_chunk_size: usize) -> Result<Self, ConfigError> {
        if max_chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "max chunk size must be greater than 0".to_string(),
            ));
        }
        Ok(Self { max_chunk_size })
    }

    pub fn from_config(config: &IngestionConfig) -> Result<Self, ConfigError> {
        Self::new(config.max_chunk_size)
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn split_document(&self, document: &Document) -> Vec<Chunk> {
        self.split(&document.source_id, &document.text)
    }

    /// Split `text` into chunks owned by `source_id`, numbered from 0.
    pub fn split(&self, source_id: &str, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut char_offset = 0u64;
        let mut line = 1u32;

        for (idx, piece) in self.split_text(text).into_iter().enumerate() {
            let len = char_len(piece) as u64;
            let newlines = piece.matches('\n').count() as u32;
            // A trailing newline belongs to the line it terminates
            let inner_newlines = if piece.ends_with('\n') {
                newlines - 1
            } else {
                newlines
            };

            chunks.push(Chunk {
                parent_source_id: source_id.to_string(),
                sequence_index: idx as u32,
                text: piece.to_string(),
                location: ChunkLocation {
                    start_offset: char_offset,
                    end_offset: char_offset + len,
                    line_start: line,
                    line_end: line + inner_newlines,
                },
            });

            char_offset += len;
            line += newlines;
        }

        chunks
    }

    /// Split `text` into borrowed pieces, in document order.
    pub fn split_text<'a>(&self, text: &'a str) -> Vec<&'a str> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut atoms = Vec::new();
        self.atomize(text, 0..text.len(), SEPARATORS, &mut atoms);

        self.merge(text, &atoms)
            .into_iter()
            .map(|range| &text[range])
            .collect()
    }

    /// Break `range` into pieces no longer than the limit, trying separators
    /// in order and hard-cutting only when none applies.
    fn atomize(
        &self,
        text: &str,
        range: Range<usize>,
        separators: &[&str],
        out: &mut Vec<Range<usize>>,
    ) {
        let slice = &text[range.clone()];
        if char_len(slice) <= self.max_chunk_size {
            out.push(range);
            return;
        }

        let Some(pos) = separators.iter().position(|sep| slice.contains(sep)) else {
            self.hard_cut(slice, range.start, out);
            return;
        };
        let finer = &separators[pos + 1..];

        for piece in split_after(slice, separators[pos]) {
            let piece = (range.start + piece.start)..(range.start + piece.end);
            self.atomize(text, piece, finer, out);
        }
    }

    fn hard_cut(&self, slice: &str, base: usize, out: &mut Vec<Range<usize>>) {
        let mut start = 0;
        let mut count = 0;
        for (idx, _) in slice.char_indices() {
            if count == self.max_chunk_size {
                out.push((base + start)..(base + idx));
                start = idx;
                count = 0;
            }
            count += 1;
        }
        if start < slice.len() {
            out.push((base + start)..(base + slice.len()));
        }
    }

    /// Greedily join adjacent atoms while the result stays within the limit.
    fn merge(&self, text: &str, atoms: &[Range<usize>]) -> Vec<Range<usize>> {
        let mut merged = Vec::new();
        let mut current: Option<Range<usize>> = None;
        let mut current_len = 0;

        for atom in atoms {
            let atom_len = char_len(&text[atom.clone()]);
            match current.as_mut() {
                Some(range) if current_len + atom_len <= self.max_chunk_size => {
                    range.end = atom.end;
                    current_len += atom_len;
                }
                _ => {
                    if let Some(range) = current.take() {
                        merged.push(range);
                    }
                    current = Some(atom.clone());
                    current_len = atom_len;
                }
            }
        }

        if let Some(range) = current {
            merged.push(range);
        }
        merged
    }
}

/// Byte ranges of `text` split after each occurrence of `sep`.
fn split_after(text: &str, sep: &str) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(sep) {
        let end = idx + sep.len();
        pieces.push(start..end);
        start = end;
    }
    if start < text.len() {
        pieces.push(start..text.len());
    }
    pieces
}
