//! Local directory document loader.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::DocumentLoader;
use crate::error::SourceError;
use crate::models::{Document, IngestionConfig};
use crate::utils::file::{DocumentKind, check_file_size, read_file_content};

/// Loads `.txt`, `.md` and `.pdf` files below a root directory.
///
/// The source id of each document is its path as walked from the root.
#[derive(Debug)]
pub struct DirectoryLoader {
    /// Root path to scan
    root: PathBuf,

    /// Patterns to exclude
    exclude_patterns: Vec<glob::Pattern>,

    /// Maximum file size
    max_file_size: u64,
}

impl DirectoryLoader {
    /// Create a new loader. Invalid exclude patterns are dropped with a warning.
    pub fn new(root: PathBuf, exclude_patterns: &[String], max_file_size: u64) -> Self {
        let exclude_patterns = exclude_patterns
            .iter()
            .filter_map(|pattern| match glob::Pattern::new(pattern) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();

        Self {
            root,
            exclude_patterns,
            max_file_size,
        }
    }

    pub fn from_config(config: &IngestionConfig) -> Self {
        Self::new(
            config.documents_dir.clone(),
            &config.exclude_patterns,
            config.max_file_size,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.exclude_patterns.iter().any(|p| p.matches(&path_str))
    }

    /// Collect all loadable files, sorted by path.
    pub fn collect_files(&self) -> Result<Vec<(PathBuf, DocumentKind)>, SourceError> {
        if !self.root.exists() {
            return Err(SourceError::NotFound(self.root.display().to_string()));
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();

            if !entry.file_type().is_file() || self.is_excluded(path) {
                continue;
            }

            match DocumentKind::from_path(path) {
                Some(kind) => files.push((path.to_path_buf(), kind)),
                None => tracing::debug!(path = %path.display(), "skipping unsupported file"),
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Read one file into a document.
    pub fn read_document(&self, path: &Path, kind: DocumentKind) -> Result<Document, SourceError> {
        let source_id = path.to_string_lossy().to_string();
        let text = match kind {
            DocumentKind::PlainText | DocumentKind::Markdown => {
                read_file_content(path, self.max_file_size).map_err(|e| SourceError::ReadError {
                    path: source_id.clone(),
                    message: e.to_string(),
                })?
            }
            DocumentKind::Pdf => {
                check_file_size(path, self.max_file_size).map_err(|e| SourceError::ReadError {
                    path: source_id.clone(),
                    message: e.to_string(),
                })?;
                extract_pdf_text(path)?
            }
        };

        Ok(Document::new(source_id, text))
    }
}

impl DocumentLoader for DirectoryLoader {
    fn name(&self) -> &str {
        "directory"
    }

    fn load(&self) -> Result<Vec<Document>, SourceError> {
        let files = self.collect_files()?;
        let mut documents = Vec::with_capacity(files.len());

        for (path, kind) in files {
            match self.read_document(&path, kind) {
                Ok(document) => {
                    tracing::debug!(path = %path.display(), kind = %kind, "loaded document");
                    documents.push(document);
                }
                Err(e) => tracing::warn!(error = %e, "skipping document"),
            }
        }

        tracing::info!(
            root = %self.root.display(),
            documents = documents.len(),
            "documents loaded"
        );
        Ok(documents)
    }
}

#[cfg(feature = "pdf")]
fn extract_pdf_text(path: &Path) -> Result<String, SourceError> {
    pdf_extract::extract_text(path).map_err(|e| SourceError::ExtractError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf_text(path: &Path) -> Result<String, SourceError> {
    Err(SourceError::ExtractError {
        path: path.display().to_string(),
        message: "built without the `pdf` feature".to_string(),
    })
}
