//! Document sources.
//!
//! A source turns some external location into loaded [`Document`]s ready for
//! ingestion. Only the local directory loader exists today.

mod local;

pub use local::DirectoryLoader;

use crate::error::SourceError;
use crate::models::Document;

/// Anything that can produce documents for ingestion.
pub trait DocumentLoader: Send + Sync {
    /// Human-readable name.
    fn name(&self) -> &str;

    /// Load every document, sorted by source id.
    fn load(&self) -> Result<Vec<Document>, SourceError>;
}
