//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{DocumentKind, read_file_content};
pub use retry::{RetryConfig, RetryResult, Retryable, with_retry};
pub use text::{char_len, normalize_for_embedding};
