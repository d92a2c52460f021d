//! Text processing utilities.

/// Replace every newline with a single space.
///
/// Applied to chunk text right before it is sent to the embedding provider.
/// Stored chunk text is never normalized.
pub fn normalize_for_embedding(text: &str) -> String {
    text.replace('\n', " ")
}

/// Number of characters (Unicode scalar values) in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_for_embedding() {
        assert_eq!(normalize_for_embedding("a\nb"), "a b");
        assert_eq!(normalize_for_embedding("a\n\nb"), "a  b");
        assert_eq!(normalize_for_embedding("no newline"), "no newline");
        assert_eq!(normalize_for_embedding("tab\tkept\r\n"), "tab\tkept\r ");
    }

    #[test]
    fn test_char_len_counts_scalars() {
        assert_eq!(char_len(""), 0);
        assert_eq!(char_len("héllo"), 5);
        assert_eq!(char_len("日本語"), 3);
    }
}
