/// Engine tunables. Scoring weights and the extraction confidence threshold
/// are fixed constants and do not live here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntakeConfig {
    /// Per-message body cut-off used when building the extraction prompt.
    pub body_char_limit: usize,
    /// Characters of raw body kept as a context summary when summarization
    /// fails.
    pub summary_excerpt_chars: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            body_char_limit: 2000,
            summary_excerpt_chars: 500,
        }
    }
}

/// First `limit` characters of `text`, never splitting a code point.
pub(crate) fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}
