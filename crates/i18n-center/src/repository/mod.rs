//! Sources of translated messages.

mod po;

use std::collections::HashMap;

use anyhow::Result;

use crate::language::LanguageTag;

pub use po::{PoEntry, PoRepository, parse_po};

/// Complete key → text table for one language.
pub type MessageTable = HashMap<String, String>;

/// Read access to translation catalogs.
///
/// Errors propagate unchanged to whoever triggered the cache population.
pub trait TranslationRepository: Send + Sync {
    /// Every language with a catalog, in no particular order.
    fn available_languages(&self) -> Result<Vec<LanguageTag>>;

    /// Whether any content exists for `language`, without loading it.
    fn translation_exists(&self, language: &LanguageTag) -> Result<bool>;

    /// The full message table of `language`; empty when it has no catalog.
    fn translation(&self, language: &LanguageTag) -> Result<MessageTable>;
}

/// Build a message key from a message id and optional comment.
///
/// When `include_comment` is set and the comment is non-empty the comment is
/// prefixed using gettext's context separator (`\u{4}`).
pub fn message_key(msgid: &str, comment: Option<&str>, include_comment: bool) -> String {
    match comment.filter(|comment| include_comment && !comment.is_empty()) {
        Some(comment) => format!("{comment}\u{4}{msgid}"),
        None => msgid.to_string(),
    }
}

/// Normalize line endings to `\n`.
pub fn normalize_line_endings(key: &str) -> std::borrow::Cow<'_, str> {
    if key.contains("\r\n") {
        std::borrow::Cow::Owned(key.replace("\r\n", "\n"))
    } else {
        std::borrow::Cow::Borrowed(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_only_joins_key_when_enabled() {
        assert_eq!(message_key("Save", Some("button"), false), "Save");
        assert_eq!(message_key("Save", Some("button"), true), "button\u{4}Save");
        assert_eq!(message_key("Save", Some(""), true), "Save");
        assert_eq!(message_key("Save", None, true), "Save");
    }

    #[test]
    fn normalizes_crlf_only() {
        assert_eq!(normalize_line_endings("a\r\nb\nc\r"), "a\nb\nc\r");
        assert!(matches!(normalize_line_endings("plain"), std::borrow::Cow::Borrowed(_)));
    }
}
