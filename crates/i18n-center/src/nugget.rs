//! Nugget tokens (`[[[msgid|||arg///comment]]]`) and their replacement.

use anyhow::Result;
use regex::Regex;
use tracing::debug;

use crate::{config::NuggetSyntax, language::LanguageItem, resolver::TextLocalizer};

/// Replaces every nugget in a text with its localized message.
pub trait NuggetProcessor: Send + Sync {
    /// Must return text without nuggets unchanged.
    fn process(&self, text: &str, languages: &[LanguageItem]) -> Result<String>;
}

/// A parsed nugget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nugget {
    pub msgid: String,
    pub format_items: Vec<String>,
    pub comment: Option<String>,
}

impl Nugget {
    /// Parse the inner part of a nugget (between begin and end tokens).
    pub fn parse(inner: &str, syntax: &NuggetSyntax) -> Self {
        let (body, comment) = match inner.split_once(syntax.comment_token.as_str()) {
            Some((body, comment)) => (body, Some(comment.to_string())),
            None => (inner, None),
        };
        let mut parts = body.split(syntax.delimiter_token.as_str());
        let msgid = parts.next().unwrap_or_default().to_string();
        Nugget { msgid, format_items: parts.map(str::to_string).collect(), comment }
    }

    /// Substitute `%0`, `%1`, … in `message` with the format items.
    pub fn format(&self, message: &str) -> String {
        // Highest index first so `%1` never eats the prefix of `%10`.
        self.format_items
            .iter()
            .enumerate()
            .rev()
            .fold(message.to_string(), |acc, (index, item)| acc.replace(&format!("%{index}"), item))
    }
}

/// Nugget processor resolving messages through a [`TextLocalizer`].
#[derive(Debug, Clone)]
pub struct NuggetLocalizer {
    localizer: TextLocalizer,
    syntax: NuggetSyntax,
    pattern: Regex,
}

impl NuggetLocalizer {
    pub fn new(localizer: TextLocalizer, syntax: NuggetSyntax) -> Result<Self> {
        let pattern = Regex::new(&format!(
            "(?s){}(.+?){}",
            regex::escape(&syntax.begin_token),
            regex::escape(&syntax.end_token)
        ))?;
        Ok(Self { localizer, syntax, pattern })
    }
}

impl NuggetProcessor for NuggetLocalizer {
    fn process(&self, text: &str, languages: &[LanguageItem]) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut replaced = 0usize;

        for captures in self.pattern.captures_iter(text) {
            let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let nugget = Nugget::parse(inner.as_str(), &self.syntax);
            let message = self
                .localizer
                .resolve(&nugget.msgid, nugget.comment.as_deref(), languages, None)?
                .map(|resolution| resolution.text)
                .unwrap_or_else(|| nugget.msgid.clone());

            out.push_str(&text[last..whole.start()]);
            out.push_str(&nugget.format(&message));
            last = whole.end();
            replaced += 1;
        }

        if replaced == 0 {
            return Ok(text.to_string());
        }
        out.push_str(&text[last..]);
        debug!(nuggets = replaced, "nuggets localized");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        cache::{
            TranslationCache,
            tests::{MemoryRepository, policy},
        },
        language::parse_accept_language,
    };

    fn processor(include_comment: bool) -> NuggetLocalizer {
        let repo = MemoryRepository::default().with(
            "fr",
            &[
                ("Hello", "Bonjour"),
                ("Welcome %0, you have %1 messages", "Bienvenue %0, vous avez %1 messages"),
                ("menu\u{4}File", "Fichier"),
            ],
        );
        let cache = Arc::new(TranslationCache::new(policy("en", true), Arc::new(repo)));
        NuggetLocalizer::new(TextLocalizer::new(cache, include_comment), NuggetSyntax::default())
            .unwrap()
    }

    #[test]
    fn parses_format_items_and_comment() {
        let nugget = Nugget::parse("Welcome %0|||Ana///greeting", &NuggetSyntax::default());
        assert_eq!(nugget.msgid, "Welcome %0");
        assert_eq!(nugget.format_items, vec!["Ana"]);
        assert_eq!(nugget.comment.as_deref(), Some("greeting"));
    }

    #[test]
    fn format_handles_two_digit_indexes() {
        let nugget = Nugget {
            msgid: String::new(),
            format_items: (0..11).map(|i| format!("v{i}")).collect(),
            comment: None,
        };
        assert_eq!(nugget.format("%1-%10"), "v1-v10");
    }

    #[test]
    fn replaces_nuggets_for_requested_language() {
        let languages = parse_accept_language("fr-FR,fr;q=0.9");
        let out = processor(false)
            .process(
                "<h1>[[[Hello]]]</h1><p>[[[Welcome %0, you have %1 messages|||Ana|||3]]]</p>",
                &languages,
            )
            .unwrap();
        assert_eq!(out, "<h1>Bonjour</h1><p>Bienvenue Ana, vous avez 3 messages</p>");
    }

    #[test]
    fn untranslated_nuggets_fall_back_to_msgid() {
        let languages = parse_accept_language("fr");
        let out = processor(false).process("[[[Goodbye]]] [[[Hi %0|||Bo]]]", &languages).unwrap();
        assert_eq!(out, "Goodbye Hi Bo");
    }

    #[test]
    fn comments_select_context_when_enabled() {
        let languages = parse_accept_language("fr");
        assert_eq!(processor(true).process("[[[File///menu]]]", &languages).unwrap(), "Fichier");
        assert_eq!(processor(false).process("[[[File///menu]]]", &languages).unwrap(), "File");
    }

    #[test]
    fn text_without_nuggets_is_unchanged() {
        let languages = parse_accept_language("fr");
        let processor = processor(false);
        for text in ["", "plain text", "[[[unterminated", "[[[]]]"] {
            assert_eq!(processor.process(text, &languages).unwrap(), text);
        }
    }
}
