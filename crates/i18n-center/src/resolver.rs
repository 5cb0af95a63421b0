//! Multi-pass resolution of message keys against the translation cache.

use std::sync::Arc;

use anyhow::Result;
use tracing::trace;

use crate::{
    cache::TranslationCache,
    language::{DEFAULT_FALLBACK_PASS, LanguageItem, LanguageTag, MatchGrade, TextProbe, rank},
    repository::message_key,
};

/// Text chosen for a message key and the language it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub text: String,
    pub language: LanguageTag,
}

/// Resolves message keys to localized text.
#[derive(Debug, Clone)]
pub struct TextLocalizer {
    cache: Arc<TranslationCache>,
    include_comment: bool,
}

impl TextLocalizer {
    pub fn new(cache: Arc<TranslationCache>, include_comment: bool) -> Self {
        Self { cache, include_comment }
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    /// Resolve `key` for a requester.
    ///
    /// `max_passes` bounds the match grades tried; `None` means unbounded,
    /// which also allows the final default-language pass. Anything above that
    /// pass is clamped to it. Returns `Ok(None)` only when passes were
    /// restricted and no grade matched.
    pub fn resolve(
        &self,
        key: &str,
        comment: Option<&str>,
        languages: &[LanguageItem],
        max_passes: Option<usize>,
    ) -> Result<Option<Resolution>> {
        let max_passes = max_passes.map_or(DEFAULT_FALLBACK_PASS, |p| p.min(DEFAULT_FALLBACK_PASS));
        let msgkey = message_key(key, comment, self.include_comment);
        let max_grade = MatchGrade::from_pass(max_passes).unwrap_or(MatchGrade::MAX);

        let app_languages = self.cache.app_languages()?;
        let probe = CacheProbe { cache: &self.cache, sentinel: &msgkey };
        let ranked = rank(languages, app_languages.values(), Some(&msgkey), &probe, max_grade)?;

        if let Some(ranked) = ranked {
            let text = ranked.text.unwrap_or_default();
            // A match that only proved the key itself must not leak a
            // comment-decorated key into the output.
            let text = if text == msgkey { key.to_string() } else { text };
            trace!(key, language = %ranked.language, grade = ?ranked.grade, "message resolved");
            return Ok(Some(Resolution { text, language: ranked.language }));
        }

        if max_passes >= DEFAULT_FALLBACK_PASS {
            trace!(key, "message falls back to default language");
            return Ok(Some(Resolution {
                text: key.to_string(),
                language: self.cache.default_language().clone(),
            }));
        }
        Ok(None)
    }

    /// The single language that best represents a requester.
    ///
    /// Ranks without a key, so any language with content qualifies; falls
    /// back to the default language.
    pub fn principal_language(&self, languages: &[LanguageItem]) -> Result<LanguageTag> {
        let app_languages = self.cache.app_languages()?;
        let probe = CacheProbe { cache: &self.cache, sentinel: "" };
        let ranked = rank(languages, app_languages.values(), None, &probe, MatchGrade::MAX)?;
        Ok(ranked
            .map(|ranked| ranked.language)
            .unwrap_or_else(|| self.cache.default_language().clone()))
    }
}

/// Existence probe backed by the translation cache.
struct CacheProbe<'a> {
    cache: &'a TranslationCache,
    /// Returned for a miss in the default language under the key-is-value policy.
    sentinel: &'a str,
}

impl TextProbe for CacheProbe<'_> {
    fn text_for(&self, language: &LanguageTag, key: Option<&str>) -> Result<Option<String>> {
        let Some(key) = key else {
            return Ok(self.cache.is_language_valid(language)?.then(String::new));
        };
        if let Some(text) = self.cache.lookup(language, key)? {
            return Ok(Some(text));
        }
        let policy = self.cache.policy();
        if policy.message_key_is_value_in_default_language && *language == policy.default_language
        {
            return Ok(Some(self.sentinel.to_string()));
        }
        Ok(None)
    }
}
