//! Language-prefixing of links in HTML responses.

use std::sync::Arc;

use anyhow::Result;
use regex::{Captures, Regex};
use tracing::debug;
use url::Url;

use crate::{cache::TranslationCache, error::CoreError, language::LanguageTag};

/// What the URL localizer needs to know about the request being answered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// `Host` header value, port included when present.
    pub host: Option<String>,
    /// Request path after any language prefix was stripped.
    pub path: String,
}

/// Rewrites URLs in a response body to carry the principal language.
pub trait UrlProcessor: Send + Sync {
    fn process(
        &self,
        text: &str,
        principal: &LanguageTag,
        request: &RequestContext,
    ) -> Result<String>;
}

/// Insert `/{language}` as the first segment of a rooted path.
pub fn localize_path(path: &str, language: &LanguageTag) -> String {
    if path.is_empty() || path == "/" {
        return format!("/{language}");
    }
    if path.starts_with('/') { format!("/{language}{path}") } else { format!("/{language}/{path}") }
}

/// First path segment of `path` when it names one of `languages`.
pub fn language_prefix(path: &str, cache: &TranslationCache) -> Result<Option<LanguageTag>> {
    let Some(segment) = path.trim_start_matches('/').split(['/', '?', '#']).next() else {
        return Ok(None);
    };
    let Ok(tag) = LanguageTag::parse(segment) else {
        return Ok(None);
    };
    Ok(cache.app_languages()?.contains_key(&tag.to_string()).then_some(tag))
}

#[derive(Debug)]
pub struct UrlLocalizer {
    cache: Arc<TranslationCache>,
    exclusion: Option<Regex>,
    attributes: Regex,
}

impl UrlLocalizer {
    /// `exclusion` is a regex of URLs that are never rewritten; empty disables it.
    pub fn new(cache: Arc<TranslationCache>, exclusion: &str) -> Result<Self> {
        let exclusion = if exclusion.trim().is_empty() {
            None
        } else {
            Some(Regex::new(exclusion).map_err(|source| CoreError::ExclusionPattern {
                pattern: exclusion.to_string(),
                source,
            })?)
        };
        let attributes = Regex::new(
            r#"(?i)(?P<lead>^|\s)(?P<attr>href|src|action)(?P<eq>\s*=\s*)(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#,
        )?;
        Ok(Self { cache, exclusion, attributes })
    }

    /// Localized form of `url`, or `None` when it must be left alone.
    pub fn localize_url(
        &self,
        url: &str,
        principal: &LanguageTag,
        request: &RequestContext,
    ) -> Result<Option<String>> {
        if self.exclusion.as_ref().is_some_and(|exclusion| exclusion.is_match(url)) {
            return Ok(None);
        }

        if url.starts_with('/') {
            if url.starts_with("//") || language_prefix(url, &self.cache)?.is_some() {
                return Ok(None);
            }
            return Ok(Some(localize_path(url, principal)));
        }

        let Ok(mut parsed) = Url::parse(url) else {
            return Ok(None);
        };
        if !matches!(parsed.scheme(), "http" | "https") || !same_host(&parsed, request) {
            return Ok(None);
        }
        if language_prefix(parsed.path(), &self.cache)?.is_some() {
            return Ok(None);
        }
        let path = localize_path(parsed.path(), principal);
        parsed.set_path(&path);
        Ok(Some(parsed.to_string()))
    }
}

fn same_host(url: &Url, request: &RequestContext) -> bool {
    let (Some(host), Some(request_host)) = (url.host_str(), request.host.as_deref()) else {
        return false;
    };
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    authority.eq_ignore_ascii_case(request_host)
}

impl UrlProcessor for UrlLocalizer {
    fn process(
        &self,
        text: &str,
        principal: &LanguageTag,
        request: &RequestContext,
    ) -> Result<String> {
        let mut failure = None;
        let mut rewritten = 0usize;
        let out = self.attributes.replace_all(text, |caps: &Captures<'_>| {
            let whole = caps[0].to_string();
            let (value, quote) = match (caps.name("dq"), caps.name("sq")) {
                (Some(value), _) => (value.as_str(), '"'),
                (None, Some(value)) => (value.as_str(), '\''),
                _ => return whole,
            };
            match self.localize_url(value, principal, request) {
                Ok(Some(localized)) => {
                    rewritten += 1;
                    format!(
                        "{}{}{}{quote}{localized}{quote}",
                        &caps["lead"], &caps["attr"], &caps["eq"]
                    )
                }
                Ok(None) => whole,
                Err(err) => {
                    failure.get_or_insert(err);
                    whole
                }
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }
        if rewritten > 0 {
            debug!(urls = rewritten, language = %principal, path = %request.path, "urls localized");
        }
        Ok(out.into_owned())
    }
}
