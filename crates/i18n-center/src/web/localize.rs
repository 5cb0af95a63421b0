//! Middleware that runs every textual response through a [`ResponseFilter`].

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request, Uri, header, uri::PathAndQuery},
    middleware::{self, Next},
    response::Response,
};
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use crate::{
    cache::TranslationCache,
    config::Settings,
    filter::{FilterContext, ResponseFilter},
    language::{LanguageItem, LanguageSource, LanguageTag, parse_accept_language},
    nugget::{NuggetLocalizer, NuggetProcessor},
    resolver::TextLocalizer,
    url_localizer::{RequestContext, UrlLocalizer, UrlProcessor, language_prefix, localize_path},
    web::http::ApiError,
};

const PARTIAL_UPDATE_HEADER: &str = "x-microsoftajax";

/// Shared state of the localization middleware.
#[derive(Clone)]
pub struct LocalizeState {
    pub localizer: TextLocalizer,
    pub nuggets: Option<Arc<dyn NuggetProcessor>>,
    pub urls: Option<Arc<dyn UrlProcessor>>,
    pub settings: Arc<Settings>,
}

impl LocalizeState {
    /// Wire the nugget and URL localizers configured by `settings`.
    pub fn new(cache: Arc<TranslationCache>, settings: Settings) -> Result<Self> {
        let localizer =
            TextLocalizer::new(cache.clone(), settings.message_context_enabled_from_comment);
        let nuggets: Arc<dyn NuggetProcessor> =
            Arc::new(NuggetLocalizer::new(localizer.clone(), settings.nugget.clone())?);
        let urls = if settings.url_localization.enabled {
            let urls = UrlLocalizer::new(cache, &settings.url_localization.exclusion_pattern)?;
            Some(Arc::new(urls) as Arc<dyn UrlProcessor>)
        } else {
            None
        };
        Ok(Self { localizer, nuggets: Some(nuggets), urls, settings: Arc::new(settings) })
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        self.localizer.cache()
    }
}

/// Languages of the request being served, available to handlers as an extension.
#[derive(Debug, Clone)]
pub struct RequestLanguages {
    pub items: Vec<LanguageItem>,
    pub principal: LanguageTag,
}

/// Wrap `router` so URL language prefixes are stripped before it routes and
/// its responses are localized.
pub fn localized(router: Router, state: LocalizeState) -> Router {
    Router::new()
        .fallback_service(router)
        .layer(middleware::from_fn_with_state(state, localize_response))
}

pub async fn localize_response(
    State(state): State<LocalizeState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let prefix = strip_language_prefix(&mut req, state.cache())?;
    let mut items: Vec<LanguageItem> = prefix
        .iter()
        .map(|tag| LanguageItem::new(tag.clone(), LanguageSource::UrlPrefix))
        .collect();
    if let Some(accept) = header_str(req.headers(), header::ACCEPT_LANGUAGE.as_str()) {
        items.extend(parse_accept_language(accept));
    }
    if items.is_empty() {
        items.push(LanguageItem::new(state.cache().default_language().clone(), LanguageSource::Default));
    }
    let principal = state.localizer.principal_language(&items)?;

    let request = RequestContext {
        host: header_str(req.headers(), header::HOST.as_str()).map(str::to_string),
        path: req.uri().path().to_string(),
    };
    let partial_update = header_str(req.headers(), PARTIAL_UPDATE_HEADER)
        .is_some_and(|value| value.to_ascii_lowercase().contains("delta=true"));
    req.extensions_mut().insert(RequestLanguages {
        items: items.clone(),
        principal: principal.clone(),
    });

    let mut response = next.run(req).await;

    if prefix.is_some() && state.settings.url_localization.enabled {
        localize_location(response.headers_mut(), &principal, state.cache())?;
    }

    let headers = response.headers();
    let Some(content_type) = header_str(headers, header::CONTENT_TYPE.as_str()) else {
        return Ok(response);
    };
    if !is_localizable(content_type) || has_content_encoding(headers) {
        trace!(content_type, "response left untouched");
        return Ok(response);
    }

    let mut context = FilterContext::new(items, principal.clone()).with_charset(charset(content_type));
    context.request = request;
    context.partial_update = partial_update;
    context.async_postback_types = state.settings.async_postback_types();
    context.nuggets = state.nuggets.clone();
    context.urls = state.urls.clone();

    let (mut parts, body) = response.into_parts();
    let mut filter = ResponseFilter::new(Vec::new(), context);
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| ApiError::internal(format!("failed to read body: {err}")))?;
        filter.write(&chunk).map_err(|err| ApiError::internal(err.to_string()))?;
    }
    filter.complete().map_err(|err| ApiError::internal(err.to_string()))?;
    let body = filter.into_inner();

    parts.headers.remove(header::CONTENT_LENGTH);
    if let Ok(value) = HeaderValue::from_str(&principal.to_string()) {
        parts.headers.insert(header::CONTENT_LANGUAGE, value);
    }
    debug!(language = %principal, bytes = body.len(), partial_update, "response localized");
    Ok(Response::from_parts(parts, Body::from(body)))
}

/// Remove a leading application-language segment from the request URI.
fn strip_language_prefix(
    req: &mut Request<Body>,
    cache: &TranslationCache,
) -> Result<Option<LanguageTag>, ApiError> {
    let path = req.uri().path();
    let Some(language) = language_prefix(path, cache)? else {
        return Ok(None);
    };

    let trimmed = path.trim_start_matches('/');
    let rest = trimmed.find('/').map_or("", |pos| &trimmed[pos..]);
    let rest = if rest.is_empty() { "/" } else { rest };
    let stripped = match req.uri().query() {
        Some(query) => format!("{rest}?{query}"),
        None => rest.to_string(),
    };

    let mut parts = req.uri().clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(stripped.as_str())
            .map_err(|err| ApiError::bad_request(format!("invalid request path: {err}")))?,
    );
    *req.uri_mut() = Uri::from_parts(parts)
        .map_err(|err| ApiError::bad_request(format!("invalid request uri: {err}")))?;
    trace!(language = %language, path = %stripped, "language prefix stripped");
    Ok(Some(language))
}

/// Keep rooted redirect targets inside the requester's language prefix.
fn localize_location(
    headers: &mut HeaderMap,
    principal: &LanguageTag,
    cache: &TranslationCache,
) -> Result<()> {
    let Some(location) = header_str(headers, header::LOCATION.as_str()) else {
        return Ok(());
    };
    if !location.starts_with('/') || location.starts_with("//") {
        return Ok(());
    }
    if language_prefix(location, cache)?.is_some() {
        return Ok(());
    }
    let localized = localize_path(location, principal);
    headers.insert(header::LOCATION, HeaderValue::from_str(&localized)?);
    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn is_localizable(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    mime.starts_with("text/")
        || matches!(
            mime.as_str(),
            "application/xhtml+xml"
                | "application/xml"
                | "application/json"
                | "application/javascript"
        )
}

fn has_content_encoding(headers: &HeaderMap) -> bool {
    header_str(headers, header::CONTENT_ENCODING.as_str())
        .is_some_and(|encoding| !encoding.trim().eq_ignore_ascii_case("identity"))
}

fn charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim().eq_ignore_ascii_case("charset").then(|| value.trim().trim_matches('"'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_textual_content_types() {
        assert!(is_localizable("text/html; charset=utf-8"));
        assert!(is_localizable("Application/JSON"));
        assert!(!is_localizable("image/png"));
        assert!(!is_localizable("application/octet-stream"));
    }

    #[test]
    fn extracts_charset_parameter() {
        assert_eq!(charset("text/html; charset=\"ISO-8859-1\""), Some("ISO-8859-1"));
        assert_eq!(charset("text/plain;CHARSET=utf-8"), Some("utf-8"));
        assert_eq!(charset("text/plain"), None);
    }

    #[test]
    fn identity_encoding_is_not_compressed() {
        let mut headers = HeaderMap::new();
        assert!(!has_content_encoding(&headers));
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("identity"));
        assert!(!has_content_encoding(&headers));
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        assert!(has_content_encoding(&headers));
    }
}
