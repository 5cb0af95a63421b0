use std::{
    collections::BTreeMap,
    net::SocketAddr,
    path::{Component, Path as FsPath, PathBuf},
};

use anyhow::Result;
use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio::{fs, net::TcpListener, task::JoinHandle};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    CoreError, Layout,
    web::localize::{LocalizeState, RequestLanguages, localized},
};

const TOKEN_HEADER: &str = "x-i18n-token";

#[derive(Clone)]
pub struct HttpState {
    pub localize: LocalizeState,
    pub layout: Layout,
    pub auth: HttpAuth,
}

#[derive(Debug)]
pub struct HttpServerHandle {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl HttpServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguagesResponse {
    pub default_language: String,
    pub languages: Vec<String>,
    /// Language this request was answered in.
    pub principal: Option<String>,
}

#[derive(Serialize)]
struct ResetResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    details: BTreeMap<&'static str, String>,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Internal(String),
    /// Domain failure reported with its stable code and placeholders.
    Core(StatusCode, CoreError),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = match err {
            CoreError::LanguageTagEmpty | CoreError::LanguageTagInvalid { .. } => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::Core(status, err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<CoreError>() {
            Ok(core) => ApiError::from(core),
            Err(other) => ApiError::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::Internal(message) => {
                error!(error = %message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            ApiError::Core(status, err) => {
                if status.is_server_error() {
                    error!(error = %err, code = err.code(), "request failed");
                }
                let body = ErrorResponse {
                    error: err.to_string(),
                    code: Some(err.code()),
                    details: err.placeholders().into_iter().collect(),
                };
                return (status, Json(body)).into_response();
            }
        };
        let body = ErrorResponse { error: message, code: None, details: BTreeMap::new() };
        (status, Json(body)).into_response()
    }
}

/// Optional bearer token guarding the administrative endpoints.
#[derive(Clone, Default)]
pub struct HttpAuth {
    token: Option<String>,
}

impl HttpAuth {
    pub fn new(token: Option<String>) -> Self {
        Self { token: token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) }
    }

    fn verify(&self, req: &Request<Body>) -> Result<(), ApiError> {
        let Some(expected) = self.token.as_deref() else {
            return Ok(());
        };

        let matches_authorization = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|value| value.trim() == expected);

        let matches_custom = req
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim() == expected);

        if matches_authorization || matches_custom {
            return Ok(());
        }
        Err(ApiError::unauthorized("missing valid authentication token"))
    }
}

pub fn build_router(state: HttpState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::ACCEPT_LANGUAGE,
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(TOKEN_HEADER),
        ])
        .allow_origin(Any);

    let auth_state = state.auth.clone();
    let localize_state = state.localize.clone();

    let routes = Router::new()
        .route("/api/health", get(get_health))
        .route("/api/languages", get(list_languages))
        .route(
            "/api/cache/reset",
            post(reset_cache)
                .route_layer(middleware::from_fn_with_state(auth_state, authenticate)),
        )
        .route("/", get(get_index))
        .route("/*path", get(get_content))
        .with_state(state);

    localized(routes, localize_state).layer(TraceLayer::new_for_http()).layer(cors)
}

async fn authenticate(
    State(auth): State<HttpAuth>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    auth.verify(&req)?;
    Ok(next.run(req).await)
}

pub async fn spawn_http_server(state: HttpState, addr: SocketAddr) -> Result<HttpServerHandle> {
    let router = build_router(state);
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("HTTP server listening on {}", local_addr);

    let task = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            error!("HTTP server terminated with error: {err}");
        }
    });

    Ok(HttpServerHandle { addr: local_addr, task })
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn list_languages(
    State(state): State<HttpState>,
    languages: Option<Extension<RequestLanguages>>,
) -> Result<Json<LanguagesResponse>, ApiError> {
    let cache = state.localize.cache();
    let available = cache.app_languages()?;
    Ok(Json(LanguagesResponse {
        default_language: cache.default_language().to_string(),
        languages: available.keys().cloned().collect(),
        principal: languages.map(|Extension(languages)| languages.principal.to_string()),
    }))
}

async fn reset_cache(State(state): State<HttpState>) -> Json<ResetResponse> {
    state.localize.cache().reset();
    Json(ResetResponse { status: "reset" })
}

async fn get_index(State(state): State<HttpState>) -> Result<Response, ApiError> {
    serve_content(&state.layout, "").await
}

async fn get_content(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    serve_content(&state.layout, &path).await
}

async fn serve_content(layout: &Layout, request_path: &str) -> Result<Response, ApiError> {
    let relative = sanitize_path(request_path)
        .ok_or_else(|| ApiError::bad_request(format!("invalid path '{request_path}'")))?;
    let mut file = layout.content_dir().join(relative);
    if fs::metadata(&file).await.is_ok_and(|meta| meta.is_dir()) {
        file = file.join("index.html");
    }

    let bytes = match fs::read(&file).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found(format!("'/{request_path}' not found")));
        }
        Err(err) => {
            warn!(path = %file.display(), error = %err, "failed to read content file");
            return Err(ApiError::internal(format!("failed to read '/{request_path}'")));
        }
    };

    let mut response = Response::new(Body::from(bytes));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type_for(&file)));
    Ok(response)
}

/// Relative file path for a request path; `None` when it escapes the content root.
fn sanitize_path(request_path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in FsPath::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(relative)
}

fn content_type_for(path: &FsPath) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "gz" => "application/gzip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_rejects_parent_components() {
        assert_eq!(sanitize_path("docs/./a.html"), Some(PathBuf::from("docs/a.html")));
        assert_eq!(sanitize_path(""), Some(PathBuf::new()));
        assert_eq!(sanitize_path("../secret"), None);
        assert_eq!(sanitize_path("a/../../b"), None);
    }

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for(FsPath::new("a/index.HTML")), "text/html; charset=utf-8");
        assert_eq!(content_type_for(FsPath::new("logo.png")), "image/png");
        assert_eq!(content_type_for(FsPath::new("README")), "application/octet-stream");
    }

    #[test]
    fn core_errors_map_to_status() {
        let invalid = ApiError::from(CoreError::LanguageTagInvalid { tag: "x".into() });
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);
        let flushed = ApiError::from(anyhow::Error::from(CoreError::ResponseAlreadyFlushed));
        assert_eq!(flushed.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn core_error_payload_carries_code_and_details() {
        let response = ApiError::from(CoreError::LanguageTagInvalid { tag: "!!".into() })
            .into_response();
        let bytes = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(axum::body::to_bytes(response.into_body(), usize::MAX))
            .unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload["code"], "language_tag_invalid");
        assert_eq!(payload["details"]["tag"], "!!");
        assert_eq!(payload["error"], "invalid language tag '!!'");

        let response = ApiError::not_found("gone").into_response();
        let bytes = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(axum::body::to_bytes(response.into_body(), usize::MAX))
            .unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload, serde_json::json!({ "error": "gone" }));
    }
}
