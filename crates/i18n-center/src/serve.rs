//! i18n-center server entry point

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Args;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{
    Layout, Settings, default_root,
    cache::{CachePolicy, TranslationCache},
    paths::expand_tilde,
    repository::PoRepository,
    web::{
        http::{self, HttpState},
        localize::LocalizeState,
    },
};

const HTTP_TOKEN_ENV: &str = "I18N_CENTER_HTTP_TOKEN";

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Workspace root, filled from the global `--root` flag.
    #[arg(skip)]
    pub root: Option<PathBuf>,
    /// Bind address for the HTTP server.
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:8787")]
    pub http_bind: SocketAddr,
    /// Token required by administrative endpoints (fallback env I18N_CENTER_HTTP_TOKEN).
    #[arg(long, value_name = "TOKEN")]
    pub http_auth_token: Option<String>,
}

pub async fn run(mut args: ServeArgs) -> Result<()> {
    let layout = resolve_layout(args.root.take())?;
    layout.ensure()?;
    let _tracing_guard = init_tracing(&layout)?;

    if let Err(err) = run_impl(layout, args).await {
        error!(error = ?err, "server terminated with error");
        return Err(err);
    }
    info!("server exited cleanly");
    Ok(())
}

async fn run_impl(layout: Layout, args: ServeArgs) -> Result<()> {
    let ServeArgs { http_bind, http_auth_token, .. } = args;
    let http_auth_token = http_auth_token.or_else(|| std::env::var(HTTP_TOKEN_ENV).ok());

    let settings = Settings::load(&layout)?;
    let cache = open_cache(&layout, &settings)?;
    let languages = cache.app_languages()?;
    info!(
        environment = %settings.environment,
        default_language = %settings.default_language,
        languages = ?languages.keys().collect::<Vec<_>>(),
        "translations available"
    );

    let state = HttpState {
        localize: LocalizeState::new(cache, settings)?,
        layout: layout.clone(),
        auth: http::HttpAuth::new(http_auth_token),
    };
    let http_handle = http::spawn_http_server(state, http_bind).await?;
    info!(
        http_addr = %http_handle.addr(),
        content = %layout.content_dir().display(),
        "server ready"
    );

    match signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down server"),
        Err(err) => warn!(error = ?err, "failed to listen for Ctrl+C"),
    }

    http_handle.shutdown();
    info!("server stopped cleanly");
    Ok(())
}

/// Translation cache over the workspace's `.po` catalogs.
pub fn open_cache(layout: &Layout, settings: &Settings) -> Result<Arc<TranslationCache>> {
    let repository = PoRepository::from_layout(layout, settings.message_context_enabled_from_comment);
    let policy = CachePolicy::from_settings(settings)?;
    Ok(Arc::new(TranslationCache::new(policy, Arc::new(repository))))
}

pub fn resolve_layout(root_override: Option<PathBuf>) -> Result<Layout> {
    let root = match root_override {
        Some(path) => expand_tilde(path)?,
        None => default_root()?,
    };
    debug!(root = %root.display(), "resolved workspace root");
    Ok(Layout::new(root))
}

fn init_tracing(layout: &Layout) -> Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to build log filter")?;

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let server_log_dir = layout.logs_dir().join("server");
    std::fs::create_dir_all(&server_log_dir).with_context(|| {
        format!("failed to create server log directory {}", server_log_dir.display())
    })?;
    let file_appender = rolling::hourly(server_log_dir, "server.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
