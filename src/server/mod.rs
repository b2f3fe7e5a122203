//! HTTP surface of the relay.
//!
//! # Routes
//!
//! | Route | Handler |
//! |---|---|
//! | `/meow` | liveness probe, outside the password gate |
//! | `/origin/list` | raw upstream root listing |
//! | `/list` | recursive flat listing |
//! | `/download_info` | batch listing and URL resolution |
//! | `/download` | single file, redirected or proxied |
//!
//! Every route is `GET`. Unknown paths answer 404 to `GET`/`HEAD` and 405
//! to other methods, behind the same password gate as the relay routes.
//! CORS headers are added to all responses, errors included.

mod auth;
mod handlers;
mod params;
mod response;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::http::Method;
use axum::middleware;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{DownloadMode, RelayConfig};
use crate::credential::TokenPool;
use crate::error::RelayError;
use crate::proxy::StreamProxy;
use crate::upstream::{ShareApi, UpstreamClient};

/// Per-process state shared by all request tasks. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub credentials: TokenPool,
    pub api: Arc<dyn ShareApi>,
    pub proxy: Arc<StreamProxy>,
    pub password: Option<Arc<str>>,
    pub download_mode: DownloadMode,
    pub resolve_concurrency: usize,
}

impl AppState {
    /// Builds the upstream clients described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Client`] when an HTTP client cannot be built or
    /// the upstream base URL is unusable.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let api = UpstreamClient::new(
            config.upstream_base_url.clone(),
            config.api_connect_timeout(),
            config.api_timeout(),
        )?;
        let proxy = StreamProxy::new(
            config.download_connect_timeout(),
            config.download_response_timeout(),
            config.download_read_timeout(),
        )?;
        Ok(Self::new(
            TokenPool::new(config.tokens.iter().cloned()),
            Arc::new(api),
            Arc::new(proxy),
            config,
        ))
    }

    /// Assembles state around an arbitrary [`ShareApi`] implementation.
    #[must_use]
    pub fn new(
        credentials: TokenPool,
        api: Arc<dyn ShareApi>,
        proxy: Arc<StreamProxy>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            credentials,
            api,
            proxy,
            password: config.password.as_deref().map(Arc::from),
            download_mode: config.download_mode,
            resolve_concurrency: config.resolve_concurrency,
        }
    }
}

/// Builds the relay router.
pub fn router(state: AppState) -> Router {
    let gated = Router::new()
        .route("/origin/list", get(handlers::origin_list))
        .route("/list", get(handlers::list_files))
        .route("/download_info", get(handlers::download_info))
        .route("/download", get(handlers::download))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_password,
        ));

    Router::new()
        .route("/meow", get(handlers::meow))
        .merge(gated)
        .fallback(handlers::not_found)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Binds `config.bind` and serves until interrupted.
///
/// # Errors
///
/// Fails when the upstream clients cannot be built, the address cannot be
/// bound, or the server stops with an I/O error.
pub async fn serve(config: RelayConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config).context("Failed to build upstream clients")?;
    if state.credentials.is_empty() {
        warn!("no upstream tokens configured; requests must supply `credential`");
    }

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!(
        addr = %listener.local_addr()?,
        upstream = %config.upstream_base_url,
        download_mode = %config.download_mode,
        tokens = state.credentials.len(),
        password = config.password.is_some(),
        "relay listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
