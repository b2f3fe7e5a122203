//! Route handlers. Each one selects a credential first, then validates its
//! parameters, then calls into the pipeline.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::info;

use super::AppState;
use super::auth;
use super::params::RelayQuery;
use crate::config::DownloadMode;
use crate::error::RelayError;
use crate::pipeline::{self, FlatFile, ResolvedDownload};
use crate::proxy::{self, RangeHeaders};

pub(crate) async fn meow() -> &'static str {
    "Meow!"
}

/// Root listing exactly as the share API returned it.
pub(crate) async fn origin_list(
    State(state): State<AppState>,
    query: RelayQuery,
) -> Result<Json<serde_json::Value>, RelayError> {
    let credential = state.credentials.select(query.credential.as_deref())?;
    let link = query.share_link()?;
    let raw = state.api.list_root_raw(&link, &credential).await?;
    Ok(Json(raw))
}

/// Recursive listing flattened to `[{id, path}]`.
pub(crate) async fn list_files(
    State(state): State<AppState>,
    query: RelayQuery,
) -> Result<Json<Vec<FlatFile>>, RelayError> {
    let credential = state.credentials.select(query.credential.as_deref())?;
    let link = query.share_link()?;
    let files = pipeline::expand(state.api.as_ref(), &link, &credential).await?;
    info!(link = %link, files = files.len(), "listed share");
    Ok(Json(files))
}

/// Explicit ids, or the whole recursive listing, optionally resolved to URLs.
pub(crate) async fn download_info(
    State(state): State<AppState>,
    query: RelayQuery,
) -> Result<Json<Vec<ResolvedDownload>>, RelayError> {
    let credential = state.credentials.select(query.credential.as_deref())?;
    let link = query.share_link()?;

    let targets = if query.file_ids.is_empty() {
        pipeline::expand(state.api.as_ref(), &link, &credential).await?
    } else {
        query.file_ids.into_iter().map(FlatFile::from_id).collect()
    };

    let results = if query.resolve {
        pipeline::resolve_many(
            state.api.as_ref(),
            &link,
            targets,
            &credential,
            state.resolve_concurrency,
        )
        .await
    } else {
        targets.into_iter().map(ResolvedDownload::unresolved).collect()
    };
    info!(
        link = %link,
        entries = results.len(),
        resolve = query.resolve,
        "served download info"
    );
    Ok(Json(results))
}

/// One file, redirected to or streamed from its resolved URL.
pub(crate) async fn download(
    State(state): State<AppState>,
    query: RelayQuery,
    headers: HeaderMap,
) -> Result<Response, RelayError> {
    let credential = state.credentials.select(query.credential.as_deref())?;
    let link = query.share_link()?;
    let file_id = query.single_file_id()?;

    let resolved = state
        .api
        .resolve_download_url(&link, file_id, &credential)
        .await?;
    let url = proxy::parse_download_url(&resolved)?;

    match state.download_mode {
        DownloadMode::Redirect => {
            info!(link = %link, file_id, "redirecting download");
            Ok((StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response())
        }
        DownloadMode::Proxy => {
            let range = RangeHeaders::from_headers(&headers);
            let download = state.proxy.fetch(url, &range).await?;
            info!(
                link = %link,
                file_id,
                status = download.status.as_u16(),
                "proxying download"
            );
            Ok(download.into_response())
        }
    }
}

/// Unknown path. Gated like the relay routes; non-GET methods get 405.
pub(crate) async fn not_found(
    State(state): State<AppState>,
    method: Method,
    query: RelayQuery,
) -> Result<(StatusCode, &'static str), RelayError> {
    auth::check_password(&state, &query)?;
    if method == Method::GET || method == Method::HEAD {
        Ok((StatusCode::NOT_FOUND, "Not Found"))
    } else {
        Ok((StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"))
    }
}
