//! Batch download URL resolution with per-file failure isolation.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::FlatFile;
use crate::credential::Credential;
use crate::link::ShareLink;
use crate::upstream::ShareApi;

/// Default number of resolve calls in flight per batch.
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 16;

/// Outcome of resolving one target.
///
/// `url` is absent when resolution was not requested or failed; in the latter
/// case `error` carries the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDownload {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(rename = "downloadUrl", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolvedDownload {
    /// Wraps a target without resolving it.
    #[must_use]
    pub fn unresolved(target: FlatFile) -> Self {
        Self {
            id: target.id,
            path: target.path,
            url: None,
            error: None,
        }
    }
}

/// Resolves every target independently, at most `concurrency` at a time.
///
/// Results are returned in target order. A failing target yields an entry
/// without `url`; it never aborts the batch.
#[instrument(skip(api, link, targets, credential), fields(link = %link, targets = targets.len()))]
pub async fn resolve_many(
    api: &dyn ShareApi,
    link: &ShareLink,
    targets: Vec<FlatFile>,
    credential: &Credential,
    concurrency: usize,
) -> Vec<ResolvedDownload> {
    let results: Vec<ResolvedDownload> = stream::iter(targets)
        .map(|target| async move {
            match api.resolve_download_url(link, &target.id, credential).await {
                Ok(url) => ResolvedDownload {
                    url: Some(url),
                    ..ResolvedDownload::unresolved(target)
                },
                Err(e) => {
                    warn!(file_id = %target.id, error = %e, "failed to resolve download URL");
                    ResolvedDownload {
                        error: Some(e.to_string()),
                        ..ResolvedDownload::unresolved(target)
                    }
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let failed = results.iter().filter(|r| r.url.is_none()).count();
    debug!(resolved = results.len() - failed, failed, "batch resolution finished");
    results
}
