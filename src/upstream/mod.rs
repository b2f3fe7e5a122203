//! Authenticated channel to the CTFile share API.
//!
//! # Architecture
//!
//! - [`ShareApi`] - Async trait the pipeline drives; the seam for test doubles
//! - [`UpstreamClient`] - reqwest implementation against the fixed upstream host
//! - [`ListingEntry`] - One decoded row of a directory listing
//!
//! Every call issues exactly one upstream request. Nothing is retried: an
//! upstream failure propagates to the caller immediately.

mod client;
pub(crate) mod http_client;
mod types;

pub use client::{DEFAULT_UPSTREAM_BASE_URL, UpstreamClient};

use async_trait::async_trait;
use serde::Serialize;

use crate::credential::Credential;
use crate::error::RelayError;
use crate::link::ShareLink;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    /// File or folder id, used as `folder_id`/`file_id` in follow-up calls.
    pub id: String,
    /// Name shown to users; becomes one path segment.
    pub display_name: String,
    /// True for folders, which trigger recursive expansion.
    pub is_container: bool,
}

impl ListingEntry {
    /// Creates a leaf (file) entry.
    #[must_use]
    pub fn file(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            is_container: false,
        }
    }

    /// Creates a container (folder) entry.
    #[must_use]
    pub fn folder(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            is_container: true,
        }
    }
}

/// Operations the relay needs from the share API.
///
/// # Object Safety
///
/// Uses `async_trait` so handlers can hold an `Arc<dyn ShareApi>`.
#[async_trait]
pub trait ShareApi: Send + Sync {
    /// Lists one folder of a share link. `container_id` of `None` lists the root.
    async fn list_directory(
        &self,
        link: &ShareLink,
        credential: &Credential,
        container_id: Option<&str>,
    ) -> Result<Vec<ListingEntry>, RelayError>;

    /// Resolves a file id to its direct, time-limited download URL.
    async fn resolve_download_url(
        &self,
        link: &ShareLink,
        file_id: &str,
        credential: &Credential,
    ) -> Result<String, RelayError>;

    /// Returns the root listing as the upstream JSON document.
    ///
    /// The default rebuilds a `results` document from [`list_directory`](Self::list_directory);
    /// HTTP implementations return the body untouched.
    async fn list_root_raw(
        &self,
        link: &ShareLink,
        credential: &Credential,
    ) -> Result<serde_json::Value, RelayError> {
        let entries = self.list_directory(link, credential, None).await?;
        let results: Vec<serde_json::Value> = entries
            .into_iter()
            .map(|entry| {
                serde_json::json!({
                    "key": entry.id,
                    "name": entry.display_name,
                    "is_dir": entry.is_container,
                })
            })
            .collect();
        Ok(serde_json::json!({ "results": results }))
    }
}
