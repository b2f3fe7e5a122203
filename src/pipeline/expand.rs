//! Recursive listing expansion.
//!
//! Sibling folders are listed concurrently. Results are gathered with an
//! ordered fan-in, so the output is depth-first in listing order regardless
//! of which listing call finishes first.
//!
//! There is no cycle detection. The share API returns a containment tree; a
//! folder that lists itself would recurse without bound.

use futures_util::future::{self, BoxFuture, FutureExt};
use tracing::{debug, instrument};

use super::FlatFile;
use crate::credential::Credential;
use crate::error::RelayError;
use crate::link::ShareLink;
use crate::upstream::ShareApi;

/// Flattens the folder tree behind `link` into its files.
///
/// # Errors
///
/// Any failing listing call aborts the whole expansion; no partial listing is
/// returned.
#[instrument(skip(api, link, credential), fields(link = %link))]
pub async fn expand(
    api: &dyn ShareApi,
    link: &ShareLink,
    credential: &Credential,
) -> Result<Vec<FlatFile>, RelayError> {
    let files = expand_container(api, link, credential, None, String::new()).await?;
    debug!(files = files.len(), "expanded share link");
    Ok(files)
}

fn expand_container<'a>(
    api: &'a dyn ShareApi,
    link: &'a ShareLink,
    credential: &'a Credential,
    container_id: Option<String>,
    prefix: String,
) -> BoxFuture<'a, Result<Vec<FlatFile>, RelayError>> {
    async move {
        let entries = api
            .list_directory(link, credential, container_id.as_deref())
            .await?;

        let branches = entries.into_iter().map(|entry| {
            let path = join_path(&prefix, &entry.display_name);
            if entry.is_container {
                expand_container(api, link, credential, Some(entry.id), path)
            } else {
                future::ready(Ok(vec![FlatFile::new(entry.id, path)])).boxed()
            }
        });

        let nested = future::try_join_all(branches).await?;
        Ok(nested.into_iter().flatten().collect())
    }
    .boxed()
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
