//! Link resolution pipeline driving the [`ShareApi`](crate::upstream::ShareApi).
//!
//! - [`expand`] - flattens a share link's folder tree into [`FlatFile`]s
//! - [`resolve_many`] - resolves a batch of files to download URLs, tolerating
//!   per-file failures

mod batch;
mod expand;

pub use batch::{DEFAULT_RESOLVE_CONCURRENCY, ResolvedDownload, resolve_many};
pub use expand::expand;

use serde::Serialize;

/// A downloadable file with its `/`-joined path from the share root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatFile {
    /// Upstream file id.
    pub id: String,
    /// Display names from the expansion root down to the file, joined by `/`.
    /// Empty for caller-supplied ids that were never listed.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
}

impl FlatFile {
    /// Creates a listed file.
    #[must_use]
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    /// Creates a target from a caller-supplied id; no path is known.
    #[must_use]
    pub fn from_id(id: impl Into<String>) -> Self {
        Self::new(id, String::new())
    }
}
