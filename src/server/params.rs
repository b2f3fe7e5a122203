//! Query-string extraction shared by every relay route.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;

use crate::error::RelayError;
use crate::link::ShareLink;

/// Parsed relay query string.
///
/// `file_id` may repeat and is kept verbatim (empty values are skipped);
/// every other key keeps its first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RelayQuery {
    pub xtlink: Option<String>,
    pub file_ids: Vec<String>,
    /// `download=true` (or `resolve=true`) asks for download URLs.
    pub resolve: bool,
    /// Shared secret checked by the password gate.
    pub password: Option<String>,
    /// Explicit upstream token overriding the pool.
    pub credential: Option<String>,
}

impl RelayQuery {
    pub(crate) fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "xtlink" => {
                    query.xtlink.get_or_insert(value);
                }
                "file_id" => {
                    if !value.is_empty() {
                        query.file_ids.push(value);
                    }
                }
                "download" | "resolve" => query.resolve |= is_truthy(&value),
                "token" => {
                    query.password.get_or_insert(value);
                }
                "credential" => {
                    query.credential.get_or_insert(value);
                }
                _ => {}
            }
        }
        query
    }

    /// Normalized share link from `xtlink`.
    pub(crate) fn share_link(&self) -> Result<ShareLink, RelayError> {
        match self.xtlink.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Ok(ShareLink::normalize(raw)),
            _ => Err(RelayError::missing_parameter("xtlink")),
        }
    }

    /// The one `file_id` a single-file route operates on.
    pub(crate) fn single_file_id(&self) -> Result<&str, RelayError> {
        match self.file_ids.as_slice() {
            [id] => Ok(id.as_str()),
            [] => Err(RelayError::missing_parameter("file_id")),
            _ => Err(RelayError::invalid_parameter(
                "file_id",
                "exactly one value is required",
            )),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

impl<S> FromRequestParts<S> for RelayQuery
where
    S: Send + Sync,
{
    type Rejection = RelayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|e| RelayError::invalid_parameter("query", e.body_text()))?;
        Ok(Self::from_pairs(pairs))
    }
}
