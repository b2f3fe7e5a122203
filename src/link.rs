//! Share link normalization.
//!
//! Users paste share links with or without the `ctfile://` scheme. The share
//! API only accepts the scheme-prefixed form.

use std::fmt;

use serde::Serialize;

/// Scheme prefix required by the share API.
pub const SHARE_LINK_SCHEME: &str = "ctfile://";

/// A share link in the canonical, scheme-prefixed form.
///
/// Constructed only through [`ShareLink::normalize`], so every value held by
/// the pipeline already carries [`SHARE_LINK_SCHEME`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ShareLink(String);

impl ShareLink {
    /// Canonicalizes a raw share link.
    ///
    /// Returns the input unchanged when it already starts with the scheme,
    /// otherwise prepends it. Idempotent. Callers reject empty input before
    /// normalizing.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        if raw.starts_with(SHARE_LINK_SCHEME) {
            Self(raw.to_string())
        } else {
            Self(format!("{SHARE_LINK_SCHEME}{raw}"))
        }
    }

    /// Returns the canonical link string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShareLink {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
