//! Synthetic client identities presented to the upstream.
//!
//! The relay never forwards the end user's identity. The share API is only
//! served to the vendor's mobile client, and the CDN that serves resolved
//! download URLs rejects non-browser identities.

/// User-Agent sent on every share API call (list and resolve).
pub const API_USER_AGENT: &str = "okhttp/4.9.2";

/// Browser User-Agent sent on the final hop to a resolved download URL.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Identity used for the share API client.
#[must_use]
pub(crate) fn api_user_agent() -> &'static str {
    API_USER_AGENT
}

/// Identity used for the download stream client.
#[must_use]
pub(crate) fn download_user_agent() -> &'static str {
    BROWSER_USER_AGENT
}
