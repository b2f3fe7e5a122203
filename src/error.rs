//! Error types for the relay pipeline.
//!
//! Every failure is scoped to a single inbound request. Variants carry the
//! context (endpoint URL, upstream status, parameter name) needed to log the
//! failure and to map it onto an HTTP response.

use thiserror::Error;

/// Errors that can occur while resolving a share link or relaying a download.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A required request parameter is absent or invalid.
    #[error("Missing \"{name}\" parameter{}", detail_suffix(.detail.as_deref()))]
    MissingParameter {
        /// The parameter name as it appears in the query string.
        name: &'static str,
        /// Optional explanation for values that are present but unusable.
        detail: Option<String>,
    },

    /// No explicit credential was supplied and the configured pool is empty.
    #[error("No Token Found")]
    NoCredentialAvailable,

    /// The shared-secret password gate rejected the request.
    #[error("Wrong Password")]
    Unauthorized,

    /// The upstream answered with a failing HTTP status.
    #[error("upstream error: HTTP {status} from {url}")]
    Upstream {
        /// The upstream URL that failed.
        url: String,
        /// The upstream HTTP status code.
        status: u16,
    },

    /// Network-level failure talking to the upstream (DNS, connect, TLS, reset).
    #[error("network error calling {url}: {source}")]
    Network {
        /// The upstream URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The upstream did not answer within the configured deadline.
    #[error("timeout calling {url}")]
    Timeout {
        /// The upstream URL that timed out.
        url: String,
    },

    /// The upstream answered 2xx with a body that is not the expected JSON shape.
    #[error("invalid response from {url}: {source}")]
    InvalidResponse {
        /// The upstream URL that produced the body.
        url: String,
        /// The decode failure.
        #[source]
        source: reqwest::Error,
    },

    /// The upstream succeeded but omitted `download_url`.
    #[error("No download_url returned for file {file_id}")]
    MissingDownloadUrl {
        /// The file id whose resolution came back empty.
        file_id: String,
    },

    /// A resolved download URL is not an absolute http(s) URL.
    #[error("refusing to relay non-http(s) download URL: {url}")]
    InvalidDownloadUrl {
        /// The rejected URL.
        url: String,
    },

    /// HTTP client construction failed.
    #[error("HTTP client construction failed: {0}")]
    Client(String),
}

fn detail_suffix(detail: Option<&str>) -> String {
    detail.map(|d| format!(": {d}")).unwrap_or_default()
}

impl RelayError {
    /// Creates a missing-parameter error.
    #[must_use]
    pub fn missing_parameter(name: &'static str) -> Self {
        Self::MissingParameter { name, detail: None }
    }

    /// Creates a missing-parameter error with an explanation.
    #[must_use]
    pub fn invalid_parameter(name: &'static str, detail: impl Into<String>) -> Self {
        Self::MissingParameter {
            name,
            detail: Some(detail.into()),
        }
    }

    /// Creates an upstream status error.
    pub fn upstream(url: impl Into<String>, status: u16) -> Self {
        Self::Upstream {
            url: url.into(),
            status,
        }
    }

    /// Classifies a reqwest send error as timeout or network failure.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a body decode error.
    pub fn invalid_response(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::InvalidResponse {
            url: url.into(),
            source,
        }
    }

    /// Creates a missing download URL error.
    pub fn missing_download_url(file_id: impl Into<String>) -> Self {
        Self::MissingDownloadUrl {
            file_id: file_id.into(),
        }
    }

    /// Returns the upstream HTTP status when the failure carried one.
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for failures the caller can correct by changing the request.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter { .. } | Self::NoCredentialAvailable | Self::Unauthorized
        )
    }
}
