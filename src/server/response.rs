//! Mapping of relay outcomes onto HTTP responses.

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};

use crate::error::RelayError;
use crate::proxy::ProxiedDownload;

impl RelayError {
    /// HTTP status reported to the caller.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingParameter { .. } | Self::NoCredentialAvailable => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream { .. }
            | Self::Network { .. }
            | Self::InvalidResponse { .. }
            | Self::MissingDownloadUrl { .. }
            | Self::InvalidDownloadUrl { .. } => StatusCode::BAD_GATEWAY,
            Self::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text body. Upstream URLs stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::Upstream { status, .. } => format!("upstream error: HTTP {status}"),
            Self::Network { .. } => "upstream unreachable".to_string(),
            Self::Timeout { .. } => "upstream timeout".to_string(),
            Self::InvalidResponse { .. } => "invalid upstream response".to_string(),
            Self::MissingDownloadUrl { .. } => "No download_url returned".to_string(),
            Self::InvalidDownloadUrl { .. } => "invalid download_url returned".to_string(),
            Self::Client(_) => "Internal Server Error".to_string(),
            Self::MissingParameter { .. } | Self::NoCredentialAvailable | Self::Unauthorized => {
                self.to_string()
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_caller_error() {
            debug!(error = %self, "rejected request");
        } else if matches!(self, Self::Client(_)) {
            error!(error = %self, "relay failure");
        } else {
            warn!(error = %self, "upstream failure");
        }
        (status, self.public_message()).into_response()
    }
}

impl IntoResponse for ProxiedDownload {
    fn into_response(mut self) -> Response {
        let status = self.status;
        let headers = std::mem::take(&mut self.headers);
        let mut response = Response::new(Body::from_stream(self.into_body_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}
