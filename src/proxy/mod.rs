//! Range-preserving download relay.
//!
//! Fetches a resolved download URL with a browser identity and hands back the
//! upstream status, the allow-listed headers and the body as a stream. The
//! body is never buffered; dropping the stream drops the upstream connection.
//!
//! Only transport failures and `5xx` answers are errors. Every other status
//! (`206`, `304`, `416`, ...) is relayed to the caller unchanged.

mod headers;

pub use headers::{FORWARDED_RESPONSE_HEADERS, RangeHeaders, filter_response_headers};

use std::time::Duration;

use axum::body::Bytes;
use futures_util::Stream;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use crate::error::RelayError;
use crate::upstream::http_client::{ClientPolicy, build_http_client};
use crate::user_agent;

/// HTTP client for the final hop to the download origin.
#[derive(Debug, Clone)]
pub struct StreamProxy {
    client: Client,
    response_timeout: Duration,
}

impl StreamProxy {
    /// Creates a proxy client.
    ///
    /// `response_timeout` bounds the wait for response headers; `read_timeout`
    /// bounds each idle gap while streaming the body. There is no total
    /// deadline, so large transfers are not cut off.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Client`] if the HTTP client cannot be built.
    pub fn new(
        connect_timeout: Duration,
        response_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, RelayError> {
        let client = build_http_client(
            "download-proxy",
            ClientPolicy {
                user_agent: user_agent::download_user_agent(),
                connect_timeout,
                total_timeout: None,
                read_timeout: Some(read_timeout),
                decompress: false,
            },
        )?;
        Ok(Self {
            client,
            response_timeout,
        })
    }

    /// Opens `url`, forwarding the caller's `Range`/`If-Range` headers.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Network`] / [`RelayError::Timeout`] on transport failure
    /// - [`RelayError::Upstream`] when the origin answers `5xx`
    #[instrument(
        skip(self, url, range),
        fields(host = url.host_str().unwrap_or_default(), ranged = range.range.is_some())
    )]
    pub async fn fetch(
        &self,
        url: Url,
        range: &RangeHeaders,
    ) -> Result<ProxiedDownload, RelayError> {
        let target = url.to_string();
        let request = range.apply(self.client.get(url));
        let response = tokio::time::timeout(self.response_timeout, request.send())
            .await
            .map_err(|_| RelayError::timeout(&target))?
            .map_err(|e| RelayError::transport(&target, e))?;

        let status = response.status();
        if status.is_server_error() {
            debug!(status = status.as_u16(), "download origin failed");
            return Err(RelayError::upstream(target, status.as_u16()));
        }

        let headers = filter_response_headers(response.headers());
        debug!(
            status = status.as_u16(),
            forwarded_headers = headers.len(),
            "download origin answered"
        );
        Ok(ProxiedDownload {
            status,
            headers,
            response,
        })
    }
}

/// Parses a resolved download URL, accepting only absolute http(s) URLs.
///
/// # Errors
///
/// Returns [`RelayError::InvalidDownloadUrl`] for anything else.
pub fn parse_download_url(raw: &str) -> Result<Url, RelayError> {
    match Url::parse(raw.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        _ => Err(RelayError::InvalidDownloadUrl {
            url: raw.to_string(),
        }),
    }
}

/// An open download ready to be relayed.
#[derive(Debug)]
pub struct ProxiedDownload {
    /// Upstream status, relayed unchanged.
    pub status: StatusCode,
    /// Allow-listed upstream headers.
    pub headers: HeaderMap,
    response: reqwest::Response,
}

impl ProxiedDownload {
    /// Consumes the download into its body stream.
    pub fn into_body_stream(self) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send {
        self.response.bytes_stream()
    }
}
