//! reqwest-backed share API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::http_client::{ClientPolicy, build_http_client};
use super::types::{FetchUrlRequest, FetchUrlResponse, ListRequest, ListResponse};
use super::{ListingEntry, ShareApi};
use crate::credential::Credential;
use crate::error::RelayError;
use crate::link::ShareLink;
use crate::user_agent;

/// Default share API host.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://rest.ctfile.com";

const LIST_ENDPOINT: &str = "/p2/browser/file/list";
const FETCH_URL_ENDPOINT: &str = "/p2/browser/file/fetch_url";

/// Share API client.
///
/// Created once at startup and shared by all requests; it holds no
/// per-request state. The credential travels with each call.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: String,
}

impl UpstreamClient {
    /// Creates a client for `base_url` with explicit deadlines.
    ///
    /// `request_timeout` bounds each call end to end.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Client`] if the base URL is not an absolute
    /// http(s) URL or the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, RelayError> {
        let base_url = base_url.into();
        let parsed = Url::parse(&base_url)
            .map_err(|e| RelayError::Client(format!("invalid upstream base URL {base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RelayError::Client(format!(
                "upstream base URL must be http(s): {base_url}"
            )));
        }

        let client = build_http_client(
            "share-api",
            ClientPolicy {
                user_agent: user_agent::api_user_agent(),
                connect_timeout,
                total_timeout: Some(request_timeout),
                read_timeout: None,
                decompress: true,
            },
        )?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the configured upstream base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, RelayError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{endpoint}", self.base_url);
        debug!(api_url = %url, "calling share API");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::transport(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), api_url = %url, "share API error");
            return Err(RelayError::upstream(url, status.as_u16()));
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                RelayError::timeout(&url)
            } else {
                RelayError::invalid_response(&url, e)
            }
        })
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ShareApi for UpstreamClient {
    #[instrument(skip(self, link, credential), fields(link = %link))]
    async fn list_directory(
        &self,
        link: &ShareLink,
        credential: &Credential,
        container_id: Option<&str>,
    ) -> Result<Vec<ListingEntry>, RelayError> {
        let body = ListRequest {
            xtlink: link.as_str(),
            token: credential.expose(),
            reload: false,
            folder_id: container_id,
        };
        let response: ListResponse = self.post(LIST_ENDPOINT, &body).await?;
        let entries: Vec<ListingEntry> = response.results.into_iter().map(Into::into).collect();
        debug!(entries = entries.len(), "listed folder");
        Ok(entries)
    }

    #[instrument(skip(self, link, credential), fields(link = %link))]
    async fn resolve_download_url(
        &self,
        link: &ShareLink,
        file_id: &str,
        credential: &Credential,
    ) -> Result<String, RelayError> {
        let body = FetchUrlRequest {
            xtlink: link.as_str(),
            file_id,
            token: credential.expose(),
        };
        let response: FetchUrlResponse = self.post(FETCH_URL_ENDPOINT, &body).await?;
        response
            .download_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| RelayError::missing_download_url(file_id))
    }

    #[instrument(skip(self, link, credential), fields(link = %link))]
    async fn list_root_raw(
        &self,
        link: &ShareLink,
        credential: &Credential,
    ) -> Result<serde_json::Value, RelayError> {
        let body = ListRequest {
            xtlink: link.as_str(),
            token: credential.expose(),
            reload: false,
            folder_id: None,
        };
        self.post(LIST_ENDPOINT, &body).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn client_for(base_url: &str) -> UpstreamClient {
        UpstreamClient::new(base_url, Duration::from_secs(5), Duration::from_secs(5)).unwrap()
    }

    fn link() -> ShareLink {
        ShareLink::normalize("abc123")
    }

    #[test]
    fn test_new_rejects_non_http_base_url() {
        let err = UpstreamClient::new(
            "ftp://rest.ctfile.com",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, RelayError::Client(_)));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = client_for("https://rest.ctfile.com/");
        assert_eq!(client.base_url(), "https://rest.ctfile.com");
    }

    #[tokio::test]
    async fn test_list_directory_posts_root_listing_body() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("POST"))
            .and(path("/p2/browser/file/list"))
            .and(header("user-agent", "okhttp/4.9.2"))
            .and(body_json(serde_json::json!({
                "xtlink": "ctfile://abc123",
                "token": "tok",
                "reload": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"key": "d1", "name": "docs", "icon": "folder"},
                    {"key": "f1", "name": "a.txt"}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let entries = client
            .list_directory(&link(), &Credential::new("tok"), None)
            .await
            .unwrap();

        assert_eq!(
            entries,
            vec![ListingEntry::folder("d1", "docs"), ListingEntry::file("f1", "a.txt")]
        );
    }

    #[tokio::test]
    async fn test_list_directory_sends_folder_id() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("POST"))
            .and(path("/p2/browser/file/list"))
            .and(body_partial_json(serde_json::json!({"folder_id": "d42"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let entries = client
            .list_directory(&link(), &Credential::new("tok"), Some("d42"))
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_list_directory_non_success_status_is_upstream_error() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("POST"))
            .and(path("/p2/browser/file/list"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let err = client
            .list_directory(&link(), &Credential::new("tok"), None)
            .await
            .unwrap_err();
        assert_eq!(err.upstream_status(), Some(503));
    }

    #[tokio::test]
    async fn test_list_directory_garbage_body_is_invalid_response() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("POST"))
            .and(path("/p2/browser/file/list"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let err = client
            .list_directory(&link(), &Credential::new("tok"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidResponse { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_resolve_download_url_returns_url() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("POST"))
            .and(path("/p2/browser/file/fetch_url"))
            .and(body_json(serde_json::json!({
                "xtlink": "ctfile://abc123",
                "file_id": "f1",
                "token": "tok"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "download_url": "https://cdn.example.com/f1?sig=1"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let url = client
            .resolve_download_url(&link(), "f1", &Credential::new("tok"))
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/f1?sig=1");
    }

    #[tokio::test]
    async fn test_resolve_download_url_missing_field() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("POST"))
            .and(path("/p2/browser/file/fetch_url"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"download_url": ""})),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let err = client
            .resolve_download_url(&link(), "f1", &Credential::new("tok"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, RelayError::MissingDownloadUrl { ref file_id } if file_id == "f1"),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_list_root_raw_returns_body_untouched() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        let body = serde_json::json!({
            "code": 200,
            "folder_name": "share",
            "results": [{"key": "f1", "name": "a.txt", "size": 3}]
        });
        Mock::given(method("POST"))
            .and(path("/p2/browser/file/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let raw = client
            .list_root_raw(&link(), &Credential::new("tok"))
            .await
            .unwrap();
        assert_eq!(raw, body);
    }

    #[tokio::test]
    async fn test_slow_upstream_hits_request_timeout() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("POST"))
            .and(path("/p2/browser/file/fetch_url"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"download_url": "https://cdn.example.com/f1"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let client = UpstreamClient::new(
            mock_server.uri(),
            Duration::from_secs(1),
            Duration::from_millis(200),
        )
        .unwrap();
        let err = client
            .resolve_download_url(&link(), "f1", &Credential::new("tok"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Timeout { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_network_error() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let client = client_for("http://127.0.0.1:9");
        let err = client
            .list_directory(&link(), &Credential::new("tok"), None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, RelayError::Network { .. } | RelayError::Timeout { .. }),
            "got {err:?}"
        );
    }
}
