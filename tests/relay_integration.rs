//! End-to-end tests: relay router against a simulated share API and CDN.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use ctrelay_core::{
    AppState, DownloadMode, RelayConfig, StreamProxy, TokenPool, UpstreamClient, router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::matchers::{body_json, body_partial_json, header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Share `abc123`: root has `readme.txt` and folder `Season 1`, which holds
/// `e01.mkv` and folder `subs` with `e01.srt`. Files f1 and f2 resolve to the
/// mock CDN; every other id is unknown upstream (wiremock answers 404).
async fn mount_share(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/p2/browser/file/list"))
        .and(body_json(serde_json::json!({
            "xtlink": "ctfile://abc123",
            "token": "pool-tok",
            "reload": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "results": [
                {"key": "f1", "name": "readme.txt", "icon": "txt"},
                {"key": "d10", "name": "Season 1", "icon": "folder"}
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/p2/browser/file/list"))
        .and(body_partial_json(serde_json::json!({"folder_id": "d10"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {"key": "f2", "name": "e01.mkv"},
                {"key": "d11", "name": "subs", "is_dir": true}
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/p2/browser/file/list"))
        .and(body_partial_json(serde_json::json!({"folder_id": "d11"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{"key": "f3", "name": "e01.srt"}]
        })))
        .mount(server)
        .await;

    for file_id in ["f1", "f2"] {
        Mock::given(method("POST"))
            .and(path("/p2/browser/file/fetch_url"))
            .and(body_partial_json(serde_json::json!({"file_id": file_id})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "download_url": format!("{}/cdn/{file_id}.bin", server.uri())
            })))
            .mount(server)
            .await;
    }
}

fn relay(server: &MockServer, mode: DownloadMode) -> Router {
    let config = RelayConfig {
        upstream_base_url: server.uri(),
        tokens: vec!["pool-tok".to_string()],
        download_mode: mode,
        ..RelayConfig::default()
    };
    let api = UpstreamClient::new(
        config.upstream_base_url.clone(),
        Duration::from_secs(5),
        Duration::from_secs(5),
    )
    .unwrap();
    let proxy = StreamProxy::new(
        Duration::from_secs(5),
        Duration::from_secs(5),
        Duration::from_secs(5),
    )
    .unwrap();
    let state = AppState::new(
        TokenPool::new(config.tokens.iter().cloned()),
        Arc::new(api),
        Arc::new(proxy),
        &config,
    );
    router(state)
}

async fn call(app: Router, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, HeaderMap, Vec<u8>) {
    let mut request = Request::builder().uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = app
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_list_returns_recursively_joined_paths() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_share(&server).await;

    let (status, _, body) = call(relay(&server, DownloadMode::Redirect), "/list?xtlink=abc123", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json(&body),
        serde_json::json!([
            {"id": "f1", "path": "readme.txt"},
            {"id": "f2", "path": "Season 1/e01.mkv"},
            {"id": "f3", "path": "Season 1/subs/e01.srt"}
        ])
    );
}

#[tokio::test]
async fn test_download_info_single_explicit_id_resolves() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_share(&server).await;

    let (status, _, body) = call(
        relay(&server, DownloadMode::Redirect),
        "/download_info?xtlink=abc123&file_id=f1&download=true",
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = json(&body);
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], "f1");
    let url = entries[0]["downloadUrl"].as_str().unwrap();
    assert!(!url.is_empty());
    assert!(url.ends_with("/cdn/f1.bin"), "{url}");
}

#[tokio::test]
async fn test_download_info_unknown_id_has_no_url_and_request_succeeds() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_share(&server).await;

    let (status, _, body) = call(
        relay(&server, DownloadMode::Redirect),
        "/download_info?xtlink=abc123&file_id=does-not-exist&download=true",
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = json(&body);
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], "does-not-exist");
    assert!(entries[0].get("downloadUrl").is_none());
}

#[tokio::test]
async fn test_download_info_full_listing_with_one_failure() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_share(&server).await;

    let (status, _, body) = call(
        relay(&server, DownloadMode::Redirect),
        "/download_info?xtlink=ctfile://abc123&resolve=true",
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = json(&body);
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    let resolved = entries
        .iter()
        .filter(|entry| entry.get("downloadUrl").is_some())
        .count();
    assert_eq!(resolved, 2);
    assert_eq!(entries[2]["path"], "Season 1/subs/e01.srt");
    assert!(entries[2].get("downloadUrl").is_none());
}

#[tokio::test]
async fn test_upstream_list_failure_is_bad_gateway() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/p2/browser/file/list"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (status, headers, body) = call(relay(&server, DownloadMode::Redirect), "/list?xtlink=abc123", &[]).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(String::from_utf8(body).unwrap(), "upstream error: HTTP 500");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_download_redirect_mode() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_share(&server).await;

    let (status, headers, _) = call(
        relay(&server, DownloadMode::Redirect),
        "/download?xtlink=abc123&file_id=f2",
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::FOUND);
    let location = headers[header::LOCATION].to_str().unwrap();
    assert_eq!(location, format!("{}/cdn/f2.bin", server.uri()));
}

#[tokio::test]
async fn test_download_proxy_mode_streams_partial_content() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_share(&server).await;
    Mock::given(method("GET"))
        .and(path("/cdn/f1.bin"))
        .and(header_matcher("range", "bytes=0-4"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 0-4/11")
                .insert_header("accept-ranges", "bytes")
                .insert_header("x-cdn-node", "edge-7")
                .set_body_raw(b"hello".to_vec(), "application/octet-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (status, headers, body) = call(
        relay(&server, DownloadMode::Proxy),
        "/download?xtlink=abc123&file_id=f1",
        &[("range", "bytes=0-4")],
    )
    .await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body, b"hello");
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 0-4/11");
    assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
    assert!(headers.get("x-cdn-node").is_none());
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
