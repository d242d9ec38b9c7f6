//! Integration tests for `HttpChannelSource` against a mocked gateway.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no real
//! network traffic is made.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tgwh_collector::{ChannelSource, HttpChannelSource, SourceError, DEFAULT_FLOOD_WAIT_SECS};
use tgwh_core::{normalize_channel, ChannelRef};

fn test_source(server: &MockServer) -> HttpChannelSource {
    HttpChannelSource::new(&server.uri(), 5, "tgwh-test/0.1", Some("secret".to_string()))
        .expect("failed to build test source")
}

fn channel() -> ChannelRef {
    normalize_channel("@tikvahpharma").unwrap()
}

// ---------------------------------------------------------------------------
// Channel resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolve_channel_returns_title_and_sends_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/tikvahpharma"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 77, "title": "Tikvah | Pharma"})),
        )
        .mount(&server)
        .await;

    let info = test_source(&server)
        .resolve_channel(&channel())
        .await
        .expect("resolve should succeed");
    assert_eq!(info.id, 77);
    assert_eq!(info.title, "Tikvah | Pharma");
}

#[tokio::test]
async fn forbidden_channel_is_private() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/tikvahpharma"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = test_source(&server)
        .resolve_channel(&channel())
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::ChannelPrivate { ref channel } if channel == "@tikvahpharma"));
}

#[tokio::test]
async fn missing_channel_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/tikvahpharma"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = test_source(&server)
        .resolve_channel(&channel())
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::ChannelNotFound { .. }));
}

// ---------------------------------------------------------------------------
// Message pages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_messages_passes_limit_and_offset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/tikvahpharma/messages"))
        .and(query_param("limit", "100"))
        .and(query_param("offset_id", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [
                {"id": 499, "date": "2026-03-02T09:00:00Z", "text": "Amoxicillin in stock",
                 "views": 1200, "forwards": 4,
                 "media": {"kind": "photo", "url": "/media/tikvahpharma/499"}},
                {"id": 498, "date": null, "text": null, "views": null, "forwards": null,
                 "media": null}
            ]
        })))
        .mount(&server)
        .await;

    let messages = test_source(&server)
        .fetch_messages(&channel(), 100, Some(500))
        .await
        .expect("fetch should succeed");

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, 499);
    assert!(messages[0].media.as_ref().is_some_and(|m| m.is_photo()));
    assert!(messages[1].date.is_none());
    assert!(messages[1].media.is_none());
}

#[tokio::test]
async fn too_many_requests_maps_to_flood_wait_with_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/tikvahpharma/messages"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "42"))
        .mount(&server)
        .await;

    let err = test_source(&server)
        .fetch_messages(&channel(), 10, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::FloodWait { seconds: 42 }));
}

#[tokio::test]
async fn status_420_without_retry_after_uses_default_wait() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/tikvahpharma/messages"))
        .respond_with(ResponseTemplate::new(420))
        .mount(&server)
        .await;

    let err = test_source(&server)
        .fetch_messages(&channel(), 10, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::FloodWait { seconds } if seconds == DEFAULT_FLOOD_WAIT_SECS));
}

#[tokio::test]
async fn malformed_page_is_deserialize_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/tikvahpharma/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway down</html>"))
        .mount(&server)
        .await;

    let err = test_source(&server)
        .fetch_messages(&channel(), 10, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Deserialize { .. }));
}

#[tokio::test]
async fn server_error_is_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/tikvahpharma/messages"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = test_source(&server)
        .fetch_messages(&channel(), 10, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::UnexpectedStatus { status: 502, .. }));
}

// ---------------------------------------------------------------------------
// Media download
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_media_resolves_relative_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/tikvahpharma/499"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xd8, 0xff, 0xe0]))
        .mount(&server)
        .await;

    let media = tgwh_collector::SourceMedia {
        kind: "photo".to_string(),
        url: Some("/media/tikvahpharma/499".to_string()),
    };
    let bytes = test_source(&server).download_media(&media).await.unwrap();
    assert_eq!(bytes, vec![0xff, 0xd8, 0xff, 0xe0]);
}

#[tokio::test]
async fn download_media_without_url_fails() {
    let server = MockServer::start().await;
    let media = tgwh_collector::SourceMedia {
        kind: "photo".to_string(),
        url: None,
    };
    let err = test_source(&server).download_media(&media).await.unwrap_err();
    assert!(matches!(err, SourceError::InvalidUrl { .. }));
}
