//! Fetch client and engine against a mock origin.

use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server};
use netstash_client::{FetchClient, FetchConfig};
use netstash_core::engine::{FetchMode, FixedRandom};
use netstash_core::{AppConfig, CacheDb, Engine, EngineSettings, Error, Fetch, InboundRequest};
use url::Url;

fn client() -> FetchClient {
    FetchClient::new(FetchConfig { timeout: Duration::from_millis(500), ..Default::default() }).unwrap()
}

fn at(server: &mockito::ServerGuard, path: &str) -> Url {
    Url::parse(&server.url()).unwrap().join(path).unwrap()
}

#[tokio::test]
async fn test_fetch_returns_status_headers_and_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/posts")
        .with_status(200)
        .with_header("Content-Type", "application/json")
        .with_body(r#"[{"id":1}]"#)
        .create_async()
        .await;

    let response = client().fetch(&at(&server, "/api/posts"), FetchMode::Default).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 200);
    assert_eq!(response.status_text, "OK");
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert!(response.headers.iter().all(|(name, _)| name == &name.to_ascii_lowercase()));
    assert_eq!(response.body, r#"[{"id":1}]"#);
}

#[tokio::test]
async fn test_error_status_is_a_response() {
    let mut server = Server::new_async().await;
    server.mock("GET", "/missing").with_status(404).with_body("gone").create_async().await;

    let response = client().fetch(&at(&server, "/missing"), FetchMode::Default).await.unwrap();

    assert_eq!(response.status, 404);
    assert!(!response.is_ok());
    assert_eq!(response.body, "gone");
}

#[tokio::test]
async fn test_reload_sends_no_cache_headers() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/static/js/main.js")
        .match_header("cache-control", "no-cache")
        .match_header("pragma", "no-cache")
        .with_status(200)
        .with_body("js")
        .create_async()
        .await;

    let response = client().fetch(&at(&server, "/static/js/main.js"), FetchMode::Reload).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_default_mode_sends_no_cache_bypass() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/blog")
        .match_header("cache-control", Matcher::Missing)
        .with_status(200)
        .create_async()
        .await;

    client().fetch(&at(&server, "/blog"), FetchMode::Default).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_body_over_limit_is_rejected() {
    let mut server = Server::new_async().await;
    server.mock("GET", "/big").with_status(200).with_body("x".repeat(2048)).create_async().await;

    let small = FetchClient::new(FetchConfig { max_bytes: 1024, ..Default::default() }).unwrap();
    let err = small.fetch(&at(&server, "/big"), FetchMode::Default).await.unwrap_err();

    assert!(matches!(err, Error::FetchTooLarge(_)));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{addr}/")).unwrap();
    let err = client().fetch(&url, FetchMode::Default).await.unwrap_err();

    assert!(matches!(err, Error::Network(_)));
    assert!(err.is_network());
}

#[tokio::test]
async fn test_silent_origin_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let url = Url::parse(&format!("http://{addr}/")).unwrap();
    let err = client().fetch(&url, FetchMode::Default).await.unwrap_err();

    assert!(matches!(err, Error::FetchTimeout(_)));
    accept.abort();
}

#[tokio::test]
async fn test_engine_serves_api_from_cache_after_first_fetch() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/posts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;

    let config = AppConfig { origin: server.url(), ..Default::default() };
    let settings = EngineSettings::from_config(&config).unwrap();
    let db = CacheDb::open_in_memory().await.unwrap();
    let engine = Engine::builder(settings, db, Arc::new(client())).random(Arc::new(FixedRandom(1.0))).build();

    let request = InboundRequest::get(at(&server, "/api/posts"));
    let first = engine.handle_fetch(&request).await.unwrap();
    let second = engine.handle_fetch(&request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(first.body, "[]");
    assert_eq!(second.body, "[]");
    assert_eq!(second.header("stored-at"), None);
}
