//! Downloader tests against a local HTTP mock

use httpmock::prelude::*;
use network_monitor::providers::downloader::{download_file, parse_json_file};
use network_monitor::{ErrorCode, TransportNetwork};
use tempfile::TempDir;

const LAYOUT: &str = include_str!("data/network-layout.json");

#[tokio::test]
async fn test_download_layout() {
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("network-layout.json");

    let server = MockServer::start_async().await;
    let layout_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/network-layout.json");
            then.status(200)
                .header("Content-Type", "application/json")
                .body(LAYOUT);
        })
        .await;

    download_file(&server.url("/network-layout.json"), &destination, None)
        .await
        .unwrap();
    layout_mock.assert_async().await;

    assert_eq!(std::fs::read_to_string(&destination).unwrap(), LAYOUT);

    let parsed = parse_json_file(&destination).unwrap();
    let network = TransportNetwork::from_json(parsed).unwrap();
    assert_eq!(network.station_count(), 5);
}

#[tokio::test]
async fn test_download_follows_redirect() {
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("moved.json");

    let server = MockServer::start_async().await;
    let target = server
        .mock_async(|when, then| {
            when.method(GET).path("/new-location.json");
            then.status(200).body("{\"moved\": true}");
        })
        .await;
    let redirect = server
        .mock_async(|when, then| {
            when.method(GET).path("/old-location.json");
            then.status(301)
                .header("Location", server.url("/new-location.json"));
        })
        .await;

    download_file(&server.url("/old-location.json"), &destination, None)
        .await
        .unwrap();
    redirect.assert_async().await;
    target.assert_async().await;

    let parsed = parse_json_file(&destination).unwrap();
    assert_eq!(parsed["moved"], serde_json::json!(true));
}

#[tokio::test]
async fn test_download_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("missing.json");

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/missing.json");
            then.status(404);
        })
        .await;

    let err = download_file(&server.url("/missing.json"), &destination, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::DownloadBadStatus);
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_download_unwritable_destination() {
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("no-such-dir").join("layout.json");

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/network-layout.json");
            then.status(200).body(LAYOUT);
        })
        .await;

    let err = download_file(&server.url("/network-layout.json"), &destination, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::FileNotFound);
}

#[tokio::test]
async fn test_download_unreachable_host() {
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("layout.json");

    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = download_file(
        &format!("http://127.0.0.1:{}/network-layout.json", port),
        &destination,
        None,
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::DownloadFailed);
    assert!(err.code.is_retryable());
}

#[tokio::test]
async fn test_truncated_body_leaves_no_file() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("layout.json");

    // Announces 1000 bytes, sends 9, hangs up
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut tcp, _)) = listener.accept().await {
            let mut buf = [0u8; 1024];
            let _ = tcp.read(&mut buf).await;
            let _ = tcp
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\n{\"partial")
                .await;
            let _ = tcp.shutdown().await;
        }
    });

    let err = download_file(
        &format!("http://{}/network-layout.json", addr),
        &destination,
        None,
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::DownloadFailed);
    assert!(!destination.exists());
}
