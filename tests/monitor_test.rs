//! End-to-end monitor tests: layout file + scripted STOMP server

mod common;

use std::path::PathBuf;
use std::time::Duration;

use network_monitor::{ErrorCode, MonitorConfig, NetworkMonitor};
use tokio::sync::watch;

use common::{
    passenger_event_json, plain_client, spawn_silent_server, spawn_stomp_server, StompScript,
    LOGIN, PASSCODE,
};

fn config() -> MonitorConfig {
    MonitorConfig {
        layout_file: Some(
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/network-layout.json"),
        ),
        login: LOGIN.to_string(),
        passcode: PASSCODE.to_string(),
        use_tls: false,
        max_reconnect_attempts: 0,
        reply_timeout: Duration::from_secs(2),
        ..MonitorConfig::default()
    }
}

#[tokio::test]
async fn test_monitor_applies_feed() {
    let addr = spawn_stomp_server(StompScript {
        messages: vec![
            passenger_event_json("station_000", "in"),
            passenger_event_json("station_000", "in"),
            passenger_event_json("station_002", "in"),
            passenger_event_json("station_000", "out"),
            passenger_event_json("station_999", "in"),
        ],
        ..Default::default()
    })
    .await;

    let config = config();
    let network = NetworkMonitor::load_network(&config).await.unwrap();
    let monitor = NetworkMonitor::new(config, network);
    let ws_client = plain_client(addr);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stop = async {
        while monitor.get_stats().received < 5 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        shutdown_tx.send(true).unwrap();
    };

    let (result, ()) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(monitor.run_with(&ws_client, shutdown_rx), stop) },
    )
    .await
    .expect("monitor did not stop");
    result.unwrap();

    assert_eq!(monitor.passenger_count("station_000").unwrap(), 1);
    assert_eq!(monitor.passenger_count("station_002").unwrap(), 1);
    assert_eq!(monitor.passenger_count("station_004").unwrap(), 0);

    let stats = monitor.get_stats();
    assert_eq!(stats.applied, 4);
    assert_eq!(stats.rejected, 1);
}

#[tokio::test]
async fn test_monitor_gives_up_when_unreachable() {
    let port = common::unused_port().await;
    let config = config();
    let network = NetworkMonitor::load_network(&config).await.unwrap();
    let monitor = NetworkMonitor::new(config, network);

    let ws_client =
        network_monitor::WebSocketClient::new("127.0.0.1", "/network-events", port).tls(false);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let err = monitor.run_with(&ws_client, shutdown_rx).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::WsConnectFailed);
}

#[tokio::test]
async fn test_monitor_stops_on_auth_failure() {
    let addr = spawn_stomp_server(StompScript::default()).await;
    let config = MonitorConfig {
        passcode: "wrong".to_string(),
        max_reconnect_attempts: 5,
        ..config()
    };
    let network = NetworkMonitor::load_network(&config).await.unwrap();
    let monitor = NetworkMonitor::new(config, network);

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let err = monitor
        .run_with(&plain_client(addr), shutdown_rx)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::StompAuthFailed);
    assert_eq!(monitor.get_stats().reconnects, 0);
}

#[tokio::test]
async fn test_monitor_shutdown_while_connecting() {
    let addr = spawn_silent_server().await;
    let config = config();
    let network = NetworkMonitor::load_network(&config).await.unwrap();
    let monitor = NetworkMonitor::new(config, network);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stop = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown_tx.send(true).unwrap();
    };

    // Well under the handshake timeout of the client
    let client = plain_client(addr);
    let (result, ()) = tokio::time::timeout(
        Duration::from_secs(3),
        async { tokio::join!(monitor.run_with(&client, shutdown_rx), stop) },
    )
    .await
    .expect("shutdown ignored while connecting");
    result.unwrap();
    assert_eq!(monitor.get_stats().received, 0);
}

#[tokio::test]
async fn test_monitor_reconnects_after_server_error() {
    let addr = spawn_stomp_server(StompScript {
        messages: vec![passenger_event_json("station_000", "in")],
        error_after_messages: Some("server restarting".to_string()),
        ..Default::default()
    })
    .await;

    let config = config();
    let network = NetworkMonitor::load_network(&config).await.unwrap();
    let monitor = NetworkMonitor::new(config, network);
    let ws_client = plain_client(addr);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stop = async {
        while monitor.get_stats().reconnects < 1 || monitor.get_stats().received < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        shutdown_tx.send(true).unwrap();
    };

    let (result, ()) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(monitor.run_with(&ws_client, shutdown_rx), stop) },
    )
    .await
    .expect("monitor did not resubscribe");
    result.unwrap();

    // One event per session
    assert!(monitor.passenger_count("station_000").unwrap() >= 2);
}
