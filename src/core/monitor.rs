//! Network monitor
//! Loads the layout, keeps a STOMP subscription to the passenger feed alive
//! and applies every event to the network graph

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::stomp_frame::{StompFrame, StompHeader};
use crate::core::transport_network::TransportNetwork;
use crate::models::config::MonitorConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{Id, PassengerEvent};
use crate::providers::downloader::{download_file, parse_json_file};
use crate::providers::stomp_client::StompClient;
use crate::providers::websocket::{DnsResolver, Resolver, WebSocketClient};
use crate::utils::constants::{
    PASSENGERS_DESTINATION, RECONNECT_BASE_MS, RECONNECT_JITTER_PERCENT, RECONNECT_MAX_MS,
};

/// Thread-safe counters
#[derive(Default)]
struct MonitorCounters {
    received: AtomicU64,
    applied: AtomicU64,
    rejected: AtomicU64,
    reconnects: AtomicU64,
}

/// Snapshot of the monitor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    /// MESSAGE frames received
    pub received: u64,
    /// Events applied to the network
    pub applied: u64,
    /// Undecodable events or unknown stations
    pub rejected: u64,
    pub reconnects: u64,
}

/// How a STOMP session ended
enum SessionEnd {
    Disconnected,
    Shutdown,
}

pub struct NetworkMonitor {
    config: MonitorConfig,
    network: Arc<RwLock<TransportNetwork>>,
    stats: Arc<MonitorCounters>,
}

impl NetworkMonitor {
    pub fn new(config: MonitorConfig, network: TransportNetwork) -> Self {
        Self {
            config,
            network: Arc::new(RwLock::new(network)),
            stats: Arc::new(MonitorCounters::default()),
        }
    }

    /// Read the layout from the configured file, or download it first
    pub async fn load_network(config: &MonitorConfig) -> AppResult<TransportNetwork> {
        let layout = match &config.layout_file {
            Some(path) => {
                info!("🗺️ Loading network layout from {}", path.display());
                parse_json_file(path)?
            }
            None => {
                let scratch: PathBuf =
                    std::env::temp_dir().join(format!("network-layout-{}.json", Uuid::new_v4()));
                download_file(&config.layout_url, &scratch, config.ca_cert.as_deref()).await?;
                let parsed = parse_json_file(&scratch);
                if let Err(e) = std::fs::remove_file(&scratch) {
                    debug!("Could not remove {}: {}", scratch.display(), e);
                }
                parsed?
            }
        };
        TransportNetwork::from_json(layout)
    }

    /// WebSocket client for the configured event server
    pub fn ws_client(&self) -> WebSocketClient<DnsResolver> {
        let client = WebSocketClient::new(
            self.config.server_host.as_str(),
            self.config.events_endpoint.as_str(),
            self.config.server_port,
        )
        .tls(self.config.use_tls);
        match &self.config.ca_cert {
            Some(path) => client.ca_cert(path.clone()),
            None => client,
        }
    }

    /// Run against the configured server until `shutdown` flips to true or
    /// reconnection gives up
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> AppResult<()> {
        let ws_client = self.ws_client();
        self.run_with(&ws_client, shutdown).await
    }

    /// Connect, subscribe, consume. Reconnects with exponential backoff;
    /// a session that got as far as subscribing resets the attempt count.
    pub async fn run_with<R: Resolver>(
        &self,
        ws_client: &WebSocketClient<R>,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<()> {
        self.config.validate()?;
        info!("🚀 Starting network monitor on {}", ws_client.url());

        let mut attempt: u32 = 0;
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            match self.run_session(ws_client, &mut shutdown).await {
                Ok(SessionEnd::Shutdown) => return Ok(()),
                Ok(SessionEnd::Disconnected) => {
                    attempt = 0;
                    warn!("🔌 Event feed disconnected, reconnecting");
                }
                Err(e) if e.code.is_retryable() => {
                    if attempt >= self.config.max_reconnect_attempts {
                        error!(
                            "❌ [{}] Giving up after {} reconnection attempts: {}",
                            e.code_str(),
                            attempt,
                            e
                        );
                        return Err(e);
                    }
                    attempt += 1;
                    warn!(
                        "⚠️ [{}] {} (attempt {}/{})",
                        e.code_str(),
                        e,
                        attempt,
                        self.config.max_reconnect_attempts
                    );
                }
                Err(e) => {
                    error!("❌ [{}] {}", e.code_str(), e);
                    return Err(e);
                }
            }

            self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
            let delay = reconnect_delay(attempt);
            debug!("⏳ Reconnecting in {:?}", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return Ok(()),
            }
        }
    }

    async fn run_session<R: Resolver>(
        &self,
        ws_client: &WebSocketClient<R>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> AppResult<SessionEnd> {
        let setup = async {
            let mut client = StompClient::connect_with_timeout(
                ws_client,
                &self.config.login,
                &self.config.passcode,
                self.config.reply_timeout,
            )
            .await?;
            client.subscribe(PASSENGERS_DESTINATION).await?;
            Ok::<_, AppError>(client)
        };
        let mut client = tokio::select! {
            client = setup => client?,
            _ = shutdown.changed() => {
                info!("🛑 Shutdown requested while connecting");
                return Ok(SessionEnd::Shutdown);
            }
        };
        info!("🔍 Listening for passenger events...");

        loop {
            let next = tokio::select! {
                message = client.next_message() => Some(message),
                _ = shutdown.changed() => None,
            };

            match next {
                Some(message) => match message {
                    Ok(Some(frame)) => {
                        self.apply_message(&frame);
                    }
                    Ok(None) => return Ok(SessionEnd::Disconnected),
                    // An ERROR frame after the subscription is up ends the
                    // session; credentials were already accepted.
                    Err(e) if e.code == ErrorCode::StompServerError => {
                        warn!("⚠️ [{}] {}", e.code_str(), e);
                        return Ok(SessionEnd::Disconnected);
                    }
                    Err(e) => return Err(e),
                },
                None => {
                    info!("🛑 Closing STOMP session");
                    if let Err(e) = client.close().await {
                        warn!("Close failed: {}", e);
                    }
                    return Ok(SessionEnd::Shutdown);
                }
            }
        }
    }

    /// Apply one MESSAGE frame. Returns true when the network changed.
    pub fn apply_message(&self, frame: &StompFrame) -> bool {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let event = match PassengerEvent::from_json(frame.body()) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    "[{}] message {}: {}",
                    e.code_str(),
                    frame.header(StompHeader::MessageId),
                    e
                );
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        let recorded = match self.network.write() {
            Ok(mut network) => network.record_passenger_event(&event),
            Err(poisoned) => poisoned.into_inner().record_passenger_event(&event),
        };

        if recorded {
            debug!("🚉 {} {}", event.kind.as_str(), event.station_id);
            self.stats.applied.fetch_add(1, Ordering::Relaxed);
        } else {
            let e = AppError::unknown_station(&event.station_id);
            warn!("[{}] {}", e.code_str(), e);
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
        }
        recorded
    }

    /// Passenger count at one station
    pub fn passenger_count(&self, station_id: &str) -> AppResult<i64> {
        self.network
            .read()
            .map_err(|_| AppError::new(ErrorCode::Unknown, "Network lock poisoned"))?
            .passenger_count(station_id)
    }

    /// (station id, name, count) for every station, sorted by id
    pub fn passenger_counts(&self) -> Vec<(Id, String, i64)> {
        match self.network.read() {
            Ok(network) => network.passenger_counts(),
            Err(poisoned) => poisoned.into_inner().passenger_counts(),
        }
    }

    /// Shared handle to the network graph
    pub fn network(&self) -> Arc<RwLock<TransportNetwork>> {
        self.network.clone()
    }

    pub fn get_stats(&self) -> MonitorStats {
        MonitorStats {
            received: self.stats.received.load(Ordering::Relaxed),
            applied: self.stats.applied.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            reconnects: self.stats.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Exponential backoff (base * 2^attempt, capped) with +/- jitter
pub fn reconnect_delay(attempt: u32) -> Duration {
    let exp = RECONNECT_BASE_MS.saturating_mul(1u64 << attempt.min(16));
    let capped = exp.min(RECONNECT_MAX_MS);
    let jitter_range = (capped * RECONNECT_JITTER_PERCENT / 100) as i64;
    let jitter: i64 = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
    Duration::from_millis((capped as i64 + jitter).max(100) as u64)
}
