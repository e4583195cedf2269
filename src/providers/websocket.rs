//! WebSocket Client Module
//!
//! Text-message WebSocket client, TLS by default.
//!
//! Connection stages (each fails with its own error code):
//! 1. Resolve host name -> `WS_RESOLVE_FAILED`
//! 2. TCP connect, first reachable address, with timeout -> `WS_CONNECT_FAILED`
//! 3. TLS handshake (CA bundle optional) -> `WS_TLS_FAILED`
//! 4. WebSocket upgrade on the endpoint -> `WS_HANDSHAKE_FAILED`
//!
//! TCP connect and the TLS + upgrade handshake each get `connect_timeout`.
//!
//! After the upgrade a reader task forwards incoming text messages to the
//! session over a channel and reports the disconnect exactly once.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{WS_CONNECT_TIMEOUT_SECS, WS_EVENT_CHANNEL_SIZE};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================
// RESOLVER
// ============================================

/// Turns a host name into socket addresses
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> AppResult<Vec<SocketAddr>>;
}

/// System DNS resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, host: &str, port: u16) -> AppResult<Vec<SocketAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
            AppError::with_source(
                ErrorCode::WsResolveFailed,
                format!("Cannot resolve {}:{}", host, port),
                e,
            )
        })?;
        Ok(addrs.collect())
    }
}

// ============================================
// EVENTS
// ============================================

/// What the reader task reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsEvent {
    /// A text message from the server
    Message(String),
    /// The connection is gone, with the close reason or error if any
    Disconnected(Option<String>),
}

// ============================================
// CLIENT
// ============================================

/// WebSocket client configuration. `connect` may be called repeatedly;
/// every call opens an independent session.
#[derive(Debug, Clone)]
pub struct WebSocketClient<R: Resolver = DnsResolver> {
    host: String,
    endpoint: String,
    port: u16,
    tls: bool,
    ca_cert: Option<PathBuf>,
    connect_timeout: Duration,
    resolver: R,
}

impl WebSocketClient<DnsResolver> {
    pub fn new(host: impl Into<String>, endpoint: impl Into<String>, port: u16) -> Self {
        Self::with_resolver(host, endpoint, port, DnsResolver)
    }
}

impl<R: Resolver> WebSocketClient<R> {
    pub fn with_resolver(
        host: impl Into<String>,
        endpoint: impl Into<String>,
        port: u16,
        resolver: R,
    ) -> Self {
        Self {
            host: host.into(),
            endpoint: endpoint.into(),
            port,
            tls: true,
            ca_cert: None,
            connect_timeout: Duration::from_secs(WS_CONNECT_TIMEOUT_SECS),
            resolver,
        }
    }

    /// Enable or disable TLS (`wss://` vs `ws://`)
    pub fn tls(mut self, enabled: bool) -> Self {
        self.tls = enabled;
        self
    }

    /// Trust this PEM bundle in addition to the system roots
    pub fn ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn url(&self) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        let endpoint = if self.endpoint.starts_with('/') {
            self.endpoint.clone()
        } else {
            format!("/{}", self.endpoint)
        };
        format!("{}://{}:{}{}", scheme, self.host, self.port, endpoint)
    }

    /// Open a session
    pub async fn connect(&self) -> AppResult<WebSocketSession> {
        let url = self.url();

        let addrs = self.resolver.resolve(&self.host, self.port).await.map_err(|e| {
            error!("❌ [resolve] {}: {}", self.host, e);
            e
        })?;
        if addrs.is_empty() {
            error!("❌ [resolve] {}: no addresses", self.host);
            return Err(AppError::resolve_failed(format!("No address for {}", self.host)));
        }
        debug!("[resolve] {} -> {:?}", self.host, addrs);

        let tcp = self.connect_tcp(&addrs).await?;
        debug!("[connect] TCP connected to {}", url);

        let connector = if self.tls {
            Connector::NativeTls(build_tls_connector(self.ca_cert.as_deref())?)
        } else {
            Connector::Plain
        };

        let handshake =
            tokio_tungstenite::client_async_tls_with_config(url.as_str(), tcp, None, Some(connector));
        let (ws_stream, _response) = match tokio::time::timeout(self.connect_timeout, handshake).await {
            Ok(result) => result.map_err(|e| {
                let err = handshake_error(e);
                error!("❌ [handshake] {}: {}", url, err);
                err
            })?,
            Err(_) => {
                // TLS and upgrade run as one future; a stalled TLS hello is
                // reported with the TLS code when TLS is on.
                let code = if self.tls {
                    ErrorCode::WsTlsFailed
                } else {
                    ErrorCode::WsHandshakeFailed
                };
                error!("❌ [handshake] {}: no answer within {:?}", url, self.connect_timeout);
                return Err(AppError::new(
                    code,
                    format!("Handshake with {} timed out after {:?}", url, self.connect_timeout),
                ));
            }
        };

        info!("🔌 WebSocket connected to {}", url);
        Ok(WebSocketSession::start(ws_stream, self.connect_timeout))
    }

    async fn connect_tcp(&self, addrs: &[SocketAddr]) -> AppResult<TcpStream> {
        let mut last_error = String::new();
        for addr in addrs {
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => {
                    debug!("[connect] {} failed: {}", addr, e);
                    last_error = e.to_string();
                }
                Err(_) => {
                    debug!("[connect] {} timed out", addr);
                    last_error = format!("timed out after {:?}", self.connect_timeout);
                }
            }
        }
        error!("❌ [connect] {}:{}: {}", self.host, self.port, last_error);
        Err(AppError::connect_failed(format!(
            "Cannot connect to {}:{}: {}",
            self.host, self.port, last_error
        )))
    }
}

fn build_tls_connector(ca_cert: Option<&Path>) -> AppResult<native_tls::TlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    if let Some(path) = ca_cert {
        let pem = std::fs::read(path)?;
        let certificate = native_tls::Certificate::from_pem(&pem).map_err(|e| {
            AppError::with_source(
                ErrorCode::ConfigInvalidValue,
                format!("Invalid CA certificate: {}", path.display()),
                e,
            )
        })?;
        builder.add_root_certificate(certificate);
    }
    builder
        .build()
        .map_err(|e| AppError::with_source(ErrorCode::WsTlsFailed, "Cannot build TLS connector", e))
}

fn handshake_error(err: tungstenite::Error) -> AppError {
    match err {
        tungstenite::Error::Tls(_) => {
            AppError::with_source(ErrorCode::WsTlsFailed, "TLS handshake failed", err)
        }
        other => AppError::with_source(
            ErrorCode::WsHandshakeFailed,
            format!("WebSocket handshake failed: {}", other),
            other,
        ),
    }
}

// ============================================
// SESSION
// ============================================

/// An open WebSocket connection
pub struct WebSocketSession {
    writer: SplitSink<WsStream, Message>,
    events: mpsc::Receiver<WsEvent>,
    reader: JoinHandle<()>,
    close_timeout: Duration,
    disconnected: bool,
}

impl fmt::Debug for WebSocketSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketSession")
            .field("disconnected", &self.disconnected)
            .field("close_timeout", &self.close_timeout)
            .finish_non_exhaustive()
    }
}

impl WebSocketSession {
    fn start(ws_stream: WsStream, close_timeout: Duration) -> Self {
        let (writer, mut reader) = ws_stream.split();
        let (tx, events) = mpsc::channel(WS_EVENT_CHANNEL_SIZE);

        let reader = tokio::spawn(async move {
            let reason = loop {
                match reader.next().await {
                    Some(Ok(Message::Text(text))) => {
                        debug!("📨 WS message: {}", text.chars().take(200).collect::<String>());
                        if tx.send(WsEvent::Message(text)).await.is_err() {
                            // Session dropped
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => {
                            if tx.send(WsEvent::Message(text)).await.is_err() {
                                return;
                            }
                        }
                        Err(_) => warn!("Dropping non UTF-8 binary message"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        info!("🔌 WebSocket closed by peer");
                        break frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {}", e);
                        break Some(e.to_string());
                    }
                    None => break None,
                }
            };
            let _ = tx.send(WsEvent::Disconnected(reason)).await;
        });

        Self {
            writer,
            events,
            reader,
            close_timeout,
            disconnected: false,
        }
    }

    /// Send a text message
    pub async fn send(&mut self, message: impl Into<String>) -> AppResult<()> {
        if self.disconnected {
            return Err(AppError::ws_closed());
        }
        self.writer
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| AppError::with_source(ErrorCode::WsSendFailed, "Send failed", e))
    }

    /// Next received message, or the disconnect notification.
    /// Returns `None` once the disconnect has been reported.
    pub async fn next_event(&mut self) -> Option<WsEvent> {
        if self.disconnected {
            return None;
        }
        match self.events.recv().await {
            Some(WsEvent::Disconnected(reason)) => {
                self.disconnected = true;
                Some(WsEvent::Disconnected(reason))
            }
            Some(event) => Some(event),
            None => {
                self.disconnected = true;
                None
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.disconnected
    }

    /// Close handshake. Messages still in flight are discarded.
    pub async fn close(&mut self) -> AppResult<()> {
        if self.disconnected {
            return Ok(());
        }
        if let Err(e) = self.writer.close().await {
            debug!("Close frame not sent: {}", e);
        }

        let close_timeout = self.close_timeout;
        let wait = async {
            while let Some(event) = self.next_event().await {
                if matches!(event, WsEvent::Disconnected(_)) {
                    break;
                }
            }
        };
        if tokio::time::timeout(close_timeout, wait).await.is_err() {
            warn!("Peer did not acknowledge close");
            self.reader.abort();
            self.disconnected = true;
        }
        Ok(())
    }
}

impl Drop for WebSocketSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
