//! STOMP Client Module
//!
//! STOMP 1.2 session on top of a `WebSocketSession`: one STOMP frame per
//! WebSocket text message.
//!
//! Flow:
//! 1. `connect` sends STOMP (accept-version, host, login, passcode) and waits
//!    for CONNECTED, or fails on ERROR
//! 2. `subscribe` sends SUBSCRIBE with a receipt and waits for the RECEIPT
//! 3. `next_message` yields MESSAGE frames until the connection drops;
//!    `unsubscribe` waits for its RECEIPT like `subscribe`
//! 4. `close` sends DISCONNECT with a receipt, then closes the WebSocket

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::stomp_frame::{StompCommand, StompFrame, StompFrameBuilder, StompHeader};
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::providers::websocket::{Resolver, WebSocketClient, WebSocketSession, WsEvent};
use crate::utils::constants::{STOMP_ACCEPT_VERSION, STOMP_ACK_AUTO, STOMP_REPLY_TIMEOUT_SECS};

/// An authenticated STOMP session
pub struct StompClient {
    session: WebSocketSession,
    /// subscription id -> destination
    subscriptions: HashMap<String, String>,
    /// MESSAGE frames that arrived while waiting for another reply
    pending: VecDeque<StompFrame>,
    reply_timeout: Duration,
}

impl StompClient {
    /// Open the WebSocket and authenticate
    pub async fn connect<R: Resolver>(
        ws_client: &WebSocketClient<R>,
        login: &str,
        passcode: &str,
    ) -> AppResult<Self> {
        Self::connect_with_timeout(
            ws_client,
            login,
            passcode,
            Duration::from_secs(STOMP_REPLY_TIMEOUT_SECS),
        )
        .await
    }

    pub async fn connect_with_timeout<R: Resolver>(
        ws_client: &WebSocketClient<R>,
        login: &str,
        passcode: &str,
        reply_timeout: Duration,
    ) -> AppResult<Self> {
        if login.is_empty() || passcode.is_empty() {
            return Err(AppError::new(
                ErrorCode::ConfigMissingCredential,
                "STOMP login and passcode are required",
            ));
        }

        let session = ws_client.connect().await?;
        let mut client = Self {
            session,
            subscriptions: HashMap::new(),
            pending: VecDeque::new(),
            reply_timeout,
        };

        let frame = StompFrameBuilder::new(StompCommand::Stomp)
            .header(StompHeader::AcceptVersion, STOMP_ACCEPT_VERSION)
            .header(StompHeader::Host, ws_client.host())
            .header(StompHeader::Login, login)
            .header(StompHeader::Passcode, passcode)
            .build()?;
        client.send_frame(&frame).await?;

        let reply = client
            .await_reply("CONNECTED", |f| f.command() == StompCommand::Connected)
            .await?;
        if reply.command() == StompCommand::Error {
            let reason = reply.header(StompHeader::Message).to_string();
            warn!("🔒 STOMP authentication rejected: {}", reason);
            let _ = client.session.close().await;
            return Err(AppError::new(
                ErrorCode::StompAuthFailed,
                format!("Server rejected STOMP connection: {}", reason),
            ));
        }

        info!(
            "✅ STOMP session established (version {}, session {})",
            reply.header(StompHeader::Version),
            reply.header(StompHeader::Session)
        );
        Ok(client)
    }

    /// Subscribe to a destination; returns the subscription id
    pub async fn subscribe(&mut self, destination: &str) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        let receipt = Uuid::new_v4().to_string();

        let frame = StompFrameBuilder::new(StompCommand::Subscribe)
            .header(StompHeader::Destination, destination)
            .header(StompHeader::Id, id.as_str())
            .header(StompHeader::Ack, STOMP_ACK_AUTO)
            .header(StompHeader::Receipt, receipt.as_str())
            .build()?;
        self.send_frame(&frame).await?;

        let reply = self
            .await_reply("RECEIPT", |f| {
                f.command() == StompCommand::Receipt && f.header(StompHeader::ReceiptId) == receipt
            })
            .await?;
        if reply.command() == StompCommand::Error {
            return Err(server_error(&reply));
        }

        info!("📡 Subscribed to {} (id {})", destination, id);
        self.subscriptions.insert(id.clone(), destination.to_string());
        Ok(id)
    }

    /// Drop a subscription. Unknown ids are ignored.
    pub async fn unsubscribe(&mut self, id: &str) -> AppResult<()> {
        if self.subscriptions.remove(id).is_none() {
            debug!("Unsubscribe for unknown id {}", id);
            return Ok(());
        }
        let receipt = Uuid::new_v4().to_string();
        let frame = StompFrameBuilder::new(StompCommand::Unsubscribe)
            .header(StompHeader::Id, id)
            .header(StompHeader::Receipt, receipt.as_str())
            .build()?;
        self.send_frame(&frame).await?;

        let reply = self
            .await_reply("RECEIPT", |f| {
                f.command() == StompCommand::Receipt && f.header(StompHeader::ReceiptId) == receipt
            })
            .await?;
        if reply.command() == StompCommand::Error {
            return Err(server_error(&reply));
        }

        info!("📴 Unsubscribed {}", id);
        Ok(())
    }

    /// Next MESSAGE frame. `Ok(None)` once the connection is gone.
    pub async fn next_message(&mut self) -> AppResult<Option<StompFrame>> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(Some(frame));
        }

        loop {
            let text = match self.session.next_event().await {
                Some(WsEvent::Message(text)) => text,
                Some(WsEvent::Disconnected(reason)) => {
                    warn!(
                        "🔌 STOMP connection lost: {}",
                        reason.as_deref().unwrap_or("no reason given")
                    );
                    return Ok(None);
                }
                None => return Ok(None),
            };

            let frame = match StompFrame::parse(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Skipping malformed frame ({}): {:?}", e, text);
                    continue;
                }
            };

            match frame.command() {
                StompCommand::Message => {
                    let subscription = frame.header(StompHeader::Subscription);
                    if !self.subscriptions.contains_key(subscription) {
                        debug!("MESSAGE for unknown subscription {}", subscription);
                    }
                    return Ok(Some(frame));
                }
                StompCommand::Error => return Err(server_error(&frame)),
                other => debug!("Ignoring {} frame", other),
            }
        }
    }

    /// Destinations currently subscribed, keyed by subscription id
    pub fn subscriptions(&self) -> &HashMap<String, String> {
        &self.subscriptions
    }

    /// Graceful DISCONNECT, then WebSocket close
    pub async fn close(mut self) -> AppResult<()> {
        if self.session.is_connected() {
            let receipt = Uuid::new_v4().to_string();
            let frame = StompFrameBuilder::new(StompCommand::Disconnect)
                .header(StompHeader::Receipt, receipt.as_str())
                .build()?;

            if self.send_frame(&frame).await.is_ok() {
                match self
                    .await_reply("DISCONNECT receipt", |f| {
                        f.command() == StompCommand::Receipt
                            && f.header(StompHeader::ReceiptId) == receipt
                    })
                    .await
                {
                    Ok(_) => debug!("DISCONNECT acknowledged"),
                    Err(e) => debug!("DISCONNECT not acknowledged: {}", e),
                }
            }
        }

        self.session.close().await?;
        info!("👋 STOMP session closed");
        Ok(())
    }

    async fn send_frame(&mut self, frame: &StompFrame) -> AppResult<()> {
        debug!("📤 {}", frame.command());
        self.session.send(frame.to_wire()).await
    }

    /// Wait for a frame matching `wanted` or an ERROR frame, whichever comes
    /// first. MESSAGE frames seen meanwhile are queued for `next_message`.
    async fn await_reply<F>(&mut self, what: &str, wanted: F) -> AppResult<StompFrame>
    where
        F: Fn(&StompFrame) -> bool,
    {
        let deadline = tokio::time::Instant::now() + self.reply_timeout;

        loop {
            let event = match tokio::time::timeout_at(deadline, self.session.next_event()).await {
                Ok(event) => event,
                Err(_) => return Err(AppError::stomp_timeout(what)),
            };

            let text = match event {
                Some(WsEvent::Message(text)) => text,
                Some(WsEvent::Disconnected(_)) | None => {
                    return Err(AppError::new(
                        ErrorCode::WsClosed,
                        format!("Connection closed while waiting for {}", what),
                    ))
                }
            };

            let frame = match StompFrame::parse(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Skipping malformed frame ({}) while waiting for {}", e, what);
                    continue;
                }
            };

            if wanted(&frame) || frame.command() == StompCommand::Error {
                return Ok(frame);
            }
            if frame.command() == StompCommand::Message {
                self.pending.push_back(frame);
            } else {
                debug!("Ignoring {} frame while waiting for {}", frame.command(), what);
            }
        }
    }
}

fn server_error(frame: &StompFrame) -> AppError {
    let message = frame.header(StompHeader::Message);
    let detail = if message.is_empty() { frame.body() } else { message };
    AppError::new(
        ErrorCode::StompServerError,
        format!("STOMP server error: {}", detail),
    )
}
