//! Local WebSocket servers for integration tests

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use network_monitor::core::stomp_frame::{StompCommand, StompFrame, StompFrameBuilder, StompHeader};
use network_monitor::WebSocketClient;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub const LOGIN: &str = "user";
pub const PASSCODE: &str = "pass";

/// Accept WebSocket connections on a random local port, one task per client
pub async fn spawn_ws_server<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(WebSocketStream<TcpStream>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                if let Ok(ws) = tokio_tungstenite::accept_async(tcp).await {
                    handler(ws).await;
                }
            });
        }
    });
    addr
}

/// Accept TCP connections, write `reply` and hang up
pub async fn spawn_raw_server(reply: &'static [u8]) -> SocketAddr {
    use tokio::io::AsyncWriteExt;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut tcp, _)) = listener.accept().await {
            let _ = tcp.write_all(reply).await;
            let _ = tcp.shutdown().await;
        }
    });
    addr
}

/// Accept TCP connections and never answer; sockets stay open
pub async fn spawn_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });
    addr
}

/// Complete the WebSocket upgrade, then only read raw bytes.
/// Close frames go unanswered; the receiver fires once the client hangs up.
pub async fn spawn_mute_ws_server() -> (SocketAddr, tokio::sync::oneshot::Receiver<()>) {
    use tokio::io::AsyncReadExt;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (eof_tx, eof_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let Ok((tcp, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
            return;
        };
        let mut buf = [0u8; 1024];
        loop {
            match ws.get_mut().read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = eof_tx.send(());
    });
    (addr, eof_rx)
}

pub async fn spawn_echo_server() -> SocketAddr {
    spawn_ws_server(|mut ws| async move {
        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Text(_) | Message::Binary(_) => {
                    if ws.send(msg).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    })
    .await
}

/// A port nothing listens on
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn plain_client(addr: SocketAddr) -> WebSocketClient {
    WebSocketClient::new("127.0.0.1", "/network-events", addr.port()).tls(false)
}

/// Behaviour of the scripted STOMP server
#[derive(Debug, Clone, Default)]
pub struct StompScript {
    /// MESSAGE bodies pushed after a successful SUBSCRIBE
    pub messages: Vec<String>,
    /// Push the first message before the RECEIPT
    pub message_before_receipt: bool,
    /// Push a line of garbage before the messages
    pub garbage_first: bool,
    /// Hang up once the messages are sent
    pub close_after_messages: bool,
    /// Never answer the STOMP frame
    pub silent: bool,
    /// Send ERROR with this message once the messages are out, then hang up
    pub error_after_messages: Option<String>,
    /// Send MESSAGE frames as binary WebSocket messages, preceded by one
    /// binary message that is not UTF-8
    pub binary_messages: bool,
}

pub async fn spawn_stomp_server(script: StompScript) -> SocketAddr {
    spawn_ws_server(move |ws| serve_stomp(ws, script.clone())).await
}

fn message_frame(subscription: &str, n: usize, body: &str) -> String {
    StompFrameBuilder::new(StompCommand::Message)
        .header(StompHeader::Destination, "/passengers")
        .header(StompHeader::MessageId, format!("msg-{}", n))
        .header(StompHeader::Subscription, subscription)
        .header(StompHeader::ContentType, "application/json")
        .header(StompHeader::ContentLength, body.len().to_string())
        .body(body)
        .build()
        .unwrap()
        .to_wire()
}

fn error_frame(message: &str) -> String {
    StompFrameBuilder::new(StompCommand::Error)
        .header(StompHeader::Message, message)
        .build()
        .unwrap()
        .to_wire()
}

fn receipt_frame(receipt_id: &str) -> String {
    StompFrameBuilder::new(StompCommand::Receipt)
        .header(StompHeader::ReceiptId, receipt_id)
        .build()
        .unwrap()
        .to_wire()
}

async fn serve_stomp(mut ws: WebSocketStream<TcpStream>, script: StompScript) {
    while let Some(Ok(msg)) = ws.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => return,
            _ => continue,
        };
        let Ok(frame) = StompFrame::parse(&text) else {
            continue;
        };

        match frame.command() {
            StompCommand::Stomp | StompCommand::Connect => {
                if script.silent {
                    continue;
                }
                if frame.header(StompHeader::Login) == LOGIN
                    && frame.header(StompHeader::Passcode) == PASSCODE
                {
                    let connected = StompFrameBuilder::new(StompCommand::Connected)
                        .header(StompHeader::Version, "1.2")
                        .header(StompHeader::Session, "session-1")
                        .build()
                        .unwrap();
                    let _ = ws.send(Message::Text(connected.to_wire())).await;
                } else {
                    let _ = ws.send(Message::Text(error_frame("Bad credentials"))).await;
                    let _ = ws.close(None).await;
                    return;
                }
            }
            StompCommand::Subscribe => {
                let subscription = frame.header(StompHeader::Id).to_string();
                let mut bodies = script.messages.iter().enumerate();

                if script.message_before_receipt {
                    if let Some((n, body)) = bodies.next() {
                        let _ = ws.send(Message::Text(message_frame(&subscription, n, body))).await;
                    }
                }
                let _ = ws
                    .send(Message::Text(receipt_frame(frame.header(StompHeader::Receipt))))
                    .await;
                if script.garbage_first {
                    let _ = ws.send(Message::Text("this is not a frame".to_string())).await;
                }
                if script.binary_messages {
                    let _ = ws.send(Message::Binary(vec![0xff, 0xfe, 0x00])).await;
                }
                for (n, body) in bodies {
                    let wire = message_frame(&subscription, n, body);
                    let msg = if script.binary_messages {
                        Message::Binary(wire.into_bytes())
                    } else {
                        Message::Text(wire)
                    };
                    let _ = ws.send(msg).await;
                }
                if let Some(message) = &script.error_after_messages {
                    let _ = ws.send(Message::Text(error_frame(message))).await;
                    let _ = ws.close(None).await;
                    return;
                }
                if script.close_after_messages {
                    let _ = ws.close(None).await;
                    return;
                }
            }
            StompCommand::Unsubscribe => {
                let receipt = frame.header(StompHeader::Receipt);
                if !receipt.is_empty() {
                    let _ = ws.send(Message::Text(receipt_frame(receipt))).await;
                }
            }
            StompCommand::Disconnect => {
                let _ = ws
                    .send(Message::Text(receipt_frame(frame.header(StompHeader::Receipt))))
                    .await;
                let _ = ws.close(None).await;
                return;
            }
            _ => {}
        }
    }
}

/// A passenger event as the feed sends it
pub fn passenger_event_json(station_id: &str, kind: &str) -> String {
    format!(
        r#"{{"datetime":"2020-11-01T07:18:50.234000Z","passenger_event":"{}","station_id":"{}"}}"#,
        kind, station_id
    )
}
