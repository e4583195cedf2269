//! Network Monitor Library
//!
//! Client for a live transport-network event feed:
//! - Downloads the network layout and builds the station/route graph
//! - Speaks STOMP 1.2 over a TLS WebSocket
//! - Tracks passengers entering and leaving every station

pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{
    MonitorStats, NetworkMonitor, StompCommand, StompError, StompFrame, StompHeader,
    TransportNetwork,
};
pub use models::{
    AppError, AppResult, DependencyManifest, ErrorCode, MonitorConfig, PassengerEvent,
    PassengerEventKind,
};
pub use providers::{StompClient, WebSocketClient, WebSocketSession, WsEvent};
