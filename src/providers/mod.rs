//! Providers Module - External Connections
//!
//! WebSocket transport, the STOMP session on top of it, and HTTPS downloads.

pub mod downloader;
pub mod stomp_client;
pub mod websocket;

pub use downloader::*;
pub use stomp_client::*;
pub use websocket::*;
