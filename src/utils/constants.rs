//! Constants Module - Single Source of Truth
//!
//! Endpoints, protocol values and timeouts used across the monitor.
//! Nothing outside this file hardcodes a host name or a timeout.

// ============================================
// EVENT SERVER
// ============================================

/// Public host serving the network layout and the event feed
pub const DEFAULT_SERVER_HOST: &str = "ltnm.learncppthroughprojects.com";

/// TLS port of the event feed
pub const DEFAULT_SERVER_PORT: u16 = 443;

/// WebSocket endpoint carrying STOMP frames
pub const NETWORK_EVENTS_ENDPOINT: &str = "/network-events";

/// Network layout document
pub const NETWORK_LAYOUT_URL: &str = "https://ltnm.learncppthroughprojects.com/network-layout.json";

/// STOMP destination for passenger events
pub const PASSENGERS_DESTINATION: &str = "/passengers";

// ============================================
// STOMP
// ============================================

pub const STOMP_ACCEPT_VERSION: &str = "1.2";

/// Acknowledgement mode for subscriptions
pub const STOMP_ACK_AUTO: &str = "auto";

/// How long to wait for CONNECTED / RECEIPT frames (seconds)
pub const STOMP_REPLY_TIMEOUT_SECS: u64 = 10;

// ============================================
// WEBSOCKET
// ============================================

/// TCP connect timeout (seconds)
pub const WS_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Buffered events between the reader task and the session
pub const WS_EVENT_CHANNEL_SIZE: usize = 256;

/// Reconnection base delay (milliseconds)
pub const RECONNECT_BASE_MS: u64 = 1000;

/// Maximum reconnection delay (milliseconds)
pub const RECONNECT_MAX_MS: u64 = 30000;

/// Maximum reconnection attempts before giving up
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Jitter percentage added to the reconnection delay
pub const RECONNECT_JITTER_PERCENT: u64 = 20;

// ============================================
// HTTP
// ============================================

/// Download request timeout (seconds)
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

pub const USER_AGENT: &str = concat!("network-monitor/", env!("CARGO_PKG_VERSION"));
