//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so log lines can be grepped
//! and alerted on without parsing free-form messages.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - WS_xxx: WebSocket transport errors
//! - STOMP_xxx: STOMP protocol errors
//! - DL_xxx: Download / file errors
//! - NET_xxx: Transport network errors
//! - CFG_xxx: Configuration errors
//! - MANIFEST_xxx: Dependency manifest errors

use std::fmt;

use crate::core::stomp_frame::StompError;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // WebSocket Errors
    // ============================================
    /// Host name could not be resolved
    WsResolveFailed,
    /// TCP connection failed or timed out
    WsConnectFailed,
    /// TLS handshake failed
    WsTlsFailed,
    /// WebSocket upgrade handshake failed
    WsHandshakeFailed,
    /// Sending a message failed
    WsSendFailed,
    /// Connection is closed
    WsClosed,

    // ============================================
    // STOMP Errors
    // ============================================
    /// Received or built a malformed frame
    StompInvalidFrame,
    /// Server answered CONNECT/STOMP with ERROR
    StompAuthFailed,
    /// Server sent an ERROR frame
    StompServerError,
    /// Expected frame did not arrive in time
    StompTimeout,

    // ============================================
    // Download / File Errors
    // ============================================
    /// HTTP request failed
    DownloadFailed,
    /// HTTP server answered with a non-success status
    DownloadBadStatus,
    /// Local file missing
    FileNotFound,
    /// Local file I/O failed
    FileIo,
    /// JSON document malformed
    JsonInvalid,

    // ============================================
    // Transport Network Errors
    // ============================================
    /// Station id not in the network
    NetworkUnknownStation,
    /// Layout contains a duplicate or dangling entry
    NetworkInvalidLayout,
    /// Passenger event payload malformed
    NetworkInvalidEvent,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Invalid configuration value
    ConfigInvalidValue,
    /// Missing credential
    ConfigMissingCredential,

    // ============================================
    // Manifest Errors
    // ============================================
    /// Version string not parseable
    ManifestInvalidVersion,
    /// Dependency declared twice or option targets unknown dependency
    ManifestInconsistent,

    // ============================================
    // Generic Errors
    // ============================================
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WsResolveFailed => "WS_RESOLVE_FAILED",
            Self::WsConnectFailed => "WS_CONNECT_FAILED",
            Self::WsTlsFailed => "WS_TLS_FAILED",
            Self::WsHandshakeFailed => "WS_HANDSHAKE_FAILED",
            Self::WsSendFailed => "WS_SEND_FAILED",
            Self::WsClosed => "WS_CLOSED",

            Self::StompInvalidFrame => "STOMP_INVALID_FRAME",
            Self::StompAuthFailed => "STOMP_AUTH_FAILED",
            Self::StompServerError => "STOMP_SERVER_ERROR",
            Self::StompTimeout => "STOMP_TIMEOUT",

            Self::DownloadFailed => "DL_FAILED",
            Self::DownloadBadStatus => "DL_BAD_STATUS",
            Self::FileNotFound => "DL_FILE_NOT_FOUND",
            Self::FileIo => "DL_FILE_IO",
            Self::JsonInvalid => "DL_JSON_INVALID",

            Self::NetworkUnknownStation => "NET_UNKNOWN_STATION",
            Self::NetworkInvalidLayout => "NET_INVALID_LAYOUT",
            Self::NetworkInvalidEvent => "NET_INVALID_EVENT",

            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::ConfigMissingCredential => "CFG_MISSING_CREDENTIAL",

            Self::ManifestInvalidVersion => "MANIFEST_INVALID_VERSION",
            Self::ManifestInconsistent => "MANIFEST_INCONSISTENT",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Check if error is retryable (the monitor loop reconnects on these)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::WsResolveFailed
                | Self::WsConnectFailed
                | Self::WsTlsFailed
                | Self::WsHandshakeFailed
                | Self::WsSendFailed
                | Self::WsClosed
                | Self::StompTimeout
                | Self::DownloadFailed
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    pub fn resolve_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::WsResolveFailed, msg)
    }

    pub fn connect_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::WsConnectFailed, msg)
    }

    pub fn ws_closed() -> Self {
        Self::new(ErrorCode::WsClosed, "WebSocket connection closed")
    }

    pub fn stomp_timeout(waiting_for: &str) -> Self {
        Self::new(
            ErrorCode::StompTimeout,
            format!("Timed out waiting for {}", waiting_for),
        )
    }

    pub fn unknown_station(station_id: &str) -> Self {
        Self::new(
            ErrorCode::NetworkUnknownStation,
            format!("Unknown station: {}", station_id),
        )
    }

    pub fn invalid_layout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkInvalidLayout, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::with_source(ErrorCode::FileNotFound, "File not found", err)
        } else {
            Self::with_source(ErrorCode::FileIo, "IO error", err)
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::with_source(ErrorCode::DownloadFailed, "Request timeout", err)
        } else if err.is_connect() {
            Self::with_source(ErrorCode::DownloadFailed, "Connection failed", err)
        } else if err.is_status() {
            Self::with_source(ErrorCode::DownloadBadStatus, "Bad HTTP status", err)
        } else {
            Self::with_source(ErrorCode::DownloadFailed, err.to_string(), err)
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::JsonInvalid, "JSON parse error", err)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::ws_closed(),
            WsError::Tls(_) => Self::with_source(ErrorCode::WsTlsFailed, "TLS error", err),
            WsError::Http(_) | WsError::HttpFormat(_) | WsError::Url(_) => {
                Self::with_source(ErrorCode::WsHandshakeFailed, "WebSocket handshake failed", err)
            }
            other => Self::with_source(ErrorCode::WsSendFailed, other.to_string(), other),
        }
    }
}

impl From<StompError> for AppError {
    fn from(err: StompError) -> Self {
        Self::with_source(ErrorCode::StompInvalidFrame, "Invalid STOMP frame", err)
    }
}
