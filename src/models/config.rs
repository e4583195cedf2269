//! Configuration module for the network monitor
//!
//! Defaults come from utils/constants.rs; every value can be overridden
//! through a `NETWORK_MONITOR_*` environment variable.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{
    DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, MAX_RECONNECT_ATTEMPTS, NETWORK_EVENTS_ENDPOINT,
    NETWORK_LAYOUT_URL, STOMP_REPLY_TIMEOUT_SECS,
};

pub const ENV_HOST: &str = "NETWORK_MONITOR_HOST";
pub const ENV_PORT: &str = "NETWORK_MONITOR_PORT";
pub const ENV_ENDPOINT: &str = "NETWORK_MONITOR_ENDPOINT";
pub const ENV_LAYOUT_URL: &str = "NETWORK_MONITOR_LAYOUT_URL";
pub const ENV_LAYOUT_FILE: &str = "NETWORK_MONITOR_LAYOUT_FILE";
pub const ENV_CA_CERT: &str = "NETWORK_MONITOR_CA_CERT";
pub const ENV_USERNAME: &str = "NETWORK_MONITOR_USERNAME";
pub const ENV_PASSWORD: &str = "NETWORK_MONITOR_PASSWORD";
pub const ENV_TLS: &str = "NETWORK_MONITOR_TLS";
pub const ENV_MAX_RECONNECTS: &str = "NETWORK_MONITOR_MAX_RECONNECTS";

/// Configuration for the network monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Event server host name
    pub server_host: String,
    pub server_port: u16,
    /// WebSocket endpoint carrying STOMP frames
    pub events_endpoint: String,
    /// Where to download the network layout from
    pub layout_url: String,
    /// Use this local layout file instead of downloading
    pub layout_file: Option<PathBuf>,
    /// Extra CA bundle (PEM) trusted for HTTPS and WSS
    pub ca_cert: Option<PathBuf>,
    /// STOMP credentials
    pub login: String,
    pub passcode: String,
    pub use_tls: bool,
    /// Consecutive failed connections before giving up
    pub max_reconnect_attempts: u32,
    /// Wait for CONNECTED / RECEIPT replies
    pub reply_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            events_endpoint: NETWORK_EVENTS_ENDPOINT.to_string(),
            layout_url: NETWORK_LAYOUT_URL.to_string(),
            layout_file: None,
            ca_cert: None,
            login: String::new(),
            passcode: String::new(),
            use_tls: true,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            reply_timeout: Duration::from_secs(STOMP_REPLY_TIMEOUT_SECS),
        }
    }
}

impl MonitorConfig {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> AppResult<Self> {
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        // Credentials are never logged
        info!(
            "⚙️ Config: server {}:{}{} (tls: {}), credentials {}",
            config.server_host,
            config.server_port,
            config.events_endpoint,
            config.use_tls,
            if config.login.is_empty() { "missing" } else { "configured" }
        );
        Ok(config)
    }

    /// Defaults overlaid with whatever `lookup` returns for each variable.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(host) = get(ENV_HOST) {
            config.server_host = host;
        }
        if let Some(port) = get(ENV_PORT) {
            config.server_port = port.parse().map_err(|_| {
                AppError::invalid_config(format!("{} must be a port number, got {:?}", ENV_PORT, port))
            })?;
        }
        if let Some(endpoint) = get(ENV_ENDPOINT) {
            config.events_endpoint = endpoint;
        }
        if let Some(url) = get(ENV_LAYOUT_URL) {
            config.layout_url = url;
        }
        config.layout_file = get(ENV_LAYOUT_FILE).map(PathBuf::from);
        config.ca_cert = get(ENV_CA_CERT).map(PathBuf::from);
        if let Some(login) = get(ENV_USERNAME) {
            config.login = login;
        }
        if let Some(passcode) = get(ENV_PASSWORD) {
            config.passcode = passcode;
        }
        if let Some(tls) = get(ENV_TLS) {
            config.use_tls = parse_bool(&tls).ok_or_else(|| {
                AppError::invalid_config(format!("{} must be true or false, got {:?}", ENV_TLS, tls))
            })?;
        }
        if let Some(max) = get(ENV_MAX_RECONNECTS) {
            config.max_reconnect_attempts = max.parse().map_err(|_| {
                AppError::invalid_config(format!(
                    "{} must be a non-negative integer, got {:?}",
                    ENV_MAX_RECONNECTS, max
                ))
            })?;
        }

        Ok(config)
    }

    /// Check the values needed to open a STOMP session
    pub fn validate(&self) -> AppResult<()> {
        if self.login.is_empty() || self.passcode.is_empty() {
            return Err(AppError::new(
                ErrorCode::ConfigMissingCredential,
                format!("Set {} and {}", ENV_USERNAME, ENV_PASSWORD),
            ));
        }
        if self.server_host.is_empty() {
            return Err(AppError::invalid_config("Server host is empty"));
        }
        if self.server_port == 0 {
            return Err(AppError::invalid_config("Server port must not be 0"));
        }
        if self.layout_file.is_none() && self.layout_url.is_empty() {
            return Err(AppError::invalid_config("Either a layout URL or a layout file is required"));
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
