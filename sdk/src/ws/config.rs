//! WebSocket configuration.
//!
//! Provides configuration options for the auction session.

use std::time::Duration;

use super::backoff::BackoffPolicy;
use crate::error::SyncError;
use crate::types::Identity;

/// Default backend origin.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

/// Default capacity of the notification channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// WebSocket configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Backend origin (`http`, `https`, `ws` or `wss`).
    pub backend_url: String,

    /// Heartbeat interval.
    pub heartbeat_interval: Duration,

    /// Maximum wait for a pong after a heartbeat (None = never time out).
    pub pong_timeout: Option<Duration>,

    /// Reconnect delay policy.
    pub backoff: BackoffPolicy,

    /// Re-send the last join after a reconnect.
    pub rejoin_on_reconnect: bool,

    /// Capacity of the notification channel.
    pub notification_capacity: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            pong_timeout: None,
            backoff: BackoffPolicy::default(),
            rejoin_on_reconnect: true,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl WsConfig {
    /// Creates a new configuration with the given backend URL.
    #[must_use]
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            ..Default::default()
        }
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Enables the pong deadline.
    #[must_use]
    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = Some(timeout);
        self
    }

    /// Sets the reconnect backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets whether the last join is re-sent after a reconnect.
    #[must_use]
    pub fn with_rejoin_on_reconnect(mut self, rejoin: bool) -> Self {
        self.rejoin_on_reconnect = rejoin;
        self
    }

    /// Sets the notification channel capacity.
    #[must_use]
    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    /// Returns the WebSocket origin derived from the backend URL.
    #[must_use]
    pub fn ws_origin(&self) -> String {
        let base = self.backend_url.trim_end_matches('/');

        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        }
    }

    /// Returns the endpoint URL for an identity.
    #[must_use]
    pub fn endpoint_url(&self, identity: &Identity) -> String {
        format!("{}/ws/{}", self.ws_origin(), identity)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.backend_url.is_empty() {
            return Err(SyncError::Configuration(
                "backend_url cannot be empty".to_string(),
            ));
        }

        let scheme_ok = ["http://", "https://", "ws://", "wss://"]
            .iter()
            .any(|scheme| self.backend_url.starts_with(scheme));
        if !scheme_ok {
            return Err(SyncError::Configuration(
                "backend_url must start with http://, https://, ws:// or wss://".to_string(),
            ));
        }

        if self.heartbeat_interval.is_zero() {
            return Err(SyncError::Configuration(
                "heartbeat_interval must be > 0".to_string(),
            ));
        }

        if self.pong_timeout.is_some_and(|t| t.is_zero()) {
            return Err(SyncError::Configuration(
                "pong_timeout must be > 0".to_string(),
            ));
        }

        if self.notification_capacity == 0 {
            return Err(SyncError::Configuration(
                "notification_capacity must be > 0".to_string(),
            ));
        }

        self.backoff.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(raw: &str) -> Identity {
        Identity::parse(raw).expect("identity")
    }

    #[test]
    fn test_config_default() {
        let config = WsConfig::default();
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(
            config.heartbeat_interval,
            Duration::from_secs(DEFAULT_HEARTBEAT_SECS)
        );
        assert!(config.pong_timeout.is_none());
        assert!(config.rejoin_on_reconnect);
        assert_eq!(config.backoff, BackoffPolicy::default());
    }

    #[test]
    fn test_config_builder() {
        let config = WsConfig::new("https://auction.example.com")
            .with_heartbeat_interval(Duration::from_secs(10))
            .with_pong_timeout(Duration::from_secs(5))
            .with_backoff(BackoffPolicy::Fixed(Duration::from_secs(1)))
            .with_rejoin_on_reconnect(false)
            .with_notification_capacity(8);

        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.pong_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.backoff.delay(1), Duration::from_secs(1));
        assert!(!config.rejoin_on_reconnect);
        assert_eq!(config.notification_capacity, 8);
    }

    #[test]
    fn test_endpoint_url_from_http() {
        let config = WsConfig::new("http://localhost:8001");
        assert_eq!(
            config.endpoint_url(&identity("u1")),
            "ws://localhost:8001/ws/u1"
        );
    }

    #[test]
    fn test_endpoint_url_from_https_with_trailing_slash() {
        let config = WsConfig::new("https://auction.example.com/");
        assert_eq!(
            config.endpoint_url(&identity("u1")),
            "wss://auction.example.com/ws/u1"
        );
    }

    #[test]
    fn test_endpoint_url_from_ws() {
        let config = WsConfig::new("wss://rt.example.com");
        assert_eq!(
            config.endpoint_url(&identity("abc")),
            "wss://rt.example.com/ws/abc"
        );
    }

    #[test]
    fn test_config_validate_valid() {
        assert!(WsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validate_empty_url() {
        assert!(WsConfig::new("").validate().is_err());
    }

    #[test]
    fn test_config_validate_invalid_scheme() {
        assert!(WsConfig::new("ftp://example.com").validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_heartbeat() {
        let config = WsConfig::default().with_heartbeat_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_capacity() {
        let config = WsConfig::default().with_notification_capacity(0);
        assert!(config.validate().is_err());
    }
}
