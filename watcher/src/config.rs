//! Watcher configuration.
//!
//! Loaded from `AUCTION_*` environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use auction_live_sdk::ws::backoff::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_MAX_BACKOFF_MS, DEFAULT_RECONNECT_DELAY_MS,
};
use auction_live_sdk::ws::config::{DEFAULT_BACKEND_URL, DEFAULT_HEARTBEAT_SECS};
use auction_live_sdk::{BackoffPolicy, Identity, SyncError, WsConfig};
use serde::{Deserialize, Serialize};

/// Reconnect delay strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffMode {
    /// Same delay every time.
    #[default]
    Fixed,
    /// Delay doubles (by default) per failed attempt.
    Exponential,
}

impl FromStr for BackoffMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "exponential" => Ok(Self::Exponential),
            other => Err(ConfigError::InvalidBackoffMode(other.to_string())),
        }
    }
}

impl fmt::Display for BackoffMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Exponential => write!(f, "exponential"),
        }
    }
}

/// Configuration for the watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Backend origin, `http(s)://` or `ws(s)://`.
    pub backend_url: String,

    /// Subscriber identity.
    pub user_id: String,

    /// Auction to join after connecting.
    pub auction_id: Option<String>,

    /// Display name used when joining.
    pub username: Option<String>,

    /// Heartbeat interval in seconds.
    pub heartbeat_secs: u64,

    /// Reconnect delay in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Reconnect delay strategy.
    pub backoff: BackoffMode,

    /// Maximum backoff in milliseconds.
    pub max_backoff_ms: u64,

    /// Backoff multiplier.
    pub backoff_multiplier: f64,

    /// Pong timeout in seconds; disabled when unset.
    pub pong_timeout_secs: Option<u64>,

    /// Whether to fetch a snapshot over REST after a reconnect.
    pub resync: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            user_id: String::new(),
            auction_id: None,
            username: None,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            backoff: BackoffMode::Fixed,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            pong_timeout_secs: None,
            resync: false,
        }
    }
}

impl WatcherConfig {
    /// Creates a configuration for the given identity.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Sets the auction to join and the display name to join with.
    #[must_use]
    pub fn with_auction(
        mut self,
        auction_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        self.auction_id = Some(auction_id.into());
        self.username = Some(username.into());
        self
    }

    /// Sets the backend URL.
    #[must_use]
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is missing or unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads the configuration through a variable lookup function.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is missing or unparseable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let user_id =
            non_empty("AUCTION_USER_ID").ok_or(ConfigError::MissingVar("AUCTION_USER_ID"))?;

        Ok(Self {
            backend_url: non_empty("AUCTION_BACKEND_URL").unwrap_or(defaults.backend_url),
            user_id,
            auction_id: non_empty("AUCTION_ID"),
            username: non_empty("AUCTION_USERNAME"),
            heartbeat_secs: parse_var(&lookup, "AUCTION_HEARTBEAT_SECS")?
                .unwrap_or(defaults.heartbeat_secs),
            reconnect_delay_ms: parse_var(&lookup, "AUCTION_RECONNECT_DELAY_MS")?
                .unwrap_or(defaults.reconnect_delay_ms),
            backoff: parse_var(&lookup, "AUCTION_BACKOFF")?.unwrap_or(defaults.backoff),
            max_backoff_ms: parse_var(&lookup, "AUCTION_MAX_BACKOFF_MS")?
                .unwrap_or(defaults.max_backoff_ms),
            backoff_multiplier: parse_var(&lookup, "AUCTION_BACKOFF_MULTIPLIER")?
                .unwrap_or(defaults.backoff_multiplier),
            pong_timeout_secs: parse_var(&lookup, "AUCTION_PONG_TIMEOUT_SECS")?,
            resync: parse_var(&lookup, "AUCTION_RESYNC")?.unwrap_or(defaults.resync),
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Identity::parse(self.user_id.as_str())?;

        if self.heartbeat_secs == 0 {
            return Err(ConfigError::InvalidHeartbeat);
        }

        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidBackoffMultiplier);
        }

        if self.auction_id.is_some() && self.username.is_none() {
            return Err(ConfigError::MissingVar("AUCTION_USERNAME"));
        }

        self.to_ws_config().validate()?;
        Ok(())
    }

    /// Returns the join target, if an auction is configured.
    #[must_use]
    pub fn join_target(&self) -> Option<(&str, &str)> {
        match (self.auction_id.as_deref(), self.username.as_deref()) {
            (Some(auction_id), Some(username)) => Some((auction_id, username)),
            _ => None,
        }
    }

    /// Returns the REST API base for snapshot requests.
    #[must_use]
    pub fn api_base_url(&self) -> String {
        let url = self.backend_url.trim_end_matches('/');
        if let Some(rest) = url.strip_prefix("wss://") {
            format!("https://{}", rest)
        } else if let Some(rest) = url.strip_prefix("ws://") {
            format!("http://{}", rest)
        } else {
            url.to_string()
        }
    }

    /// Builds the session configuration.
    #[must_use]
    pub fn to_ws_config(&self) -> WsConfig {
        let initial = Duration::from_millis(self.reconnect_delay_ms);
        let backoff = match self.backoff {
            BackoffMode::Fixed => BackoffPolicy::Fixed(initial),
            BackoffMode::Exponential => BackoffPolicy::Exponential {
                initial,
                max: Duration::from_millis(self.max_backoff_ms),
                multiplier: self.backoff_multiplier,
            },
        };

        let config = WsConfig::new(self.backend_url.clone())
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_secs))
            .with_backoff(backoff);

        match self.pong_timeout_secs {
            Some(secs) => config.with_pong_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var: key, value: raw }),
        _ => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} must be set")]
    MissingVar(&'static str),

    /// A variable could not be parsed.
    #[error("{var} has an invalid value: {value}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// Unknown backoff mode.
    #[error("unknown backoff mode: {0} (expected fixed or exponential)")]
    InvalidBackoffMode(String),

    /// Invalid heartbeat interval.
    #[error("heartbeat_secs must be > 0")]
    InvalidHeartbeat,

    /// Invalid backoff multiplier.
    #[error("backoff_multiplier must be >= 1.0")]
    InvalidBackoffMultiplier,

    /// Rejected by the SDK.
    #[error(transparent)]
    Sdk(#[from] SyncError),
}
