//! Auction status and timer types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Auction lifecycle status.
///
/// Monotonic: once `Ended`, the status never returns to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    /// Bidding is open.
    #[default]
    Active,
    /// The auction is closed.
    Ended,
}

impl AuctionStatus {
    /// Returns true if the auction has ended.
    #[must_use]
    pub const fn is_ended(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

/// Countdown timer as last reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    /// Seconds remaining, `None` until the first server update.
    pub remaining_seconds: Option<i64>,

    /// Number of extensions announced by the server.
    pub extension_count: u32,
}

/// Winner of an ended auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    /// Winner user ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Winner display name.
    pub username: String,

    /// Winning bid amount.
    pub winning_bid: u64,
}

impl Winner {
    /// Creates a winner without a user ID.
    #[must_use]
    pub fn new(username: impl Into<String>, winning_bid: u64) -> Self {
        Self {
            user_id: None,
            username: username.into(),
            winning_bid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(AuctionStatus::Active.to_string(), "active");
        assert_eq!(AuctionStatus::Ended.to_string(), "ended");
        assert!(AuctionStatus::Ended.is_ended());
        assert!(!AuctionStatus::default().is_ended());
    }

    #[test]
    fn test_timer_default_unknown() {
        let timer = TimerState::default();
        assert!(timer.remaining_seconds.is_none());
        assert_eq!(timer.extension_count, 0);
    }

    #[test]
    fn test_winner_deserialize() {
        let json = r#"{"user_id":"u9","username":"alex","winning_bid":250000}"#;
        let winner: Winner = serde_json::from_str(json).expect("deserialize");
        assert_eq!(winner.user_id.as_deref(), Some("u9"));
        assert_eq!(winner.username, "alex");
        assert_eq!(winner.winning_bid, 250_000);
    }
}
