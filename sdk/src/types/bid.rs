//! Bid types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bid as seen by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidEvent {
    /// Bidder user ID, when the server includes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidder_id: Option<String>,

    /// Bidder display name.
    pub bidder_name: String,

    /// Bid amount in whole currency units.
    pub amount: u64,

    /// Time the server accepted the bid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl BidEvent {
    /// Creates a bid without a bidder ID or timestamp.
    #[must_use]
    pub fn new(bidder_name: impl Into<String>, amount: u64) -> Self {
        Self {
            bidder_id: None,
            bidder_name: bidder_name.into(),
            amount,
            server_timestamp: None,
        }
    }

    /// Sets the bidder ID.
    #[must_use]
    pub fn with_bidder_id(mut self, bidder_id: impl Into<String>) -> Self {
        self.bidder_id = Some(bidder_id.into());
        self
    }

    /// Sets the server timestamp.
    #[must_use]
    pub fn with_server_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.server_timestamp = Some(ts);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bid_builder() {
        let ts = Utc::now();
        let bid = BidEvent::new("alex", 250_000)
            .with_bidder_id("u1")
            .with_server_timestamp(ts);

        assert_eq!(bid.bidder_name, "alex");
        assert_eq!(bid.amount, 250_000);
        assert_eq!(bid.bidder_id.as_deref(), Some("u1"));
        assert_eq!(bid.server_timestamp, Some(ts));
    }

    #[test]
    fn test_bid_serialize_camel_case() {
        let bid = BidEvent::new("alex", 100).with_bidder_id("u1");
        let json = serde_json::to_string(&bid).expect("serialize");
        assert!(json.contains("\"bidderName\":\"alex\""));
        assert!(json.contains("\"bidderId\":\"u1\""));
        assert!(!json.contains("serverTimestamp"));
    }
}
