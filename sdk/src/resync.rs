//! Authoritative state recovery after a reconnect.
//!
//! Frames broadcast while the client was offline are lost. After a resync
//! point the session asks a [`SnapshotSource`] for the auction's current bid
//! history and status and reseeds the store with it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::SyncError;
use crate::store::AuctionSeed;
use crate::types::{parse_server_time, BidEvent, Winner};

/// Default timeout for snapshot requests.
pub const DEFAULT_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Provides authoritative auction snapshots.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetches the current state of `auction_id`.
    async fn fetch(&self, auction_id: &str) -> Result<AuctionSeed, SyncError>;
}

/// Auction record as served by the REST API.
#[derive(Debug, Deserialize)]
struct AuctionRecord {
    #[serde(default = "default_active")]
    is_active: bool,
    #[serde(default)]
    highest_bidder_id: Option<String>,
    #[serde(default)]
    current_bid: u64,
}

fn default_active() -> bool {
    true
}

/// Bid record as served by the REST API.
#[derive(Debug, Deserialize)]
struct BidRecord {
    #[serde(default)]
    user_id: Option<String>,
    username: String,
    amount: u64,
    #[serde(default)]
    timestamp: Option<String>,
}

impl BidRecord {
    fn into_event(self) -> BidEvent {
        BidEvent {
            bidder_id: self.user_id,
            bidder_name: self.username,
            amount: self.amount,
            server_timestamp: self.timestamp.as_deref().and_then(parse_server_time),
        }
    }
}

/// Builds a seed from an auction record and its bids, newest first.
fn build_seed(auction: AuctionRecord, bids: Vec<BidRecord>) -> AuctionSeed {
    let bids: Vec<BidEvent> = bids.into_iter().map(BidRecord::into_event).collect();

    let winner = if auction.is_active {
        None
    } else {
        // The auction record only carries the winner's ID; take the name from
        // the matching bid.
        bids.iter()
            .find(|b| {
                auction.highest_bidder_id.is_some() && b.bidder_id == auction.highest_bidder_id
            })
            .or_else(|| bids.first())
            .map(|b| Winner {
                user_id: b.bidder_id.clone(),
                username: b.bidder_name.clone(),
                winning_bid: auction.current_bid.max(b.amount),
            })
    };

    AuctionSeed {
        bids,
        active: auction.is_active,
        winner,
    }
}

/// Snapshot source backed by the auction REST API.
#[derive(Debug, Clone)]
pub struct RestSnapshotClient {
    base_url: String,
    http: reqwest::Client,
}

impl RestSnapshotClient {
    /// Creates a client for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty or the HTTP client cannot be
    /// built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SyncError::Configuration(
                "snapshot base URL cannot be empty".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { base_url, http })
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SnapshotSource for RestSnapshotClient {
    async fn fetch(&self, auction_id: &str) -> Result<AuctionSeed, SyncError> {
        let auction: AuctionRecord = self.get(&format!("/api/auctions/{}", auction_id)).await?;
        let bids: Vec<BidRecord> = self
            .get(&format!("/api/auctions/{}/bids", auction_id))
            .await?;

        debug!(auction_id, bids = bids.len(), active = auction.is_active, "snapshot fetched");
        Ok(build_seed(auction, bids))
    }
}
