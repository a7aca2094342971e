//! Auction Live SDK - real-time auction synchronization client.
//!
//! This crate keeps a client-side view of a live auction in step with the
//! server over a WebSocket connection, survives transient disconnects, and
//! raises user-facing notifications for auction events.
//!
//! # Components
//!
//! - [`AuctionSession`] - Connection handle and session driver
//! - [`ConnectionManager`] - Connection lifecycle state machine
//! - [`AuctionStateStore`] - Canonical auction state for one identity
//! - [`MessageRouter`] - Dispatches inbound frames to handlers
//! - [`NotificationEmitter`] - Fire-and-forget user notifications
//! - [`OutboundCommandSender`] - Sends commands while connected
//! - [`RestSnapshotClient`] - Fetches authoritative state after a reconnect
//!
//! # Example
//!
//! ```rust
//! use auction_live_sdk::{AuctionStateStore, BidEvent, Identity};
//!
//! let mut store = AuctionStateStore::new(Identity::parse("user-1").unwrap());
//! store.apply_bid(BidEvent::new("alex", 250000)).unwrap();
//! assert_eq!(store.view().latest_bid().map(|b| b.amount), Some(250000));
//! ```

pub mod error;
pub mod metrics;
pub mod notify;
pub mod resync;
pub mod router;
pub mod sender;
pub mod store;
pub mod types;
pub mod ws;

pub use error::{StateError, SyncError};
pub use metrics::SyncMetrics;
pub use notify::{Notification, NotificationEmitter, NotificationKind};
pub use resync::{RestSnapshotClient, SnapshotSource};
pub use router::{Dispatch, MessageRouter};
pub use sender::{OutboundCommandSender, SendOutcome};
pub use store::{AuctionSeed, AuctionStateStore, AuctionView, BID_HISTORY_LIMIT};
pub use types::{AuctionStatus, BidEvent, Identity, Participant, TimerState, Winner};
pub use ws::{
    AuctionSession, BackoffPolicy, ConnectionManager, ConnectionState, OutboundCommand, WsConfig,
};
