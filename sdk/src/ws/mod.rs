//! Real-time auction synchronization over WebSocket.
//!
//! The entry point is [`AuctionSession`], which owns one connection for one
//! subscriber identity and keeps an [`AuctionView`](crate::AuctionView)
//! current as frames arrive.
//!
//! # Example
//!
//! ```rust,ignore
//! use auction_live_sdk::ws::{AuctionSession, TungsteniteConnector, WsConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WsConfig::new("http://localhost:8001");
//!     let (session, mut notifications) =
//!         AuctionSession::spawn(config, TungsteniteConnector, None)?;
//!
//!     session.connect("user-1")?;
//!     session.join_auction("auction-1", "alex")?;
//!
//!     while let Some(notification) = notifications.recv().await {
//!         println!("{}: {}", notification.kind, notification.message);
//!     }
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod connection;
pub mod error;
pub mod messages;
pub mod session;
pub mod transport;

pub use backoff::BackoffPolicy;
pub use config::WsConfig;
pub use connection::{ConnectionManager, ConnectionState};
pub use error::ProtocolError;
pub use messages::{parse_frame, InboundMessage, OutboundCommand, CLOSE_NORMAL};
pub use session::AuctionSession;
pub use transport::{Connector, Transport, TransportEvent, TungsteniteConnector};
