//! Core types for the auction synchronization client.

pub mod auction;
pub mod bid;
pub mod identity;
pub mod participant;
pub mod timestamp;

pub use auction::{AuctionStatus, TimerState, Winner};
pub use bid::BidEvent;
pub use identity::Identity;
pub use participant::Participant;
pub use timestamp::parse_server_time;
