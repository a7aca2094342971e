//! WebSocket message types.
//!
//! Defines the frames exchanged with the auction server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ProtocolError;
use crate::error::SyncError;
use crate::types::{parse_server_time, BidEvent, Winner};

/// Close code for an intentional, normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code reported when a connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Server-to-client messages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// A new bid was accepted.
    BidUpdate {
        /// Bid payload.
        bid: BidPayload,
        /// Broadcast time.
        #[serde(default)]
        timestamp: Option<String>,
    },
    /// A user joined the auction room.
    UserJoined {
        /// User ID.
        user_id: String,
        /// Display name.
        username: String,
        /// Join time.
        #[serde(default)]
        timestamp: Option<String>,
    },
    /// A user left the auction room.
    UserLeft {
        /// User ID.
        user_id: String,
    },
    /// Authoritative countdown value.
    TimerUpdate {
        /// Seconds remaining.
        time_remaining: i64,
    },
    /// Countdown is getting low.
    TimerWarning {
        /// Human-readable message.
        message: String,
    },
    /// Countdown is about to expire.
    TimerFinalWarning {
        /// Human-readable message.
        message: String,
    },
    /// The countdown was extended.
    TimerExtended {
        /// Seconds added.
        additional_seconds: u64,
    },
    /// Auction status change.
    AuctionStatus {
        /// New status.
        status: StatusKind,
        /// Status details.
        #[serde(default)]
        data: StatusData,
    },
    /// Server-pushed notification for this user.
    Notification {
        /// Notification payload.
        notification: NotificationPayload,
    },
    /// Heartbeat response.
    Pong,
}

impl InboundMessage {
    /// Wire names of every message type this client understands.
    pub const KNOWN_TYPES: [&'static str; 10] = [
        "bid_update",
        "user_joined",
        "user_left",
        "timer_update",
        "timer_warning",
        "timer_final_warning",
        "timer_extended",
        "auction_status",
        "notification",
        "pong",
    ];

    /// Returns the wire name of this message type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BidUpdate { .. } => "bid_update",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::TimerUpdate { .. } => "timer_update",
            Self::TimerWarning { .. } => "timer_warning",
            Self::TimerFinalWarning { .. } => "timer_final_warning",
            Self::TimerExtended { .. } => "timer_extended",
            Self::AuctionStatus { .. } => "auction_status",
            Self::Notification { .. } => "notification",
            Self::Pong => "pong",
        }
    }

    /// Returns true for frames that describe the auction itself.
    ///
    /// These are ignored once the auction has ended.
    #[must_use]
    pub const fn is_auction_event(&self) -> bool {
        !matches!(self, Self::Notification { .. } | Self::Pong)
    }
}

/// Bid payload inside a `bid_update` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BidPayload {
    /// Bidder user ID.
    #[serde(default, alias = "bidder_id")]
    pub user_id: Option<String>,

    /// Bidder display name.
    #[serde(alias = "bidder", alias = "bidder_name")]
    pub username: String,

    /// Bid amount.
    pub amount: u64,

    /// Bid acceptance time.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl BidPayload {
    /// Converts the payload into a bid event.
    ///
    /// The bid's own timestamp wins over the frame's broadcast time.
    #[must_use]
    pub fn into_event(self, frame_timestamp: Option<&str>) -> BidEvent {
        let server_timestamp = self
            .timestamp
            .as_deref()
            .or(frame_timestamp)
            .and_then(parse_server_time);

        BidEvent {
            bidder_id: self.user_id,
            bidder_name: self.username,
            amount: self.amount,
            server_timestamp,
        }
    }
}

/// Status value inside an `auction_status` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Auction is running.
    Active,
    /// Auction has closed.
    Ended,
    /// Any status this client does not act on.
    #[serde(other)]
    Other,
}

/// Details inside an `auction_status` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatusData {
    /// Winner, if any bid was placed.
    #[serde(default)]
    pub winner: Option<Winner>,

    /// Final price.
    #[serde(default)]
    pub final_price: Option<u64>,
}

/// Payload of a `notification` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationPayload {
    /// Notification kind (`success`, `error`, `warning`, anything else).
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Human-readable message.
    pub message: String,
}

/// Client-to-server commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundCommand {
    /// Join an auction room.
    JoinAuction {
        /// Auction ID.
        auction_id: String,
        /// Display name.
        username: String,
    },
    /// Leave the current auction room.
    LeaveAuction {
        /// Display name.
        username: String,
    },
    /// Heartbeat.
    Ping,
}

impl OutboundCommand {
    /// Creates a join command.
    #[must_use]
    pub fn join(auction_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self::JoinAuction {
            auction_id: auction_id.into(),
            username: username.into(),
        }
    }

    /// Creates a leave command.
    #[must_use]
    pub fn leave(username: impl Into<String>) -> Self {
        Self::LeaveAuction {
            username: username.into(),
        }
    }

    /// Returns the wire name of this command.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::JoinAuction { .. } => "join_auction",
            Self::LeaveAuction { .. } => "leave_auction",
            Self::Ping => "ping",
        }
    }

    /// Validates the command fields.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidCommand`] if a required field is blank.
    pub fn validate(&self) -> Result<(), SyncError> {
        match self {
            Self::JoinAuction {
                auction_id,
                username,
            } => {
                if auction_id.trim().is_empty() {
                    return Err(SyncError::InvalidCommand(
                        "auction_id cannot be empty".to_string(),
                    ));
                }
                if username.trim().is_empty() {
                    return Err(SyncError::InvalidCommand(
                        "username cannot be empty".to_string(),
                    ));
                }
                Ok(())
            }
            Self::LeaveAuction { username } => {
                if username.trim().is_empty() {
                    return Err(SyncError::InvalidCommand(
                        "username cannot be empty".to_string(),
                    ));
                }
                Ok(())
            }
            Self::Ping => Ok(()),
        }
    }

    /// Serializes the command to its wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is invalid.
    pub fn encode(&self) -> Result<String, SyncError> {
        self.validate()?;
        serde_json::to_string(self).map_err(|e| SyncError::InvalidCommand(e.to_string()))
    }
}

/// Decodes one inbound frame.
///
/// # Errors
///
/// Returns a [`ProtocolError`] if the frame is not JSON, lacks a `type`,
/// declares an unknown type, or carries a payload that does not match its
/// type.
pub fn parse_frame(raw: &str) -> Result<InboundMessage, ProtocolError> {
    let value: Value = serde_json::from_str(raw)?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    if !InboundMessage::KNOWN_TYPES.contains(&kind.as_str()) {
        return Err(ProtocolError::UnknownType(kind));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}
