//! SDK error types.
//!
//! Provides the error taxonomy for the synchronization client. Only
//! [`SyncError::Configuration`] and [`SyncError::InvalidCommand`] ever reach
//! callers of [`crate::AuctionSession`]; every other variant is handled inside
//! the session loop.

use crate::ws::error::ProtocolError;

/// Synchronization errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Missing or invalid identity or configuration. Fatal for the call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection drop or dial failure. Drives reconnection.
    #[error("transport error: {0}")]
    Transport(String),

    /// Unparseable or malformed inbound frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Rejected state mutation.
    #[error(transparent)]
    State(#[from] StateError),

    /// Outbound command failed validation.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Snapshot request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl SyncError {
    /// Returns true if the caller must fix its input before retrying.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::InvalidCommand(_))
    }
}

/// Errors raised by the auction state store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// The auction already ended; no further mutation is accepted.
    #[error("auction has ended")]
    AuctionEnded,
}
