//! Outbound command sending.
//!
//! Commands are written only while the connection is open. Anything sent
//! in another state is dropped with a log line; nothing is queued.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::metrics::SyncMetrics;
use crate::ws::connection::ConnectionState;
use crate::ws::messages::OutboundCommand;
use crate::ws::transport::Transport;

/// Outcome of a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written to the transport.
    Sent,
    /// Not connected, or the write failed.
    Dropped,
    /// The command failed validation or encoding.
    Rejected,
}

/// Serializes commands and writes them to the open transport.
#[derive(Debug, Clone)]
pub struct OutboundCommandSender {
    metrics: Arc<SyncMetrics>,
}

impl OutboundCommandSender {
    /// Creates a sender that records into `metrics`.
    #[must_use]
    pub fn new(metrics: Arc<SyncMetrics>) -> Self {
        Self { metrics }
    }

    /// Sends `command` if `state` is `Connected` and a transport is present.
    pub async fn send<T>(
        &self,
        state: ConnectionState,
        transport: Option<&mut T>,
        command: &OutboundCommand,
    ) -> SendOutcome
    where
        T: Transport + ?Sized,
    {
        let text = match command.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(kind = command.kind(), error = %e, "rejecting command");
                return SendOutcome::Rejected;
            }
        };

        let transport = match transport {
            Some(t) if state == ConnectionState::Connected => t,
            _ => {
                debug!(kind = command.kind(), state = %state, "not connected, dropping command");
                self.metrics.record_command_dropped();
                return SendOutcome::Dropped;
            }
        };

        match transport.send_text(text).await {
            Ok(()) => {
                debug!(kind = command.kind(), "command sent");
                self.metrics.record_command_sent();
                SendOutcome::Sent
            }
            Err(e) => {
                warn!(kind = command.kind(), error = %e, "command send failed");
                self.metrics.record_command_dropped();
                SendOutcome::Dropped
            }
        }
    }
}
