//! Inbound message routing.
//!
//! [`MessageRouter`] decodes a frame and hands it to exactly one handler.
//! Handlers mutate the [`AuctionStateStore`], raise a notification, or both.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::metrics::SyncMetrics;
use crate::notify::{
    Notification, NotificationEmitter, NotificationKind, FINAL_WARNING_DURATION, RESULT_DURATION,
};
use crate::store::AuctionStateStore;
use crate::types::{parse_server_time, Participant};
use crate::ws::messages::{parse_frame, InboundMessage, StatusKind};

/// Outcome of routing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The store changed.
    Applied,
    /// Only a notification was raised.
    Notified,
    /// A heartbeat response.
    Pong,
    /// Understood but intentionally ignored.
    Ignored,
    /// Unparseable; dropped.
    Dropped,
}

impl Dispatch {
    /// Returns true if observers should see a new view.
    #[must_use]
    pub const fn changed_state(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Routes inbound frames to their handlers.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    metrics: Arc<SyncMetrics>,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new(Arc::new(SyncMetrics::new()))
    }
}

impl MessageRouter {
    /// Creates a router that records into `metrics`.
    #[must_use]
    pub fn new(metrics: Arc<SyncMetrics>) -> Self {
        Self { metrics }
    }

    /// Decodes and routes one raw frame. Never fails: bad frames are logged
    /// and dropped.
    pub fn dispatch(
        &self,
        raw: &str,
        store: &mut AuctionStateStore,
        emitter: &NotificationEmitter,
    ) -> Dispatch {
        self.metrics.record_frame_received();

        match parse_frame(raw) {
            Ok(message) => self.route(message, store, emitter),
            Err(e) if e.is_unknown_type() => {
                debug!(error = %e, "ignoring frame");
                self.metrics.record_frame_unknown();
                Dispatch::Ignored
            }
            Err(e) => {
                warn!(error = %e, "dropping frame");
                self.metrics.record_frame_dropped();
                Dispatch::Dropped
            }
        }
    }

    /// Routes a decoded message.
    pub fn route(
        &self,
        message: InboundMessage,
        store: &mut AuctionStateStore,
        emitter: &NotificationEmitter,
    ) -> Dispatch {
        if store.is_ended() && message.is_auction_event() {
            debug!(kind = message.kind(), "ignoring frame after auction end");
            self.metrics.record_frame_after_end();
            return Dispatch::Ignored;
        }

        let outcome = match message {
            InboundMessage::BidUpdate { bid, timestamp } => {
                let event = bid.into_event(timestamp.as_deref());
                let summary = format!("{} bid ${}!", event.bidder_name, event.amount);
                match store.apply_bid(event) {
                    Ok(()) => {
                        emitter.success(summary);
                        Dispatch::Applied
                    }
                    Err(_) => Dispatch::Ignored,
                }
            }
            InboundMessage::UserJoined {
                user_id,
                username,
                timestamp,
            } => {
                let joined_at = timestamp
                    .as_deref()
                    .and_then(parse_server_time)
                    .unwrap_or_else(Utc::now);
                let summary = format!("{} joined the auction!", username);
                match store.upsert_participant(Participant::new(user_id, username, joined_at)) {
                    Ok(()) => {
                        emitter.info(summary);
                        Dispatch::Applied
                    }
                    Err(_) => Dispatch::Ignored,
                }
            }
            InboundMessage::UserLeft { user_id } => match store.remove_participant(&user_id) {
                Ok(true) => Dispatch::Applied,
                Ok(false) | Err(_) => Dispatch::Ignored,
            },
            InboundMessage::TimerUpdate { time_remaining } => {
                match store.set_remaining(time_remaining) {
                    Ok(()) => Dispatch::Applied,
                    Err(_) => Dispatch::Ignored,
                }
            }
            InboundMessage::TimerWarning { message } => {
                emitter.warning(message);
                Dispatch::Notified
            }
            InboundMessage::TimerFinalWarning { message } => {
                emitter.emit(
                    Notification::new(NotificationKind::Warning, message)
                        .with_duration(FINAL_WARNING_DURATION),
                );
                Dispatch::Notified
            }
            InboundMessage::TimerExtended { additional_seconds } => {
                emitter.info(format!("Timer extended by {} seconds!", additional_seconds));
                match store.record_extension() {
                    Ok(()) => Dispatch::Applied,
                    Err(_) => Dispatch::Notified,
                }
            }
            InboundMessage::AuctionStatus { status, data } => match status {
                StatusKind::Ended => {
                    let summary = match &data.winner {
                        Some(winner) => Notification::new(
                            NotificationKind::Success,
                            format!(
                                "Auction ended! {} won with ${}!",
                                winner.username, winner.winning_bid
                            ),
                        ),
                        None => Notification::new(
                            NotificationKind::Info,
                            "Auction ended without a winning bid",
                        ),
                    };
                    match store.set_ended(data.winner) {
                        Ok(()) => {
                            info!(identity = %store.identity(), "auction ended");
                            emitter.emit(summary.with_duration(RESULT_DURATION));
                            Dispatch::Applied
                        }
                        Err(_) => Dispatch::Ignored,
                    }
                }
                StatusKind::Active | StatusKind::Other => {
                    debug!(status = ?status, "ignoring auction status");
                    Dispatch::Ignored
                }
            },
            InboundMessage::Notification { notification } => {
                emitter.from_wire(&notification.kind, notification.message);
                Dispatch::Notified
            }
            InboundMessage::Pong => Dispatch::Pong,
        };

        if outcome != Dispatch::Ignored {
            self.metrics.record_frame_applied();
        }
        outcome
    }
}
