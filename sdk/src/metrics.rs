//! Synchronization metrics.
//!
//! Provides atomic counters for monitoring a session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for an auction session.
#[derive(Debug)]
pub struct SyncMetrics {
    /// Frames received from the transport.
    frames_received: AtomicU64,

    /// Frames routed to a handler.
    frames_applied: AtomicU64,

    /// Frames dropped as unparseable.
    frames_dropped: AtomicU64,

    /// Frames with an unknown type.
    frames_unknown: AtomicU64,

    /// Auction frames ignored after the auction ended.
    frames_after_end: AtomicU64,

    /// Commands written to the transport.
    commands_sent: AtomicU64,

    /// Commands dropped while not connected or on send failure.
    commands_dropped: AtomicU64,

    /// Successful opens.
    connections_opened: AtomicU64,

    /// Reconnects scheduled.
    reconnects_scheduled: AtomicU64,

    /// Transport errors.
    transport_errors: AtomicU64,

    /// Heartbeats that went unanswered.
    pong_timeouts: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_applied: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            frames_unknown: AtomicU64::new(0),
            frames_after_end: AtomicU64::new(0),
            commands_sent: AtomicU64::new(0),
            commands_dropped: AtomicU64::new(0),
            connections_opened: AtomicU64::new(0),
            reconnects_scheduled: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            pong_timeouts: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a received frame.
    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a routed frame.
    pub fn record_frame_applied(&self) {
        self.frames_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped frame.
    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a frame with an unknown type.
    pub fn record_frame_unknown(&self) {
        self.frames_unknown.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a frame ignored because the auction ended.
    pub fn record_frame_after_end(&self) {
        self.frames_after_end.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a sent command.
    pub fn record_command_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped command.
    pub fn record_command_dropped(&self) {
        self.commands_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful open.
    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a scheduled reconnect.
    pub fn record_reconnect_scheduled(&self) {
        self.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a transport error.
    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a missed pong.
    pub fn record_pong_timeout(&self) {
        self.pong_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns frames received.
    #[must_use]
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Returns frames routed.
    #[must_use]
    pub fn frames_applied(&self) -> u64 {
        self.frames_applied.load(Ordering::Relaxed)
    }

    /// Returns frames dropped.
    #[must_use]
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    /// Returns frames with an unknown type.
    #[must_use]
    pub fn frames_unknown(&self) -> u64 {
        self.frames_unknown.load(Ordering::Relaxed)
    }

    /// Returns frames ignored after the auction ended.
    #[must_use]
    pub fn frames_after_end(&self) -> u64 {
        self.frames_after_end.load(Ordering::Relaxed)
    }

    /// Returns commands sent.
    #[must_use]
    pub fn commands_sent(&self) -> u64 {
        self.commands_sent.load(Ordering::Relaxed)
    }

    /// Returns commands dropped.
    #[must_use]
    pub fn commands_dropped(&self) -> u64 {
        self.commands_dropped.load(Ordering::Relaxed)
    }

    /// Returns successful opens.
    #[must_use]
    pub fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    /// Returns reconnects scheduled.
    #[must_use]
    pub fn reconnects_scheduled(&self) -> u64 {
        self.reconnects_scheduled.load(Ordering::Relaxed)
    }

    /// Returns transport errors.
    #[must_use]
    pub fn transport_errors(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }

    /// Returns missed pongs.
    #[must_use]
    pub fn pong_timeouts(&self) -> u64 {
        self.pong_timeouts.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the share of received frames that were routed (0.0 to 1.0).
    #[must_use]
    pub fn applied_rate(&self) -> f64 {
        let received = self.frames_received();
        if received == 0 {
            return 0.0;
        }
        self.frames_applied() as f64 / received as f64
    }
}
