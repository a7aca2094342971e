//! WebSocket connection state management.
//!
//! [`ConnectionManager`] owns the connection lifecycle as a state machine.
//! It performs no IO: the session driver feeds it transport events and the
//! current time, and executes the directives it returns. The heartbeat,
//! pong and reconnect timers are deadlines held here, so cancelling them is
//! a field reset.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::WsConfig;
use super::messages::CLOSE_NORMAL;
use crate::error::SyncError;
use crate::types::Identity;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No transport and no pending attempt.
    #[default]
    Disconnected,
    /// First dial in flight.
    Connecting,
    /// Transport open.
    Connected,
    /// Transport lost; waiting for or performing a redial.
    Reconnecting,
    /// Intentional close in progress.
    Closing,
}

impl ConnectionState {
    /// Returns true if `next` is a permitted successor of this state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::{Closing, Connected, Connecting, Disconnected, Reconnecting};

        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected | Reconnecting | Closing)
                | (Connected, Reconnecting | Closing | Disconnected)
                | (Reconnecting, Reconnecting | Connected | Closing)
                | (Closing, Disconnected)
        )
    }

    /// Returns true while the session wants a live connection.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// What the driver should do after a connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectDirective {
    /// Open a transport to this URL.
    Dial(String),
    /// A connection is already open or being opened.
    AlreadyActive,
}

/// What the driver should do after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDirective {
    /// Terminal close; nothing further.
    Terminal,
    /// A redial is scheduled after this delay.
    Reconnect(Duration),
}

/// A timer that came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// Send a heartbeat ping.
    Heartbeat,
    /// Backoff elapsed; dial this URL.
    Redial(String),
    /// No pong arrived in time; the transport should be dropped.
    PongOverdue,
}

/// Connection lifecycle state machine.
#[derive(Debug)]
pub struct ConnectionManager {
    config: WsConfig,
    state: ConnectionState,
    identity: Option<Identity>,
    attempts: u32,
    ever_connected: bool,
    heartbeat_at: Option<Instant>,
    pong_deadline: Option<Instant>,
    reconnect_at: Option<Instant>,
}

impl ConnectionManager {
    /// Creates a manager in the `Disconnected` state.
    #[must_use]
    pub fn new(config: WsConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            identity: None,
            attempts: 0,
            ever_connected: false,
            heartbeat_at: None,
            pong_deadline: None,
            reconnect_at: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the identity of the current or last connection.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Returns consecutive failed attempts since the last open.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns true if a heartbeat is scheduled.
    #[must_use]
    pub const fn heartbeat_scheduled(&self) -> bool {
        self.heartbeat_at.is_some()
    }

    /// Returns true if a redial is scheduled.
    #[must_use]
    pub const fn reconnect_scheduled(&self) -> bool {
        self.reconnect_at.is_some()
    }

    /// Requests a connection for `identity`.
    ///
    /// A request for a different identity than the active one must be
    /// preceded by [`disconnect`](Self::disconnect); the session driver does
    /// this when it swaps stores.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if the identity is invalid.
    pub fn connect(&mut self, identity: &str) -> Result<ConnectDirective, SyncError> {
        let identity = Identity::parse(identity)?;

        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                debug!(
                    identity = %identity,
                    state = %self.state,
                    "connect ignored, already active"
                );
                Ok(ConnectDirective::AlreadyActive)
            }
            ConnectionState::Reconnecting => {
                self.reconnect_at = None;
                let url = self.config.endpoint_url(&identity);
                self.identity = Some(identity);
                debug!(url = %url, "connect requested during backoff, dialing now");
                Ok(ConnectDirective::Dial(url))
            }
            ConnectionState::Disconnected | ConnectionState::Closing => {
                if self.state == ConnectionState::Closing {
                    // A close that never completed; treat it as done.
                    self.transition(ConnectionState::Disconnected);
                }
                self.clear_timers();
                self.attempts = 0;
                let url = self.config.endpoint_url(&identity);
                self.identity = Some(identity);
                self.transition(ConnectionState::Connecting);
                info!(url = %url, "connecting");
                Ok(ConnectDirective::Dial(url))
            }
        }
    }

    /// Records a successful open.
    ///
    /// Returns true when this open follows an earlier connection, which makes
    /// it a resynchronization point.
    pub fn on_open(&mut self, now: Instant) -> bool {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Reconnecting
        ) {
            warn!(state = %self.state, "open reported outside of a dial");
            return false;
        }

        let resumed = self.ever_connected;
        self.transition(ConnectionState::Connected);
        self.attempts = 0;
        self.ever_connected = true;
        self.reconnect_at = None;
        self.pong_deadline = None;
        self.heartbeat_at = Some(now + self.config.heartbeat_interval);

        info!(resumed, "connected");
        resumed
    }

    /// Records a dial failure. Always schedules a retry.
    pub fn on_dial_failed(&mut self, now: Instant, reason: &str) -> Duration {
        warn!(reason, "dial failed");
        self.schedule_reconnect(now)
    }

    /// Records a transport close.
    pub fn on_close(&mut self, code: Option<u16>, now: Instant) -> CloseDirective {
        self.heartbeat_at = None;
        self.pong_deadline = None;

        let intentional = self.state == ConnectionState::Closing
            || (self.state == ConnectionState::Connected && code == Some(CLOSE_NORMAL));

        if intentional || self.state == ConnectionState::Disconnected {
            self.reconnect_at = None;
            if self.state != ConnectionState::Disconnected {
                self.transition(ConnectionState::Disconnected);
            }
            info!(code = ?code, "connection closed");
            return CloseDirective::Terminal;
        }

        info!(code = ?code, "connection lost");
        CloseDirective::Reconnect(self.schedule_reconnect(now))
    }

    /// Records a transport error. Recovery is driven by the close that
    /// follows.
    pub fn on_error(&self, error: &str) {
        warn!(error, state = %self.state, "transport error");
    }

    /// Records an inbound pong.
    pub fn on_pong(&mut self) {
        self.pong_deadline = None;
    }

    /// Starts an intentional close.
    ///
    /// Cancels every timer. Returns true if the driver must close the
    /// transport and then report [`on_close`](Self::on_close).
    pub fn disconnect(&mut self) -> bool {
        self.clear_timers();

        match self.state {
            ConnectionState::Disconnected | ConnectionState::Closing => false,
            _ => {
                self.transition(ConnectionState::Closing);
                true
            }
        }
    }

    /// Returns the earliest pending timer deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.heartbeat_at, self.pong_deadline, self.reconnect_at]
            .into_iter()
            .flatten()
            .min()
    }

    /// Fires at most one due timer.
    pub fn poll_timers(&mut self, now: Instant) -> Option<TimerEvent> {
        if self.state == ConnectionState::Connected && is_due(self.pong_deadline, now) {
            self.pong_deadline = None;
            self.heartbeat_at = None;
            return Some(TimerEvent::PongOverdue);
        }

        if self.state == ConnectionState::Reconnecting && is_due(self.reconnect_at, now) {
            self.reconnect_at = None;
            let identity = self.identity.as_ref()?;
            let url = self.config.endpoint_url(identity);
            debug!(url = %url, attempt = self.attempts, "redialing");
            return Some(TimerEvent::Redial(url));
        }

        if self.state == ConnectionState::Connected && is_due(self.heartbeat_at, now) {
            self.heartbeat_at = Some(now + self.config.heartbeat_interval);
            if let Some(timeout) = self.config.pong_timeout {
                if self.pong_deadline.is_none() {
                    self.pong_deadline = Some(now + timeout);
                }
            }
            return Some(TimerEvent::Heartbeat);
        }

        None
    }

    fn schedule_reconnect(&mut self, now: Instant) -> Duration {
        self.heartbeat_at = None;
        self.pong_deadline = None;
        self.attempts = self.attempts.saturating_add(1);
        let delay = self.config.backoff.delay(self.attempts);
        self.reconnect_at = Some(now + delay);
        self.transition(ConnectionState::Reconnecting);
        debug!(attempt = self.attempts, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        delay
    }

    fn clear_timers(&mut self) {
        self.heartbeat_at = None;
        self.pong_deadline = None;
        self.reconnect_at = None;
    }

    fn transition(&mut self, next: ConnectionState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "refusing invalid state transition");
            return;
        }
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
    }
}

fn is_due(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|at| at <= now)
}
