//! User-facing notifications.
//!
//! Transient signals raised by inbound events. Emission is fire-and-forget:
//! the emitter never waits on the consumer and never touches auction state.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Display duration for success notifications.
pub const SUCCESS_DURATION: Duration = Duration::from_secs(2);

/// Display duration for info notifications.
pub const INFO_DURATION: Duration = Duration::from_secs(3);

/// Display duration for error notifications.
pub const ERROR_DURATION: Duration = Duration::from_secs(4);

/// Display duration for warning notifications.
pub const WARNING_DURATION: Duration = Duration::from_secs(5);

/// Display duration for the final countdown warning.
pub const FINAL_WARNING_DURATION: Duration = Duration::from_secs(6);

/// Display duration for the auction result.
pub const RESULT_DURATION: Duration = Duration::from_secs(5);

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Something good happened.
    Success,
    /// Something failed.
    Error,
    /// Needs attention.
    Warning,
    /// Neutral information.
    Info,
}

impl NotificationKind {
    /// Maps a wire kind; anything unrecognized is `Info`.
    #[must_use]
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "success" => Self::Success,
            "error" => Self::Error,
            "warning" => Self::Warning,
            _ => Self::Info,
        }
    }

    /// Returns the default display duration.
    #[must_use]
    pub const fn default_duration(&self) -> Duration {
        match self {
            Self::Success => SUCCESS_DURATION,
            Self::Info => INFO_DURATION,
            Self::Error => ERROR_DURATION,
            Self::Warning => WARNING_DURATION,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A transient user-facing signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Severity.
    pub kind: NotificationKind,

    /// Message text.
    pub message: String,

    /// How long to show it.
    pub duration: Duration,
}

impl Notification {
    /// Creates a notification with the kind's default duration.
    #[must_use]
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            duration: kind.default_duration(),
        }
    }

    /// Overrides the display duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Sends notifications to a bounded channel without waiting.
#[derive(Debug, Clone)]
pub struct NotificationEmitter {
    tx: mpsc::Sender<Notification>,
}

impl NotificationEmitter {
    /// Creates an emitter and the receiving end of its channel.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Emits a notification. Returns false if it was dropped.
    pub fn emit(&self, notification: Notification) -> bool {
        match self.tx.try_send(notification) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!(
                    kind = %n.kind,
                    message = %n.message,
                    "notification dropped, consumer is behind"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                debug!(kind = %n.kind, "notification dropped, no consumer");
                false
            }
        }
    }

    /// Emits a success notification.
    pub fn success(&self, message: impl Into<String>) -> bool {
        self.emit(Notification::new(NotificationKind::Success, message))
    }

    /// Emits an info notification.
    pub fn info(&self, message: impl Into<String>) -> bool {
        self.emit(Notification::new(NotificationKind::Info, message))
    }

    /// Emits a warning notification.
    pub fn warning(&self, message: impl Into<String>) -> bool {
        self.emit(Notification::new(NotificationKind::Warning, message))
    }

    /// Emits an error notification.
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.emit(Notification::new(NotificationKind::Error, message))
    }

    /// Emits a notification whose kind came off the wire.
    pub fn from_wire(&self, kind: &str, message: impl Into<String>) -> bool {
        self.emit(Notification::new(NotificationKind::from_wire(kind), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_wire() {
        assert_eq!(NotificationKind::from_wire("success"), NotificationKind::Success);
        assert_eq!(NotificationKind::from_wire("error"), NotificationKind::Error);
        assert_eq!(NotificationKind::from_wire("warning"), NotificationKind::Warning);
        assert_eq!(NotificationKind::from_wire("info"), NotificationKind::Info);
        assert_eq!(NotificationKind::from_wire("achievement"), NotificationKind::Info);
        assert_eq!(NotificationKind::from_wire(""), NotificationKind::Info);
    }

    #[test]
    fn test_kinds_have_distinct_durations() {
        let kinds = [
            NotificationKind::Success,
            NotificationKind::Error,
            NotificationKind::Warning,
            NotificationKind::Info,
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a.default_duration(), b.default_duration(), "{} vs {}", a, b);
            }
        }
        assert!(FINAL_WARNING_DURATION > WARNING_DURATION);
    }

    #[test]
    fn test_emit_delivers() {
        let (emitter, mut rx) = NotificationEmitter::channel(4);
        assert!(emitter.success("done"));
        assert!(emitter.from_wire("warning", "careful"));

        let first = rx.try_recv().expect("first");
        assert_eq!(first.kind, NotificationKind::Success);
        assert_eq!(first.message, "done");
        assert_eq!(first.duration, SUCCESS_DURATION);

        let second = rx.try_recv().expect("second");
        assert_eq!(second.kind, NotificationKind::Warning);
    }

    #[test]
    fn test_emit_drops_when_full() {
        let (emitter, mut rx) = NotificationEmitter::channel(1);
        assert!(emitter.info("one"));
        assert!(!emitter.info("two"));
        assert_eq!(rx.try_recv().expect("one").message, "one");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_without_consumer() {
        let (emitter, rx) = NotificationEmitter::channel(1);
        drop(rx);
        assert!(!emitter.error("nobody listens"));
    }

    #[test]
    fn test_with_duration() {
        let n = Notification::new(NotificationKind::Warning, "Final 10 seconds!")
            .with_duration(FINAL_WARNING_DURATION);
        assert_eq!(n.duration, FINAL_WARNING_DURATION);
    }
}
