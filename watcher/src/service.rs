//! Watcher service.
//!
//! Follows one auction: connects, joins once the first connection opens,
//! logs every notification and view change, and leaves on shutdown.

use std::future::Future;
use std::sync::Arc;

use auction_live_sdk::resync::DEFAULT_SNAPSHOT_TIMEOUT;
use auction_live_sdk::ws::{Connector, TungsteniteConnector};
use auction_live_sdk::{
    AuctionSession, AuctionView, ConnectionState, Notification, NotificationKind,
    RestSnapshotClient, SnapshotSource, SyncError, SyncMetrics,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::config::{ConfigError, WatcherConfig};

/// Totals reported when the watcher stops.
#[derive(Debug, Clone, Serialize)]
pub struct WatchSummary {
    /// Frames received.
    pub frames_received: u64,

    /// Frames that reached a handler.
    pub frames_applied: u64,

    /// Frames dropped as malformed.
    pub frames_dropped: u64,

    /// Commands written to the socket.
    pub commands_sent: u64,

    /// Reconnects scheduled.
    pub reconnects: u64,

    /// Session uptime in seconds.
    pub uptime_secs: u64,

    /// Auction state at shutdown.
    pub final_view: AuctionView,
}

impl WatchSummary {
    fn collect(metrics: &SyncMetrics, final_view: AuctionView) -> Self {
        Self {
            frames_received: metrics.frames_received(),
            frames_applied: metrics.frames_applied(),
            frames_dropped: metrics.frames_dropped(),
            commands_sent: metrics.commands_sent(),
            reconnects: metrics.reconnects_scheduled(),
            uptime_secs: metrics.uptime().as_secs(),
            final_view,
        }
    }
}

/// The watcher service.
pub struct WatcherService {
    config: WatcherConfig,
    session: AuctionSession,
    notifications: mpsc::Receiver<Notification>,
    joined: bool,
}

impl WatcherService {
    /// Creates a watcher that connects over WebSocket.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WatcherConfig) -> Result<Self, ConfigError> {
        Self::with_connector(config, TungsteniteConnector)
    }

    /// Creates a watcher that connects through `connector`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_connector<C: Connector>(
        config: WatcherConfig,
        connector: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let snapshots: Option<Arc<dyn SnapshotSource>> = if config.resync {
            let client =
                RestSnapshotClient::new(config.api_base_url(), DEFAULT_SNAPSHOT_TIMEOUT)?;
            Some(Arc::new(client))
        } else {
            None
        };

        let (session, notifications) =
            AuctionSession::spawn(config.to_ws_config(), connector, snapshots)?;

        Ok(Self {
            config,
            session,
            notifications,
            joined: false,
        })
    }

    /// Returns the session handle.
    #[must_use]
    pub const fn session(&self) -> &AuctionSession {
        &self.session
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Runs until `shutdown` completes, then leaves and disconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured identity or join target is
    /// rejected.
    pub async fn run<F>(mut self, shutdown: F) -> Result<WatchSummary, SyncError>
    where
        F: Future<Output = ()>,
    {
        info!(
            backend = %self.config.backend_url,
            user_id = %self.config.user_id,
            auction_id = ?self.config.auction_id,
            "starting watcher"
        );
        self.session.connect(&self.config.user_id)?;

        let mut connection = self.session.watch_connection();
        let mut view = self.session.watch_view();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                Some(notification) = self.notifications.recv() => log_notification(&notification),
                changed = connection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *connection.borrow_and_update();
                    info!(state = %state, "connection state changed");
                    if state == ConnectionState::Connected {
                        self.join_once()?;
                    }
                }
                changed = view.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let summary = describe_view(&view.borrow_and_update());
                    info!(view = %summary, "auction updated");
                }
            }
        }

        self.stop().await
    }

    fn join_once(&mut self) -> Result<(), SyncError> {
        if self.joined {
            return Ok(());
        }
        if let Some((auction_id, username)) = self.config.join_target() {
            info!(auction_id, username, "joining auction");
            self.session.join_auction(auction_id, username)?;
            self.joined = true;
        }
        Ok(())
    }

    async fn stop(self) -> Result<WatchSummary, SyncError> {
        info!("shutting down watcher");

        if self.joined {
            if let Some((_, username)) = self.config.join_target() {
                self.session.leave_auction(username)?;
            }
        }

        let metrics = self.session.metrics();
        let final_view = self.session.view();
        self.session.shutdown().await;

        let summary = WatchSummary::collect(&metrics, final_view);
        info!(
            frames_received = summary.frames_received,
            frames_applied = summary.frames_applied,
            frames_dropped = summary.frames_dropped,
            commands_sent = summary.commands_sent,
            reconnects = summary.reconnects,
            uptime_secs = summary.uptime_secs,
            "watcher stopped"
        );
        Ok(summary)
    }
}

fn log_notification(notification: &Notification) {
    let duration_ms = notification.duration.as_millis() as u64;
    match notification.kind {
        NotificationKind::Error | NotificationKind::Warning => {
            warn!(kind = %notification.kind, duration_ms, "{}", notification.message);
        }
        NotificationKind::Success | NotificationKind::Info => {
            info!(kind = %notification.kind, duration_ms, "{}", notification.message);
        }
    }
}

/// Renders a one-line summary of an auction view.
#[must_use]
pub fn describe_view(view: &AuctionView) -> String {
    let latest = view
        .latest_bid()
        .map_or_else(|| "-".to_string(), |b| format!("{} ${}", b.bidder_name, b.amount));
    let remaining = view
        .timer
        .remaining_seconds
        .map_or_else(|| "-".to_string(), |s| format!("{}s", s));
    let winner = view
        .winner
        .as_ref()
        .map_or_else(|| "-".to_string(), |w| format!("{} ${}", w.username, w.winning_bid));

    format!(
        "status={} participants={} bids={} latest={} remaining={} extensions={} winner={}",
        view.status,
        view.participants.len(),
        view.bid_history.len(),
        latest,
        remaining,
        view.timer.extension_count,
        winner
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use auction_live_sdk::ws::{Transport, TransportEvent};
    use auction_live_sdk::{AuctionStatus, BidEvent, TimerState, Winner};
    use tokio::sync::oneshot;

    use super::*;

    struct ScriptedTransport {
        frames: mpsc::UnboundedReceiver<String>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send_text(&mut self, text: String) -> Result<(), SyncError> {
            self.sent.lock().expect("lock").push(text);
            Ok(())
        }

        async fn next_event(&mut self) -> TransportEvent {
            match self.frames.recv().await {
                Some(frame) => TransportEvent::Frame(frame),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self, _code: u16, _reason: &str) -> Result<(), SyncError> {
            Ok(())
        }
    }

    /// Hands out one transport, then refuses.
    struct ScriptedConnector {
        transport: Mutex<Option<ScriptedTransport>>,
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        type Transport = ScriptedTransport;

        async fn connect(&self, _url: &str) -> Result<Self::Transport, SyncError> {
            self.transport
                .lock()
                .expect("lock")
                .take()
                .ok_or_else(|| SyncError::Transport("connection refused".to_string()))
        }
    }

    fn scripted() -> (
        ScriptedConnector,
        mpsc::UnboundedSender<String>,
        Arc<Mutex<Vec<String>>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let connector = ScriptedConnector {
            transport: Mutex::new(Some(ScriptedTransport {
                frames: rx,
                sent: Arc::clone(&sent),
            })),
        };
        (connector, tx, sent)
    }

    #[test]
    fn test_describe_empty_view() {
        let text = describe_view(&AuctionView::default());
        assert_eq!(
            text,
            "status=active participants=0 bids=0 latest=- remaining=- extensions=0 winner=-"
        );
    }

    #[test]
    fn test_describe_ended_view() {
        let view = AuctionView {
            bid_history: vec![BidEvent::new("alex", 250000)],
            timer: TimerState {
                remaining_seconds: Some(0),
                extension_count: 2,
            },
            status: AuctionStatus::Ended,
            winner: Some(Winner::new("alex", 250000)),
            ..AuctionView::default()
        };
        let text = describe_view(&view);
        assert!(text.contains("latest=alex $250000"));
        assert!(text.contains("remaining=0s"));
        assert!(text.contains("extensions=2"));
        assert!(text.contains("winner=alex $250000"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_rejects_invalid_config() {
        let (connector, _frames, _sent) = scripted();
        let result = WatcherService::with_connector(WatcherConfig::new(""), connector);
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_joins_follows_and_leaves() {
        let (connector, frames, sent) = scripted();
        let config = WatcherConfig::new("u1").with_auction("a1", "alex");
        let service = WatcherService::with_connector(config, connector).expect("service");
        let mut view = service.session().watch_view();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let run = tokio::spawn(service.run(async move {
            let _ = stop_rx.await;
        }));

        while sent.lock().expect("lock").is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let join: serde_json::Value =
            serde_json::from_str(&sent.lock().expect("lock")[0]).expect("join");
        assert_eq!(join["type"], "join_auction");
        assert_eq!(join["auction_id"], "a1");

        frames
            .send(r#"{"type":"bid_update","bid":{"username":"sam","amount":260000}}"#.to_string())
            .expect("frame");
        view.wait_for(|v| v.latest_bid().is_some()).await.expect("view");

        stop_tx.send(()).expect("stop");
        let summary = run.await.expect("task").expect("summary");

        assert_eq!(summary.final_view.bid_history.len(), 1);
        assert_eq!(summary.frames_applied, 1);

        let sent = sent.lock().expect("lock");
        let leave: serde_json::Value =
            serde_json::from_str(sent.last().expect("leave")).expect("json");
        assert_eq!(leave["type"], "leave_auction");
        assert_eq!(leave["username"], "alex");
    }
}
