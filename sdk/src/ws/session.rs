//! Auction session.
//!
//! [`AuctionSession`] is the caller's handle. Every call on it enqueues a
//! command for a single driver task, which owns the transport, the
//! [`ConnectionManager`] and the [`AuctionStateStore`]. Inbound frames, timers,
//! dials, snapshot results and caller commands are serialized through one
//! `select!` loop. Observers read connection state and the auction view
//! through `watch` channels.

use std::future::pending;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::config::WsConfig;
use super::connection::{
    CloseDirective, ConnectDirective, ConnectionManager, ConnectionState, TimerEvent,
};
use super::messages::{OutboundCommand, CLOSE_NORMAL};
use super::transport::{Connector, Transport, TransportEvent};
use crate::error::SyncError;
use crate::metrics::SyncMetrics;
use crate::notify::{Notification, NotificationEmitter};
use crate::resync::SnapshotSource;
use crate::router::{Dispatch, MessageRouter};
use crate::sender::{OutboundCommandSender, SendOutcome};
use crate::store::{AuctionSeed, AuctionStateStore, AuctionView};
use crate::types::Identity;

type DialFuture<T> = BoxFuture<'static, Result<T, SyncError>>;
type SnapshotTask = (u64, JoinHandle<Result<AuctionSeed, SyncError>>);

#[derive(Debug)]
enum SessionCommand {
    Connect(Identity),
    Disconnect,
    Send(OutboundCommand),
    Shutdown,
}

/// Handle to a running auction session.
///
/// Dropping the handle stops the driver task, which closes the connection
/// with code 1000.
#[derive(Debug)]
pub struct AuctionSession {
    commands: mpsc::UnboundedSender<SessionCommand>,
    connection: watch::Receiver<ConnectionState>,
    view: watch::Receiver<AuctionView>,
    metrics: Arc<SyncMetrics>,
    task: JoinHandle<()>,
}

impl AuctionSession {
    /// Starts a session driver and returns its handle together with the
    /// notification stream.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if `config` is invalid.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<C: Connector>(
        config: WsConfig,
        connector: C,
        snapshots: Option<Arc<dyn SnapshotSource>>,
    ) -> Result<(Self, mpsc::Receiver<Notification>), SyncError> {
        config.validate()?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (connection_tx, connection_rx) = watch::channel(ConnectionState::Disconnected);
        let (view_tx, view_rx) = watch::channel(AuctionView::default());
        let (emitter, notifications) = NotificationEmitter::channel(config.notification_capacity);
        let metrics = Arc::new(SyncMetrics::new());

        let driver = SessionDriver {
            rejoin_on_reconnect: config.rejoin_on_reconnect,
            manager: ConnectionManager::new(config),
            connector: Arc::new(connector),
            router: MessageRouter::new(Arc::clone(&metrics)),
            sender: OutboundCommandSender::new(Arc::clone(&metrics)),
            emitter,
            metrics: Arc::clone(&metrics),
            store: None,
            generation: 0,
            transport: None,
            dial: None,
            snapshots,
            snapshot_task: None,
            joined: None,
            commands: commands_rx,
            connection_tx,
            view_tx,
        };
        let task = tokio::spawn(driver.run());

        Ok((
            Self {
                commands: commands_tx,
                connection: connection_rx,
                view: view_rx,
                metrics,
                task,
            },
            notifications,
        ))
    }

    /// Connects as `identity`.
    ///
    /// Idempotent while a connection for the same identity is open or being
    /// opened. A different identity closes the current connection and starts
    /// from an empty auction state.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if the identity is empty or
    /// malformed.
    pub fn connect(&self, identity: &str) -> Result<(), SyncError> {
        let identity = Identity::parse(identity)?;
        self.enqueue(SessionCommand::Connect(identity));
        Ok(())
    }

    /// Closes the connection intentionally. No reconnect follows.
    pub fn disconnect(&self) {
        self.enqueue(SessionCommand::Disconnect);
    }

    /// Sends a command. Commands issued while not connected are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidCommand`] if a required field is blank.
    pub fn send(&self, command: OutboundCommand) -> Result<(), SyncError> {
        command.validate()?;
        self.enqueue(SessionCommand::Send(command));
        Ok(())
    }

    /// Joins an auction room.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidCommand`] if either field is blank.
    pub fn join_auction(&self, auction_id: &str, username: &str) -> Result<(), SyncError> {
        self.send(OutboundCommand::join(auction_id, username))
    }

    /// Leaves the current auction room.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidCommand`] if the username is blank.
    pub fn leave_auction(&self, username: &str) -> Result<(), SyncError> {
        self.send(OutboundCommand::leave(username))
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    /// Returns a receiver that observes connection state changes.
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    /// Returns a snapshot of the auction state.
    #[must_use]
    pub fn view(&self) -> AuctionView {
        self.view.borrow().clone()
    }

    /// Returns a receiver that observes auction state changes.
    #[must_use]
    pub fn watch_view(&self) -> watch::Receiver<AuctionView> {
        self.view.clone()
    }

    /// Returns the session metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<SyncMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Closes the connection and waits for the driver task to finish.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        let _ = commands.send(SessionCommand::Shutdown);
        drop(commands);
        if let Err(e) = task.await {
            warn!(error = %e, "session task failed");
        }
    }

    fn enqueue(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            debug!("session task has stopped, command ignored");
        }
    }
}

struct SessionDriver<C: Connector> {
    rejoin_on_reconnect: bool,
    manager: ConnectionManager,
    connector: Arc<C>,
    router: MessageRouter,
    sender: OutboundCommandSender,
    emitter: NotificationEmitter,
    metrics: Arc<SyncMetrics>,
    store: Option<AuctionStateStore>,
    generation: u64,
    transport: Option<C::Transport>,
    dial: Option<DialFuture<C::Transport>>,
    snapshots: Option<Arc<dyn SnapshotSource>>,
    snapshot_task: Option<SnapshotTask>,
    joined: Option<OutboundCommand>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    connection_tx: watch::Sender<ConnectionState>,
    view_tx: watch::Sender<AuctionView>,
}

impl<C: Connector> SessionDriver<C> {
    async fn run(mut self) {
        debug!("session started");

        loop {
            let deadline = self.manager.next_deadline();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                result = wait_dial(&mut self.dial) => {
                    self.dial = None;
                    self.handle_dial(result).await;
                }
                event = next_event(&mut self.transport) => self.handle_transport(event),
                () = sleep_until_deadline(deadline) => self.handle_timers().await,
                (generation, result) = wait_snapshot(&mut self.snapshot_task) => {
                    self.snapshot_task = None;
                    self.handle_snapshot(generation, result);
                }
            }
        }

        self.close_intentionally().await;
        debug!("session stopped");
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect(identity) => self.handle_connect(identity).await,
            SessionCommand::Disconnect => self.close_intentionally().await,
            SessionCommand::Send(command) => self.handle_send(command).await,
            SessionCommand::Shutdown => {}
        }
    }

    async fn handle_connect(&mut self, identity: Identity) {
        let current = self.store.as_ref().map(|s| s.identity().clone());
        let switching = current.as_ref().is_some_and(|c| *c != identity);

        if switching {
            let from = current.as_ref().map(Identity::as_str);
            info!(from = ?from, to = %identity, "identity changed");
            self.close_intentionally().await;
        }

        if switching || self.store.is_none() {
            self.generation += 1;
            self.store = Some(AuctionStateStore::new(identity.clone()));
            self.publish_view();
        }

        match self.manager.connect(identity.as_str()) {
            Ok(ConnectDirective::Dial(url)) => self.start_dial(url),
            Ok(ConnectDirective::AlreadyActive) => {}
            Err(e) => warn!(error = %e, "connect rejected"),
        }
        self.publish_state();
    }

    async fn handle_send(&mut self, command: OutboundCommand) {
        let outcome = self
            .sender
            .send(self.manager.state(), self.transport.as_mut(), &command)
            .await;

        if outcome == SendOutcome::Sent {
            if let OutboundCommand::JoinAuction { auction_id, .. } = &command {
                self.start_resync(auction_id.clone());
            }
        }

        match command {
            OutboundCommand::JoinAuction { .. } if outcome == SendOutcome::Sent => {
                self.joined = Some(command);
            }
            OutboundCommand::LeaveAuction { .. } => {
                self.joined = None;
                self.abort_snapshot();
            }
            _ => {}
        }
    }

    fn start_dial(&mut self, url: String) {
        self.transport = None;
        let connector = Arc::clone(&self.connector);
        self.dial = Some(Box::pin(async move { connector.connect(&url).await }));
    }

    async fn handle_dial(&mut self, result: Result<C::Transport, SyncError>) {
        match result {
            Ok(transport) => {
                self.transport = Some(transport);
                let resumed = self.manager.on_open(Instant::now());
                self.metrics.record_connection_opened();
                self.publish_state();
                if resumed {
                    self.resynchronize().await;
                }
            }
            Err(e) => {
                self.metrics.record_transport_error();
                let delay = self.manager.on_dial_failed(Instant::now(), &e.to_string());
                self.metrics.record_reconnect_scheduled();
                debug!(delay_ms = delay.as_millis() as u64, "retry scheduled");
                self.publish_state();
            }
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(raw) => {
                let Some(store) = self.store.as_mut() else {
                    debug!("frame received without a store");
                    return;
                };
                match self.router.dispatch(&raw, store, &self.emitter) {
                    Dispatch::Pong => self.manager.on_pong(),
                    outcome if outcome.changed_state() => self.publish_view(),
                    _ => {}
                }
            }
            TransportEvent::Error(e) => {
                self.metrics.record_transport_error();
                self.manager.on_error(&e);
            }
            TransportEvent::Closed { code, reason } => {
                debug!(code = ?code, reason = %reason, "transport closed");
                self.transport = None;
                self.on_closed(code);
            }
        }
    }

    async fn handle_timers(&mut self) {
        while let Some(event) = self.manager.poll_timers(Instant::now()) {
            match event {
                TimerEvent::Heartbeat => {
                    self.sender
                        .send(self.manager.state(), self.transport.as_mut(), &OutboundCommand::Ping)
                        .await;
                }
                TimerEvent::Redial(url) => self.start_dial(url),
                TimerEvent::PongOverdue => {
                    warn!("no pong received, dropping connection");
                    self.metrics.record_pong_timeout();
                    self.transport = None;
                    self.on_closed(None);
                }
            }
        }
    }

    fn on_closed(&mut self, code: Option<u16>) {
        if let CloseDirective::Reconnect(delay) = self.manager.on_close(code, Instant::now()) {
            self.metrics.record_reconnect_scheduled();
            debug!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        }
        self.publish_state();
    }

    async fn resynchronize(&mut self) {
        let Some(join) = self.joined.clone() else {
            return;
        };

        if self.rejoin_on_reconnect {
            info!("rejoining auction after reconnect");
            self.sender
                .send(self.manager.state(), self.transport.as_mut(), &join)
                .await;
        }

        if let OutboundCommand::JoinAuction { auction_id, .. } = join {
            self.start_resync(auction_id);
        }
    }

    fn start_resync(&mut self, auction_id: String) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        store.begin_resync();
        self.publish_view();

        let Some(source) = self.snapshots.clone() else {
            return;
        };
        self.abort_snapshot();
        debug!(auction_id = %auction_id, generation = self.generation, "fetching snapshot");
        let task = tokio::spawn(async move { source.fetch(&auction_id).await });
        self.snapshot_task = Some((self.generation, task));
    }

    fn handle_snapshot(&mut self, generation: u64, result: Result<AuctionSeed, SyncError>) {
        if generation != self.generation {
            debug!(generation, current = self.generation, "discarding stale snapshot");
            return;
        }

        match result {
            Ok(seed) => {
                let Some(store) = self.store.as_mut() else {
                    return;
                };
                match store.restore(seed) {
                    Ok(()) => {
                        info!(bids = store.bid_count(), "state restored from snapshot");
                        self.publish_view();
                    }
                    Err(e) => debug!(error = %e, "snapshot not applied"),
                }
            }
            Err(e) => warn!(error = %e, "snapshot fetch failed"),
        }
    }

    async fn close_intentionally(&mut self) {
        self.dial = None;
        self.joined = None;
        self.abort_snapshot();

        if !self.manager.disconnect() {
            return;
        }

        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close(CLOSE_NORMAL, "client disconnect").await {
                debug!(error = %e, "close frame not delivered");
            }
        }

        self.manager.on_close(Some(CLOSE_NORMAL), Instant::now());
        self.publish_state();
    }

    fn abort_snapshot(&mut self) {
        if let Some((_, task)) = self.snapshot_task.take() {
            task.abort();
        }
    }

    fn publish_state(&self) {
        let state = self.manager.state();
        self.connection_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    fn publish_view(&self) {
        if let Some(store) = self.store.as_ref() {
            self.view_tx.send_replace(store.view());
        }
    }
}

async fn wait_dial<T>(dial: &mut Option<DialFuture<T>>) -> Result<T, SyncError> {
    match dial {
        Some(dial) => dial.await,
        None => pending().await,
    }
}

async fn next_event<T: Transport>(transport: &mut Option<T>) -> TransportEvent {
    match transport {
        Some(transport) => transport.next_event().await,
        None => pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}

async fn wait_snapshot(task: &mut Option<SnapshotTask>) -> (u64, Result<AuctionSeed, SyncError>) {
    match task {
        Some((generation, handle)) => {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(SyncError::Transport(format!("snapshot task failed: {}", e))),
            };
            (*generation, result)
        }
        None => pending().await,
    }
}
