//! Connection lifecycle management for the gateway WebSocket.
//!
//! A single background task owns the transport connection, the
//! subscription ledger, and the outbound queue. It handles:
//!
//! - Authentication (credentials resolved fresh on every attempt)
//! - Connection-establishment timeout
//! - Automatic reconnection with exponential backoff
//! - Heartbeat pings and pong-timeout liveness detection
//! - Replay of live subscriptions after every successful (re)connection
//! - FIFO flush of queued outbound messages, after the replay
//!
//! The public handle talks to the task over a command channel; connection
//! state is mirrored into shared atomics so `is_connected()` and the
//! health snapshot are synchronous reads.

use crate::{
    auth::ResolvedAuth,
    config::{AmoraLinkTimeouts, ConnectionOptions},
    dispatcher::MessageDispatcher,
    error::{AmoraLinkError, Result},
    event_handlers::{ConnectionError, DisconnectReason, EventHandlers},
    models::{is_valid_channel_name, message_type, HealthSnapshot, TypedMessage},
    queue::OutboundQueue,
    subscriptions::SubscriptionLedger,
    transport::{resolve_gateway_url, Transport, TransportConn, TransportEvent, CLOSE_CODE_NORMAL},
};
use std::sync::{
    atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering},
    Arc,
};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;

/// Command channel depth between the public handle and the task.
const CMD_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle state of the gateway connection.
///
/// Owned by the connection task; everyone else observes it through the
/// shared status mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection, none being attempted.
    Closed,
    /// A connection or reconnection attempt is in flight.
    Connecting,
    /// Connected and able to send.
    Open,
    /// An intentional close is in progress.
    Closing,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Connecting => 1,
            Self::Open => 2,
            Self::Closing => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Shared mirror of the connection task's state, readable without
/// going through the command channel.
#[derive(Debug, Default)]
pub(crate) struct ConnectionStatus {
    state: AtomicU8,
    authenticated: AtomicBool,
    reconnect_attempts: AtomicU32,
    /// Millis since Unix epoch of the last observed pong; 0 = never.
    last_pong_ms: AtomicU64,
}

impl ConnectionStatus {
    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn set_authenticated(&self, value: bool) {
        self.authenticated.store(value, Ordering::SeqCst);
    }

    pub(crate) fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    fn set_reconnect_attempts(&self, value: u32) {
        self.reconnect_attempts.store(value, Ordering::SeqCst);
    }

    fn record_pong(&self) {
        self.last_pong_ms.store(now_ms(), Ordering::SeqCst);
    }

    /// Derive a health snapshot on demand.
    pub(crate) fn snapshot(&self, pong_timeout: Duration) -> HealthSnapshot {
        let state = self.state();
        let last_pong = self.last_pong_ms.load(Ordering::SeqCst);
        let time_since_last_pong = if last_pong == 0 {
            None
        } else {
            Some(Duration::from_millis(now_ms().saturating_sub(last_pong)))
        };
        let healthy = state == ConnectionState::Open
            && self.is_authenticated()
            && time_since_last_pong.is_some_and(|d| d < pong_timeout);
        HealthSnapshot {
            healthy,
            state,
            time_since_last_pong,
            reconnect_attempts: self.reconnect_attempts(),
            is_authenticated: self.is_authenticated(),
        }
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

/// Commands sent from the public handle to the connection task.
enum Cmd {
    /// Establish a connection. Replies `Ok` immediately when one already
    /// exists; during a reconnect backoff the remaining wait is skipped
    /// and the reply carries that attempt's result.
    Connect { ready: oneshot::Sender<Result<()>> },
    /// Intentional teardown: clears subscriptions and handlers, suppresses
    /// reconnects, closes with a normal code. Acked once fully applied.
    Disconnect { done: oneshot::Sender<()> },
    /// Send a message now. With `queue_offline`, a failed send lands in
    /// the outbound queue. Replies whether the direct send succeeded.
    SendMessage {
        message: TypedMessage,
        queue_offline: bool,
        reply: oneshot::Sender<bool>,
    },
    /// Add a channel to the ledger and subscribe immediately if open.
    Subscribe {
        channel: String,
        reply: oneshot::Sender<bool>,
    },
    /// Remove a channel from the ledger, unsubscribing best-effort.
    Unsubscribe {
        channel: String,
        reply: oneshot::Sender<bool>,
    },
    /// Stop the task entirely (client dropped).
    Shutdown,
}

/// Cheap-to-clone handle that routes outbound messages through the
/// connection task. Domain services hold one of these and nothing else.
#[derive(Clone)]
pub struct GatewaySender {
    cmd_tx: mpsc::Sender<Cmd>,
}

impl GatewaySender {
    /// Send a message, queueing it when not connected or when the direct
    /// send fails. Returns `true` only for an immediate successful send.
    pub async fn send_message(&self, message: TypedMessage) -> bool {
        self.dispatch_send(message, true).await
    }

    /// Send a message that is only meaningful right now (heartbeats).
    /// Returns `false` without queueing when not connected.
    pub async fn send_transient(&self, message: TypedMessage) -> bool {
        self.dispatch_send(message, false).await
    }

    async fn dispatch_send(&self, message: TypedMessage, queue_offline: bool) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Cmd::SendMessage {
                message,
                queue_offline,
                reply,
            })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Subscribe to a channel. Returns `true` when the subscribe frame was
    /// sent immediately; `false` when it will be replayed on the next open.
    pub async fn subscribe(&self, channel: &str) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Cmd::Subscribe {
                channel: channel.to_string(),
                reply,
            })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Unsubscribe from a channel. Returns `true` when the unsubscribe
    /// frame was sent.
    pub async fn unsubscribe(&self, channel: &str) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Cmd::Unsubscribe {
                channel: channel.to_string(),
                reply,
            })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }
}

impl std::fmt::Debug for GatewaySender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySender").finish()
    }
}

// ── Connection handle ───────────────────────────────────────────────────────

/// Owning handle for the background connection task.
pub(crate) struct Connection {
    cmd_tx: mpsc::Sender<Cmd>,
    status: Arc<ConnectionStatus>,
    pong_timeout: Duration,
    _task: JoinHandle<()>,
}

impl Connection {
    /// Spawn the connection task. Must be called within a tokio runtime.
    pub(crate) fn spawn(
        base_url: String,
        auth: ResolvedAuth,
        options: ConnectionOptions,
        timeouts: AmoraLinkTimeouts,
        transport: Arc<dyn Transport>,
        dispatcher: Arc<MessageDispatcher>,
        event_handlers: EventHandlers,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(CMD_CHANNEL_CAPACITY);
        let status = Arc::new(ConnectionStatus::default());
        let pong_timeout = timeouts.pong_timeout;

        let task = ConnectionTask {
            cmd_rx,
            base_url,
            auth,
            outbound: OutboundQueue::new(options.outbound_queue_capacity, options.max_send_retries),
            options,
            timeouts,
            transport,
            dispatcher,
            event_handlers,
            status: status.clone(),
            ledger: SubscriptionLedger::new(),
            conn: None,
            principal: None,
            reconnect_pending: false,
            shutdown: false,
            last_pong_at: TokioInstant::now(),
            next_beat: TokioInstant::now(),
        };

        Self {
            cmd_tx,
            status,
            pong_timeout,
            _task: tokio::spawn(task.run()),
        }
    }

    pub(crate) fn sender(&self) -> GatewaySender {
        GatewaySender {
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Establish the connection. The task answers: `Ok` right away when a
    /// connection already exists, otherwise the result of the attempt this
    /// call triggers. Stale mirror state is never trusted here, so a
    /// `connect()` racing a teardown still produces a real attempt.
    pub(crate) async fn connect(&self) -> Result<()> {
        let (ready, rx) = oneshot::channel();
        self.cmd_tx
            .send(Cmd::Connect { ready })
            .await
            .map_err(|_| {
                AmoraLinkError::WebSocketError("Connection task is not running".to_string())
            })?;
        rx.await.map_err(|_| {
            AmoraLinkError::WebSocketError(
                "Connection task stopped before the attempt completed".to_string(),
            )
        })?
    }

    /// Intentional teardown. Idempotent; cancels any pending reconnect.
    /// Resolves only after the task has fully applied the teardown, so a
    /// follow-up `connect()` never observes it half-done.
    pub(crate) async fn disconnect(&self) {
        let (done, rx) = oneshot::channel();
        if self.cmd_tx.send(Cmd::Disconnect { done }).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.status.state() == ConnectionState::Open
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.status.state()
    }

    pub(crate) fn health(&self) -> HealthSnapshot {
        self.status.snapshot(self.pong_timeout)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Best-effort shutdown signal.
        let _ = self.cmd_tx.try_send(Cmd::Shutdown);
    }
}

// ── Background task ─────────────────────────────────────────────────────────

enum Step {
    Cmd(Option<Cmd>),
    Heartbeat,
    Event(TransportEvent),
}

struct ConnectionTask {
    cmd_rx: mpsc::Receiver<Cmd>,
    base_url: String,
    auth: ResolvedAuth,
    options: ConnectionOptions,
    timeouts: AmoraLinkTimeouts,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<MessageDispatcher>,
    event_handlers: EventHandlers,
    status: Arc<ConnectionStatus>,
    ledger: SubscriptionLedger,
    outbound: OutboundQueue,
    conn: Option<Box<dyn TransportConn>>,
    /// User id captured on the last explicit connect; reconnects refuse to
    /// proceed when the credential provider starts returning a different
    /// principal mid-session.
    principal: Option<String>,
    reconnect_pending: bool,
    shutdown: bool,
    /// Heartbeat bookkeeping on the runtime clock (virtualizable in tests).
    last_pong_at: TokioInstant,
    next_beat: TokioInstant,
}

impl ConnectionTask {
    async fn run(mut self) {
        loop {
            if self.shutdown {
                if let Some(mut conn) = self.conn.take() {
                    conn.close(CLOSE_CODE_NORMAL, "Client shutting down").await;
                }
                self.status.set_state(ConnectionState::Closed);
                return;
            }

            if self.conn.is_some() {
                self.run_open().await;
            } else if self.reconnect_pending && self.status.is_authenticated() {
                self.run_reconnect_cycle().await;
            } else {
                match self.cmd_rx.recv().await {
                    Some(cmd) => self.handle_cmd(cmd).await,
                    None => {
                        // All handles dropped.
                        self.shutdown = true;
                    },
                }
            }
        }
    }

    /// One iteration of the connected event loop: multiplex commands, the
    /// heartbeat timer, and inbound transport events.
    async fn run_open(&mut self) {
        let heartbeat_enabled = !self.timeouts.heartbeat_interval.is_zero();
        let beat = tokio::time::sleep_until(self.next_beat);
        tokio::pin!(beat);

        let step = {
            let Some(conn) = self.conn.as_mut() else {
                return;
            };
            let cmd_rx = &mut self.cmd_rx;
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => Step::Cmd(cmd),

                _ = &mut beat, if heartbeat_enabled => Step::Heartbeat,

                event = conn.next_event() => Step::Event(event),
            }
        };

        match step {
            Step::Cmd(Some(cmd)) => self.handle_cmd(cmd).await,
            Step::Cmd(None) => {
                self.shutdown = true;
            },
            Step::Heartbeat => self.run_heartbeat().await,
            Step::Event(event) => self.handle_transport_event(event).await,
        }
    }

    /// Heartbeat tick: detect a stale connection, otherwise send a ping.
    async fn run_heartbeat(&mut self) {
        if self.last_pong_at.elapsed() >= self.timeouts.pong_timeout {
            log::warn!(
                "[amora-link] No pong for {:?}, treating connection as dead",
                self.timeouts.pong_timeout
            );
            // Dropping the socket without a close handshake is an abnormal
            // closure; the standard reconnect policy takes over.
            self.connection_lost(DisconnectReason::new(format!(
                "Heartbeat timeout ({:?}) - gateway unresponsive",
                self.timeouts.pong_timeout
            )));
            return;
        }

        if !self.send_frame(&TypedMessage::ping()).await {
            log::warn!("[amora-link] Heartbeat ping failed to send");
            self.connection_lost(DisconnectReason::new("Heartbeat ping failed"));
            return;
        }
        log::debug!(
            "[amora-link] Heartbeat ping sent (interval {:?})",
            self.timeouts.heartbeat_interval
        );
        self.next_beat = TokioInstant::now() + self.timeouts.heartbeat_interval;
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(text) => self.handle_frame(&text),
            TransportEvent::Closed { code } => {
                let reason = match code {
                    Some(c) => DisconnectReason::with_code("Gateway closed the connection", c),
                    None => DisconnectReason::new("Gateway connection ended"),
                };
                self.connection_lost(reason);
            },
            TransportEvent::Error(message) => {
                self.event_handlers
                    .emit_error(ConnectionError::new(&message, true));
                self.connection_lost(DisconnectReason::new(format!(
                    "Transport error: {}",
                    message
                )));
            },
        }
    }

    /// Parse and route one inbound frame. Pong frames only feed the
    /// heartbeat tracker; everything else goes to the dispatcher. Parse
    /// failures are logged and the frame dropped.
    fn handle_frame(&mut self, text: &str) {
        let message = match TypedMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("[amora-link] Failed to parse inbound frame: {}", e);
                return;
            },
        };

        if message.message_type == message_type::PONG {
            self.status.record_pong();
            self.last_pong_at = TokioInstant::now();
            log::debug!("[amora-link] Pong received");
            return;
        }

        self.dispatcher.distribute(&message);
    }

    /// Record a lost connection and arm the reconnect policy when the close
    /// was not a normal closure and the session is still authenticated.
    fn connection_lost(&mut self, reason: DisconnectReason) {
        let normal = reason.code == Some(CLOSE_CODE_NORMAL);
        log::info!("[amora-link] Connection lost: {}", reason);
        self.event_handlers.emit_disconnect(reason);
        self.conn = None;
        self.status.set_state(ConnectionState::Closed);
        self.reconnect_pending =
            !normal && self.options.auto_reconnect && self.status.is_authenticated();
    }

    async fn handle_cmd(&mut self, cmd: Cmd) {
        match cmd {
            Cmd::Connect { ready } => {
                if self.conn.is_some() {
                    let _ = ready.send(Ok(()));
                    return;
                }
                self.status.set_state(ConnectionState::Connecting);
                match self.establish(false).await {
                    Ok(()) => {
                        self.after_open().await;
                        let _ = ready.send(Ok(()));
                    },
                    Err(e) => {
                        // A failed explicit attempt is terminal for that
                        // call; no reconnect is scheduled from here.
                        self.status.set_state(ConnectionState::Closed);
                        let _ = ready.send(Err(e));
                    },
                }
            },
            Cmd::Disconnect { done } => {
                self.do_disconnect().await;
                let _ = done.send(());
            },
            Cmd::SendMessage {
                message,
                queue_offline,
                reply,
            } => {
                let sent = self.conn.is_some() && self.send_frame(&message).await;
                if !sent && queue_offline {
                    self.outbound.enqueue(message);
                }
                let _ = reply.send(sent);
            },
            Cmd::Subscribe { channel, reply } => {
                if !is_valid_channel_name(&channel) {
                    log::warn!("[amora-link] Rejecting invalid channel name '{}'", channel);
                    let _ = reply.send(false);
                    return;
                }
                self.ledger.insert(&channel);
                // The ledger alone carries offline subscriptions; they are
                // replayed once on the next open rather than queued, so a
                // channel is never announced twice in one flush.
                let sent =
                    self.conn.is_some() && self.send_frame(&TypedMessage::subscribe(&channel)).await;
                let _ = reply.send(sent);
            },
            Cmd::Unsubscribe { channel, reply } => {
                self.ledger.remove(&channel);
                // Best-effort: when disconnected there is nothing to
                // unsubscribe from on the server.
                let sent = self.conn.is_some()
                    && self.send_frame(&TypedMessage::unsubscribe(&channel)).await;
                let _ = reply.send(sent);
            },
            Cmd::Shutdown => {
                self.shutdown = true;
            },
        }
    }

    /// Intentional teardown: subscriptions first, then handlers, then the
    /// socket, so no stray resubscription or dispatch can occur mid-way.
    async fn do_disconnect(&mut self) {
        self.ledger.clear();
        self.dispatcher.clear();
        self.status.set_authenticated(false);
        self.reconnect_pending = false;
        self.principal = None;

        if let Some(mut conn) = self.conn.take() {
            self.status.set_state(ConnectionState::Closing);
            conn.close(CLOSE_CODE_NORMAL, "Client disconnecting").await;
        }
        self.status.set_state(ConnectionState::Closed);
        log::info!("[amora-link] Disconnected");
    }

    /// Resolve credentials and open the transport, applying the
    /// connection-establishment deadline.
    ///
    /// With `check_principal`, the attempt is refused when the credential
    /// provider now identifies a different user than the session was
    /// opened for (a token swap mid-session must not silently reconnect
    /// as someone else).
    async fn establish(&mut self, check_principal: bool) -> Result<()> {
        let creds = self.auth.resolve().await?.ok_or_else(|| {
            AmoraLinkError::AuthenticationError(
                "Cannot connect without credentials".to_string(),
            )
        })?;
        if !creds.is_complete() {
            return Err(AmoraLinkError::AuthenticationError(
                "Cannot connect without a token and an identified user".to_string(),
            ));
        }

        if check_principal {
            if let Some(principal) = &self.principal {
                if *principal != creds.user_id {
                    return Err(AmoraLinkError::AuthenticationError(format!(
                        "Principal changed mid-session ('{}' -> '{}'); refusing to reconnect",
                        principal, creds.user_id
                    )));
                }
            }
        }

        // The URL is rebuilt per attempt so a refreshed token is always used.
        let url = resolve_gateway_url(&self.base_url, &creds.access_token)?;
        log::debug!("[amora-link] Opening gateway connection");

        let opened =
            tokio::time::timeout(self.timeouts.connection_timeout, self.transport.open(&url))
                .await;
        let conn = match opened {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                self.event_handlers
                    .emit_error(ConnectionError::new(e.to_string(), true));
                return Err(e);
            },
            Err(_) => {
                let message = format!(
                    "Connection timeout ({:?})",
                    self.timeouts.connection_timeout
                );
                self.event_handlers
                    .emit_error(ConnectionError::new(&message, true));
                return Err(AmoraLinkError::TimeoutError(message));
            },
        };

        // Only a completed open establishes a session; a refused or timed
        // out attempt leaves the snapshot unauthenticated.
        self.status.set_authenticated(true);
        self.principal = Some(creds.user_id);
        self.conn = Some(conn);
        Ok(())
    }

    /// Post-open bookkeeping: reset the attempt counter, baseline the
    /// heartbeat, replay subscriptions, then flush the outbound queue —
    /// in that order, so replayed subscriptions are in place before queued
    /// application messages go out.
    async fn after_open(&mut self) {
        self.status.set_state(ConnectionState::Open);
        self.status.set_reconnect_attempts(0);
        self.status.record_pong();
        self.last_pong_at = TokioInstant::now();
        self.next_beat = TokioInstant::now() + self.timeouts.heartbeat_interval;
        self.reconnect_pending = false;

        log::info!("[amora-link] Gateway connection established");
        self.event_handlers.emit_connect();

        self.resubscribe_all().await;
        self.flush_outbound().await;
    }

    /// Replay a subscribe frame for every channel in the live set.
    async fn resubscribe_all(&mut self) {
        let channels = self.ledger.channels();
        if channels.is_empty() {
            return;
        }
        log::info!(
            "[amora-link] Replaying {} subscription(s) after (re)connect",
            channels.len()
        );
        for channel in channels {
            if !self.send_frame(&TypedMessage::subscribe(&channel)).await {
                log::warn!("[amora-link] Failed to replay subscription '{}'", channel);
            }
        }
    }

    /// Flush the outbound queue in FIFO order. Failed sends are requeued
    /// until their retry budget runs out.
    async fn flush_outbound(&mut self) {
        let pending = self.outbound.drain();
        if pending.is_empty() {
            return;
        }
        log::info!("[amora-link] Flushing {} queued message(s)", pending.len());
        for envelope in pending {
            if !self.send_frame(&envelope.message).await {
                self.outbound.requeue_failed(envelope);
            }
        }
    }

    /// Encode and send one frame over the live connection. Returns `false`
    /// when not connected, on encoding failure, or on a socket error.
    async fn send_frame(&mut self, message: &TypedMessage) -> bool {
        let Some(conn) = self.conn.as_mut() else {
            return false;
        };
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                log::warn!(
                    "[amora-link] Failed to encode '{}' message: {}",
                    message.message_type,
                    e
                );
                return false;
            },
        };
        match conn.send(&text).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "[amora-link] Failed to send '{}' message: {}",
                    message.message_type,
                    e
                );
                false
            },
        }
    }

    /// One reconnect cycle: wait out the backoff (servicing commands),
    /// then attempt. Exhaustion reports a terminal error once and leaves
    /// the client closed until an explicit `connect()`.
    async fn run_reconnect_cycle(&mut self) {
        let attempt = self.status.reconnect_attempts() + 1;
        if attempt > self.options.max_reconnect_attempts {
            let message = format!(
                "Max reconnection attempts ({}) reached",
                self.options.max_reconnect_attempts
            );
            log::warn!("[amora-link] {}", message);
            self.event_handlers
                .emit_error(ConnectionError::new(message, false));
            self.give_up_reconnecting();
            return;
        }
        self.status.set_reconnect_attempts(attempt);
        self.status.set_state(ConnectionState::Connecting);

        let delay = self.options.backoff_delay(attempt);
        log::info!(
            "[amora-link] Reconnecting in {:?} (attempt {}/{})",
            delay,
            attempt,
            self.options.max_reconnect_attempts
        );

        // Wait out the backoff while still servicing commands; a
        // disconnect or shutdown arriving here cancels the reconnect, and
        // an explicit connect skips the remaining wait.
        let mut explicit_ready: Option<oneshot::Sender<Result<()>>> = None;
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            let step = {
                let cmd_rx = &mut self.cmd_rx;
                tokio::select! {
                    biased;
                    cmd = cmd_rx.recv() => Some(cmd),
                    _ = &mut sleep => None,
                }
            };
            match step {
                Some(Some(Cmd::Connect { ready })) => {
                    explicit_ready = Some(ready);
                    break;
                },
                Some(Some(cmd)) => {
                    self.handle_cmd(cmd).await;
                    if self.shutdown || !self.reconnect_pending {
                        return;
                    }
                },
                Some(None) => {
                    self.shutdown = true;
                    return;
                },
                None => break, // backoff elapsed
            }
        }

        match self.establish(true).await {
            Ok(()) => {
                self.after_open().await;
                if let Some(ready) = explicit_ready {
                    let _ = ready.send(Ok(()));
                }
            },
            Err(e) => {
                if matches!(e, AmoraLinkError::AuthenticationError(_)) {
                    // Signed out or principal swapped: stop reconnecting.
                    log::warn!("[amora-link] Abandoning reconnect: {}", e);
                    self.event_handlers
                        .emit_error(ConnectionError::new(e.to_string(), false));
                    self.give_up_reconnecting();
                } else {
                    log::warn!(
                        "[amora-link] Reconnection attempt {} failed: {}",
                        attempt,
                        e
                    );
                    // Loop back; the next cycle doubles the delay.
                }
                if let Some(ready) = explicit_ready {
                    let _ = ready.send(Err(e));
                }
            },
        }
    }

    fn give_up_reconnecting(&mut self) {
        self.reconnect_pending = false;
        self.status.set_authenticated(false);
        self.status.set_state(ConnectionState::Closed);
    }
}
