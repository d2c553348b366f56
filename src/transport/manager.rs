//! Connection lifecycle manager.
//!
//! Owns the one live connection of a session and the timers around it.
//!
//! # State Machine
//!
//! ```text
//!                  connect()
//!   Disconnected ─────────────► Connecting ──── open ok ────► Open
//!        ▲  ▲                      │                           │
//!        │  │                      │ open failed               │ server close
//!        │  │                      ▼                           │ handshake
//!        │  └──── retries left: backoff timer ◄── dropped ◄────┤
//!        │                                                     │
//!        └──── retries exhausted / clean close / disconnect() ◄┘
//! ```
//!
//! - `connect` while `Connecting` or `Open` is a no-op.
//! - An unexpected drop with retries left schedules one reconnect after
//!   `min(base_delay * 2^attempt, max_delay)`; the state stays
//!   `Disconnected` while the timer is pending.
//! - With the budget spent, `websocket:disconnected` is published once with
//!   [`DisconnectReason::RetriesExhausted`] and nothing else happens until the
//!   next `connect`.
//! - `disconnect` cancels the link, its heartbeat and any pending timer, and
//!   never leads to a reconnect.
//!
//! # Generations
//!
//! Every connection attempt gets a new generation number. Link tasks and
//! timers report back with the generation they were started under, and
//! reports from a superseded generation are dropped. This is what keeps a
//! stale close or timer from touching a replacement connection.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::bus::{EventBus, topics};
use crate::client::ConnectionOptions;
use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, SessionId};
use crate::protocol::{Connected, DisconnectReason, Disconnected, ErrorNotice, Payload};

use super::connection::{Link, LinkCommand, LinkExit, LinkObserver, run_link};
use super::connector::Connector;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state reported by [`ConnectionManager::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No link. Initial state, and terminal after exhausted retries.
    #[default]
    Disconnected,
    /// Transport handshake in progress.
    Connecting,
    /// Link up, heartbeat running.
    Open,
}

impl ConnectionState {
    /// Lowercase name, as shown to users.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Internal State
// ============================================================================

#[derive(Default)]
struct ManagerState {
    phase: ConnectionState,
    session_id: Option<SessionId>,
    retry_count: u32,
    generation: u64,
    link: Option<Link>,
    reconnect: Option<JoinHandle<()>>,
}

impl ManagerState {
    /// Cancels a pending reconnect. Returns `true` if one was pending.
    fn cancel_reconnect(&mut self) -> bool {
        match self.reconnect.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }

    /// Releases the current link. Returns `true` if there was one.
    ///
    /// An open link is closed gracefully; a handshake in flight is aborted.
    fn release_link(&mut self) -> bool {
        let Some(link) = self.link.take() else {
            return false;
        };

        match self.phase {
            ConnectionState::Open => link.shutdown(),
            ConnectionState::Connecting | ConnectionState::Disconnected => link.abort(),
        }

        true
    }
}

struct Shared {
    bus: EventBus,
    connector: Arc<dyn Connector>,
    options: ConnectionOptions,
    state: Mutex<ManagerState>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.cancel_reconnect();
        state.release_link();
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Connection state machine for one session at a time.
///
/// Cheap to clone; clones drive the same connection. Lifecycle and inbound
/// frames are published on the [`EventBus`] given at construction:
///
/// | Topic | When |
/// |-------|------|
/// | `websocket:connected` | Transport open |
/// | `websocket:message` | Each inbound frame that parses as JSON |
/// | `websocket:error` | Open failure or transport error |
/// | `websocket:disconnected` | Link gone with no reconnect pending |
///
/// Must be used from within a Tokio runtime.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

/// Non-owning handle to a [`ConnectionManager`].
#[derive(Clone)]
pub struct WeakConnectionManager {
    shared: Weak<Shared>,
}

impl WeakConnectionManager {
    /// Returns the manager if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<ConnectionManager> {
        self.shared
            .upgrade()
            .map(|shared| ConnectionManager { shared })
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ConnectionManager")
            .field("state", &state.phase)
            .field("session_id", &state.session_id)
            .field("retry_count", &state.retry_count)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Public API
// ============================================================================

impl ConnectionManager {
    /// Creates a manager that opens transports through `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `options` fail
    /// [`ConnectionOptions::validate`].
    pub fn new(
        bus: EventBus,
        connector: Arc<dyn Connector>,
        options: ConnectionOptions,
    ) -> Result<Self> {
        options.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                bus,
                connector,
                options,
                state: Mutex::new(ManagerState::default()),
            }),
        })
    }

    /// Returns a non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakConnectionManager {
        WeakConnectionManager {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Connects to the backend stream of `session_id`.
    ///
    /// Does nothing if a connection is already open or being opened.
    /// Otherwise cancels any pending reconnect, starts with a fresh retry
    /// budget and opens a new transport in the background. The outcome is
    /// published on the bus.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidSession`] if `session_id` is blank
    /// - [`Error::Url`] if the endpoint URL cannot be built
    pub fn connect(&self, session_id: impl AsRef<str>) -> Result<()> {
        let session_id = SessionId::new(session_id.as_ref())?;
        let url = self.shared.options.endpoint(&session_id)?;

        let mut state = self.shared.state.lock();

        if matches!(
            state.phase,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            debug!(state = %state.phase, "Already connected or connecting");
            return Ok(());
        }

        state.retry_count = 0;
        self.shared.begin_attempt(&mut state, session_id, url);

        Ok(())
    }

    /// Sends `message` as a JSON text frame.
    ///
    /// Only transmits while the state is `Open`; otherwise the message is
    /// dropped with a warning. Nothing is queued for later delivery.
    ///
    /// Returns `Ok(true)` if the frame was handed to the link, `Ok(false)`
    /// if it was dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `message` cannot be serialized.
    pub fn send<T>(&self, message: &T) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        let command_tx = {
            let state = self.shared.state.lock();
            match (&state.phase, &state.link) {
                (ConnectionState::Open, Some(link)) => link.command_tx.clone(),
                _ => {
                    warn!(state = %state.phase, "WebSocket not open, dropping message");
                    return Ok(false);
                }
            }
        };

        let text = serde_json::to_string(message)?;

        if command_tx.send(LinkCommand::Send(text)).is_err() {
            warn!("Link task gone, dropping message");
            return Ok(false);
        }

        trace!("Message queued for send");
        Ok(true)
    }

    /// Tears the connection down on purpose.
    ///
    /// Cancels the heartbeat and any pending reconnect and closes the
    /// transport. Never schedules a reconnect. Publishes
    /// `websocket:disconnected` with [`DisconnectReason::Requested`] if there
    /// was anything to tear down.
    pub fn disconnect(&self) {
        let notice = {
            let mut state = self.shared.state.lock();

            let had_timer = state.cancel_reconnect();
            let had_link = state.release_link();

            state.generation += 1;
            state.phase = ConnectionState::Disconnected;

            if !had_timer && !had_link {
                debug!("Disconnect requested while already disconnected");
                return;
            }

            info!(session_id = ?state.session_id, "Disconnecting");

            Disconnected {
                session_id: state.session_id.clone(),
                reason: DisconnectReason::Requested,
            }
        };

        self.shared
            .bus
            .emit(topics::WEBSOCKET_DISCONNECTED, &Payload::Disconnected(notice));
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.lock().phase
    }

    /// Returns the number of reconnects attempted since the last open.
    #[inline]
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.shared.state.lock().retry_count
    }

    /// Returns `true` while a backoff timer is waiting to reconnect.
    #[inline]
    #[must_use]
    pub fn is_reconnect_pending(&self) -> bool {
        self.shared.state.lock().reconnect.is_some()
    }

    /// Returns the session of the current or last connection.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.shared.state.lock().session_id.clone()
    }

    /// Returns the id of the current connection attempt.
    #[must_use]
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.shared
            .state
            .lock()
            .link
            .as_ref()
            .map(|link| link.connection_id)
    }

    /// Returns the options this manager was built with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.shared.options
    }

    /// Returns the bus this manager publishes on.
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }
}

// ============================================================================
// Shared - Transitions
// ============================================================================

impl Shared {
    /// Starts a new attempt. Caller holds the state lock.
    fn begin_attempt(
        self: &Arc<Self>,
        state: &mut ManagerState,
        session_id: SessionId,
        url: Url,
    ) {
        state.cancel_reconnect();
        state.release_link();

        state.generation += 1;
        state.phase = ConnectionState::Connecting;
        state.session_id = Some(session_id);

        let generation = state.generation;
        let connection_id = ConnectionId::generate();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        info!(
            %url,
            %connection_id,
            retry = state.retry_count,
            "Connecting WebSocket"
        );

        let task = tokio::spawn(run_attempt(
            Arc::downgrade(self),
            generation,
            url,
            command_rx,
        ));

        state.link = Some(Link {
            connection_id,
            command_tx,
            task,
        });
    }

    /// Handshake succeeded. Returns `false` if the attempt was superseded.
    fn opened(&self, generation: u64) -> bool {
        let notice = {
            let mut state = self.state.lock();

            if state.generation != generation || state.phase != ConnectionState::Connecting {
                debug!(generation, "Discarding superseded connection");
                return false;
            }

            let (Some(session_id), Some(connection_id)) = (
                state.session_id.clone(),
                state.link.as_ref().map(|link| link.connection_id),
            ) else {
                return false;
            };

            state.phase = ConnectionState::Open;
            state.retry_count = 0;

            Connected {
                session_id,
                connection_id,
            }
        };

        info!(connection_id = %notice.connection_id, "WebSocket connection established");
        self.bus
            .emit(topics::WEBSOCKET_CONNECTED, &Payload::Connected(notice));
        true
    }

    /// Handshake failed: report it, then treat it as an unexpected close.
    fn open_failed(self: &Arc<Self>, generation: u64, error: Error) {
        if !self.is_current(generation) {
            return;
        }

        warn!(error = %error, "Failed to open WebSocket");
        self.bus.emit(
            topics::WEBSOCKET_ERROR,
            &Payload::Error(ErrorNotice::from_error(&error)),
        );

        self.link_closed(generation, LinkExit::Dropped);
    }

    /// A link ended; decide between reconnecting and giving up.
    fn link_closed(self: &Arc<Self>, generation: u64, exit: LinkExit) {
        let notice = {
            let mut state = self.state.lock();

            if state.generation != generation {
                trace!(generation, "Ignoring close of superseded connection");
                return;
            }

            state.link = None;
            state.phase = ConnectionState::Disconnected;

            let reason = match exit {
                LinkExit::Requested => return,

                LinkExit::Closed { code, reason } => {
                    info!(?code, %reason, "WebSocket closed by server");
                    DisconnectReason::Closed { code, reason }
                }

                LinkExit::Dropped if state.retry_count < self.options.max_retries => {
                    state.retry_count += 1;
                    let attempt = state.retry_count;
                    let delay = self.options.reconnect_delay(attempt);

                    info!(
                        attempt,
                        max_retries = self.options.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Scheduling reconnect"
                    );

                    state.reconnect = Some(tokio::spawn(reconnect_after(
                        Arc::downgrade(self),
                        generation,
                        delay,
                    )));
                    return;
                }

                LinkExit::Dropped => {
                    warn!(
                        attempts = state.retry_count,
                        "Reconnect attempts exhausted, giving up"
                    );
                    DisconnectReason::RetriesExhausted {
                        attempts: state.retry_count,
                    }
                }
            };

            Disconnected {
                session_id: state.session_id.clone(),
                reason,
            }
        };

        self.bus
            .emit(topics::WEBSOCKET_DISCONNECTED, &Payload::Disconnected(notice));
    }

    /// Backoff elapsed.
    fn reconnect_due(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock();

        if state.generation != generation || state.phase != ConnectionState::Disconnected {
            return;
        }

        // Taken rather than aborted: this runs on the timer task itself.
        if state.reconnect.take().is_none() {
            return;
        }

        let Some(session_id) = state.session_id.clone() else {
            return;
        };

        match self.options.endpoint(&session_id) {
            Ok(url) => {
                debug!(retry = state.retry_count, "Reconnecting");
                self.begin_attempt(&mut state, session_id, url);
            }
            Err(e) => error!(error = %e, "Cannot rebuild endpoint for reconnect"),
        }
    }

    fn deliver_frame(&self, generation: u64, frame: Value) {
        if !self.is_current(generation) {
            trace!(generation, "Dropping frame from superseded connection");
            return;
        }

        self.bus
            .emit(topics::WEBSOCKET_MESSAGE, &Payload::Frame(frame));
    }

    fn report_error(&self, generation: u64, error: Error) {
        if !self.is_current(generation) {
            return;
        }

        self.bus.emit(
            topics::WEBSOCKET_ERROR,
            &Payload::Error(ErrorNotice::from_error(&error)),
        );
    }

    #[inline]
    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }
}

// ============================================================================
// Background Tasks
// ============================================================================

/// Opens the transport, then drives it until it ends.
async fn run_attempt(
    shared: Weak<Shared>,
    generation: u64,
    url: Url,
    command_rx: mpsc::UnboundedReceiver<LinkCommand>,
) {
    let Some(strong) = shared.upgrade() else {
        return;
    };
    let connector = Arc::clone(&strong.connector);
    let connect_timeout = strong.options.connect_timeout;
    let heartbeat_every = strong.options.heartbeat_interval;
    drop(strong);

    let opened = match timeout(connect_timeout, connector.open(&url)).await {
        Ok(result) => result,
        Err(_) => Err(Error::connection_timeout(connect_timeout.as_millis() as u64)),
    };

    let transport = match opened {
        Ok(transport) => transport,
        Err(e) => {
            if let Some(strong) = shared.upgrade() {
                strong.open_failed(generation, e);
            }
            return;
        }
    };

    match shared.upgrade() {
        Some(strong) if strong.opened(generation) => {}
        _ => return,
    }

    run_link(
        transport,
        command_rx,
        heartbeat_every,
        LinkContext::new(shared, generation),
    )
    .await;
}

/// Single-shot backoff timer.
async fn reconnect_after(shared: Weak<Shared>, generation: u64, delay: Duration) {
    sleep(delay).await;

    if let Some(strong) = shared.upgrade() {
        strong.reconnect_due(generation);
    }
}

/// Routes link callbacks back to the manager that started the link.
///
/// If the link task unwinds or is dropped before reporting how it ended, the
/// link counts as dropped.
struct LinkContext {
    shared: Weak<Shared>,
    generation: u64,
    closed: AtomicBool,
}

impl LinkContext {
    fn new(shared: Weak<Shared>, generation: u64) -> Self {
        Self {
            shared,
            generation,
            closed: AtomicBool::new(false),
        }
    }
}

impl Drop for LinkContext {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Acquire) || Handle::try_current().is_err() {
            return;
        }

        if let Some(shared) = self.shared.upgrade() {
            if shared.is_current(self.generation) {
                warn!(generation = self.generation, "Link task ended abnormally");
            }
            shared.link_closed(self.generation, LinkExit::Dropped);
        }
    }
}

impl LinkObserver for LinkContext {
    fn on_frame(&self, frame: Value) {
        if let Some(shared) = self.shared.upgrade() {
            shared.deliver_frame(self.generation, frame);
        }
    }

    fn on_error(&self, error: Error) {
        if let Some(shared) = self.shared.upgrade() {
            shared.report_error(self.generation, error);
        }
    }

    fn on_closed(&self, exit: LinkExit) {
        self.closed.store(true, Ordering::Release);
        if let Some(shared) = self.shared.upgrade() {
            shared.link_closed(self.generation, exit);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
