//! Realtime client facade.
//!
//! The [`Client`] wires one event bus, one connection manager and one
//! attached message router together. Applications subscribe on
//! [`Client::bus`] and drive the connection through the pass-through
//! methods.
//!
//! # Example
//!
//! ```no_run
//! use analysis_realtime::bus::topics;
//! use analysis_realtime::Client;
//!
//! # async fn example() -> analysis_realtime::Result<()> {
//! let client = Client::builder().host("localhost:8000").build()?;
//!
//! client.bus().on(topics::ANALYSIS_FINAL, |payload| {
//!     if let Some(event) = payload.as_content() {
//!         println!("{}", event.content);
//!     }
//!     Ok(())
//! });
//!
//! client.connect("4f1c-session")?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::bus::EventBus;
use crate::error::Result;
use crate::identifiers::SubscriptionId;
use crate::router::{AutoResponder, MessageRouter};
use crate::transport::{ConnectionManager, ConnectionState, Connector};

use super::builder::ClientBuilder;
use super::options::ConnectionOptions;

// ============================================================================
// Client
// ============================================================================

/// Event bus, connection manager and message router for one session link.
pub struct Client {
    bus: EventBus,
    manager: ConnectionManager,
    router: MessageRouter,
    routing: Mutex<Option<SubscriptionId>>,
    responder: Mutex<Option<AutoResponder>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("manager", &self.manager)
            .field("auto_confirm", &self.responder.lock().is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Construction
// ============================================================================

impl Client {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn new(
        bus: EventBus,
        connector: Arc<dyn Connector>,
        options: ConnectionOptions,
        auto_confirm_input: bool,
    ) -> Result<Self> {
        let manager = ConnectionManager::new(bus.clone(), connector, options)?;
        let router = MessageRouter::new(bus.clone());
        let routing = router.attach();

        let client = Self {
            bus,
            manager,
            router,
            routing: Mutex::new(Some(routing)),
            responder: Mutex::new(None),
        };

        client.set_auto_confirm(auto_confirm_input);
        Ok(client)
    }
}

// ============================================================================
// Client - Accessors
// ============================================================================

impl Client {
    /// Returns the event bus.
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Returns the connection manager.
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Returns the message router.
    #[inline]
    #[must_use]
    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Returns the connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Returns `true` if input requests are answered automatically.
    #[must_use]
    pub fn auto_confirm(&self) -> bool {
        self.responder.lock().is_some()
    }
}

// ============================================================================
// Client - Connection
// ============================================================================

impl Client {
    /// Connects to `session_id`. See [`ConnectionManager::connect`].
    ///
    /// Re-attaches the router if [`shutdown`](Self::shutdown) detached it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSession`](crate::Error::InvalidSession) for a
    /// blank session id.
    pub fn connect(&self, session_id: impl AsRef<str>) -> Result<()> {
        {
            let mut routing = self.routing.lock();
            if routing.is_none() {
                *routing = Some(self.router.attach());
            }
        }

        self.manager.connect(session_id)
    }

    /// Sends a JSON message. See [`ConnectionManager::send`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if `message` cannot be
    /// serialized.
    pub fn send<T>(&self, message: &T) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        self.manager.send(message)
    }

    /// Closes the connection. See [`ConnectionManager::disconnect`].
    pub fn disconnect(&self) {
        self.manager.disconnect();
    }

    /// Turns automatic answers to input requests on or off.
    pub fn set_auto_confirm(&self, enabled: bool) {
        let mut responder = self.responder.lock();

        match (enabled, responder.is_some()) {
            (true, false) => {
                *responder = Some(AutoResponder::install(&self.bus, &self.manager));
            }
            (false, true) => {
                if let Some(active) = responder.take() {
                    active.uninstall();
                }
            }
            _ => {}
        }
    }

    /// Disconnects and stops routing.
    ///
    /// Application subscriptions on the bus are left in place. A later
    /// [`connect`](Self::connect) resumes routing; auto-confirm stays off.
    pub fn shutdown(&self) {
        self.manager.disconnect();
        self.set_auto_confirm(false);

        if let Some(id) = self.routing.lock().take() {
            self.router.detach(id);
        }

        debug!("Client shut down");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;

    use crate::bus::topics;
    use crate::protocol::Payload;
    use crate::transport::testing::MockConnector;

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn collect(bus: &EventBus, topic: &'static str) -> Arc<Mutex<Vec<Payload>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on(topic, move |payload| {
            sink.lock().push(payload.clone());
            Ok(())
        });
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_flow_to_semantic_topics() {
        let connector = MockConnector::new();
        let client = Client::builder().connector(connector.clone()).build().unwrap();
        let finals = collect(client.bus(), topics::ANALYSIS_FINAL);
        let completed = collect(client.bus(), topics::ANALYSIS_COMPLETED);

        client.connect("run-1").unwrap();
        settle().await;
        assert_eq!(client.state(), ConnectionState::Open);

        let server = connector.take_server().unwrap();
        server.send_json(json!({"type": "task_completed", "result": "X"}));
        settle().await;

        assert_eq!(completed.lock().len(), 1);
        let finals = finals.lock();
        assert_eq!(finals.len(), 1);
        assert_eq!(finals[0].as_content().unwrap().content, "X");
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_confirm_opt_in() {
        let connector = MockConnector::new();
        let client = Client::builder().connector(connector.clone()).build().unwrap();
        assert!(!client.auto_confirm());

        client.connect("run-1").unwrap();
        settle().await;
        let mut server = connector.take_server().unwrap();

        server.send_json(json!({"type": "user_input_request", "prompt": "Go?"}));
        settle().await;
        assert!(server.sent().is_empty());

        client.set_auto_confirm(true);
        server.send_json(json!({"type": "user_input_request", "prompt": "Go?"}));
        settle().await;
        assert_eq!(
            server.sent(),
            vec![r#"{"type":"user_input_response","response":"yes"}"#]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_routing_and_connection() {
        let connector = MockConnector::new();
        let client = Client::builder()
            .connector(connector.clone())
            .auto_confirm_input(true)
            .build()
            .unwrap();
        let logs = collect(client.bus(), topics::ANALYSIS_LOG);

        client.connect("run-1").unwrap();
        settle().await;

        client.shutdown();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.auto_confirm());

        client
            .bus()
            .emit(topics::WEBSOCKET_MESSAGE, &Payload::Frame(json!({"type": "log", "message": "late"})));
        assert!(logs.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_after_shutdown_resumes_routing() {
        let connector = MockConnector::new();
        let client = Client::builder().connector(connector.clone()).build().unwrap();
        let logs = collect(client.bus(), topics::ANALYSIS_LOG);

        client.connect("run-1").unwrap();
        settle().await;
        client.shutdown();

        client.connect("run-2").unwrap();
        settle().await;
        assert_eq!(client.state(), ConnectionState::Open);

        let _first = connector.take_server().unwrap();
        let server = connector.take_server().unwrap();
        server.send_json(json!({"type": "log", "message": "again"}));
        settle().await;

        assert_eq!(logs.lock().len(), 1);
        assert_eq!(client.bus().handler_count(topics::WEBSOCKET_MESSAGE), 1);
    }

    #[test]
    fn test_send_before_connect_is_dropped() {
        let client = Client::builder().build().unwrap();
        assert!(!client.send(&json!({"type": "noop"})).unwrap());
    }
}
