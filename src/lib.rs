//! Analysis Realtime - Live session link for interactive analysis clients.
//!
//! This library keeps one session's WebSocket connection to an analysis
//! backend alive and turns the frames it carries into application events.
//!
//! # Architecture
//!
//! Three parts, connected only through the event bus:
//!
//! - **Event Bus**: Topic-based publish/subscribe with synchronous, ordered,
//!   failure-isolated delivery
//! - **Connection Manager**: Lifecycle state machine with heartbeat,
//!   bounded exponential-backoff reconnection and intentional close
//! - **Message Router**: Classifies raw frames and republishes them as
//!   semantic `analysis:*` events
//!
//! Key design principles:
//!
//! - At most one live connection per manager
//! - Every link and timer is tagged with a generation, stale ones are ignored
//! - Transient reconnects are silent; only giving up is announced
//! - Unknown frame types are ignored, never errors
//!
//! # Quick Start
//!
//! ```no_run
//! use analysis_realtime::bus::topics;
//! use analysis_realtime::{Client, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .origin("http://localhost:8000")
//!         .build()?;
//!
//!     client.bus().on(topics::ANALYSIS_PROGRESS, |payload| {
//!         if let Some(event) = payload.as_content() {
//!             println!("{}", event.content);
//!         }
//!         Ok(())
//!     });
//!
//!     client.bus().on(topics::WEBSOCKET_DISCONNECTED, |payload| {
//!         if payload.as_disconnected().is_some_and(|d| d.is_connection_lost()) {
//!             eprintln!("Connection lost");
//!         }
//!         Ok(())
//!     });
//!
//!     client.connect("session-id-from-backend")?;
//!     tokio::signal::ctrl_c().await.ok();
//!     client.shutdown();
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bus`] | [`EventBus`] and topic names |
//! | [`client`] | [`Client`] facade, builder and [`ConnectionOptions`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Inbound/outbound frames and bus payloads |
//! | [`router`] | [`MessageRouter`] and [`AutoResponder`] |
//! | [`transport`] | [`ConnectionManager`] and the WebSocket link |
//!
//! # Features
//!
//! - **`tls`**: `wss://` endpoints via rustls with bundled web PKI roots

// ============================================================================
// Modules
// ============================================================================

/// Publish/subscribe event bus.
///
/// Handlers run synchronously in registration order; failures are isolated.
pub mod bus;

/// Client facade and configuration.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for sessions, connections and subscriptions.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire frames and event payloads.
pub mod protocol;

/// Inbound frame routing.
pub mod router;

/// WebSocket transport layer.
///
/// Connection lifecycle, heartbeat and reconnection.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bus types
pub use bus::EventBus;

// Client types
pub use client::{Client, ClientBuilder, ConnectionOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, SessionId, SubscriptionId};

// Protocol types
pub use protocol::{DisconnectReason, InboundFrame, Outbound, Payload};

// Router types
pub use router::{AutoResponder, MessageRouter};

// Transport types
pub use transport::{ConnectionManager, ConnectionState, Connector, WsConnector};
