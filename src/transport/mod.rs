//! WebSocket transport layer.
//!
//! Owns the client end of the per-session backend stream: opening it,
//! keeping it alive, and recovering it when it drops.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                        ┌─────────────────┐
//! │  ConnectionManager   │                        │  Backend        │
//! │   state + timers     │       WebSocket        │                 │
//! │          │           │◄──────────────────────►│  /ws/{session}  │
//! │   link task (loop)   │    ws(s)://host        │                 │
//! └──────────┬───────────┘                        └─────────────────┘
//!            │ websocket:* topics
//!            ▼
//!        EventBus
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionManager::connect` - Spawn a link task for the session
//! 2. `Connector::open` - Handshake, bounded by the connect timeout
//! 3. `run_link` - Deliver frames, send heartbeats, carry outbound frames
//! 4. On an unexpected drop - Back off and reopen, up to the retry budget
//! 5. `ConnectionManager::disconnect` - Close the link, cancel timers
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Link event loop |
//! | `connector` | Transport opening seam |
//! | `manager` | Lifecycle state machine and reconnection |

// ============================================================================
// Submodules
// ============================================================================

/// Link event loop.
pub(crate) mod connection;

/// Transport opening.
pub mod connector;

/// Connection lifecycle and reconnection.
pub mod manager;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use connector::{Connector, FrameSink, FrameStream, Transport, WsConnector};
pub use manager::{ConnectionManager, ConnectionState, WeakConnectionManager};
