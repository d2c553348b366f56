//! Message routing.
//!
//! Sits between the raw `websocket:message` topic and the application: each
//! inbound frame is classified and republished as semantic `analysis:*`
//! events.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dispatch` | [`MessageRouter`] classification to topics |
//! | `responder` | Opt-in [`AutoResponder`] for input requests |

// ============================================================================
// Submodules
// ============================================================================

/// Frame to topic dispatch.
pub mod dispatch;

/// Automatic input-request answers.
pub mod responder;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatch::MessageRouter;
pub use responder::AutoResponder;
