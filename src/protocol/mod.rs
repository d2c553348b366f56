//! Wire and event types.
//!
//! This module defines what arrives on the socket, what leaves it, and the
//! normalized events the rest of the application sees.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | [`InboundFrame`] | Server → Client | Progress, logs, results, errors, input requests |
//! | [`Outbound`] | Client → Server | Heartbeat and user input responses |
//! | [`Payload`] | In-process | Everything published on the event bus |
//!
//! Frames are UTF-8 JSON objects carrying at least a `type` field.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Bus payloads and semantic events |
//! | `frame` | Inbound classification and field resolution |
//! | `outbound` | Client-to-server frames |

// ============================================================================
// Submodules
// ============================================================================

/// Bus payloads and semantic events.
pub mod event;

/// Inbound frame classification.
pub mod frame;

/// Client-to-server frames.
pub mod outbound;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{
    Acknowledgment, AnalysisFailure, Completion, Connected, ContentEvent, DisconnectReason,
    Disconnected, ErrorNotice, Payload, UserInputRequest,
};
pub use frame::InboundFrame;
pub use outbound::Outbound;
