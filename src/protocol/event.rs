//! Semantic event payloads published on the event bus.
//!
//! Every value the crate emits is one variant of [`Payload`]. Lifecycle
//! notices come from the connection manager, the rest from the message
//! router.
//!
//! # Payloads by Topic
//!
//! | Topic | Payload |
//! |-------|---------|
//! | `websocket:connected` | [`Payload::Connected`] |
//! | `websocket:disconnected` | [`Payload::Disconnected`] |
//! | `websocket:error` | [`Payload::Error`] |
//! | `websocket:message` | [`Payload::Frame`] |
//! | `analysis:progress`, `analysis:log`, `analysis:final` | [`Payload::Content`] |
//! | `analysis:error` | [`Payload::Failure`] |
//! | `analysis:completed` | [`Payload::Completed`] |
//! | `analysis:input-request` | [`Payload::InputRequest`] |
//! | `analysis:acknowledged` | [`Payload::Acknowledged`] |

// ============================================================================
// Imports
// ============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::identifiers::{ConnectionId, SessionId};

// ============================================================================
// Lifecycle Notices
// ============================================================================

/// Emitted once the transport is open and the heartbeat is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connected {
    /// Session the connection belongs to.
    pub session_id: SessionId,
    /// Identifier of this connection attempt.
    pub connection_id: ConnectionId,
}

/// Why the connection ended without a reconnect being scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisconnectReason {
    /// `disconnect()` was called.
    Requested,
    /// The server completed a close handshake.
    Closed {
        /// Close code, if the server sent one.
        code: Option<u16>,
        /// Close reason text (may be empty).
        reason: String,
    },
    /// Unexpected drops exhausted the retry budget.
    RetriesExhausted {
        /// Reconnect attempts made before giving up.
        attempts: u32,
    },
}

/// Emitted when the link is down for good (until the next `connect`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disconnected {
    /// Session that was connected, if any.
    pub session_id: Option<SessionId>,
    /// What ended the connection.
    pub reason: DisconnectReason,
}

impl Disconnected {
    /// Returns `true` if the user should be told the session link is lost.
    #[inline]
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self.reason, DisconnectReason::RetriesExhausted { .. })
    }
}

/// Transport-level error surfaced to the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorNotice {
    /// Human readable description.
    pub message: String,
    /// Whether the reconnection path may still recover.
    pub recoverable: bool,
}

impl ErrorNotice {
    /// Builds a notice from a crate error.
    #[must_use]
    pub fn from_error(err: &crate::error::Error) -> Self {
        Self {
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

// ============================================================================
// Analysis Events
// ============================================================================

/// Text-bearing semantic event (progress, log line or final result).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentEvent {
    /// Normalized text.
    pub content: String,
    /// Receipt time on this client.
    pub timestamp: DateTime<Utc>,
}

impl ContentEvent {
    /// Creates an event stamped with the current time.
    #[inline]
    #[must_use]
    pub fn now(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Analysis failure or cancellation reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisFailure {
    /// Normalized error message.
    pub message: String,
    /// Frame type that carried it (`error`, `task_cancelled`, `task_failed`).
    pub kind: String,
    /// Receipt time on this client.
    pub timestamp: DateTime<Utc>,
}

/// Analysis run finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    /// Receipt time on this client.
    pub timestamp: DateTime<Utc>,
}

/// Backend asks the user for input.
///
/// Answer it by sending
/// [`Outbound::UserInputResponse`](crate::protocol::Outbound::UserInputResponse)
/// through the connection manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInputRequest {
    /// Question text, if the backend supplied one.
    pub prompt: Option<String>,
    /// Suggested answer.
    pub default: Option<String>,
    /// The untouched inbound frame.
    pub frame: Value,
    /// Receipt time on this client.
    pub timestamp: DateTime<Utc>,
}

/// Server-side acknowledgment that the session stream is attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Acknowledgment {
    /// Greeting text, if any.
    pub message: Option<String>,
    /// Receipt time on this client.
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Payload
// ============================================================================

/// Everything that can travel over the [`EventBus`](crate::bus::EventBus).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "payload", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// No data attached.
    Empty,
    /// Transport opened.
    Connected(Connected),
    /// Transport gone without a pending reconnect.
    Disconnected(Disconnected),
    /// Transport-level error.
    Error(ErrorNotice),
    /// Raw inbound frame, already parsed as JSON.
    Frame(Value),
    /// Progress, log or final-result text.
    Content(ContentEvent),
    /// Analysis error.
    Failure(AnalysisFailure),
    /// Analysis completion.
    Completed(Completion),
    /// Request for user input.
    InputRequest(UserInputRequest),
    /// Connection acknowledgment from the server.
    Acknowledged(Acknowledgment),
}

impl Payload {
    /// Returns the raw frame, if this is one.
    #[inline]
    #[must_use]
    pub fn as_frame(&self) -> Option<&Value> {
        match self {
            Self::Frame(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the content event, if this is one.
    #[inline]
    #[must_use]
    pub fn as_content(&self) -> Option<&ContentEvent> {
        match self {
            Self::Content(event) => Some(event),
            _ => None,
        }
    }

    /// Returns the input request, if this is one.
    #[inline]
    #[must_use]
    pub fn as_input_request(&self) -> Option<&UserInputRequest> {
        match self {
            Self::InputRequest(request) => Some(request),
            _ => None,
        }
    }

    /// Returns the disconnect notice, if this is one.
    #[inline]
    #[must_use]
    pub fn as_disconnected(&self) -> Option<&Disconnected> {
        match self {
            Self::Disconnected(notice) => Some(notice),
            _ => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Frame(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
