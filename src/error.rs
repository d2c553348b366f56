//! Error types for the realtime link.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use analysis_realtime::{Client, Result};
//!
//! fn example(client: &Client) -> Result<()> {
//!     client.connect("session-42")?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidSession`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Delivery | [`Error::Handler`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client or connection options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Session identifier rejected before connecting.
    #[error("Invalid session id: {message}")]
    InvalidSession {
        /// Why the identifier was rejected.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the transport cannot be opened.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Opening the transport took longer than the configured timeout.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Delivery Errors
    // ========================================================================
    /// An event handler reported a failure.
    ///
    /// The bus logs these and keeps delivering; they never reach the emitter.
    #[error("Handler failed on '{topic}': {message}")]
    Handler {
        /// Topic being delivered.
        topic: String,
        /// Failure description.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Endpoint URL could not be parsed.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid session error.
    #[inline]
    pub fn invalid_session(message: impl Into<String>) -> Self {
        Self::InvalidSession {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a handler error.
    #[inline]
    pub fn handler(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            topic: topic.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors feed the reconnection path instead of ending the
    /// session.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.is_connection_error()
    }
}

// ============================================================================
// Tests
// ============================================================================
