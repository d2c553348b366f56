//! Type-safe identifiers.
//!
//! Newtype wrappers keep session, connection and subscription identifiers
//! from being mixed up at compile time.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ============================================================================
// SessionId
// ============================================================================

/// Opaque identifier of a backend analysis run.
///
/// Supplied by the session-creation collaborator and used verbatim (after
/// percent-encoding) as the last path segment of the connection URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session identifier, rejecting empty or blank input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSession`] if `value` is empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(Error::invalid_session("session id must not be empty"));
        }
        Ok(Self(value))
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for SessionId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for SessionId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifier of a single connection attempt.
///
/// Every call that opens a transport gets a fresh id, so log lines from a
/// replaced connection can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a random connection id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SubscriptionId
// ============================================================================

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Token returned by the event bus for each registered handler.
///
/// Pass it back to [`EventBus::off`](crate::bus::EventBus::off) to remove the
/// registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Allocates the next process-unique id.
    #[inline]
    pub(crate) fn next() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the numeric value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
