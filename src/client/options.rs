//! Connection options.
//!
//! Controls where the client connects and how it behaves when the link
//! drops: retry budget, backoff curve, heartbeat period and open timeout.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use analysis_realtime::ConnectionOptions;
//!
//! let options = ConnectionOptions::new()
//!     .with_host("analysis.internal:8000")
//!     .with_secure(true)
//!     .with_max_retries(5)
//!     .with_heartbeat_interval(Duration::from_secs(15));
//!
//! options.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

// ============================================================================
// Constants
// ============================================================================

/// Default backend address.
pub const DEFAULT_HOST: &str = "127.0.0.1:8000";

/// Path prefix under which the backend serves session sockets.
pub const DEFAULT_SOCKET_PATH: &str = "/ws";

/// Reconnect attempts before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// First backoff unit; attempt `n` waits `base * 2^n`.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Backoff ceiling.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Keep-alive period while the link is open.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Time allowed for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Connection and recovery configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Backend `host[:port]`.
    pub host: String,

    /// Use `wss` instead of `ws`.
    pub secure: bool,

    /// Path prefix; the session id is appended as the last segment.
    pub socket_path: String,

    /// Reconnect attempts after an unexpected drop.
    pub max_retries: u32,

    /// Backoff unit.
    pub base_delay: Duration,

    /// Backoff ceiling.
    pub max_delay: Duration,

    /// Heartbeat period.
    pub heartbeat_interval: Duration,

    /// Handshake timeout.
    pub connect_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionOptions {
    /// Creates options with the default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            secure: false,
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Derives host and scheme from the origin the UI was served from.
    ///
    /// `https`/`wss` origins select a secure socket, `http`/`ws` a plain one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for other schemes or origins without a host.
    pub fn from_origin(origin: &str) -> Result<Self> {
        let url = Url::parse(origin)?;

        let secure = match url.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            other => {
                return Err(Error::config(format!(
                    "Unsupported origin scheme '{other}', expected http(s) or ws(s)"
                )));
            }
        };

        let host = url
            .host_str()
            .ok_or_else(|| Error::config(format!("Origin '{origin}' has no host")))?;

        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self::new().with_host(host).with_secure(secure))
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionOptions {
    /// Sets the backend `host[:port]`.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Selects `wss` (`true`) or `ws` (`false`).
    #[inline]
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the socket path prefix.
    #[inline]
    #[must_use]
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Sets the reconnect budget.
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff unit.
    #[inline]
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the backoff ceiling.
    #[inline]
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the heartbeat period.
    #[inline]
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

// ============================================================================
// Derived Values
// ============================================================================

impl ConnectionOptions {
    /// URL scheme for the socket.
    #[inline]
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    /// Builds `scheme://host/ws/{session_id}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the host does not form a valid URL.
    pub fn endpoint(&self, session_id: &SessionId) -> Result<Url> {
        let path = self.socket_path.trim_end_matches('/');
        let raw = format!(
            "{}://{}{}/{}",
            self.scheme(),
            self.host,
            path,
            urlencoding::encode(session_id.as_str())
        );
        Ok(Url::parse(&raw)?)
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    ///
    /// `min(base_delay * 2^attempt, max_delay)`, saturating on overflow.
    #[must_use]
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("Host must not be empty"));
        }

        if self.host.contains('/') {
            return Err(Error::config(format!(
                "Host '{}' must be host[:port] without a scheme or path",
                self.host
            )));
        }

        if !self.socket_path.starts_with('/') {
            return Err(Error::config(format!(
                "Socket path '{}' must start with '/'",
                self.socket_path
            )));
        }

        if self.base_delay.is_zero() {
            return Err(Error::config("Base reconnect delay must be greater than zero"));
        }

        if self.max_delay < self.base_delay {
            return Err(Error::config(
                "Maximum reconnect delay must not be shorter than the base delay",
            ));
        }

        if self.heartbeat_interval.is_zero() {
            return Err(Error::config("Heartbeat interval must be greater than zero"));
        }

        if self.connect_timeout.is_zero() {
            return Err(Error::config("Connect timeout must be greater than zero"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
