//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use analysis_realtime::Client;
//!
//! # fn example() -> analysis_realtime::Result<()> {
//! let client = Client::builder()
//!     .origin("https://analysis.example.com")
//!     .max_retries(5)
//!     .heartbeat_interval(Duration::from_secs(15))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::bus::EventBus;
use crate::error::Result;
use crate::transport::{Connector, WsConnector};

use super::core::Client;
use super::options::ConnectionOptions;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ClientBuilder {
    /// Connection options, adjusted by the setters below.
    options: ConnectionOptions,
    /// Page origin to derive host and scheme from.
    origin: Option<String>,
    /// Transport opener; WebSocket when unset.
    connector: Option<Arc<dyn Connector>>,
    /// Existing bus to publish on.
    bus: Option<EventBus>,
    /// Answer input requests automatically.
    auto_confirm_input: bool,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("options", &self.options)
            .field("origin", &self.origin)
            .field("custom_connector", &self.connector.is_some())
            .field("auto_confirm_input", &self.auto_confirm_input)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backend `host[:port]`.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options.host = host.into();
        self
    }

    /// Selects `wss` (`true`) or `ws` (`false`).
    #[inline]
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.options.secure = secure;
        self
    }

    /// Derives host and scheme from the origin the UI was served from.
    ///
    /// Resolved at [`build`](Self::build) and takes precedence over
    /// [`host`](Self::host) and [`secure`](Self::secure).
    #[inline]
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Sets the socket path prefix (default `/ws`).
    #[inline]
    #[must_use]
    pub fn socket_path(mut self, path: impl Into<String>) -> Self {
        self.options.socket_path = path.into();
        self
    }

    /// Sets the reconnect budget.
    #[inline]
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.options.max_retries = max_retries;
        self
    }

    /// Sets the backoff unit.
    #[inline]
    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.options.base_delay = delay;
        self
    }

    /// Sets the backoff ceiling.
    #[inline]
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.options.max_delay = delay;
        self
    }

    /// Sets the heartbeat period.
    #[inline]
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.options.heartbeat_interval = interval;
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Replaces all connection options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Uses a custom transport opener.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Publishes on an existing bus instead of a fresh one.
    #[inline]
    #[must_use]
    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Answers every input request with its default, or `"yes"`.
    ///
    /// Off unless enabled here or through [`Client::set_auto_confirm`].
    #[inline]
    #[must_use]
    pub fn auto_confirm_input(mut self, enabled: bool) -> Self {
        self.auto_confirm_input = enabled;
        self
    }

    /// Builds the client with validation.
    ///
    /// Does not connect; call [`Client::connect`] with a session id.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) if the origin or an option is invalid
    /// - [`Error::Url`](crate::Error::Url) if the origin cannot be parsed
    pub fn build(self) -> Result<Client> {
        let options = self.resolve_options()?;
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector) as Arc<dyn Connector>);
        let bus = self.bus.unwrap_or_default();

        Client::new(bus, connector, options, self.auto_confirm_input)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    fn resolve_options(&self) -> Result<ConnectionOptions> {
        let mut options = self.options.clone();

        if let Some(ref origin) = self.origin {
            let derived = ConnectionOptions::from_origin(origin)?;
            options.host = derived.host;
            options.secure = derived.secure;
        }

        options.validate()?;
        Ok(options)
    }
}

// ============================================================================
// Tests
// ============================================================================
