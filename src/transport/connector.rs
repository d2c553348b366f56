//! Transport opening.
//!
//! [`Connector`] is the seam between the connection manager and the network:
//! the manager asks for a [`Transport`] and gets back a boxed frame sink and
//! frame stream. [`WsConnector`] opens real WebSocket connections.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Outbound half of a transport.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = Error> + Send>>;

/// Inbound half of a transport.
///
/// Ends (`None`) when the underlying connection is gone.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Message>> + Send>>;

// ============================================================================
// Transport
// ============================================================================

/// An open, split bidirectional connection.
pub struct Transport {
    /// Frames to the server.
    pub sink: FrameSink,
    /// Frames from the server.
    pub stream: FrameStream,
}

impl Transport {
    /// Wraps a sink/stream pair.
    pub fn new<W, R>(sink: W, stream: R) -> Self
    where
        W: Sink<Message, Error = Error> + Send + 'static,
        R: Stream<Item = Result<Message>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Opens transports for the connection manager.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a connection to `url`.
    ///
    /// # Errors
    ///
    /// Any error is treated as an open failure: it is published as
    /// `websocket:error` and fed into the reconnection path.
    async fn open(&self, url: &Url) -> Result<Transport>;
}

// ============================================================================
// WsConnector
// ============================================================================

/// WebSocket connector backed by `tokio-tungstenite`.
///
/// `wss` URLs need the crate's `tls` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &Url) -> Result<Transport> {
        let (ws_stream, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        debug!(%url, status = %response.status(), "WebSocket handshake completed");

        let (ws_write, ws_read) = ws_stream.split();

        Ok(Transport::new(
            ws_write.sink_map_err(Error::from),
            ws_read.map(|message| message.map_err(Error::from)),
        ))
    }
}
