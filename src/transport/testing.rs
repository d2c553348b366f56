//! In-memory transport for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{sink, stream};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use url::Url;

use crate::error::{Error, Result};

use super::connector::{Connector, Transport};

// ============================================================================
// MockServer
// ============================================================================

/// Server end of an in-memory transport.
pub(crate) struct MockServer {
    incoming: Mutex<Option<mpsc::UnboundedSender<Result<Message>>>>,
    outgoing: mpsc::UnboundedReceiver<Message>,
}

impl MockServer {
    fn push(&self, item: Result<Message>) {
        if let Some(tx) = self.incoming.lock().as_ref() {
            let _ = tx.send(item);
        }
    }

    pub fn send_json(&self, frame: Value) {
        self.push(Ok(Message::Text(frame.to_string().into())));
    }

    pub fn send_text(&self, text: &str) {
        self.push(Ok(Message::Text(text.to_string().into())));
    }

    pub fn send_error(&self, error: Error) {
        self.push(Err(error));
    }

    /// Completes a close handshake from the server side.
    pub fn close(&self, code: u16, reason: &str) {
        self.push(Ok(Message::Close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        }))));
    }

    /// Ends the stream without a close handshake.
    pub fn drop_connection(&self) {
        self.incoming.lock().take();
    }

    /// Drains the text frames the client has written so far.
    pub fn sent(&mut self) -> Vec<String> {
        let mut texts = Vec::new();
        while let Ok(message) = self.outgoing.try_recv() {
            if let Message::Text(text) = message {
                texts.push(text.as_str().to_owned());
            }
        }
        texts
    }
}

// ============================================================================
// MockConnector
// ============================================================================

/// Scripted outcome of one `open` call.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Accept,
    Refuse(String),
    Hang,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<Outcome>,
    opened: Vec<Url>,
    servers: VecDeque<MockServer>,
}

/// Connector that hands out in-memory transports.
///
/// Unscripted opens succeed.
#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connected transport/server pair.
    pub fn pair() -> (Transport, MockServer) {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel::<Result<Message>>();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<Message>();

        let frame_stream = stream::unfold(incoming_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        let frame_sink = sink::unfold(outgoing_tx, |tx, message: Message| async move {
            tx.send(message).map_err(|_| Error::ConnectionClosed)?;
            Ok::<_, Error>(tx)
        });

        let server = MockServer {
            incoming: Mutex::new(Some(incoming_tx)),
            outgoing: outgoing_rx,
        };

        (Transport::new(frame_sink, frame_stream), server)
    }

    pub fn script(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.state.lock().script.extend(outcomes);
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().opened.len()
    }

    pub fn urls(&self) -> Vec<Url> {
        self.state.lock().opened.clone()
    }

    /// Takes the server end of the oldest accepted connection not yet taken.
    pub fn take_server(&self) -> Option<MockServer> {
        self.state.lock().servers.pop_front()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &Url) -> Result<Transport> {
        let outcome = {
            let mut state = self.state.lock();
            state.opened.push(url.clone());
            state.script.pop_front().unwrap_or(Outcome::Accept)
        };

        match outcome {
            Outcome::Accept => {
                let (transport, server) = Self::pair();
                self.state.lock().servers.push_back(server);
                Ok(transport)
            }
            Outcome::Refuse(message) => Err(Error::connection(message)),
            Outcome::Hang => std::future::pending::<Result<Transport>>().await,
        }
    }
}
