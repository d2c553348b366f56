//! Link event loop.
//!
//! Once a transport is open, one task owns it and runs this loop until the
//! connection ends. See [`run_link`].
//!
//! # Event Loop
//!
//! Each iteration handles exactly one of, in priority order:
//!
//! - Commands from the manager (outbound frames, shutdown)
//! - Incoming frames from the server
//! - Heartbeat ticks
//!
//! Inbound frames are handled one at a time in arrival order. A pending
//! shutdown always wins over a due heartbeat, so no ping goes out after the
//! manager has let go of the link.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tracing::{debug, error, trace, warn};

use crate::error::Error;
use crate::identifiers::ConnectionId;
use crate::protocol::Outbound;

use super::connector::{FrameSink, Transport};

// ============================================================================
// LinkCommand
// ============================================================================

/// Commands from the manager to the link task.
#[derive(Debug)]
pub(crate) enum LinkCommand {
    /// Transmit a serialized frame.
    Send(String),
    /// Close the transport and stop.
    Shutdown,
}

// ============================================================================
// LinkExit
// ============================================================================

/// How a link ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkExit {
    /// The manager asked for it.
    Requested,
    /// The server completed a close handshake.
    Closed {
        /// Close code.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },
    /// The connection vanished without a close handshake.
    Dropped,
}

impl LinkExit {
    fn from_close_frame(frame: Option<CloseFrame>) -> Self {
        match frame {
            Some(frame) => Self::Closed {
                code: Some(u16::from(frame.code)),
                reason: frame.reason.as_str().to_owned(),
            },
            None => Self::Closed {
                code: None,
                reason: String::new(),
            },
        }
    }
}

// ============================================================================
// LinkObserver
// ============================================================================

/// Receives what happens on a link.
pub(crate) trait LinkObserver: Send + Sync + 'static {
    /// A frame parsed as JSON.
    fn on_frame(&self, frame: Value);

    /// A transport error. The link keeps running.
    fn on_error(&self, error: Error);

    /// The link has ended.
    fn on_closed(&self, exit: LinkExit);
}

// ============================================================================
// Link
// ============================================================================

/// Manager-side handle to one connection attempt.
#[derive(Debug)]
pub(crate) struct Link {
    /// Identifier of this attempt.
    pub connection_id: ConnectionId,
    /// Channel into the link task.
    pub command_tx: mpsc::UnboundedSender<LinkCommand>,
    /// The task opening and then driving the transport.
    pub task: JoinHandle<()>,
}

impl Link {
    /// Asks the task to close the transport gracefully.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(LinkCommand::Shutdown);
    }

    /// Cancels the task outright.
    pub fn abort(&self) {
        self.task.abort();
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Drives an open transport until it closes or is shut down.
///
/// The first heartbeat goes out one `heartbeat_every` after the loop starts.
pub(crate) async fn run_link<O: LinkObserver>(
    transport: Transport,
    mut command_rx: mpsc::UnboundedReceiver<LinkCommand>,
    heartbeat_every: Duration,
    observer: O,
) {
    let Transport {
        mut sink,
        mut stream,
    } = transport;

    let mut heartbeat = interval_at(Instant::now() + heartbeat_every, heartbeat_every);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            biased;

            // Commands from the manager
            command = command_rx.recv() => {
                match command {
                    Some(LinkCommand::Send(text)) => {
                        send_text(&mut sink, text).await;
                    }

                    Some(LinkCommand::Shutdown) | None => {
                        debug!("Link shutdown requested");
                        let _ = sink.close().await;
                        break LinkExit::Requested;
                    }
                }
            }

            // Incoming frames from the server
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(text.as_str(), &observer);
                    }

                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => handle_text(text, &observer),
                        Err(e) => warn!(error = %e, len = bytes.len(), "Dropping non-UTF-8 binary frame"),
                    },

                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "WebSocket closed by remote");
                        let _ = sink.close().await;
                        break LinkExit::from_close_frame(frame);
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        observer.on_error(e);
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break LinkExit::Dropped;
                    }

                    // Ping, Pong and raw frames are handled by tungstenite
                    Some(Ok(_)) => {}
                }
            }

            _ = heartbeat.tick() => {
                match Outbound::Ping.to_text() {
                    Ok(ping) => {
                        trace!("Sending heartbeat");
                        send_text(&mut sink, ping).await;
                    }
                    Err(e) => error!(error = %e, "Failed to encode heartbeat"),
                }
            }
        }
    };

    debug!(?exit, "Link event loop terminated");
    observer.on_closed(exit);
}

/// Parses an inbound text frame and forwards it.
fn handle_text<O: LinkObserver>(text: &str, observer: &O) {
    match serde_json::from_str::<Value>(text) {
        Ok(frame) => observer.on_frame(frame),
        Err(e) => warn!(error = %e, text = %text, "Failed to parse incoming frame"),
    }
}

/// Writes one text frame. Failures surface through the stream side.
async fn send_text(sink: &mut FrameSink, text: String) {
    if let Err(e) = sink.send(Message::Text(text.into())).await {
        warn!(error = %e, "Failed to send frame");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::json;

    use crate::transport::testing::MockConnector;

    #[derive(Clone, Default)]
    struct Recorder {
        frames: Arc<Mutex<Vec<Value>>>,
        errors: Arc<Mutex<Vec<String>>>,
        exit: Arc<Mutex<Option<LinkExit>>>,
    }

    impl LinkObserver for Recorder {
        fn on_frame(&self, frame: Value) {
            self.frames.lock().push(frame);
        }

        fn on_error(&self, error: Error) {
            self.errors.lock().push(error.to_string());
        }

        fn on_closed(&self, exit: LinkExit) {
            *self.exit.lock() = Some(exit);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_arrive_in_order_and_garbage_is_dropped() {
        let (transport, server) = MockConnector::pair();
        let (_command_tx, command_rx) = mpsc::unbounded_channel();
        let recorder = Recorder::default();

        server.send_json(json!({"type": "log", "message": "one"}));
        server.send_text("{not json");
        server.send_json(json!({"type": "log", "message": "two"}));
        server.drop_connection();

        run_link(transport, command_rx, Duration::from_secs(30), recorder.clone()).await;

        let frames = recorder.frames.lock();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["message"], "one");
        assert_eq!(frames[1]["message"], "two");
        assert_eq!(*recorder.exit.lock(), Some(LinkExit::Dropped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_frame_is_clean_exit() {
        let (transport, server) = MockConnector::pair();
        let (_command_tx, command_rx) = mpsc::unbounded_channel();
        let recorder = Recorder::default();

        server.close(4004, "Session not found");

        run_link(transport, command_rx, Duration::from_secs(30), recorder.clone()).await;

        assert_eq!(
            *recorder.exit.lock(),
            Some(LinkExit::Closed {
                code: Some(4004),
                reason: "Session not found".into()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_does_not_end_link() {
        let (transport, server) = MockConnector::pair();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let recorder = Recorder::default();

        server.send_error(Error::connection("reset by peer"));
        server.send_json(json!({"type": "pong"}));

        let task = tokio::spawn(run_link(
            transport,
            command_rx,
            Duration::from_secs(30),
            recorder.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(recorder.errors.lock().len(), 1);
        assert_eq!(recorder.frames.lock().len(), 1);
        assert!(recorder.exit.lock().is_none());

        command_tx.send(LinkCommand::Shutdown).unwrap();
        task.await.unwrap();
        assert_eq!(*recorder.exit.lock(), Some(LinkExit::Requested));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_every_interval() {
        let (transport, mut server) = MockConnector::pair();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_link(
            transport,
            command_rx,
            Duration::from_secs(30),
            Recorder::default(),
        ));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(server.sent().is_empty());

        tokio::time::sleep(Duration::from_secs(62)).await;
        assert_eq!(server.sent(), vec![r#"{"type":"ping"}"#, r#"{"type":"ping"}"#, r#"{"type":"ping"}"#]);

        command_tx.send(LinkCommand::Shutdown).unwrap();
        task.await.unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(server.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_command_writes_frame() {
        let (transport, mut server) = MockConnector::pair();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_link(
            transport,
            command_rx,
            Duration::from_secs(30),
            Recorder::default(),
        ));

        command_tx
            .send(LinkCommand::Send(r#"{"type":"user_input_response","response":"yes"}"#.into()))
            .unwrap();
        command_tx.send(LinkCommand::Shutdown).unwrap();
        task.await.unwrap();

        assert_eq!(
            server.sent(),
            vec![r#"{"type":"user_input_response","response":"yes"}"#]
        );
    }
}
