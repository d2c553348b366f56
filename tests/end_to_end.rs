//! End-to-end tests against a local WebSocket server.
//!
//! Run with: cargo test --test end_to_end

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use analysis_realtime::bus::topics;
use analysis_realtime::{Client, ConnectionState, DisconnectReason, Payload};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Helpers
// ============================================================================

const ALL_TOPICS: [&str; 11] = [
    topics::WEBSOCKET_CONNECTED,
    topics::WEBSOCKET_DISCONNECTED,
    topics::WEBSOCKET_ERROR,
    topics::WEBSOCKET_MESSAGE,
    topics::ANALYSIS_PROGRESS,
    topics::ANALYSIS_LOG,
    topics::ANALYSIS_FINAL,
    topics::ANALYSIS_ERROR,
    topics::ANALYSIS_COMPLETED,
    topics::ANALYSIS_INPUT_REQUEST,
    topics::ANALYSIS_ACKNOWLEDGED,
];

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("analysis_realtime=debug"))
        .with_target(false)
        .with_test_writer()
        .try_init();
}

fn text(frame: Value) -> Message {
    Message::Text(frame.to_string().into())
}

/// Forwards every bus event to a channel.
fn record(client: &Client) -> mpsc::UnboundedReceiver<(&'static str, Payload)> {
    let (tx, rx) = mpsc::unbounded_channel();
    for topic in ALL_TOPICS {
        let tx = tx.clone();
        client.bus().on(topic, move |payload| {
            let _ = tx.send((topic, payload.clone()));
            Ok(())
        });
    }
    rx
}

/// Waits for `websocket:disconnected`, returning every topic seen first.
async fn until_disconnected(
    events: &mut mpsc::UnboundedReceiver<(&'static str, Payload)>,
) -> anyhow::Result<(Vec<&'static str>, DisconnectReason)> {
    let mut seen = Vec::new();

    let reason = timeout(Duration::from_secs(10), async {
        while let Some((topic, payload)) = events.recv().await {
            if let Some(notice) = payload.as_disconnected() {
                return Some(notice.reason.clone());
            }
            seen.push(topic);
        }
        None
    })
    .await?;

    let reason = reason.ok_or_else(|| anyhow::anyhow!("event channel closed"))?;
    Ok((seen, reason))
}

/// Serves one analysis session.
///
/// Sends the opening frames, answers pings with pongs, asks for input after
/// the first heartbeat and closes cleanly once the answer arrives. Returns
/// the request path.
async fn serve_session(
    listener: TcpListener,
    received: mpsc::UnboundedSender<Value>,
) -> anyhow::Result<String> {
    let (stream, _) = listener.accept().await?;

    let mut path = String::new();
    let ws = accept_hdr_async(
        stream,
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            path = request.uri().path().to_string();
            Ok(response)
        },
    )
    .await?;

    let (mut write, mut read) = ws.split();

    for frame in [
        json!({"type": "connection_established", "message": "attached"}),
        json!({"type": "progress", "progress": 50, "step_info": "Parsing"}),
        json!({"type": "brand_new_type"}),
        json!({"type": "task_completed", "result": "done"}),
    ] {
        write.send(text(frame)).await?;
    }
    write.send(Message::Text("not json".to_string().into())).await?;

    let mut asked = false;
    let mut closing = false;

    while let Some(Ok(message)) = read.next().await {
        let body = match message {
            Message::Text(body) => body,
            Message::Close(_) => break,
            _ => continue,
        };

        let frame: Value = serde_json::from_str(body.as_str())?;
        let _ = received.send(frame.clone());

        if closing {
            continue;
        }

        if frame["type"] == "ping" {
            write.send(text(json!({"type": "pong"}))).await?;
            if !asked {
                asked = true;
                write
                    .send(text(json!({"type": "user_input_request", "prompt": "Proceed?"})))
                    .await?;
            }
        } else if frame["type"] == "user_input_response" {
            closing = true;
            write
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "analysis finished".to_string().into(),
                })))
                .await?;
        }
    }

    Ok(path)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_session_stream_end_to_end() -> anyhow::Result<()> {
    init_logging();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (received_tx, mut received_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(serve_session(listener, received_tx));

    let client = Client::builder()
        .host(addr.to_string())
        .heartbeat_interval(Duration::from_millis(100))
        .auto_confirm_input(true)
        .build()?;
    let mut events = record(&client);

    client.connect("e2e-session")?;

    let (seen, reason) = until_disconnected(&mut events).await?;

    assert_eq!(
        reason,
        DisconnectReason::Closed {
            code: Some(1000),
            reason: "analysis finished".into()
        }
    );

    let position = |topic: &str| seen.iter().position(|t| *t == topic);
    assert_eq!(position(topics::WEBSOCKET_CONNECTED), Some(0));
    assert!(position(topics::ANALYSIS_ACKNOWLEDGED).is_some());
    assert!(position(topics::ANALYSIS_PROGRESS).is_some());
    assert!(position(topics::ANALYSIS_INPUT_REQUEST).is_some());
    assert!(position(topics::ANALYSIS_COMPLETED) < position(topics::ANALYSIS_FINAL));
    assert!(position(topics::WEBSOCKET_ERROR).is_none());
    assert!(position(topics::ANALYSIS_ERROR).is_none());

    assert_eq!(server.await??, "/ws/e2e-session");

    let mut sent = Vec::new();
    while let Ok(frame) = received_rx.try_recv() {
        sent.push(frame);
    }
    assert!(sent.iter().any(|f| f["type"] == "ping"));
    assert!(
        sent.iter()
            .any(|f| f == &json!({"type": "user_input_response", "response": "yes"}))
    );

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.manager().is_reconnect_pending());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_backend_gives_up() -> anyhow::Result<()> {
    init_logging();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let client = Client::builder()
        .host(addr.to_string())
        .max_retries(2)
        .base_delay(Duration::from_millis(10))
        .max_delay(Duration::from_millis(50))
        .build()?;
    let mut events = record(&client);

    client.connect("nobody-home")?;

    let (seen, reason) = until_disconnected(&mut events).await?;

    assert_eq!(reason, DisconnectReason::RetriesExhausted { attempts: 2 });
    assert_eq!(
        seen.iter()
            .filter(|t| **t == topics::WEBSOCKET_ERROR)
            .count(),
        3
    );
    assert!(!seen.contains(&topics::WEBSOCKET_CONNECTED));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    Ok(())
}
