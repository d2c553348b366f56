//! Topic names published by the crate.

// ============================================================================
// Connection Lifecycle
// ============================================================================

/// Transport opened; payload [`Payload::Connected`](crate::protocol::Payload::Connected).
pub const WEBSOCKET_CONNECTED: &str = "websocket:connected";

/// Transport gone with no reconnect pending; payload
/// [`Payload::Disconnected`](crate::protocol::Payload::Disconnected).
pub const WEBSOCKET_DISCONNECTED: &str = "websocket:disconnected";

/// Transport error; payload [`Payload::Error`](crate::protocol::Payload::Error).
pub const WEBSOCKET_ERROR: &str = "websocket:error";

/// Raw inbound frame; payload [`Payload::Frame`](crate::protocol::Payload::Frame).
pub const WEBSOCKET_MESSAGE: &str = "websocket:message";

// ============================================================================
// Analysis Events
// ============================================================================

/// Progress update.
pub const ANALYSIS_PROGRESS: &str = "analysis:progress";

/// Log line.
pub const ANALYSIS_LOG: &str = "analysis:log";

/// Final result text.
pub const ANALYSIS_FINAL: &str = "analysis:final";

/// Analysis error or cancellation.
pub const ANALYSIS_ERROR: &str = "analysis:error";

/// Analysis run finished.
pub const ANALYSIS_COMPLETED: &str = "analysis:completed";

/// Backend requests user input.
pub const ANALYSIS_INPUT_REQUEST: &str = "analysis:input-request";

/// Server acknowledged the session stream.
pub const ANALYSIS_ACKNOWLEDGED: &str = "analysis:acknowledged";
