//! Outbound frames sent by the client.
//!
//! Anything implementing `Serialize` can be sent through
//! [`ConnectionManager::send`](crate::transport::ConnectionManager::send);
//! these are the frames the crate itself knows about.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

// ============================================================================
// Outbound
// ============================================================================

/// Client-to-server frames.
///
/// # Format
///
/// ```json
/// { "type": "ping" }
/// { "type": "user_input_response", "response": "yes" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Heartbeat keep-alive.
    Ping,

    /// Answer to a `user_input_request`.
    UserInputResponse {
        /// The user's answer.
        response: String,
    },
}

impl Outbound {
    /// Creates a user input response.
    #[inline]
    #[must_use]
    pub fn user_input_response(response: impl Into<String>) -> Self {
        Self::UserInputResponse {
            response: response.into(),
        }
    }

    /// Serializes the frame to its wire text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_text(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_wire_shape() {
        assert_eq!(Outbound::Ping.to_text().unwrap(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_user_input_response_wire_shape() {
        let text = Outbound::user_input_response("yes").to_text().unwrap();
        assert_eq!(text, r#"{"type":"user_input_response","response":"yes"}"#);
    }
}
