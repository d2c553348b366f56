//! Inbound frame classification.
//!
//! The backend is loose about field names: the same category of message may
//! arrive under several `type` values, and its text under several keys.
//! [`InboundFrame::classify`] folds all of that into one tagged enum at the
//! boundary so the router only ever matches on variants.
//!
//! # Field Resolution
//!
//! A field is *present* when it exists, is not `null`, is not an empty
//! string and is not numeric zero. The first present key wins:
//!
//! | Category | Keys, highest priority first | Fallback |
//! |----------|------------------------------|----------|
//! | Progress percent | `progress`, `percent` | `0` |
//! | Progress step | `step_info` | none |
//! | Log line | `message`, `content` | whole frame as JSON |
//! | Result | `content`, `result`, `final_result` | `"Analysis complete"` |
//! | Completion result | `final_result`, `result`, `content` | none |
//! | Error | `error`, `message` | `"An error occurred during analysis"` |
//! | Input prompt | `prompt`, `question`, `message` | none |
//! | Input default | `default` | none |
//! | Acknowledgment | `message` | none |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

// ============================================================================
// Constants
// ============================================================================

/// Result text used when a result frame carries none.
pub const DEFAULT_RESULT_TEXT: &str = "Analysis complete";

/// Error text used when an error frame carries none.
pub const DEFAULT_ERROR_TEXT: &str = "An error occurred during analysis";

const PROGRESS_KEYS: &[&str] = &["progress", "percent"];
const LOG_KEYS: &[&str] = &["message", "content"];
const RESULT_KEYS: &[&str] = &["content", "result", "final_result"];
const COMPLETION_KEYS: &[&str] = &["final_result", "result", "content"];
const ERROR_KEYS: &[&str] = &["error", "message"];
const PROMPT_KEYS: &[&str] = &["prompt", "question", "message"];

// ============================================================================
// InboundFrame
// ============================================================================

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// `progress` / `progress_update`.
    Progress {
        /// Completion percentage.
        percent: f64,
        /// Description of the current step.
        step_info: Option<String>,
    },

    /// `log` / `tool_call_log`.
    Log {
        /// Log line text.
        message: String,
    },

    /// `result` / `task_completed`.
    Result {
        /// Result text.
        content: String,
        /// `true` for `task_completed`, which also ends the run.
        completes_run: bool,
    },

    /// `complete`.
    Complete {
        /// Result text, when the completion carries one.
        result: Option<String>,
    },

    /// `error` / `task_cancelled` / `task_failed`.
    Error {
        /// The declared frame type.
        kind: String,
        /// Error text.
        message: String,
    },

    /// `user_input_request`.
    InputRequest {
        /// Question text.
        prompt: Option<String>,
        /// Suggested answer.
        default: Option<String>,
    },

    /// `connection_established`.
    Acknowledged {
        /// Greeting text.
        message: Option<String>,
    },

    /// `pong`, the reply to a heartbeat.
    Pong,

    /// Anything else, including frames without a `type`.
    Unknown {
        /// The declared type, if there was one.
        kind: Option<String>,
    },
}

impl InboundFrame {
    /// Classifies a parsed frame.
    #[must_use]
    pub fn classify(frame: &Value) -> Self {
        let Some(kind) = frame.get("type").and_then(Value::as_str) else {
            return Self::Unknown { kind: None };
        };

        match kind {
            "progress" | "progress_update" => Self::Progress {
                percent: first_number(frame, PROGRESS_KEYS).unwrap_or(0.0),
                step_info: text_field(frame, "step_info"),
            },

            "log" | "tool_call_log" => Self::Log {
                message: first_text(frame, LOG_KEYS).unwrap_or_else(|| frame.to_string()),
            },

            "result" | "task_completed" => Self::Result {
                content: first_text(frame, RESULT_KEYS)
                    .unwrap_or_else(|| DEFAULT_RESULT_TEXT.to_string()),
                completes_run: kind == "task_completed",
            },

            "complete" => Self::Complete {
                result: first_text(frame, COMPLETION_KEYS),
            },

            "error" | "task_cancelled" | "task_failed" => Self::Error {
                kind: kind.to_string(),
                message: first_text(frame, ERROR_KEYS)
                    .unwrap_or_else(|| DEFAULT_ERROR_TEXT.to_string()),
            },

            "user_input_request" => Self::InputRequest {
                prompt: first_text(frame, PROMPT_KEYS),
                default: text_field(frame, "default"),
            },

            "connection_established" => Self::Acknowledged {
                message: text_field(frame, "message"),
            },

            "pong" => Self::Pong,

            other => Self::Unknown {
                kind: Some(other.to_string()),
            },
        }
    }

    /// Short category name for logging.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Log { .. } => "log",
            Self::Result { .. } => "result",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
            Self::InputRequest { .. } => "input_request",
            Self::Acknowledged { .. } => "acknowledged",
            Self::Pong => "pong",
            Self::Unknown { .. } => "unknown",
        }
    }
}

// ============================================================================
// Field Helpers
// ============================================================================

/// Reads `key` as text. Non-string values are rendered as JSON.
fn text_field(frame: &Value, key: &str) -> Option<String> {
    match frame.get(key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

/// Reads `key` as a number. Numeric strings are accepted.
fn number_field(frame: &Value, key: &str) -> Option<f64> {
    let value = match frame.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (value != 0.0 && value.is_finite()).then_some(value)
}

fn first_text(frame: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text_field(frame, key))
}

fn first_number(frame: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| number_field(frame, key))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_progress_prefers_progress_over_percent() {
        let frame = json!({"type": "progress_update", "progress": 40, "percent": 90, "step_info": "loading"});
        assert_eq!(
            InboundFrame::classify(&frame),
            InboundFrame::Progress {
                percent: 40.0,
                step_info: Some("loading".into())
            }
        );
    }

    #[test]
    fn test_progress_zero_falls_through_to_percent() {
        let frame = json!({"type": "progress", "progress": 0, "percent": "15"});
        assert!(matches!(
            InboundFrame::classify(&frame),
            InboundFrame::Progress { percent, step_info: None } if percent == 15.0
        ));
    }

    #[test]
    fn test_progress_without_numbers_defaults_to_zero() {
        let frame = json!({"type": "progress"});
        assert!(matches!(
            InboundFrame::classify(&frame),
            InboundFrame::Progress { percent, .. } if percent == 0.0
        ));
    }

    #[test]
    fn test_log_falls_back_to_whole_frame() {
        let frame = json!({"type": "log", "level": "info"});
        let InboundFrame::Log { message } = InboundFrame::classify(&frame) else {
            panic!("expected log");
        };
        assert!(message.contains("\"level\":\"info\""));
    }

    #[test]
    fn test_tool_call_log_uses_message() {
        let frame = json!({"type": "tool_call_log", "message": "running query", "content": "ignored"});
        assert_eq!(
            InboundFrame::classify(&frame),
            InboundFrame::Log {
                message: "running query".into()
            }
        );
    }

    #[test]
    fn test_result_priority() {
        let frame = json!({"type": "result", "content": "", "result": "from result"});
        assert_eq!(
            InboundFrame::classify(&frame),
            InboundFrame::Result {
                content: "from result".into(),
                completes_run: false
            }
        );
    }

    #[test]
    fn test_task_completed_completes_run() {
        let frame = json!({"type": "task_completed", "result": "X"});
        assert_eq!(
            InboundFrame::classify(&frame),
            InboundFrame::Result {
                content: "X".into(),
                completes_run: true
            }
        );
    }

    #[test]
    fn test_result_default_text() {
        let frame = json!({"type": "result"});
        assert!(matches!(
            InboundFrame::classify(&frame),
            InboundFrame::Result { content, .. } if content == DEFAULT_RESULT_TEXT
        ));
    }

    #[test]
    fn test_complete_prefers_final_result() {
        let frame = json!({"type": "complete", "result": "b", "final_result": "a"});
        assert_eq!(
            InboundFrame::classify(&frame),
            InboundFrame::Complete {
                result: Some("a".into())
            }
        );
        let bare = json!({"type": "complete"});
        assert_eq!(
            InboundFrame::classify(&bare),
            InboundFrame::Complete { result: None }
        );
    }

    #[test]
    fn test_error_variants() {
        for kind in ["error", "task_cancelled", "task_failed"] {
            let frame = json!({"type": kind, "message": "m", "error": "e"});
            assert_eq!(
                InboundFrame::classify(&frame),
                InboundFrame::Error {
                    kind: kind.into(),
                    message: "e".into()
                }
            );
        }
        let bare = json!({"type": "error"});
        assert!(matches!(
            InboundFrame::classify(&bare),
            InboundFrame::Error { message, .. } if message == DEFAULT_ERROR_TEXT
        ));
    }

    #[test]
    fn test_structured_result_is_rendered_as_json() {
        let frame = json!({"type": "result", "result": {"rows": 3}});
        assert!(matches!(
            InboundFrame::classify(&frame),
            InboundFrame::Result { content, .. } if content == r#"{"rows":3}"#
        ));
    }

    #[test]
    fn test_input_request_fields() {
        let frame = json!({"type": "user_input_request", "question": "Proceed?", "default": "no"});
        assert_eq!(
            InboundFrame::classify(&frame),
            InboundFrame::InputRequest {
                prompt: Some("Proceed?".into()),
                default: Some("no".into())
            }
        );
    }

    #[test]
    fn test_acknowledgment_and_pong() {
        let ack = json!({"type": "connection_established", "message": "hello"});
        assert_eq!(
            InboundFrame::classify(&ack),
            InboundFrame::Acknowledged {
                message: Some("hello".into())
            }
        );
        assert_eq!(
            InboundFrame::classify(&json!({"type": "pong", "timestamp": 1.5})),
            InboundFrame::Pong
        );
    }

    #[test]
    fn test_unknown_and_untyped() {
        assert_eq!(
            InboundFrame::classify(&json!({"type": "brand_new"})),
            InboundFrame::Unknown {
                kind: Some("brand_new".into())
            }
        );
        assert_eq!(
            InboundFrame::classify(&json!({"no_type": true})),
            InboundFrame::Unknown { kind: None }
        );
        assert_eq!(
            InboundFrame::classify(&json!("just a string")),
            InboundFrame::Unknown { kind: None }
        );
    }
}
