//! Frame dispatch.
//!
//! Turns each raw `websocket:message` frame into zero, one or two semantic
//! events. Classification lives in [`InboundFrame`]; this module only decides
//! which topics fire and with what payload.
//!
//! | Frame | Topics, in order |
//! |-------|------------------|
//! | Progress | `analysis:progress` |
//! | Log | `analysis:log` |
//! | `result` | `analysis:final` |
//! | `task_completed` | `analysis:completed`, `analysis:final` |
//! | `complete` | `analysis:completed`, then `analysis:final` if it carries a result |
//! | Error | `analysis:error` |
//! | Input request | `analysis:input-request` |
//! | `connection_established` | `analysis:acknowledged` |
//! | `pong`, unknown | none |

// ============================================================================
// Imports
// ============================================================================

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, trace};

use crate::bus::{EventBus, topics};
use crate::identifiers::SubscriptionId;
use crate::protocol::{
    Acknowledgment, AnalysisFailure, Completion, ContentEvent, InboundFrame, Payload,
    UserInputRequest,
};

// ============================================================================
// MessageRouter
// ============================================================================

/// Routes raw inbound frames to semantic topics on the same bus.
///
/// Stateless apart from the bus handle; cheap to clone.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    bus: EventBus,
}

impl MessageRouter {
    /// Creates a router publishing on `bus`.
    #[inline]
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Subscribes the router to `websocket:message`.
    ///
    /// The subscription holds only a weak handle to the bus. Pass the
    /// returned id to [`detach`](Self::detach) to stop routing.
    pub fn attach(&self) -> SubscriptionId {
        let bus = self.bus.downgrade();

        self.bus.on(topics::WEBSOCKET_MESSAGE, move |payload| {
            let (Some(frame), Some(bus)) = (payload.as_frame(), bus.upgrade()) else {
                return Ok(());
            };
            route_frame(&bus, frame);
            Ok(())
        })
    }

    /// Removes a subscription made by [`attach`](Self::attach).
    pub fn detach(&self, id: SubscriptionId) -> bool {
        self.bus.off(topics::WEBSOCKET_MESSAGE, id)
    }

    /// Routes one frame and returns the topics emitted, in order.
    pub fn route(&self, frame: &Value) -> Vec<&'static str> {
        route_frame(&self.bus, frame)
    }
}

// ============================================================================
// Dispatch
// ============================================================================

fn route_frame(bus: &EventBus, frame: &Value) -> Vec<&'static str> {
    let classified = InboundFrame::classify(frame);
    trace!(category = classified.category(), "Routing inbound frame");

    let now = Utc::now();
    let mut events: Vec<(&'static str, Payload)> = Vec::with_capacity(2);

    match classified {
        InboundFrame::Progress { percent, step_info } => {
            let content = match step_info {
                Some(step) => format!("Progress: {percent}% - {step}"),
                None => format!("Progress: {percent}%"),
            };
            events.push((topics::ANALYSIS_PROGRESS, content_event(content, now)));
        }

        InboundFrame::Log { message } => {
            events.push((topics::ANALYSIS_LOG, content_event(message, now)));
        }

        InboundFrame::Result {
            content,
            completes_run,
        } => {
            if completes_run {
                events.push((topics::ANALYSIS_COMPLETED, completion(now)));
            }
            events.push((topics::ANALYSIS_FINAL, content_event(content, now)));
        }

        InboundFrame::Complete { result } => {
            events.push((topics::ANALYSIS_COMPLETED, completion(now)));
            if let Some(result) = result {
                events.push((topics::ANALYSIS_FINAL, content_event(result, now)));
            }
        }

        InboundFrame::Error { kind, message } => {
            debug!(%kind, %message, "Analysis error reported");
            events.push((
                topics::ANALYSIS_ERROR,
                Payload::Failure(AnalysisFailure {
                    message,
                    kind,
                    timestamp: now,
                }),
            ));
        }

        InboundFrame::InputRequest { prompt, default } => {
            events.push((
                topics::ANALYSIS_INPUT_REQUEST,
                Payload::InputRequest(UserInputRequest {
                    prompt,
                    default,
                    frame: frame.clone(),
                    timestamp: now,
                }),
            ));
        }

        InboundFrame::Acknowledged { message } => {
            events.push((
                topics::ANALYSIS_ACKNOWLEDGED,
                Payload::Acknowledged(Acknowledgment {
                    message,
                    timestamp: now,
                }),
            ));
        }

        InboundFrame::Pong => {
            trace!("Heartbeat acknowledged");
        }

        InboundFrame::Unknown { kind } => {
            debug!(kind = ?kind, "Ignoring frame of unknown type");
        }
    }

    events
        .into_iter()
        .map(|(topic, payload)| {
            bus.emit(topic, &payload);
            topic
        })
        .collect()
}

#[inline]
fn content_event(content: String, timestamp: chrono::DateTime<Utc>) -> Payload {
    Payload::Content(ContentEvent { content, timestamp })
}

#[inline]
fn completion(timestamp: chrono::DateTime<Utc>) -> Payload {
    Payload::Completed(Completion { timestamp })
}

// ============================================================================
// Tests
// ============================================================================
