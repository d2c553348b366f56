//! Automatic answers to input requests.
//!
//! Never active unless installed. Once installed, every
//! `analysis:input-request` is answered with
//! `{"type":"user_input_response","response": <default or "yes">}`.

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, info, warn};

use crate::bus::{EventBus, topics};
use crate::identifiers::SubscriptionId;
use crate::protocol::Outbound;
use crate::transport::{ConnectionManager, WeakConnectionManager};

// ============================================================================
// Constants
// ============================================================================

/// Answer used when the request names no default.
pub const DEFAULT_RESPONSE: &str = "yes";

// ============================================================================
// AutoResponder
// ============================================================================

/// Confirms every input request on the user's behalf.
#[derive(Debug)]
pub struct AutoResponder {
    bus: EventBus,
    subscription: SubscriptionId,
}

impl AutoResponder {
    /// Subscribes to input requests on `bus` and answers through `manager`.
    ///
    /// Holds only a weak handle to the manager.
    #[must_use]
    pub fn install(bus: &EventBus, manager: &ConnectionManager) -> Self {
        let manager: WeakConnectionManager = manager.downgrade();

        let subscription = bus.on(topics::ANALYSIS_INPUT_REQUEST, move |payload| {
            let Some(request) = payload.as_input_request() else {
                return Ok(());
            };
            let Some(manager) = manager.upgrade() else {
                return Ok(());
            };

            let answer = request.default.as_deref().unwrap_or(DEFAULT_RESPONSE);
            debug!(prompt = ?request.prompt, %answer, "Auto-answering input request");

            if !manager.send(&Outbound::user_input_response(answer))? {
                warn!("Input request left unanswered, link not open");
            }
            Ok(())
        });

        info!("Auto-responder installed");

        Self {
            bus: bus.clone(),
            subscription,
        }
    }

    /// Stops answering.
    pub fn uninstall(self) {
        self.bus
            .off(topics::ANALYSIS_INPUT_REQUEST, self.subscription);
    }
}

// ============================================================================
// Tests
// ============================================================================
