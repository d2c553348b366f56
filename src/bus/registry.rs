//! In-process publish/subscribe registry.
//!
//! Delivery is synchronous: [`EventBus::emit`] runs every handler on the
//! caller's stack before returning. Handlers registered for a topic run in
//! registration order.
//!
//! # Failure Isolation
//!
//! A handler that returns `Err` or panics is logged and skipped; remaining
//! handlers still run and the emitter never sees the failure.
//!
//! # Snapshot Semantics
//!
//! `emit` delivers to the handlers registered when it started. Handlers
//! added or removed while it runs take effect from the next emission.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{error, trace};

use crate::error::Result;
use crate::identifiers::SubscriptionId;
use crate::protocol::Payload;

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
pub type Handler = dyn Fn(&Payload) -> Result<()> + Send + Sync;

/// One registered handler.
#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    handler: Arc<Handler>,
    /// Set for `once` registrations; flips on first delivery.
    fired: Option<Arc<AtomicBool>>,
}

/// Topic → handlers in registration order.
type Registry = FxHashMap<String, Vec<Subscription>>;

// ============================================================================
// EventBus
// ============================================================================

/// Publish/subscribe event bus.
///
/// Cloning is cheap and every clone shares the same registry, so one bus can
/// be handed to every component that publishes or listens.
///
/// # Example
///
/// ```
/// use analysis_realtime::bus::{EventBus, topics};
/// use analysis_realtime::protocol::{ContentEvent, Payload};
///
/// let bus = EventBus::new();
/// bus.on(topics::ANALYSIS_FINAL, |payload| {
///     if let Some(event) = payload.as_content() {
///         println!("result: {}", event.content);
///     }
///     Ok(())
/// });
///
/// bus.emit(topics::ANALYSIS_FINAL, &Payload::Content(ContentEvent::now("42")));
/// ```
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("EventBus")
            .field("topics", &registry.len())
            .field(
                "handlers",
                &registry.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

/// Non-owning handle to an [`EventBus`].
///
/// Handlers that publish on the bus they are registered with hold one of
/// these so the registry does not keep itself alive.
#[derive(Clone, Default)]
pub struct WeakEventBus {
    registry: Weak<Mutex<Registry>>,
}

impl WeakEventBus {
    /// Returns the bus if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<EventBus> {
        self.registry.upgrade().map(|registry| EventBus { registry })
    }
}

impl fmt::Debug for WeakEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEventBus")
            .field("alive", &(self.registry.strong_count() > 0))
            .finish()
    }
}

// ============================================================================
// EventBus - Registration
// ============================================================================

impl EventBus {
    /// Creates an empty bus.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakEventBus {
        WeakEventBus {
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Registers `handler` for `topic`.
    ///
    /// The same closure may be registered several times; each registration
    /// gets its own [`SubscriptionId`].
    pub fn on<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Payload) -> Result<()> + Send + Sync + 'static,
    {
        self.insert(topic.into(), Arc::new(handler), None)
    }

    /// Registers `handler` for a single delivery.
    ///
    /// The registration is removed before the handler runs, so a re-entrant
    /// emission of the same topic from inside the handler does not reach it.
    pub fn once<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Payload) -> Result<()> + Send + Sync + 'static,
    {
        self.insert(
            topic.into(),
            Arc::new(handler),
            Some(Arc::new(AtomicBool::new(false))),
        )
    }

    /// Removes one registration.
    ///
    /// Returns `false` if it was not registered under `topic`.
    pub fn off(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock();
        let Some(subscriptions) = registry.get_mut(topic) else {
            return false;
        };

        let before = subscriptions.len();
        subscriptions.retain(|sub| sub.id != id);
        let removed = subscriptions.len() != before;

        if subscriptions.is_empty() {
            registry.remove(topic);
        }

        removed
    }

    /// Removes every topic and handler.
    pub fn clear(&self) {
        self.registry.lock().clear();
    }

    fn insert(
        &self,
        topic: String,
        handler: Arc<Handler>,
        fired: Option<Arc<AtomicBool>>,
    ) -> SubscriptionId {
        let id = SubscriptionId::next();
        trace!(%topic, subscription = %id, once = fired.is_some(), "Handler registered");

        self.registry
            .lock()
            .entry(topic)
            .or_default()
            .push(Subscription { id, handler, fired });

        id
    }
}

// ============================================================================
// EventBus - Delivery
// ============================================================================

impl EventBus {
    /// Delivers `payload` to every handler registered for `topic`.
    ///
    /// Returns the number of handlers invoked, failed ones included.
    pub fn emit(&self, topic: &str, payload: &Payload) -> usize {
        let snapshot = match self.registry.lock().get(topic) {
            Some(subscriptions) => subscriptions.clone(),
            None => {
                trace!(topic, "No handlers for topic");
                return 0;
            }
        };

        let mut delivered = 0;

        for sub in snapshot {
            if let Some(ref fired) = sub.fired {
                if fired.swap(true, Ordering::AcqRel) {
                    continue;
                }
                self.off(topic, sub.id);
            }

            delivered += 1;

            match catch_unwind(AssertUnwindSafe(|| (sub.handler)(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(topic, subscription = %sub.id, error = %e, "Event handler failed");
                }
                Err(panic) => {
                    error!(
                        topic,
                        subscription = %sub.id,
                        panic = panic_message(panic.as_ref()),
                        "Event handler panicked"
                    );
                }
            }
        }

        delivered
    }
}

// ============================================================================
// EventBus - Diagnostics
// ============================================================================

impl EventBus {
    /// Returns the number of handlers registered for `topic`.
    #[must_use]
    pub fn handler_count(&self, topic: &str) -> usize {
        self.registry.lock().get(topic).map_or(0, Vec::len)
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

// ============================================================================
// Tests
// ============================================================================
