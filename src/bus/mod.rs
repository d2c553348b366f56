//! Event bus.
//!
//! Decouples producers (connection manager, message router) from consumers
//! (chat view, progress display, notifications). The bus knows nothing about
//! networking; it only maps topic names to handlers.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `registry` | [`EventBus`] registration and delivery |
//! | `topics` | Topic names the crate publishes |

// ============================================================================
// Submodules
// ============================================================================

/// Handler registry and synchronous delivery.
pub mod registry;

/// Topic name constants.
pub mod topics;

// ============================================================================
// Re-exports
// ============================================================================

pub use registry::{EventBus, Handler, WeakEventBus};
