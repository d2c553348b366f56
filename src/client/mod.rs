//! Client facade and configuration.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`ClientBuilder`] fluent configuration |
//! | `core` | [`Client`] wiring of bus, manager and router |
//! | `options` | [`ConnectionOptions`] endpoint and recovery settings |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent client configuration.
pub mod builder;

/// Client facade.
pub mod core;

/// Connection options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use core::Client;
pub use options::ConnectionOptions;
