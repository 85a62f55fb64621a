//! Convenience layer for desktop-shell extensions.
//!
//! Provides label-grouped bookkeeping for signal subscriptions and method
//! injections so an extension can undo everything it set up in one call, plus
//! metadata and logging bootstrap for the extension host.

pub mod injection;
pub mod label;
pub mod logging;
pub mod metadata;
pub mod signals;

pub use injection::{Injection, Method, MethodSlots, MethodTable, PatchRegistry};
pub use label::DEFAULT_LABEL;
pub use logging::{default_log_level, init_logging, logging_status};
pub use metadata::{load_metadata, ExtensionMetadata, MetadataError, MetadataValidationError};
pub use serde_json::Value;
pub use signals::{SignalBinding, SignalEmitter, SubscriptionRegistry};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
