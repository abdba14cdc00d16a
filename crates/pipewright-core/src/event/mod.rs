//! Lifecycle notification port.
//!
//! The executor hands every `NotificationPayload` to a `Notifier`.
//! Implementations live in pipewright-infra.

pub mod notifier;

pub use notifier::{NoopNotifier, Notifier};
