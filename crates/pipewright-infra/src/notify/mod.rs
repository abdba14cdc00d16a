//! Notification sink adapters.

pub mod webhook;

pub use webhook::WebhookNotifier;
