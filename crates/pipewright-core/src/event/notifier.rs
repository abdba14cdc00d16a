//! Notification sink trait.

use pipewright_types::error::NotifyError;
use pipewright_types::event::NotificationPayload;

/// Delivery target for lifecycle notifications.
///
/// Errors are reported to the caller, which logs them and carries on:
/// a failed delivery never changes the outcome of a run.
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait Notifier: Send + Sync {
    /// Deliver one payload.
    fn notify(
        &self,
        payload: &NotificationPayload,
    ) -> impl std::future::Future<Output = Result<(), NotifyError>> + Send;
}

/// Notifier that discards every payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    async fn notify(&self, _payload: &NotificationPayload) -> Result<(), NotifyError> {
        Ok(())
    }
}
