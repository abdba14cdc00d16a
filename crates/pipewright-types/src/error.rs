use thiserror::Error;

/// Errors from the selection-state store. Never fatal to a run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("selection store unavailable: {0}")]
    Unavailable(String),

    #[error("selection store returned status {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("selection value encoding error: {0}")]
    Encoding(String),
}

/// Errors from notification delivery. Logged and swallowed by notifiers.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error("notification endpoint returned status {0}")]
    Status(u16),
}
