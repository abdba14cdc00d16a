//! Retry policy for step dispatch.
//!
//! Fixed delay between attempts, no backoff growth. Stateless: the
//! dispatcher owns the attempt counter and asks the policy what to do.

use std::time::Duration;

use pipewright_types::workflow::ExecutionSettings;

use crate::transport::{HttpResponse, TransportError};

/// How a failed attempt is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Consume an attempt and try again if any remain.
    Retryable,
    /// Stop immediately.
    Terminal,
}

/// Attempt budget and inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        Self::new(settings.max_retries, settings.retry_delay)
    }

    /// Total attempts allowed: the first try plus `max_retries`.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt should follow attempt number `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32, class: FailureClass) -> bool {
        class == FailureClass::Retryable && attempt < self.total_attempts()
    }

    /// Delay before attempt number `attempt` (1-based). The first attempt is immediate.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        (attempt > 1).then_some(self.retry_delay)
    }

    /// Non-2xx responses: 4xx is terminal, everything else is retryable.
    pub fn classify_status(response: &HttpResponse) -> FailureClass {
        if response.is_client_error() {
            FailureClass::Terminal
        } else {
            FailureClass::Retryable
        }
    }

    /// Timeouts and network failures are retryable; anything else is terminal.
    pub fn classify_transport(error: &TransportError) -> FailureClass {
        match error {
            TransportError::Timeout(_) | TransportError::Network(_) => FailureClass::Retryable,
            TransportError::Request(_) => FailureClass::Terminal,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&ExecutionSettings::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> HttpResponse {
        HttpResponse {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn attempt_budget() {
        let policy = RetryPolicy::new(2, Duration::from_secs(3));
        assert_eq!(policy.total_attempts(), 3);
        assert!(policy.should_retry(1, FailureClass::Retryable));
        assert!(policy.should_retry(2, FailureClass::Retryable));
        assert!(!policy.should_retry(3, FailureClass::Retryable));
        assert!(!policy.should_retry(1, FailureClass::Terminal));
    }

    #[test]
    fn zero_retries_means_single_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.total_attempts(), 1);
        assert!(!policy.should_retry(1, FailureClass::Retryable));
    }

    #[test]
    fn fixed_delay_after_first_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(250));
        assert_eq!(policy.delay_before(1), None);
        assert_eq!(policy.delay_before(2), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay_before(4), Some(Duration::from_millis(250)));
    }

    #[test]
    fn status_classification() {
        assert_eq!(RetryPolicy::classify_status(&response(400)), FailureClass::Terminal);
        assert_eq!(RetryPolicy::classify_status(&response(404)), FailureClass::Terminal);
        assert_eq!(RetryPolicy::classify_status(&response(429)), FailureClass::Terminal);
        assert_eq!(RetryPolicy::classify_status(&response(500)), FailureClass::Retryable);
        assert_eq!(RetryPolicy::classify_status(&response(503)), FailureClass::Retryable);
        assert_eq!(RetryPolicy::classify_status(&response(302)), FailureClass::Retryable);
    }

    #[test]
    fn transport_classification() {
        assert_eq!(
            RetryPolicy::classify_transport(&TransportError::Timeout("t".into())),
            FailureClass::Retryable
        );
        assert_eq!(
            RetryPolicy::classify_transport(&TransportError::Network("n".into())),
            FailureClass::Retryable
        );
        assert_eq!(
            RetryPolicy::classify_transport(&TransportError::Request("bad url".into())),
            FailureClass::Terminal
        );
    }

    #[test]
    fn default_policy_matches_engine_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.retry_delay, Duration::from_secs(3));
    }
}
