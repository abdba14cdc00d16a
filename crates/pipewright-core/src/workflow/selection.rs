//! Selection gating: conditional dependencies resolved via the external store.
//!
//! A step that declares `selection_<8 hex>` dependencies runs only if, for
//! every such token, the store holds a list for this run that contains the
//! step's usid. Any other outcome aborts the step without halting the run.

use std::fmt;

use pipewright_types::workflow::{SelectionToken, StepDescriptor};
use serde_json::Value;

use super::context::output_key;
use crate::storage::SelectionStore;

/// Why a step was not permitted to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// No list stored under the token for this run.
    NotFound { token: String },
    /// The stored value is not a list.
    NotAList { token: String },
    /// The list does not contain the step's usid.
    NotSelected { token: String, usid: String },
}

impl AbortReason {
    pub fn token(&self) -> &str {
        match self {
            AbortReason::NotFound { token }
            | AbortReason::NotAList { token }
            | AbortReason::NotSelected { token, .. } => token,
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::NotFound { token } => write!(f, "Selection dependency {token} not found"),
            AbortReason::NotAList { token } => {
                write!(f, "Selection dependency {token} is not a list")
            }
            AbortReason::NotSelected { token, usid } => {
                write!(f, "USID {usid} not in selection {token}")
            }
        }
    }
}

/// Outcome of gating one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Run,
    Abort(AbortReason),
}

/// Evaluates a step's selection dependencies against the store.
pub struct SelectionGate<'a, S: SelectionStore> {
    store: &'a S,
    workflow_id: &'a str,
}

impl<'a, S: SelectionStore> SelectionGate<'a, S> {
    pub fn new(store: &'a S, workflow_id: &'a str) -> Self {
        Self { store, workflow_id }
    }

    /// Check every selection token in declaration order; the first failure wins.
    pub async fn check(&self, step: &StepDescriptor) -> GateDecision {
        for token in step.selection_dependencies() {
            if let Err(reason) = self.check_token(&token, &step.usid).await {
                return GateDecision::Abort(reason);
            }
        }
        GateDecision::Run
    }

    async fn check_token(&self, token: &SelectionToken, usid: &str) -> Result<(), AbortReason> {
        let key = output_key(self.workflow_id, token.as_str());
        let stored = match self.store.get(&key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "selection store read failed");
                None
            }
        };

        let token = token.as_str().to_string();
        match stored {
            None | Some(Value::Null) => Err(AbortReason::NotFound { token }),
            Some(Value::Array(items)) => {
                if items.iter().any(|item| item.as_str() == Some(usid)) {
                    Ok(())
                } else {
                    Err(AbortReason::NotSelected {
                        token,
                        usid: usid.to_string(),
                    })
                }
            }
            Some(_) => Err(AbortReason::NotAList { token }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
