//! Security gate over an external command validator
//!
//! A missing validator only allows commands when `insecure_dev_mode` is set.
//! A validator that errors always blocks the command.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reason given when no validator is configured outside dev mode
pub const NO_VALIDATOR_REASON: &str = "no security validator configured";

/// Decision returned by a validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Verdict {
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// External security collaborator consulted before dispatch
#[async_trait]
pub trait CommandValidator: Send + Sync {
    /// Decide whether `text` may be executed
    ///
    /// # Errors
    ///
    /// Any error is treated as a rejection by the gate.
    async fn validate_command(&self, text: &str) -> anyhow::Result<Verdict>;
}

/// Security gate used by the dispatch pipeline
#[derive(Clone)]
pub struct SecurityGate {
    validator: Option<Arc<dyn CommandValidator>>,
    insecure_dev_mode: bool,
}

impl SecurityGate {
    #[must_use]
    pub fn new(validator: Option<Arc<dyn CommandValidator>>, insecure_dev_mode: bool) -> Self {
        if validator.is_none() {
            if insecure_dev_mode {
                tracing::warn!("no security validator configured; insecure dev mode allows all commands");
            } else {
                tracing::warn!("no security validator configured; all commands will be blocked");
            }
        }

        Self {
            validator,
            insecure_dev_mode,
        }
    }

    #[must_use]
    pub const fn insecure_dev_mode(&self) -> bool {
        self.insecure_dev_mode
    }

    #[must_use]
    pub const fn has_validator(&self) -> bool {
        self.validator.is_some()
    }

    /// Check a command against the validator
    pub async fn check(&self, text: &str) -> Verdict {
        let Some(validator) = &self.validator else {
            return if self.insecure_dev_mode {
                tracing::debug!("security check skipped (insecure dev mode)");
                Verdict::allow()
            } else {
                Verdict::deny(NO_VALIDATOR_REASON)
            };
        };

        match validator.validate_command(text).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, "security validator failed, blocking command");
                Verdict::deny(&format!("security check failed: {e}"))
            }
        }
    }
}

impl std::fmt::Debug for SecurityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityGate")
            .field("has_validator", &self.validator.is_some())
            .field("insecure_dev_mode", &self.insecure_dev_mode)
            .finish()
    }
}
