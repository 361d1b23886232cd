//! Handler registry, dispatch and retry
//!
//! The dispatcher resolves a match to its handler and runs it through the
//! retry executor. Patterns that require confirmation are short-circuited
//! until the caller confirms.

mod handler;
mod retry;

pub use handler::{CommandHandler, FnHandler, HandlerError, HandlerRegistry, HandlerReply, handler_fn};
pub use retry::{RetryExecutor, RetryOutcome, RetryPolicy, delay_for_attempt};

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt as _;
use thiserror::Error;

use crate::Result;
use crate::commands::{HandlerName, MatchResult};

/// Why a single handler invocation failed
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The pattern names a handler that is not registered
    #[error("no handler registered for {0}")]
    HandlerNotFound(HandlerName),

    /// The handler returned an error
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The handler panicked
    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Options controlling a single dispatch
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    /// The caller confirmed a pattern that requires confirmation
    pub confirmed: bool,
    /// Retry counter to start from
    pub retry_attempt: u32,
}

/// Result of a dispatch
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The pattern requires confirmation; the handler was not run
    ConfirmationRequired,
    /// The handler ran (possibly several times)
    Completed(RetryOutcome),
}

/// Routes matched commands to their handlers
#[derive(Debug, Default)]
pub struct Dispatcher {
    handlers: RwLock<HandlerRegistry>,
    retry: RetryExecutor,
}

impl Dispatcher {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            handlers: RwLock::new(HandlerRegistry::new()),
            retry: RetryExecutor::new(policy),
        }
    }

    /// Register or replace a handler
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is blank.
    pub fn register_handler(&self, name: &str, handler: Arc<dyn CommandHandler>) -> Result<HandlerName> {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(name, handler)
    }

    #[must_use]
    pub fn has_handler(&self, name: &HandlerName) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    #[must_use]
    pub fn handler_names(&self) -> Vec<HandlerName> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .names()
    }

    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        self.retry.policy()
    }

    /// Dispatch a matched command
    pub async fn dispatch(&self, matched: &MatchResult, context: &str, options: DispatchOptions) -> DispatchOutcome {
        if matched.pattern.requires_confirmation && !options.confirmed {
            tracing::debug!(pattern = %matched.pattern.pattern, "command requires confirmation");
            return DispatchOutcome::ConfirmationRequired;
        }

        let outcome = self
            .retry
            .run(options.retry_attempt, |_| self.invoke(matched, context))
            .await;

        DispatchOutcome::Completed(outcome)
    }

    /// Run the handler for `matched` once
    async fn invoke(&self, matched: &MatchResult, context: &str) -> std::result::Result<HandlerReply, DispatchError> {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&matched.pattern.handler)
            .ok_or_else(|| DispatchError::HandlerNotFound(matched.pattern.handler.clone()))?;

        match AssertUnwindSafe(handler.handle(&matched.params, context))
            .catch_unwind()
            .await
        {
            Ok(result) => result.map_err(DispatchError::Handler),
            Err(payload) => Err(DispatchError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
