//! Command handlers and their registry

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::commands::HandlerName;
use crate::{Error, Result};

/// Substrings that mark a handler error as worth retrying
const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "network",
    "connection",
    "temporarily unavailable",
    "service unavailable",
    "try again",
    "too many requests",
    "429",
    "503",
    "504",
];

/// What a handler reports back after running
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HandlerReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Text for the accessibility announcer, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announce: Option<String>,
}

impl HandlerReply {
    #[must_use]
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            announce: None,
        }
    }

    #[must_use]
    pub fn failed(message: &str) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
            announce: None,
        }
    }

    #[must_use]
    pub fn with_announce(mut self, announce: &str) -> Self {
        self.announce = Some(announce.to_string());
        self
    }
}

/// Error raised by a handler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
    /// Optional machine-readable code (e.g. an HTTP status)
    pub code: Option<String>,
}

impl HandlerError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Whether the error looks like a transient failure
    #[must_use]
    pub fn is_transient(&self) -> bool {
        let message = self.message.to_lowercase();
        let code = self.code.as_deref().map(str::to_lowercase).unwrap_or_default();

        TRANSIENT_MARKERS
            .iter()
            .any(|marker| message.contains(marker) || code.contains(marker))
    }
}

/// An executable command action
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Run the command with the extracted wildcard params
    ///
    /// # Errors
    ///
    /// Transient errors (see [`HandlerError::is_transient`]) are retried by
    /// the pipeline; anything else fails the command immediately.
    async fn handle(&self, params: &[String], context: &str) -> std::result::Result<HandlerReply, HandlerError>;
}

/// Adapter turning an async closure into a [`CommandHandler`]
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(Vec<String>, String) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<HandlerReply, HandlerError>> + Send,
{
    async fn handle(&self, params: &[String], context: &str) -> std::result::Result<HandlerReply, HandlerError> {
        (self.0)(params.to_vec(), context.to_string()).await
    }
}

/// Wrap an async closure as a shareable handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CommandHandler>
where
    F: Fn(Vec<String>, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<HandlerReply, HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Handlers keyed by name
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerName, Arc<dyn CommandHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one with the same name
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandler`] if `name` is blank.
    pub fn register(&mut self, name: &str, handler: Arc<dyn CommandHandler>) -> Result<HandlerName> {
        let name = HandlerName::parse(name)
            .ok_or_else(|| Error::InvalidHandler("handler name must be non-empty".to_string()))?;

        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::debug!(handler = %name, "replaced command handler");
        }
        Ok(name)
    }

    #[must_use]
    pub fn get(&self, name: &HandlerName) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &HandlerName) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<HandlerName> {
        let mut names: Vec<_> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_by_message() {
        for message in [
            "Request Timeout",
            "network unreachable",
            "Connection reset by peer",
            "backend temporarily unavailable",
            "Service Unavailable",
            "please try again later",
            "Too Many Requests",
            "upstream returned 503",
        ] {
            assert!(HandlerError::new(message).is_transient(), "{message}");
        }
    }

    #[test]
    fn transient_by_code() {
        assert!(HandlerError::new("upstream failed").with_code("429").is_transient());
        assert!(HandlerError::new("upstream failed").with_code("504").is_transient());
    }

    #[test]
    fn permanent_errors() {
        assert!(!HandlerError::new("file not found").is_transient());
        assert!(!HandlerError::new("permission denied").with_code("403").is_transient());
    }

    #[tokio::test]
    async fn closure_handler_receives_params_and_context() {
        let handler = handler_fn(|params, context| async move {
            Ok(HandlerReply::ok(&format!("{context}:{}", params.join(","))))
        });

        let reply = handler
            .handle(&["a".to_string(), "b".to_string()], "editor")
            .await
            .unwrap();
        assert_eq!(reply.message.as_deref(), Some("editor:a,b"));
    }

    #[test]
    fn registry_overwrites_and_rejects_blank() {
        let mut registry = HandlerRegistry::new();
        let noop = handler_fn(|_, _| async { Ok(HandlerReply::ok("first")) });
        let name = registry.register("noop", Arc::clone(&noop)).unwrap();
        registry.register("noop", noop).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&name));
        assert!(matches!(
            registry.register(" ", handler_fn(|_, _| async { Ok(HandlerReply::default()) })),
            Err(Error::InvalidHandler(_))
        ));
    }
}
