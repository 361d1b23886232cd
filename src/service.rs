//! Command service: the end-to-end dispatch pipeline
//!
//! ```text
//! utterance → history → throttle → security → match → (confirm?) → dispatch/retry → metrics → event
//! ```
//!
//! All shared state sits behind short-lived locks that are never held across
//! an `await`, so a service can be shared between tasks behind an `Arc`.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::commands::{self, CommandPattern, MatchResult, PatternConfig, PatternRegistry};
use crate::config::Config;
use crate::dispatch::{CommandHandler, DispatchError, DispatchOptions, DispatchOutcome, Dispatcher, RetryOutcome};
use crate::events::{self, CommandEvent, EventBus, Severity};
use crate::history::{CommandRecord, HistoryLedger};
use crate::metrics::{Metrics, MetricsCollector, UNMATCHED_BUCKET};
use crate::resource::{ResourceAdapter, ResourceModeChanged};
use crate::security::{CommandValidator, DenyListValidator, NO_VALIDATOR_REASON, SecurityGate, Verdict};
use crate::throttle::{Admission, SharedThrottle, ThrottleGovernor};
use crate::{Error, Result};

/// Message returned for commands that match no pattern
pub const UNRECOGNIZED_MESSAGE: &str = "Command not recognized";

/// Message returned for commands rejected by the security gate
pub const BLOCKED_MESSAGE: &str = "Command blocked by security policy";

/// Number of history entries attached to metrics snapshots
const SNAPSHOT_HISTORY: usize = 10;

/// Why a command did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Empty command text
    InvalidInput,
    /// Rate limit reached
    Throttled,
    /// Rejected by the security gate
    SecurityBlocked,
    /// No pattern matched
    Unrecognized,
    /// Pattern routed to an unregistered handler
    HandlerNotFound,
    /// Handler kept failing transiently until retries ran out
    TransientHandlerError,
    /// Handler failed with a non-transient error
    PermanentHandlerError,
    /// Handler ran but reported `success: false`
    HandlerDeclined,
    /// Handler panicked
    Unexpected,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Throttled => "throttled",
            Self::SecurityBlocked => "security_blocked",
            Self::Unrecognized => "unrecognized",
            Self::HandlerNotFound => "handler_not_found",
            Self::TransientHandlerError => "transient_handler_error",
            Self::PermanentHandlerError => "permanent_handler_error",
            Self::HandlerDeclined => "handler_declined",
            Self::Unexpected => "unexpected",
        }
    }
}

/// Data needed to replay a command once the user confirms it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingConfirmation {
    /// Normalized command text
    pub command: String,
    pub context: String,
    pub pattern: String,
    pub handler: String,
    pub params: Vec<String>,
}

/// Outcome of [`CommandService::process_command`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    /// A pattern or policy took responsibility for the command
    pub handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announce: Option<String>,
    pub throttled: bool,
    /// Seconds until the throttle admits commands again
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    pub requires_confirmation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingConfirmation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Handler invocations made
    pub attempts: u32,
}

impl CommandResult {
    fn failed(kind: FailureKind, handled: bool, message: &str) -> Self {
        Self {
            handled,
            message: Some(message.to_string()),
            failure: Some(kind),
            ..Self::default()
        }
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Per-call options for [`CommandService::process_command`]
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Context override for this call
    pub context: Option<String>,
    pub bypass_security: bool,
    pub bypass_throttling: bool,
    /// Retry counter to start from
    pub retry_attempt: u32,
    /// Caller confirmed a command that requires confirmation
    pub confirmed: bool,
}

impl ProcessOptions {
    #[must_use]
    pub fn in_context(context: &str) -> Self {
        Self {
            context: Some(context.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn confirmed() -> Self {
        Self {
            context: None,
            bypass_security: false,
            bypass_throttling: false,
            retry_attempt: 0,
            confirmed: true,
        }
    }
}

/// Collaborators and registrations wired in by [`CommandService::initialize`]
#[derive(Default)]
pub struct InitOptions {
    validator: Option<Arc<dyn CommandValidator>>,
    handlers: Vec<(String, Arc<dyn CommandHandler>)>,
    patterns: Vec<(String, PatternConfig)>,
    resource_signal: Option<broadcast::Receiver<ResourceModeChanged>>,
}

impl InitOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Security collaborator consulted before dispatch
    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn CommandValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub fn handler(mut self, name: &str, handler: Arc<dyn CommandHandler>) -> Self {
        self.handlers.push((name.to_string(), handler));
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: &str, config: PatternConfig) -> Self {
        self.patterns.push((pattern.to_string(), config));
        self
    }

    /// Resource mode signal to follow
    #[must_use]
    pub fn resource_signal(mut self, signal: broadcast::Receiver<ResourceModeChanged>) -> Self {
        self.resource_signal = Some(signal);
        self
    }
}

impl std::fmt::Debug for InitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitOptions")
            .field("has_validator", &self.validator.is_some())
            .field("handlers", &self.handlers.len())
            .field("patterns", &self.patterns.len())
            .field("has_resource_signal", &self.resource_signal.is_some())
            .finish()
    }
}

/// Summary of an [`CommandService::initialize`] call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitResult {
    /// The service was already initialized; nothing was changed
    pub already_initialized: bool,
    pub patterns: usize,
    pub handlers: usize,
    pub insecure_dev_mode: bool,
    /// Handler names referenced by patterns but not registered
    pub unresolved_handlers: Vec<String>,
}

/// Options for [`CommandService::shutdown`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ShutdownOptions {
    pub clear_history: bool,
}

/// Summary of a [`CommandService::shutdown`] call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShutdownResult {
    pub was_initialized: bool,
    /// Metrics as they were before the reset
    pub metrics: Metrics,
    pub history_cleared: bool,
}

#[derive(Debug, Default)]
struct Lifecycle {
    initialized: bool,
    security: Option<SecurityGate>,
    resource_task: Option<JoinHandle<()>>,
}

/// The voice command dispatch pipeline
#[derive(Debug)]
pub struct CommandService {
    config: Config,
    lifecycle: Mutex<Lifecycle>,
    context: RwLock<String>,
    patterns: RwLock<PatternRegistry>,
    dispatcher: Dispatcher,
    throttle: SharedThrottle,
    history: Mutex<HistoryLedger>,
    metrics: Mutex<MetricsCollector>,
    events: EventBus,
}

impl CommandService {
    /// Create an uninitialized service
    #[must_use]
    pub fn new(config: Config) -> Self {
        let throttle =
            ThrottleGovernor::new(config.throttle.max_per_minute, config.throttle.critical_exempt)
                .shared();
        let metrics = MetricsCollector::new(
            config.metrics.ema_alpha,
            config.metrics.snapshot_interval,
            Instant::now(),
        );

        Self {
            context: RwLock::new(config.default_context.clone()),
            lifecycle: Mutex::new(Lifecycle::default()),
            patterns: RwLock::new(PatternRegistry::new()),
            dispatcher: Dispatcher::new(config.retry.policy()),
            throttle,
            history: Mutex::new(HistoryLedger::new(config.history_capacity)),
            metrics: Mutex::new(metrics),
            events: EventBus::new(),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .initialized
    }

    /// Wire collaborators, handlers and patterns
    ///
    /// Patterns from the config file are registered first, then those in
    /// `options`. Calling this on an initialized service changes nothing.
    /// A resource signal is followed on a spawned task, so this must run
    /// inside a tokio runtime when one is given.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern or handler registration is invalid.
    pub fn initialize(&self, options: InitOptions) -> Result<InitResult> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if lifecycle.initialized {
            return Ok(InitResult {
                already_initialized: true,
                patterns: self.read_patterns().len(),
                handlers: self.dispatcher.handler_names().len(),
                insecure_dev_mode: self.config.security.insecure_dev_mode,
                unresolved_handlers: self.unresolved_handlers(),
            });
        }

        for entry in &self.config.patterns {
            self.register_command_pattern(&entry.pattern, entry.config.clone())?;
        }
        for (pattern, config) in options.patterns {
            self.register_command_pattern(&pattern, config)?;
        }
        for (name, handler) in options.handlers {
            self.register_command_handler(&name, handler)?;
        }

        let validator = options.validator.or_else(|| {
            if self.config.security.blocked_terms.is_empty() {
                None
            } else {
                let validator: Arc<dyn CommandValidator> =
                    Arc::new(DenyListValidator::new(&self.config.security.blocked_terms));
                Some(validator)
            }
        });
        lifecycle.security = Some(SecurityGate::new(
            validator,
            self.config.security.insecure_dev_mode,
        ));

        if let Some(signal) = options.resource_signal {
            let adapter = ResourceAdapter::new(Arc::clone(&self.throttle));
            lifecycle.resource_task = Some(adapter.spawn(signal));
        }

        lifecycle.initialized = true;

        let result = InitResult {
            already_initialized: false,
            patterns: self.read_patterns().len(),
            handlers: self.dispatcher.handler_names().len(),
            insecure_dev_mode: self.config.security.insecure_dev_mode,
            unresolved_handlers: self.unresolved_handlers(),
        };

        for handler in &result.unresolved_handlers {
            tracing::warn!(handler = %handler, "pattern references an unregistered handler");
        }
        tracing::info!(
            patterns = result.patterns,
            handlers = result.handlers,
            context = %self.command_context(),
            "command service initialized"
        );

        Ok(result)
    }

    /// Register or replace a command pattern
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern or its handler name is blank.
    pub fn register_command_pattern(&self, pattern: &str, config: PatternConfig) -> Result<Arc<CommandPattern>> {
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(pattern, config)
    }

    /// Register or replace a command handler
    ///
    /// # Errors
    ///
    /// Returns an error if the handler name is blank.
    pub fn register_command_handler(&self, name: &str, handler: Arc<dyn CommandHandler>) -> Result<()> {
        self.dispatcher.register_handler(name, handler).map(|_| ())
    }

    /// Registered patterns in registration order
    #[must_use]
    pub fn registered_patterns(&self) -> Vec<Arc<CommandPattern>> {
        self.read_patterns().patterns()
    }

    /// Set the active context (blank resets to the configured default)
    pub fn set_command_context(&self, context: &str) {
        let context = commands::normalize(context);
        let context = if context.is_empty() {
            self.config.default_context.clone()
        } else {
            context
        };

        tracing::debug!(%context, "command context changed");
        *self.context.write().unwrap_or_else(PoisonError::into_inner) = context;
    }

    #[must_use]
    pub fn command_context(&self) -> String {
        self.context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Up to `limit` recent commands, newest first
    #[must_use]
    pub fn command_history(&self, limit: usize) -> Vec<CommandRecord> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recent(limit)
    }

    pub fn clear_command_history(&self) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Current metrics
    #[must_use]
    pub fn metrics(&self) -> Metrics {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Subscribe to command events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CommandEvent> {
        self.events.subscribe()
    }

    /// Throttle governor handle (shared with the resource adapter)
    #[must_use]
    pub fn throttle(&self) -> SharedThrottle {
        Arc::clone(&self.throttle)
    }

    /// Interpret and execute a recognized utterance
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if called before
    /// [`initialize`](Self::initialize). Every other failure is reported
    /// on the returned [`CommandResult`].
    pub async fn process_command(&self, text: &str, options: ProcessOptions) -> Result<CommandResult> {
        let started = Instant::now();

        let security = {
            let lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            if !lifecycle.initialized {
                return Err(Error::NotInitialized);
            }
            lifecycle.security.clone()
        };

        let command = commands::normalize(text);
        if command.is_empty() {
            return Ok(CommandResult::failed(FailureKind::InvalidInput, false, "Command text is empty"));
        }

        let context = options
            .context
            .as_deref()
            .map(commands::normalize)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.command_context());

        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&command, &context);

        let matched = commands::match_command(&self.read_patterns(), &command, &context);
        let bucket = matched
            .as_ref()
            .map_or(UNMATCHED_BUCKET, |m| m.pattern.category.as_str());

        if !options.bypass_throttling {
            let is_critical = matched
                .as_ref()
                .is_some_and(|m| m.pattern.importance.is_critical());
            let admission = self
                .throttle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .try_admit(started, is_critical);

            match admission {
                Admission::Admitted => {}
                Admission::Exempt => {
                    tracing::debug!(command = %command, "critical command exempt from throttling");
                }
                Admission::Rejected { retry_after_secs } => {
                    tracing::warn!(command = %command, retry_after_secs, "command throttled");
                    self.record_metrics(bucket, false, started);
                    return Ok(CommandResult {
                        throttled: true,
                        retry_after: Some(retry_after_secs),
                        ..CommandResult::failed(
                            FailureKind::Throttled,
                            false,
                            &format!("Too many commands, try again in {retry_after_secs} seconds"),
                        )
                    });
                }
            }
        }

        if options.bypass_security {
            tracing::debug!(command = %command, "security check bypassed");
        } else {
            let verdict = match &security {
                Some(gate) => gate.check(&command).await,
                None => Verdict::deny(NO_VALIDATOR_REASON),
            };

            if !verdict.allowed {
                tracing::warn!(command = %command, reason = ?verdict.reason, "command blocked by security gate");
                self.events
                    .publish(events::security_blocked(&command, verdict.reason.as_deref()));
                self.record_metrics(bucket, false, started);

                let result = CommandResult::failed(FailureKind::SecurityBlocked, true, BLOCKED_MESSAGE);
                return Ok(match verdict.reason {
                    Some(reason) => result.with_error(reason),
                    None => result,
                });
            }
        }

        let Some(matched) = matched else {
            tracing::debug!(command = %command, %context, "command not recognized");
            self.events
                .publish(events::unrecognized_command(&command, &context));
            self.record_metrics(UNMATCHED_BUCKET, false, started);
            return Ok(CommandResult::failed(FailureKind::Unrecognized, false, UNRECOGNIZED_MESSAGE));
        };

        let dispatch_options = DispatchOptions {
            confirmed: options.confirmed,
            retry_attempt: options.retry_attempt,
        };

        match self.dispatcher.dispatch(&matched, &context, dispatch_options).await {
            DispatchOutcome::ConfirmationRequired => Ok(confirmation_required(&command, &context, &matched)),
            DispatchOutcome::Completed(outcome) => Ok(self.complete(&command, &matched, outcome, started)),
        }
    }

    /// Replay a command that was waiting for confirmation
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the service is not initialized.
    pub async fn confirm(&self, pending: &PendingConfirmation) -> Result<CommandResult> {
        let options = ProcessOptions {
            context: Some(pending.context.clone()),
            ..ProcessOptions::confirmed()
        };
        self.process_command(&pending.command, options).await
    }

    /// Stop background work and reset metrics
    ///
    /// The service can be initialized again afterwards; registrations are kept.
    pub fn shutdown(&self, options: ShutdownOptions) -> ShutdownResult {
        let was_initialized = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(task) = lifecycle.resource_task.take() {
                task.abort();
            }
            lifecycle.security = None;
            std::mem::replace(&mut lifecycle.initialized, false)
        };

        let metrics = {
            let mut collector = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
            let metrics = collector.snapshot();
            collector.reset(Instant::now());
            metrics
        };

        if options.clear_history {
            self.clear_command_history();
        }

        tracing::info!(
            total_commands = metrics.total_commands,
            succeeded = metrics.succeeded,
            failed = metrics.failed,
            "command service shut down"
        );

        ShutdownResult {
            was_initialized,
            metrics,
            history_cleared: options.clear_history,
        }
    }

    fn complete(&self, command: &str, matched: &MatchResult, outcome: RetryOutcome, started: Instant) -> CommandResult {
        let pattern = &matched.pattern;
        let attempts = outcome.attempts;

        let result = match outcome.result {
            Ok(reply) if reply.success => {
                tracing::info!(
                    command = %command,
                    handler = %pattern.handler,
                    attempts,
                    "command executed"
                );
                self.events.publish(events::command_executed(
                    command,
                    pattern.handler.as_str(),
                    &matched.params,
                    reply.message.as_deref(),
                ));
                CommandResult {
                    success: true,
                    handled: true,
                    message: reply.message,
                    announce: reply.announce,
                    attempts,
                    ..CommandResult::default()
                }
            }
            Ok(reply) => {
                let message = reply
                    .message
                    .unwrap_or_else(|| format!("{} did not complete", pattern.handler));
                self.publish_failure(command, FailureKind::HandlerDeclined, &message, Severity::Low);
                CommandResult {
                    announce: reply.announce,
                    attempts,
                    ..CommandResult::failed(FailureKind::HandlerDeclined, true, &message)
                }
            }
            Err(DispatchError::HandlerNotFound(name)) => {
                let error = format!("No handler registered for {name}");
                tracing::warn!(command = %command, handler = %name, "handler not found");
                self.publish_failure(command, FailureKind::HandlerNotFound, &error, Severity::Medium);
                CommandResult {
                    attempts,
                    ..CommandResult::failed(FailureKind::HandlerNotFound, true, "Command handler not available")
                        .with_error(error)
                }
            }
            Err(DispatchError::Handler(e)) => {
                let kind = if e.is_transient() {
                    FailureKind::TransientHandlerError
                } else {
                    FailureKind::PermanentHandlerError
                };
                tracing::warn!(command = %command, handler = %pattern.handler, error = %e, attempts, "command failed");
                self.publish_failure(command, kind, &e.message, Severity::Medium);
                CommandResult {
                    attempts,
                    ..CommandResult::failed(kind, true, "Command failed").with_error(e.message)
                }
            }
            Err(DispatchError::Panicked(message)) => {
                tracing::error!(command = %command, handler = %pattern.handler, error = %message, "unexpected handler failure");
                self.publish_failure(command, FailureKind::Unexpected, &message, Severity::High);
                CommandResult {
                    attempts,
                    ..CommandResult::failed(FailureKind::Unexpected, true, "Unexpected error while executing command")
                        .with_error(message)
                }
            }
        };

        self.record_metrics(pattern.category.as_str(), result.success, started);
        result
    }

    fn publish_failure(&self, command: &str, kind: FailureKind, error: &str, severity: Severity) {
        self.events
            .publish(events::command_failed(command, kind.as_str(), error, severity));
    }

    fn record_metrics(&self, bucket: &str, success: bool, started: Instant) {
        let now = Instant::now();
        let elapsed: Duration = now.saturating_duration_since(started);

        let snapshot = self
            .metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(bucket, success, elapsed, now);

        if let Some(metrics) = snapshot {
            let recent = self.command_history(SNAPSHOT_HISTORY);
            self.events.publish(events::metrics_snapshot(&metrics, &recent));
        }
    }

    fn read_patterns(&self) -> std::sync::RwLockReadGuard<'_, PatternRegistry> {
        self.patterns.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn unresolved_handlers(&self) -> Vec<String> {
        let mut missing: Vec<String> = self
            .read_patterns()
            .iter()
            .filter(|entry| !self.dispatcher.has_handler(&entry.pattern.handler))
            .map(|entry| entry.pattern.handler.to_string())
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }
}

impl Drop for CommandService {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = lifecycle.resource_task.take() {
            task.abort();
        }
    }
}

fn confirmation_required(command: &str, context: &str, matched: &MatchResult) -> CommandResult {
    tracing::info!(command = %command, pattern = %matched.pattern.pattern, "awaiting confirmation");
    CommandResult {
        handled: true,
        requires_confirmation: true,
        message: Some(format!("Please confirm: {command}")),
        pending: Some(PendingConfirmation {
            command: command.to_string(),
            context: context.to_string(),
            pattern: matched.pattern.pattern.clone(),
            handler: matched.pattern.handler.to_string(),
            params: matched.params.clone(),
        }),
        ..CommandResult::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{HandlerReply, handler_fn};

    fn dev_config() -> Config {
        let mut config = Config::default();
        config.security.insecure_dev_mode = true;
        config
    }

    #[tokio::test]
    async fn rejects_calls_before_initialize() {
        let service = CommandService::new(dev_config());
        assert!(matches!(
            service.process_command("go to settings", ProcessOptions::default()).await,
            Err(Error::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let service = CommandService::new(dev_config());
        let first = service
            .initialize(InitOptions::new().pattern("help", PatternConfig::new("help")))
            .unwrap();
        assert!(!first.already_initialized);
        assert_eq!(first.unresolved_handlers, vec!["help"]);

        let second = service
            .initialize(InitOptions::new().pattern("other", PatternConfig::new("other")))
            .unwrap();
        assert!(second.already_initialized);
        assert_eq!(second.patterns, 1);
    }

    #[tokio::test]
    async fn empty_command_is_invalid_input() {
        let service = CommandService::new(dev_config());
        service.initialize(InitOptions::new()).unwrap();

        let result = service.process_command("   ", ProcessOptions::default()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::InvalidInput));
        assert!(service.command_history(10).is_empty());
    }

    #[tokio::test]
    async fn config_patterns_and_blocked_terms_are_wired() {
        let file: crate::config::ConfigFile = toml::from_str(
            r#"
            [security]
            blocked_terms = ["self destruct"]

            [[patterns]]
            pattern = "initiate *"
            handler = "initiate"
            "#,
        )
        .unwrap();
        let service = CommandService::new(Config::from_file(file));
        service
            .initialize(InitOptions::new().handler(
                "initiate",
                handler_fn(|_, _| async { Ok(HandlerReply::ok("started")) }),
            ))
            .unwrap();

        let ok = service
            .process_command("initiate backup", ProcessOptions::default())
            .await
            .unwrap();
        assert!(ok.success);

        let blocked = service
            .process_command("initiate self destruct", ProcessOptions::default())
            .await
            .unwrap();
        assert_eq!(blocked.failure, Some(FailureKind::SecurityBlocked));
        assert_eq!(blocked.error.as_deref(), Some("policy"));
    }

    #[tokio::test]
    async fn context_override_and_reset() {
        let service = CommandService::new(dev_config());
        service.set_command_context("  Editor ");
        assert_eq!(service.command_context(), "editor");

        service.set_command_context("");
        assert_eq!(service.command_context(), "global");
    }

    #[tokio::test]
    async fn shutdown_resets_metrics_and_requires_reinit() {
        let service = CommandService::new(dev_config());
        service.initialize(InitOptions::new()).unwrap();
        service
            .process_command("anything", ProcessOptions::default())
            .await
            .unwrap();

        let result = service.shutdown(ShutdownOptions { clear_history: true });
        assert!(result.was_initialized);
        assert_eq!(result.metrics.total_commands, 1);
        assert_eq!(service.metrics().total_commands, 0);
        assert!(service.command_history(10).is_empty());
        assert!(!service.is_initialized());

        assert!(matches!(
            service.process_command("anything", ProcessOptions::default()).await,
            Err(Error::NotInitialized)
        ));
    }
}
