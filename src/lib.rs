//! Voice Dispatch - command interpretation and dispatch for voice assistants
//!
//! This library turns recognized speech into routed, security-checked,
//! rate-limited actions:
//! - Wildcard command patterns with parameter extraction
//! - Sliding-window throttling that adapts to host resource pressure
//! - Security gate over an external validator
//! - Handler dispatch with retry on transient failures
//! - Metrics, bounded history and lifecycle events
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        Speech recognizer / embedding app            │
//! └────────────────────┬────────────────────────────────┘
//!                      │ utterance
//! ┌────────────────────▼────────────────────────────────┐
//! │                 CommandService                       │
//! │ History │ Throttle │ Security │ Matcher │ Dispatch  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ events
//! ┌────────────────────▼────────────────────────────────┐
//! │       Announcer  │  Audit log  │  UI  │  ...        │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod history;
pub mod metrics;
pub mod resource;
pub mod security;
pub mod service;
pub mod throttle;

pub use commands::{Category, CommandPattern, Importance, MatchResult, PatternConfig};
pub use config::Config;
pub use dispatch::{CommandHandler, HandlerError, HandlerReply, RetryPolicy, handler_fn};
pub use error::{Error, Result};
pub use events::{CommandEvent, EventBus, EventKind};
pub use history::CommandRecord;
pub use metrics::Metrics;
pub use resource::{ResourceMode, ResourceModeChanged, publish_mode, resource_channel};
pub use security::{CommandValidator, DenyListValidator, SecurityGate, Verdict};
pub use service::{
    CommandResult, CommandService, FailureKind, InitOptions, InitResult, PendingConfirmation,
    ProcessOptions, ShutdownOptions, ShutdownResult,
};
pub use throttle::ThrottleGovernor;
