//! Command lifecycle events
//!
//! Events are broadcast to any subscribers (announcer, audit log, UI).
//! Publishing is fire-and-forget: with no subscribers the event is dropped.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::history::CommandRecord;
use crate::metrics::Metrics;

/// Channel capacity for command events
const CHANNEL_CAPACITY: usize = 256;

/// Source identifier stamped on every event
const SOURCE: &str = "voice-dispatch";

/// Event kinds published by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    CommandExecuted,
    CommandFailed,
    UnrecognizedCommand,
    SecurityBlocked,
    MetricsSnapshot,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CommandExecuted => "commandExecuted",
            Self::CommandFailed => "commandFailed",
            Self::UnrecognizedCommand => "unrecognizedCommand",
            Self::SecurityBlocked => "securityBlocked",
            Self::MetricsSnapshot => "metricsSnapshot",
        }
    }
}

/// Severity attached to failure events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// An event published on the [`EventBus`]
#[derive(Debug, Clone, Serialize)]
pub struct CommandEvent {
    /// Unique event ID (UUID v4)
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub source: String,
    pub data: serde_json::Value,
    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl CommandEvent {
    /// Create a new event with auto-generated `id` and `timestamp`.
    #[must_use]
    pub fn new(kind: EventKind, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            source: SOURCE.to_string(),
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Build a `commandExecuted` event.
#[must_use]
pub fn command_executed(text: &str, handler: &str, params: &[String], message: Option<&str>) -> CommandEvent {
    CommandEvent::new(
        EventKind::CommandExecuted,
        serde_json::json!({
            "command": text,
            "handler": handler,
            "params": params,
            "message": message,
        }),
    )
}

/// Build a `commandFailed` event.
///
/// # Arguments
///
/// - `text` - Command as received
/// - `reason` - Failure kind (e.g. `"handler_not_found"`)
/// - `error` - Human-readable error detail
/// - `severity` - `High` routes the event to monitoring
#[must_use]
pub fn command_failed(text: &str, reason: &str, error: &str, severity: Severity) -> CommandEvent {
    CommandEvent::new(
        EventKind::CommandFailed,
        serde_json::json!({
            "command": text,
            "reason": reason,
            "error": error,
            "severity": severity,
        }),
    )
}

/// Build an `unrecognizedCommand` event.
#[must_use]
pub fn unrecognized_command(text: &str, context: &str) -> CommandEvent {
    CommandEvent::new(
        EventKind::UnrecognizedCommand,
        serde_json::json!({
            "command": text,
            "context": context,
        }),
    )
}

/// Build a `securityBlocked` event.
#[must_use]
pub fn security_blocked(text: &str, reason: Option<&str>) -> CommandEvent {
    CommandEvent::new(
        EventKind::SecurityBlocked,
        serde_json::json!({
            "command": text,
            "reason": reason,
        }),
    )
}

/// Build a `metricsSnapshot` event carrying the counters and recent history.
#[must_use]
pub fn metrics_snapshot(metrics: &Metrics, recent: &[CommandRecord]) -> CommandEvent {
    CommandEvent::new(
        EventKind::MetricsSnapshot,
        serde_json::json!({
            "metrics": metrics,
            "successRate": metrics.success_rate(),
            "recentHistory": recent,
        }),
    )
}

/// Broadcast channel for command events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CommandEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CommandEvent> {
        self.tx.subscribe()
    }

    /// Publish an event (best-effort)
    pub fn publish(&self, event: CommandEvent) {
        let kind = event.kind;
        // No subscribers is not an error
        if self.tx.send(event).is_ok() {
            tracing::trace!(event_type = kind.as_str(), "published command event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_executed_event_has_correct_type() {
        let event = command_executed("go to settings", "navigate_to", &["settings".to_string()], Some("ok"));
        assert_eq!(event.kind, EventKind::CommandExecuted);
        assert_eq!(event.source, "voice-dispatch");
        assert_eq!(event.data["handler"], "navigate_to");
        assert_eq!(event.data["params"][0], "settings");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "commandExecuted");
    }

    #[test]
    fn command_failed_event_carries_severity() {
        let event = command_failed("boom", "unexpected", "handler panicked", Severity::High);
        assert_eq!(event.kind, EventKind::CommandFailed);
        assert_eq!(event.data["severity"], "high");
        assert_eq!(event.data["reason"], "unexpected");
    }

    #[test]
    fn metrics_snapshot_includes_success_rate() {
        let metrics = Metrics {
            total_commands: 4,
            succeeded: 3,
            failed: 1,
            ..Metrics::default()
        };
        let event = metrics_snapshot(&metrics, &[]);
        assert_eq!(event.data["metrics"]["totalCommands"], 4);
        assert_eq!(event.data["successRate"], 0.75);
    }

    #[tokio::test]
    async fn publish_reaches_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(unrecognized_command("flibbertigibbet", "global"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::UnrecognizedCommand);
        assert_eq!(event.data["command"], "flibbertigibbet");
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(security_blocked("rm -rf", Some("policy")));
    }
}
