//! Resource-pressure adaptation of the throttle limits
//!
//! The host publishes [`ResourceModeChanged`] on a broadcast channel; the
//! adapter maps each mode to a per-minute command limit.

use std::fmt;
use std::sync::PoisonError;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::throttle::SharedThrottle;

/// Channel capacity for resource mode signals
pub const CHANNEL_CAPACITY: usize = 16;

/// Host resource pressure level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    #[default]
    Normal,
    Minimal,
    Critical,
}

impl ResourceMode {
    /// Commands per minute allowed in this mode
    #[must_use]
    pub const fn commands_per_minute(&self) -> u32 {
        match self {
            Self::Normal => 30,
            Self::Minimal => 20,
            Self::Critical => 10,
        }
    }

    /// Parse from string representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "minimal" => Some(Self::Minimal),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Minimal => write!(f, "minimal"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Resource mode signal payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceModeChanged {
    pub mode: ResourceMode,
}

/// Create a resource mode signal channel
#[must_use]
pub fn resource_channel() -> (broadcast::Sender<ResourceModeChanged>, broadcast::Receiver<ResourceModeChanged>) {
    broadcast::channel(CHANNEL_CAPACITY)
}

/// Publish a mode change on `signal`
///
/// Returns `false`, with a warning, when nothing is listening.
#[must_use]
pub fn publish_mode(signal: &broadcast::Sender<ResourceModeChanged>, mode: ResourceMode) -> bool {
    match signal.send(ResourceModeChanged { mode }) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(%mode, error = %e, "no resource adapter listening, mode unchanged");
            false
        }
    }
}

/// Applies resource mode changes to the throttle governor
#[derive(Debug, Clone)]
pub struct ResourceAdapter {
    throttle: SharedThrottle,
}

impl ResourceAdapter {
    #[must_use]
    pub const fn new(throttle: SharedThrottle) -> Self {
        Self { throttle }
    }

    /// Reconfigure the governor for `mode`
    ///
    /// Critical commands are re-exempted on every change, whatever the mode.
    pub fn apply(&self, mode: ResourceMode) {
        let limit = mode.commands_per_minute();
        {
            let mut throttle = self.throttle.lock().unwrap_or_else(PoisonError::into_inner);
            throttle.set_limit(limit);
            throttle.set_critical_exempt(true);
        }
        tracing::info!(%mode, limit, "resource mode changed, throttle reconfigured");
    }

    /// Follow `signal` until the sending side closes
    #[must_use]
    pub fn spawn(self, mut signal: broadcast::Receiver<ResourceModeChanged>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match signal.recv().await {
                    Ok(change) => self.apply(change.mode),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "resource mode signal lagged");
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("resource mode signal closed");
                        break;
                    }
                }
            }
        })
    }
}
