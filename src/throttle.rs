//! Sliding-window command rate limiter
//!
//! Keeps the admission timestamps of the last minute. Critical commands may be
//! exempted from the limit; they are admitted but do not occupy a slot.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// Length of the sliding window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Upper bound on the window buffer allocated up front
const PREALLOC_LIMIT: usize = 64;

/// Throttle governor shared between the pipeline and the resource adapter
pub type SharedThrottle = Arc<Mutex<ThrottleGovernor>>;

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Admitted and recorded in the window
    Admitted,
    /// Window full, admitted through the critical exemption
    Exempt,
    /// Window full, rejected
    Rejected {
        /// Whole seconds until the oldest entry leaves the window
        retry_after_secs: u64,
    },
}

impl Admission {
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Per-minute command limiter
#[derive(Debug, Clone)]
pub struct ThrottleGovernor {
    /// Admission times, oldest first
    timestamps: VecDeque<Instant>,
    max_per_minute: u32,
    critical_exempt: bool,
}

impl ThrottleGovernor {
    #[must_use]
    pub fn new(max_per_minute: u32, critical_exempt: bool) -> Self {
        Self {
            timestamps: VecDeque::with_capacity((max_per_minute as usize).min(PREALLOC_LIMIT)),
            max_per_minute,
            critical_exempt,
        }
    }

    /// Wrap in a shareable handle
    #[must_use]
    pub fn shared(self) -> SharedThrottle {
        Arc::new(Mutex::new(self))
    }

    /// Check whether a command may run at `now`, recording it if admitted
    pub fn try_admit(&mut self, now: Instant, is_critical: bool) -> Admission {
        self.prune(now);

        if self.timestamps.len() >= self.max_per_minute as usize {
            if self.critical_exempt && is_critical {
                return Admission::Exempt;
            }

            let retry_after_secs = self.timestamps.front().map_or(WINDOW.as_secs(), |oldest| {
                let remaining = WINDOW.saturating_sub(now.saturating_duration_since(*oldest));
                u64::try_from(remaining.as_millis().div_ceil(1000)).unwrap_or(u64::MAX)
            });

            return Admission::Rejected { retry_after_secs };
        }

        self.timestamps.push_back(now);
        Admission::Admitted
    }

    /// Change the per-minute limit; the current window is kept as is
    pub fn set_limit(&mut self, max_per_minute: u32) {
        self.max_per_minute = max_per_minute;
    }

    pub fn set_critical_exempt(&mut self, exempt: bool) {
        self.critical_exempt = exempt;
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.max_per_minute
    }

    #[must_use]
    pub const fn critical_exempt(&self) -> bool {
        self.critical_exempt
    }

    /// Number of admissions still inside the window at `now`
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.timestamps.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= WINDOW {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}
