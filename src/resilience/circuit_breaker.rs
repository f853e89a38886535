//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: downstream assumed down, requests fail fast
//! - Half-Open: one trial request tests whether the downstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: first allow() after reset_timeout (that caller holds the trial permit)
//! Half-Open → Closed: trial permit reports success
//! Half-Open → Open: trial permit reports failure or is dropped unreported
//! ```
//!
//! # Design Decisions
//! - Per-route circuit breaker (not global), each with its own lock
//! - Fail fast in Open state (no waiting for timeout)
//! - `allow()` hands out a `CallPermit`; outcomes are reported through it,
//!   once, by value
//! - Each trial carries a generation number. Only the current trial's permit
//!   moves a Half-Open breaker; calls admitted while Closed that finish
//!   during Half-Open are ignored
//! - A trial permit dropped without a report (cancelled call) counts as a
//!   failed trial, so a breaker never stays Half-Open without a trial
//! - Outcomes reported while Open come from calls admitted earlier and are ignored
//! - The protected call itself never runs under the lock

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::observability::metrics;

/// Circuit breaker phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerPhase {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerPhase::Closed => "closed",
            BreakerPhase::Open => "open",
            BreakerPhase::HalfOpen => "half_open",
        }
    }
}

/// Thresholds for one breaker.
#[derive(Debug, Clone, Copy)]
pub struct BreakerSettings {
    /// Consecutive failures that open the breaker (at least 1).
    pub failure_threshold: u32,
    /// Time spent Open before a trial call is admitted.
    pub reset_timeout: Duration,
}

#[derive(Debug)]
struct BreakerState {
    phase: BreakerPhase,
    consecutive_failures: u32,
    /// Valid only while Open.
    opened_at: Option<Instant>,
    /// Generation of the trial in flight. Valid only while Half-Open.
    trial: Option<u64>,
    next_trial: u64,
}

/// Point-in-time view of a breaker, for the admin endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub route: String,
    pub state: BreakerPhase,
    pub consecutive_failures: u32,
}

/// Admission granted by [`CircuitBreaker::allow`].
///
/// Report the call's outcome with `record_success` or `record_failure`.
/// Dropping a trial permit unreported counts as a failed trial; dropping an
/// ordinary permit reports nothing.
#[must_use = "the call outcome must be reported through the permit"]
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: Option<u64>,
    reported: bool,
}

impl CallPermit<'_> {
    /// Whether this permit is the single Half-Open trial.
    pub fn is_trial(&self) -> bool {
        self.trial.is_some()
    }

    pub fn record_success(mut self) {
        self.reported = true;
        self.breaker.on_success(self.trial);
    }

    pub fn record_failure(mut self) {
        self.reported = true;
        self.breaker.on_failure(self.trial);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.reported && self.trial.is_some() {
            tracing::warn!(route = %self.breaker.name, "Half-open trial dropped before reporting");
            self.breaker.on_failure(self.trial);
        }
    }
}

/// Failure-tracking state machine guarding one route.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        let name = name.into();
        metrics::record_breaker_state(&name, BreakerPhase::Closed);
        Self {
            name,
            settings: BreakerSettings {
                failure_threshold: settings.failure_threshold.max(1),
                reset_timeout: settings.reset_timeout,
            },
            state: Mutex::new(BreakerState {
                phase: BreakerPhase::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial: None,
                next_trial: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> BreakerSettings {
        self.settings
    }

    /// Decide whether a call may proceed. `None` means fail fast.
    pub fn allow(&self) -> Option<CallPermit<'_>> {
        let mut state = self.lock();
        let now = Instant::now();

        let trial = match state.phase {
            BreakerPhase::Closed => None,
            BreakerPhase::Open => {
                let opened_at = state.opened_at.unwrap_or(now);
                if now.duration_since(opened_at) < self.settings.reset_timeout {
                    return None;
                }
                let generation = state.next_trial;
                state.next_trial = state.next_trial.wrapping_add(1);
                state.phase = BreakerPhase::HalfOpen;
                state.opened_at = None;
                state.trial = Some(generation);
                self.transitioned(BreakerPhase::Open, BreakerPhase::HalfOpen, &state);
                Some(generation)
            }
            BreakerPhase::HalfOpen => return None,
        };

        Some(CallPermit {
            breaker: self,
            trial,
            reported: false,
        })
    }

    fn on_success(&self, trial: Option<u64>) {
        let mut state = self.lock();
        match state.phase {
            BreakerPhase::Closed => {
                state.consecutive_failures = 0;
            }
            BreakerPhase::HalfOpen if trial.is_some() && trial == state.trial => {
                state.phase = BreakerPhase::Closed;
                state.consecutive_failures = 0;
                state.trial = None;
                self.transitioned(BreakerPhase::HalfOpen, BreakerPhase::Closed, &state);
            }
            BreakerPhase::HalfOpen => {
                tracing::debug!(route = %self.name, "Ignoring success from a call outside the trial");
            }
            BreakerPhase::Open => {
                tracing::debug!(route = %self.name, "Ignoring success reported while open");
            }
        }
    }

    fn on_failure(&self, trial: Option<u64>) {
        let mut state = self.lock();
        let now = Instant::now();
        match state.phase {
            BreakerPhase::Closed => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                if state.consecutive_failures >= self.settings.failure_threshold {
                    state.phase = BreakerPhase::Open;
                    state.opened_at = Some(now);
                    self.transitioned(BreakerPhase::Closed, BreakerPhase::Open, &state);
                }
            }
            BreakerPhase::HalfOpen if trial.is_some() && trial == state.trial => {
                state.phase = BreakerPhase::Open;
                state.opened_at = Some(now);
                state.trial = None;
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                self.transitioned(BreakerPhase::HalfOpen, BreakerPhase::Open, &state);
            }
            BreakerPhase::HalfOpen => {
                tracing::debug!(route = %self.name, "Ignoring failure from a call outside the trial");
            }
            BreakerPhase::Open => {
                tracing::debug!(route = %self.name, "Ignoring failure reported while open");
            }
        }
    }

    /// Current phase. An Open breaker whose reset timeout elapsed still
    /// reports Open until a caller asks to be allowed through.
    pub fn state(&self) -> BreakerPhase {
        self.lock().phase
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.lock();
        BreakerSnapshot {
            route: self.name.clone(),
            state: state.phase,
            consecutive_failures: state.consecutive_failures,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // State is updated field by field without panicking paths, so a
        // poisoned lock still holds a consistent state.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transitioned(&self, from: BreakerPhase, to: BreakerPhase, state: &BreakerState) {
        match to {
            BreakerPhase::Open => tracing::warn!(
                route = %self.name,
                from = from.as_str(),
                consecutive_failures = state.consecutive_failures,
                reset_timeout_ms = self.settings.reset_timeout.as_millis() as u64,
                "Circuit opened"
            ),
            _ => tracing::info!(
                route = %self.name,
                from = from.as_str(),
                to = to.as_str(),
                "Circuit state changed"
            ),
        }
        metrics::record_breaker_state(&self.name, to);
    }
}
