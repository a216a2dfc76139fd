//! Consecutive-failure circuit breaker.
//!
//! Owned by the invoker and only touched under its lock; nothing else sees
//! these internals.

use std::time::Duration;

use tokio::time::Instant;

/// Breaker state: a failure streak, the instant an open circuit cools down,
/// and whether a half-open trial call is out.
#[derive(Debug, Default)]
pub struct CircuitState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
    trial_in_flight: bool,
}

impl CircuitState {
    /// Why a call arriving at `now` would be turned away, without changing state.
    ///
    /// `Some(remaining)` while the cooldown runs, `Some(ZERO)` while a trial call is
    /// in flight, `None` if the call may queue for a slot.
    pub fn blocked(&self, now: Instant) -> Option<Duration> {
        match self.open_until {
            Some(until) if now < until => Some(until - now),
            _ if self.trial_in_flight => Some(Duration::ZERO),
            _ => None,
        }
    }

    /// Admit or reject a call that is about to reach the upstream.
    ///
    /// The first call after an expired cooldown becomes the trial call; every
    /// other call is rejected until the trial call settles through
    /// [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn check(&mut self, now: Instant) -> Option<Duration> {
        if let Some(remaining) = self.blocked(now) {
            return Some(remaining);
        }
        if self.open_until.take().is_some() {
            self.trial_in_flight = true;
        }
        None
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.open_until = None;
        self.trial_in_flight = false;
    }

    /// Count a failure. Returns `true` when this failure opened the circuit.
    ///
    /// The streak is kept across a cooldown, so a failed trial call reopens at once.
    pub fn record_failure(&mut self, now: Instant, threshold: u32, cooldown: Duration) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= threshold && self.open_until.is_none() {
            self.open_until = Some(now + cooldown);
            self.trial_in_flight = false;
            return true;
        }
        false
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn is_open(&self, now: Instant) -> bool {
        self.open_until.is_some_and(|until| now < until)
    }

    pub fn trial_in_flight(&self) -> bool {
        self.trial_in_flight
    }
}
