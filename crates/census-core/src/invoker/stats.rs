//! Per-invoker atomic counters.
//!
//! Counters are incremented silently at the call site. Call
//! [`InvokerStats::flush`] to emit current values as a single
//! `tracing::info!` event at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lightweight atomic counters, one set per invoker (and so per run).
#[derive(Debug, Default)]
pub struct InvokerStats {
    attempts: AtomicU64,
    retries: AtomicU64,
    throttled: AtomicU64,
    server_errors: AtomicU64,
    client_errors: AtomicU64,
    circuit_rejections: AtomicU64,
    circuit_trips: AtomicU64,
}

/// Point-in-time copy of [`InvokerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub attempts: u64,
    pub retries: u64,
    pub throttled: u64,
    pub server_errors: u64,
    pub client_errors: u64,
    pub circuit_rejections: u64,
    pub circuit_trips: u64,
}

impl InvokerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_throttled(&self) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_server_errors(&self) {
        self.server_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_client_errors(&self) {
        self.client_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_circuit_rejections(&self) {
        self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_circuit_trips(&self) {
        self.circuit_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            circuit_rejections: self.circuit_rejections.load(Ordering::Relaxed),
            circuit_trips: self.circuit_trips.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "invoker.flush",
            attempts = s.attempts,
            retries = s.retries,
            throttled = s.throttled,
            server_errors = s.server_errors,
            client_errors = s.client_errors,
            circuit_rejections = s.circuit_rejections,
            circuit_trips = s.circuit_trips,
        );
    }
}
