//! Rate-limited invoker: pacing, retry with exponential backoff, circuit breaker.
//!
//! Every upstream call of a run goes through one [`Invoker`]. Its gate state
//! (last reserved start and circuit) sits behind a single async mutex shared
//! by all branch tasks, so the pacing limit holds across every logical path.
//! Callers reserve a start slot under the lock and sleep outside it, so call
//! latencies overlap while start times stay spaced.
//!
//! - [`circuit`]: `CircuitState`, the consecutive-failure breaker
//! - [`stats`]: `InvokerStats`, per-run counters

pub mod circuit;
pub mod stats;

use std::future::Future;
use std::time::Duration;

use census_upstream::{StatusClass, UpstreamError, UpstreamResult};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cancel::CancelSignal;
use crate::config::InvokerConfig;
use crate::error::{InvokeError, InvokeResult};

pub use circuit::CircuitState;
pub use stats::{InvokerStats, StatsSnapshot};

#[derive(Debug, Default)]
struct GateState {
    last_start: Option<Instant>,
    circuit: CircuitState,
}

/// Shared gate for every upstream call of one run.
#[derive(Debug)]
pub struct Invoker {
    config: InvokerConfig,
    gate: Mutex<GateState>,
    stats: InvokerStats,
    cancel: CancelSignal,
}

impl Invoker {
    pub fn new(config: InvokerConfig) -> Self {
        Self {
            config,
            gate: Mutex::new(GateState::default()),
            stats: InvokerStats::new(),
            cancel: CancelSignal::never(),
        }
    }

    /// Stop issuing calls once `cancel` is raised.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    pub fn stats(&self) -> &InvokerStats {
        &self.stats
    }

    /// Run `op` under the pacing gate, retrying throttled and 5xx failures.
    ///
    /// `op` is called once per attempt. Throttled and server failures are
    /// retried up to `max_retries` times with `backoff_base * factor ^ n`
    /// sleeps; client failures return at once. An open circuit fails without
    /// calling `op`.
    pub async fn invoke<T, F, Fut>(&self, operation: &str, mut op: F) -> InvokeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = UpstreamResult<T>>,
    {
        let mut retry = 0u32;
        loop {
            self.admit(operation).await?;
            self.stats.inc_attempts();

            let err = match op().await {
                Ok(value) => {
                    self.gate.lock().await.circuit.record_success();
                    return Ok(value);
                }
                Err(err) => err,
            };
            self.record_failure(operation, &err).await;

            if !err.status.is_retryable() {
                return Err(InvokeError::Upstream {
                    operation: operation.to_string(),
                    source: err,
                });
            }
            if retry >= self.config.max_retries {
                return Err(exhausted(operation, retry + 1, err));
            }

            let delay = self.config.backoff_delay(retry);
            warn!(
                operation = %operation,
                status = %err.status,
                attempt = retry + 1,
                delay_ms = delay.as_millis() as u64,
                "upstream call failed, backing off"
            );
            self.stats.inc_retries();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => return Err(cancelled(operation)),
            }
            retry += 1;
        }
    }

    /// Reserve this call's start slot under the lock, then wait for it outside.
    ///
    /// The circuit is consulted twice: before reserving, so an open circuit
    /// fails fast, and again once the slot is reached, since another task may
    /// have opened it (or taken the half-open trial call) while this one slept.
    async fn admit(&self, operation: &str) -> InvokeResult<()> {
        if self.cancel.is_cancelled() {
            return Err(cancelled(operation));
        }

        let slot = {
            let mut gate = self.gate.lock().await;
            let now = Instant::now();
            if let Some(remaining) = gate.circuit.blocked(now) {
                return Err(self.reject(operation, &gate.circuit, remaining));
            }
            let slot = match gate.last_start {
                Some(last) => (last + self.config.min_request_interval()).max(now),
                None => now,
            };
            gate.last_start = Some(slot);
            slot
        };

        if slot > Instant::now() {
            debug!(operation = %operation, "pacing upstream call");
            tokio::select! {
                _ = tokio::time::sleep_until(slot) => {}
                _ = self.cancel.cancelled() => return Err(cancelled(operation)),
            }
        }
        if self.cancel.is_cancelled() {
            return Err(cancelled(operation));
        }

        let mut gate = self.gate.lock().await;
        if let Some(remaining) = gate.circuit.check(Instant::now()) {
            return Err(self.reject(operation, &gate.circuit, remaining));
        }
        if gate.circuit.trial_in_flight() {
            debug!(operation = %operation, "circuit half-open, sending trial call");
        }
        Ok(())
    }

    fn reject(&self, operation: &str, circuit: &CircuitState, remaining: Duration) -> InvokeError {
        self.stats.inc_circuit_rejections();
        InvokeError::CircuitOpen {
            operation: operation.to_string(),
            consecutive_failures: circuit.consecutive_failures(),
            retry_in_ms: remaining.as_millis() as u64,
        }
    }

    async fn record_failure(&self, operation: &str, err: &UpstreamError) {
        match err.status {
            StatusClass::RateLimited => self.stats.inc_throttled(),
            StatusClass::ServerError => self.stats.inc_server_errors(),
            StatusClass::ClientError => self.stats.inc_client_errors(),
        }

        let mut gate = self.gate.lock().await;
        let opened = gate.circuit.record_failure(
            Instant::now(),
            self.config.circuit_failure_threshold,
            self.config.circuit_cooldown(),
        );
        if opened {
            self.stats.inc_circuit_trips();
            warn!(
                operation = %operation,
                consecutive_failures = gate.circuit.consecutive_failures(),
                cooldown_ms = self.config.circuit_cooldown_ms,
                "circuit opened"
            );
        }
    }
}

fn exhausted(operation: &str, attempts: u32, last: UpstreamError) -> InvokeError {
    match last.status {
        StatusClass::RateLimited => InvokeError::ThrottleExhausted {
            operation: operation.to_string(),
            attempts,
            last,
        },
        _ => InvokeError::ServerErrorExhausted {
            operation: operation.to_string(),
            attempts,
            last,
        },
    }
}

fn cancelled(operation: &str) -> InvokeError {
    InvokeError::Cancelled {
        operation: operation.to_string(),
    }
}
