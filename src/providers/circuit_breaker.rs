//! Circuit breaker for the upstream rate provider.
//!
//! The circuit has three states:
//!
//! - **Closed**: Normal operation, calls go through.
//! - **Open**: Upstream is failing, calls fail fast with
//!   [`RateError::UpstreamUnavailable`] until the break duration elapses.
//! - **HalfOpen**: One probe call is let through; success closes the
//!   circuit, failure opens it again. A probe that is cancelled releases
//!   its slot, and one still in flight after the break duration is
//!   treated as failed so another probe can be admitted.
//!
//! Only transient failures (non-2xx, network errors, timeouts) count.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::core::context::RequestContext;
use crate::core::error::{RateError, Result};

const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_BREAK_DURATION: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a probe is allowed.
    pub break_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            break_duration: DEFAULT_BREAK_DURATION,
        }
    }
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_started_at: Option<Instant>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_started_at: None,
        }
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.probe_started_at = None;
    }
}

/// Holds the admission taken by [`CircuitBreaker::call`]. Dropping it before
/// the outcome is recorded gives a half-open probe slot back.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl Admission<'_> {
    fn settle(mut self, f: impl FnOnce(&CircuitBreaker)) {
        self.settled = true;
        f(self.breaker);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("Circuit breaker: call cancelled before completion");
            self.breaker.release_probe();
        }
    }
}

/// Thread-safe breaker guarding a single upstream dependency.
pub struct CircuitBreaker {
    circuit: Mutex<Circuit>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            circuit: Mutex::new(Circuit::new()),
            config,
        }
    }

    /// A poisoned lock only means a panic mid-update; the state is still usable.
    fn lock_circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Checks whether a call may proceed, moving Open to HalfOpen once the
    /// break duration has elapsed. In HalfOpen only one probe is admitted.
    pub fn try_acquire(&self) -> bool {
        let mut circuit = self.lock_circuit();
        match circuit.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => match circuit.probe_started_at {
                Some(started) if started.elapsed() < self.config.break_duration => false,
                Some(_) => {
                    warn!("Circuit breaker: half-open probe timed out, admitting another");
                    circuit.probe_started_at = Some(Instant::now());
                    true
                }
                None => {
                    circuit.probe_started_at = Some(Instant::now());
                    true
                }
            },
            CircuitState::Open => {
                let elapsed = circuit
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.break_duration);
                if elapsed {
                    info!("Circuit breaker: transitioning from Open to HalfOpen");
                    circuit.state = CircuitState::HalfOpen;
                    circuit.probe_started_at = Some(Instant::now());
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut circuit = self.lock_circuit();
        if circuit.state == CircuitState::HalfOpen {
            info!("Circuit breaker: probe succeeded, closing circuit");
        }
        circuit.state = CircuitState::Closed;
        circuit.consecutive_failures = 0;
        circuit.opened_at = None;
        circuit.probe_started_at = None;
    }

    pub fn record_failure(&self) {
        let mut circuit = self.lock_circuit();
        circuit.consecutive_failures += 1;
        match circuit.state {
            CircuitState::Closed => {
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    info!(
                        "Circuit breaker: opening circuit for {:?} after {} consecutive failures",
                        self.config.break_duration, circuit.consecutive_failures
                    );
                    circuit.open();
                } else {
                    debug!(
                        "Circuit breaker: failure {}/{}",
                        circuit.consecutive_failures, self.config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                info!("Circuit breaker: probe failed, reopening circuit");
                circuit.open();
            }
            CircuitState::Open => {
                debug!("Circuit breaker: failure recorded while already open");
            }
        }
    }

    /// Releases a half-open probe slot without changing state. Used when
    /// the probe was cancelled or ended in a failure that does not count.
    fn release_probe(&self) {
        self.lock_circuit().probe_started_at = None;
    }

    pub fn state(&self) -> CircuitState {
        self.lock_circuit().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock_circuit().consecutive_failures
    }

    /// Runs `operation` through the breaker.
    ///
    /// Fails fast with `UpstreamUnavailable` while open. Transient errors
    /// count as failures; successes close the circuit. If the returned
    /// future is dropped mid-flight, a half-open probe slot is released.
    pub async fn call<F, Fut, T>(&self, ctx: &RequestContext, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.try_acquire() {
            debug!(correlation_id = %ctx, "Circuit open, rejecting call");
            return Err(RateError::UpstreamUnavailable);
        }
        let admission = Admission {
            breaker: self,
            settled: false,
        };

        let result = operation().await;
        match &result {
            Ok(_) => admission.settle(Self::record_success),
            Err(err) if err.is_transient() => admission.settle(Self::record_failure),
            Err(_) => admission.settle(Self::release_probe),
        }
        result
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
