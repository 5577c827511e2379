//! Circuit breaker for upstream LLM/embedding providers.
//!
//! State machine: CLOSED -> OPEN after `failure_threshold` consecutive
//! failures; OPEN -> HALF_OPEN once `recovery_timeout` has elapsed since the
//! breaker tripped (checked lazily on the next call, not via a background
//! timer); HALF_OPEN -> CLOSED after `half_open_max_calls` consecutive
//! successes; HALF_OPEN -> OPEN on a single failure.
//!
//! Guarded by `tokio::sync::Mutex`, the same primitive the teacher uses for
//! its shared caches, rather than a background task polling wall-clock time.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::WorldRagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    half_open_in_flight: u32,
    opened_at: Option<Instant>,
}

/// One named breaker guarding a single upstream collaborator (a provider, or
/// a graph write path). Cloning a `CircuitBreaker` is cheap and shares state —
/// callers are expected to hold it behind an `Arc` via [`CircuitBreakerRegistry`].
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    half_open_max_calls: u32,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration, half_open_max_calls: u32) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            recovery_timeout,
            half_open_max_calls,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                half_open_in_flight: 0,
                opened_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Lazily transitions OPEN -> HALF_OPEN once `recovery_timeout` has
    /// elapsed, and admits the call or rejects it with `CircuitOpen`.
    async fn admit(&self) -> Result<(), WorldRagError> {
        let mut inner = self.inner.lock().await;
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.recovery_timeout {
                    tracing::info!(breaker = %self.name, "circuit_breaker_half_opened");
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    inner.half_open_in_flight = 0;
                }
            }
        }

        match inner.state {
            CircuitState::Open => Err(WorldRagError::CircuitOpen { provider: self.name.clone() }),
            CircuitState::HalfOpen if inner.half_open_in_flight >= self.half_open_max_calls => {
                Err(WorldRagError::CircuitOpen { provider: self.name.clone() })
            }
            CircuitState::HalfOpen => {
                inner.half_open_in_flight += 1;
                Ok(())
            }
            CircuitState::Closed => Ok(()),
        }
    }

    async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                if inner.half_open_successes >= self.half_open_max_calls {
                    tracing::info!(breaker = %self.name, "circuit_breaker_closed");
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_successes = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    tracing::warn!(breaker = %self.name, "circuit_breaker_opened");
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(breaker = %self.name, "circuit_breaker_reopened");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
            }
            CircuitState::Open => {}
        }
    }

    /// Runs `f` through the breaker: rejects immediately if open, otherwise
    /// records the outcome. `f`'s error type must convert into
    /// [`WorldRagError`] so a rejection and a call failure share one type.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, WorldRagError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, WorldRagError>>,
    {
        self.admit().await?;
        match f().await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(e) => {
                self.record_failure().await;
                Err(e)
            }
        }
    }
}

/// Named breakers for every provider the core calls out to, with the
/// thresholds the original system tuned per provider: generation providers
/// tolerate more failures before tripping but take longer to recover;
/// embedding/rerank providers trip faster but recover sooner.
pub struct CircuitBreakerRegistry {
    pub openai: CircuitBreaker,
    pub gemini: CircuitBreaker,
    pub anthropic: CircuitBreaker,
    pub cohere: CircuitBreaker,
    pub voyage: CircuitBreaker,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self {
            openai: CircuitBreaker::new("openai", 5, Duration::from_secs(60), 3),
            gemini: CircuitBreaker::new("gemini", 5, Duration::from_secs(60), 3),
            anthropic: CircuitBreaker::new("anthropic", 5, Duration::from_secs(60), 3),
            cohere: CircuitBreaker::new("cohere", 3, Duration::from_secs(120), 3),
            voyage: CircuitBreaker::new("voyage", 3, Duration::from_secs(120), 3),
        }
    }
}

impl CircuitBreakerRegistry {
    pub fn get(&self, provider: &str) -> Option<&CircuitBreaker> {
        match provider {
            "openai" => Some(&self.openai),
            "gemini" => Some(&self.gemini),
            "anthropic" => Some(&self.anthropic),
            "cohere" => Some(&self.cohere),
            "voyage" => Some(&self.voyage),
            _ => None,
        }
    }
}
