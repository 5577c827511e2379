//! Exponential backoff with jitter, for the two retry profiles the pipeline
//! needs: LLM calls (generous budget, long max wait) and graph writes (tight
//! budget, short max wait since a write retry blocks a chapter).

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::WorldRagError;

#[derive(Debug, Clone, Copy)]
pub struct RetryProfile {
    pub max_attempts: u32,
    pub initial: Duration,
    pub max: Duration,
    pub jitter: Duration,
}

impl RetryProfile {
    /// 3 attempts, 1s initial, 30s cap, up to 5s of jitter. Mirrors the LLM
    /// call profile in the resilience layer this is grounded on.
    pub fn llm_call() -> Self {
        Self {
            max_attempts: 3,
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            jitter: Duration::from_secs(5),
        }
    }

    /// 4 attempts, 200ms initial, 10s cap, up to 2s of jitter. Mirrors the
    /// graph-write profile in the resilience layer this is grounded on.
    pub fn graph_write() -> Self {
        Self {
            max_attempts: 4,
            initial: Duration::from_millis(200),
            max: Duration::from_secs(10),
            jitter: Duration::from_secs(2),
        }
    }

    fn wait_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.initial.as_millis().saturating_mul(1u128 << attempt.min(20));
        let capped = exp.min(self.max.as_millis());
        let jitter_ms = if self.jitter.is_zero() {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter.as_millis())
        };
        Duration::from_millis((capped + jitter_ms) as u64)
    }
}

/// Retries `f` up to `profile.max_attempts` times, calling `is_retryable` on
/// each failure to decide whether to back off and try again or propagate
/// immediately. Logs each retry with the attempt number and wait before
/// sleeping, the same shape as the Python source's `before_sleep` hook.
pub async fn retry_with_backoff<F, Fut, T>(
    profile: &RetryProfile,
    is_retryable: impl Fn(&WorldRagError) -> bool,
    mut f: F,
) -> Result<T, WorldRagError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WorldRagError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < profile.max_attempts && is_retryable(&e) => {
                let wait = profile.wait_for_attempt(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = profile.max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "retrying_after_backoff"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Retryable predicate for LLM calls: transient upstream failures and
/// open circuits (the circuit may have half-opened by the time we retry).
pub fn llm_call_is_retryable(err: &WorldRagError) -> bool {
    matches!(err, WorldRagError::Transient(_) | WorldRagError::CircuitOpen { .. })
}

/// Retryable predicate for graph writes: only transient storage errors.
pub fn graph_write_is_retryable(err: &WorldRagError) -> bool {
    matches!(err, WorldRagError::Transient(_) | WorldRagError::Graph(_))
}
