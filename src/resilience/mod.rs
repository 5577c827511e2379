//! Resilience primitives: circuit breakers, retry with backoff, cost
//! tracking, and a dead-letter queue for terminally failed chapters.
//!
//! Grounded in the original system's resilience and cost-tracking modules;
//! state here is guarded by `tokio::sync::Mutex` instead of `asyncio.Lock`.

pub mod circuit_breaker;
pub mod cost_tracker;
pub mod dlq;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry, CircuitState};
pub use cost_tracker::{count_tokens, CostEntry, CostSummary, CostTracker};
pub use dlq::{DeadLetterQueue, DlqEntry};
pub use retry::{graph_write_is_retryable, llm_call_is_retryable, retry_with_backoff, RetryProfile};
