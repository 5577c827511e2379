//! Resilience primitives exercised together the way the orchestrator actually
//! composes them (spec §3, §7): a breaker gating repeated upstream failures,
//! retry-with-backoff riding out transient errors before the breaker trips,
//! cost ceilings rejecting further spend, and the dead-letter queue recording
//! whatever finally gives up.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use worldrag::error::WorldRagError;
use worldrag::resilience::{
    graph_write_is_retryable, llm_call_is_retryable, retry_with_backoff, CircuitBreaker, CostTracker, DeadLetterQueue, RetryProfile,
};

fn fast_profile(max_attempts: u32) -> RetryProfile {
    RetryProfile {
        max_attempts,
        initial: Duration::from_millis(1),
        max: Duration::from_millis(5),
        jitter: Duration::from_millis(0),
    }
}

#[tokio::test]
async fn breaker_trips_after_retry_exhausts_its_attempts_against_a_down_provider() {
    let breaker = CircuitBreaker::new("fake-provider", 1, Duration::from_secs(60), 1);
    let profile = fast_profile(3);
    let calls = AtomicU32::new(0);

    let result: Result<(), WorldRagError> = breaker
        .call(|| {
            let calls = &calls;
            let profile = &profile;
            async move {
                retry_with_backoff(profile, llm_call_is_retryable, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(WorldRagError::Transient("upstream down".into())) }
                })
                .await
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3, "all retry attempts should run inside the single breaker call");

    // The breaker's failure_threshold of 1 means that one breaker-level call
    // failing (regardless of how many retries it absorbed internally) is
    // enough to trip it open for the next caller.
    let rejected = breaker.call(|| async { Ok::<(), WorldRagError>(()) }).await;
    assert!(matches!(rejected, Err(WorldRagError::CircuitOpen { .. })));
}

#[tokio::test]
async fn cost_ceiling_breach_is_not_retryable_and_stops_further_calls() {
    let tracker = CostTracker::new(0.001, 50.0);
    let breaker = CircuitBreaker::new("fake-provider", 5, Duration::from_secs(60), 3);
    tracker.record("gpt-4o", "openai", 10_000, 10_000, "extraction", Some("book1"), Some(1)).await;

    let profile = fast_profile(3);
    let calls = AtomicU32::new(0);
    let result: Result<(), WorldRagError> = breaker
        .call(|| {
            let calls = &calls;
            let tracker = &tracker;
            let profile = &profile;
            async move {
                retry_with_backoff(profile, llm_call_is_retryable, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let tracker = &tracker;
                    async move {
                        tracker.enforce_ceilings("book1", Some(1)).await?;
                        Ok(())
                    }
                })
                .await
            }
        })
        .await;

    assert!(matches!(result, Err(WorldRagError::CostCeilingExceeded { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "a cost-ceiling breach is not in the retryable predicate, so it must not be retried");
    // A single non-retryable failure does not trip a breaker with threshold 5.
    assert!(breaker.call(|| async { Ok::<(), WorldRagError>(()) }).await.is_ok());
}

#[tokio::test]
async fn terminally_failed_chapter_lands_in_the_dlq_and_can_be_taken_for_retry() {
    let dlq = DeadLetterQueue::new();
    let profile = fast_profile(2);
    let result: Result<(), WorldRagError> =
        retry_with_backoff(&profile, graph_write_is_retryable, || async { Err(WorldRagError::Graph("connection reset".into())) }).await;
    assert!(result.is_err());

    dlq.push("book1", 7, "graph_write_failed", result.unwrap_err().to_string(), 2).await;
    assert_eq!(dlq.len().await, 1);

    let listed = dlq.list().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].book_id, "book1");
    assert_eq!(listed[0].chapter, 7);
    assert_eq!(dlq.len().await, 1, "list() must not drain the queue");

    let taken = dlq.take("book1", 7).await;
    assert!(taken.is_some());
    assert!(dlq.is_empty().await);
    assert!(dlq.take("book1", 7).await.is_none(), "taking twice should not resurrect the entry");
}

#[tokio::test]
async fn graph_write_profile_does_not_retry_llm_only_errors() {
    let profile = RetryProfile::graph_write();
    let calls = AtomicU32::new(0);
    let result: Result<(), WorldRagError> = retry_with_backoff(&profile, graph_write_is_retryable, || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(WorldRagError::Llm("provider refused the request".into())) }
    })
    .await;
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1, "graph_write_is_retryable must reject Llm errors, so no retry should happen");
}
