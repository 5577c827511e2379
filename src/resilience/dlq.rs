//! Dead-letter queue for chapters whose extraction failed terminally (all
//! retries exhausted, or a non-retryable error). Holds enough to re-issue a
//! single-chapter extraction job on manual or scheduled retry — it does not
//! retry on its own, since the job queue transport is out of scope.

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// `{book_id, chapter, error_type, error_message, timestamp, attempt_count}`
/// per spec §3/§7 — enough to re-issue a single-chapter extraction job and to
/// render an admin-facing failure list without re-deriving it from logs.
#[derive(Debug, Clone)]
pub struct DlqEntry {
    pub book_id: String,
    pub chapter: i64,
    pub error_type: String,
    pub error_message: String,
    pub attempt_count: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
pub struct DeadLetterQueue {
    entries: Mutex<Vec<DlqEntry>>,
}

impl DeadLetterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, book_id: &str, chapter: i64, error_type: &str, error_message: String, attempt_count: u32) {
        tracing::warn!(book_id, chapter, attempt_count, error_type, error_message = %error_message, "chapter_sent_to_dlq");
        self.entries.lock().await.push(DlqEntry {
            book_id: book_id.to_string(),
            chapter,
            error_type: error_type.to_string(),
            error_message,
            attempt_count,
            timestamp: Utc::now(),
        });
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Admin `list` operation — a snapshot, not a drain.
    pub async fn list(&self) -> Vec<DlqEntry> {
        self.entries.lock().await.clone()
    }

    /// Admin `clear` operation — drops every entry without re-dispatching.
    pub async fn drain(&self) -> Vec<DlqEntry> {
        std::mem::take(&mut *self.entries.lock().await)
    }

    /// Removes and returns a single entry for retry, identified by
    /// `(book_id, chapter)`. Re-issuing the job itself is the caller's
    /// responsibility (via `JobDispatcher::enqueue_extraction`), since this
    /// queue only tracks failures, not transport.
    pub async fn take(&self, book_id: &str, chapter: i64) -> Option<DlqEntry> {
        let mut entries = self.entries.lock().await;
        let position = entries.iter().position(|e| e.book_id == book_id && e.chapter == chapter)?;
        Some(entries.remove(position))
    }
}
