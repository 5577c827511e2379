//! Job queue contract (spec §6): payload shapes for the two job kinds and the
//! `JobDispatcher` trait the pipeline calls into. The transport itself is out
//! of scope — this module only owns the typed contract and deterministic job
//! ids, the same "trait is the seam, no concrete transport ships" split the
//! crate uses for [`crate::extraction::passes::LlmClient`] and
//! [`crate::graph::GraphStore`].

use async_trait::async_trait;

use crate::WorldRagError;

/// `process_book_extraction(book_id, genre, series, ...)`. `chapter` is set
/// only for a DLQ retry re-issuing a single failed chapter; a fresh book
/// ingest leaves it `None` and the pipeline walks every chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionJob {
    pub book_id: String,
    pub genre: String,
    pub series_name: Option<String>,
    pub chapter: Option<i64>,
}

impl ExtractionJob {
    pub fn new(book_id: impl Into<String>, genre: impl Into<String>, series_name: Option<String>) -> Self {
        Self {
            book_id: book_id.into(),
            genre: genre.into(),
            series_name,
            chapter: None,
        }
    }

    pub fn retry(book_id: impl Into<String>, genre: impl Into<String>, series_name: Option<String>, chapter: i64) -> Self {
        Self {
            book_id: book_id.into(),
            genre: genre.into(),
            series_name,
            chapter: Some(chapter),
        }
    }

    /// Deterministic id per spec §6: `retry:{book}:{chapter}` for a
    /// single-chapter retry, `extract:{book}` for a fresh book-level job.
    /// Dispatching the same retry twice collapses to one queued job.
    pub fn job_id(&self) -> String {
        match self.chapter {
            Some(chapter) => format!("retry:{}:{}", self.book_id, chapter),
            None => format!("extract:{}", self.book_id),
        }
    }
}

/// `process_book_embeddings(book_id)`, enqueued by the extraction job on
/// success (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingJob {
    pub book_id: String,
}

impl EmbeddingJob {
    pub fn new(book_id: impl Into<String>) -> Self {
        Self { book_id: book_id.into() }
    }

    pub fn job_id(&self) -> String {
        format!("embed:{}", self.book_id)
    }
}

/// The pipeline's half of the job-queue contract. A concrete transport
/// (Redis, SQS, whatever the deployment uses) is explicitly out of scope per
/// spec §1; only this trait and an in-memory test double ship here.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn enqueue_extraction(&self, job: ExtractionJob) -> Result<(), WorldRagError>;

    async fn enqueue_embeddings(&self, job: EmbeddingJob) -> Result<(), WorldRagError>;
}

/// In-memory dispatcher for tests and the reference flow — records every job
/// it was handed instead of shipping it anywhere, the same role
/// [`crate::extraction::passes::FakeLlmClient`] plays for `LlmClient`.
#[cfg(any(test, feature = "test-util"))]
pub struct InMemoryJobDispatcher {
    pub extractions: tokio::sync::Mutex<Vec<ExtractionJob>>,
    pub embeddings: tokio::sync::Mutex<Vec<EmbeddingJob>>,
}

#[cfg(any(test, feature = "test-util"))]
impl Default for InMemoryJobDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl InMemoryJobDispatcher {
    pub fn new() -> Self {
        Self {
            extractions: tokio::sync::Mutex::new(Vec::new()),
            embeddings: tokio::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl JobDispatcher for InMemoryJobDispatcher {
    async fn enqueue_extraction(&self, job: ExtractionJob) -> Result<(), WorldRagError> {
        self.extractions.lock().await.push(job);
        Ok(())
    }

    async fn enqueue_embeddings(&self, job: EmbeddingJob) -> Result<(), WorldRagError> {
        self.embeddings.lock().await.push(job);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_job_id_distinguishes_fresh_from_retry() {
        let fresh = ExtractionJob::new("book1", "litrpg", None);
        assert_eq!(fresh.job_id(), "extract:book1");

        let retry = ExtractionJob::retry("book1", "litrpg", None, 7);
        assert_eq!(retry.job_id(), "retry:book1:7");
    }

    #[test]
    fn embedding_job_id_matches_spec_format() {
        let job = EmbeddingJob::new("book1");
        assert_eq!(job.job_id(), "embed:book1");
    }

    #[test]
    fn same_retry_twice_produces_the_same_id() {
        let a = ExtractionJob::retry("book1", "litrpg", None, 3);
        let b = ExtractionJob::retry("book1", "litrpg", None, 3);
        assert_eq!(a.job_id(), b.job_id());
    }

    #[tokio::test]
    async fn in_memory_dispatcher_records_jobs() {
        let dispatcher = InMemoryJobDispatcher::new();
        dispatcher.enqueue_extraction(ExtractionJob::new("book1", "litrpg", None)).await.unwrap();
        dispatcher.enqueue_embeddings(EmbeddingJob::new("book1")).await.unwrap();

        assert_eq!(dispatcher.extractions.lock().await.len(), 1);
        assert_eq!(dispatcher.embeddings.lock().await.len(), 1);
    }
}
