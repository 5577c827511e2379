//! Book-level orchestration (spec §2, §5, §7): the explicit context object
//! threading the injected collaborators through the chapter loop, sequential
//! per-book extraction, DLQ pushes on terminal chapter failure, book status
//! transitions, and the DLQ admin retry operations.
//!
//! Grounded in narra's `init.rs` `AppContext` for the "one struct threading
//! the db handle and services through every surface" shape, generalized here
//! to also carry the resilience singletons (§5: "process-wide singletons,
//! mutex-guarded, passed as explicit context objects — never module-level
//! `static`").

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::extraction::orchestrator::{extract_chapter, ChapterExtractionOutcome};
use crate::extraction::passes::LlmClient;
use crate::graph::GraphStore;
use crate::jobs::{EmbeddingJob, ExtractionJob, JobDispatcher};
use crate::models::book::BookStatus;
use crate::models::chapter::ChapterStatus;
use crate::models::{Chapter, EntityRegistry};
use crate::ontology::Ontology;
use crate::resilience::{CircuitBreakerRegistry, CostTracker, DeadLetterQueue};
use crate::WorldRagError;

/// Everything the chapter loop and the retrieval core need, bundled once per
/// process rather than threaded argument-by-argument. `entity_registry` is
/// the one piece of state that is per-book, not process-wide — the caller
/// loads it fresh from the graph for each book job and saves it back as it
/// grows (spec §5: "exclusive access within the book job").
pub struct PipelineContext {
    pub graph: Arc<dyn GraphStore>,
    pub llm: Arc<dyn LlmClient>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub cost_tracker: Arc<CostTracker>,
    pub dlq: Arc<DeadLetterQueue>,
    pub config: PipelineConfig,
    pub ontology: Ontology,
}

impl PipelineContext {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        llm: Arc<dyn LlmClient>,
        breakers: Arc<CircuitBreakerRegistry>,
        cost_tracker: Arc<CostTracker>,
        dlq: Arc<DeadLetterQueue>,
        config: PipelineConfig,
        ontology: Ontology,
    ) -> Self {
        Self { graph, llm, breakers, cost_tracker, dlq, config, ontology }
    }

    fn breaker(&self) -> Result<&crate::resilience::CircuitBreaker, WorldRagError> {
        self.breakers
            .get(&self.config.llm_provider)
            .ok_or_else(|| WorldRagError::Config(format!("unknown llm provider '{}'", self.config.llm_provider)))
    }
}

/// Outcome of one chapter attempt inside the book loop — either it wrote
/// successfully or it was sent to the DLQ. Distinct from
/// [`ChapterExtractionOutcome`], which only covers the happy path.
#[derive(Debug)]
pub enum ChapterResult {
    Extracted(ChapterExtractionOutcome),
    DeadLettered { chapter: i64, error_type: &'static str },
}

/// Processes every chapter of a book sequentially (spec §5: "to preserve
/// narrative ordering of StateChange records and to feed each chapter's
/// EntityRegistry into the next"), pushing terminal failures to the DLQ and
/// continuing rather than aborting the book. Returns the final book status
/// and dispatches the embedding job through `dispatcher` on success.
///
/// `registry` starts as whatever the caller loaded for this book (typically
/// via [`GraphStore::load_registry`]) and is mutated in place across
/// chapters; the caller owns persisting it beyond what `extract_chapter`
/// already saves per chapter.
pub async fn process_book(
    ctx: &PipelineContext,
    book_id: &str,
    genre: &str,
    chapters: &[Chapter],
    registry: &mut EntityRegistry,
    series_registry: Option<&EntityRegistry>,
    dispatcher: &dyn JobDispatcher,
) -> Result<BookStatus, WorldRagError> {
    let breaker = ctx.breaker()?;
    ctx.graph.set_book_status(book_id, BookStatus::Extracting).await?;

    let mut any_failed = false;

    for chapter in chapters {
        let outcome = extract_chapter(
            ctx.graph.as_ref(),
            ctx.llm.as_ref(),
            breaker,
            ctx.cost_tracker.as_ref(),
            &ctx.config,
            &ctx.ontology,
            chapter,
            genre,
            registry,
            series_registry,
        )
        .await;

        match outcome {
            Ok(result) => {
                ctx.graph.set_chapter_status(book_id, chapter.number, ChapterStatus::Extracted).await?;
                tracing::info!(book_id, chapter = chapter.number, "chapter_extracted");
                let _ = result;
            }
            Err(error) => {
                any_failed = true;
                let error_type = dlq_error_type(&error);
                tracing::error!(book_id, chapter = chapter.number, %error, error_type, "chapter_extraction_failed");
                ctx.dlq
                    .push(book_id, chapter.number, error_type, error.to_string(), 1)
                    .await;
                ctx.graph.set_chapter_status(book_id, chapter.number, ChapterStatus::Failed).await?;
            }
        }
    }

    let final_status = if any_failed { BookStatus::Partial } else { BookStatus::Extracted };
    ctx.graph.set_book_status(book_id, final_status).await?;

    if !any_failed {
        dispatcher.enqueue_embeddings(EmbeddingJob::new(book_id)).await?;
    }

    Ok(final_status)
}

/// Maps a terminal chapter error to the DLQ's `error_type` tag (spec §7's
/// taxonomy buckets, minus the ones that never reach this point: pre-condition
/// and validation errors surface synchronously before a chapter job starts).
fn dlq_error_type(error: &WorldRagError) -> &'static str {
    match error {
        WorldRagError::CostCeilingExceeded { .. } => "cost_ceiling_exceeded",
        WorldRagError::CircuitOpen { .. } => "circuit_open",
        WorldRagError::Transient(_) => "transient_upstream",
        WorldRagError::Graph(_) => "graph_write_failed",
        WorldRagError::Llm(_) => "llm_error",
        WorldRagError::Validation(_) => "validation_error",
        _ => "unknown",
    }
}

/// Admin "retry single entry" operation (spec §3, §6): removes the DLQ entry
/// and re-dispatches it as a single-chapter extraction job. Returns `false`
/// if no matching entry was queued.
pub async fn dlq_retry_single(
    dlq: &DeadLetterQueue,
    dispatcher: &dyn JobDispatcher,
    book_id: &str,
    chapter: i64,
    genre: &str,
    series_name: Option<String>,
) -> Result<bool, WorldRagError> {
    match dlq.take(book_id, chapter).await {
        Some(_entry) => {
            dispatcher
                .enqueue_extraction(ExtractionJob::retry(book_id, genre, series_name, chapter))
                .await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Admin "retry all" operation: one job per distinct book with queued
/// failures, not one job per failed chapter — the re-issued extraction job
/// walks every chapter of the book and naturally redoes the failed ones.
pub async fn dlq_retry_all(
    dlq: &DeadLetterQueue,
    dispatcher: &dyn JobDispatcher,
    genre_for_book: impl Fn(&str) -> (String, Option<String>),
) -> Result<usize, WorldRagError> {
    let entries = dlq.drain().await;
    let mut books: Vec<String> = Vec::new();
    for entry in &entries {
        if !books.contains(&entry.book_id) {
            books.push(entry.book_id.clone());
        }
    }

    for book_id in &books {
        let (genre, series_name) = genre_for_book(book_id);
        dispatcher
            .enqueue_extraction(ExtractionJob::new(book_id.clone(), genre, series_name))
            .await?;
    }

    Ok(books.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::passes::FakeLlmClient;
    use crate::graph::ChunkSearchResult;
    use crate::jobs::InMemoryJobDispatcher;
    use crate::models::book::{Book, BookCreate};
    use crate::models::chapter::MentionSummary;
    use crate::models::chunk::Chunk;
    use crate::models::entity::{Character, EntityRecord, Event};
    use crate::models::mention::Mention;
    use crate::models::relationship::{Relationship, RelationshipKind};
    use crate::models::state_change::StateChange;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Mutex;

    /// Minimal in-memory [`GraphStore`] for book-loop tests — entities and
    /// writes are discarded, only statuses are observable, enough to assert
    /// the orchestration decisions this module makes.
    #[derive(Default)]
    struct RecordingGraph {
        book_statuses: Mutex<Vec<BookStatus>>,
        chapter_statuses: StdMutex<Vec<(i64, ChapterStatus)>>,
    }

    #[async_trait]
    impl GraphStore for RecordingGraph {
        async fn init_schema(&self) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn create_book(&self, _book: BookCreate) -> Result<Book, WorldRagError> {
            unimplemented!()
        }
        async fn get_book(&self, _book_id: &str) -> Result<Book, WorldRagError> {
            unimplemented!()
        }
        async fn set_book_status(&self, _book_id: &str, status: BookStatus) -> Result<(), WorldRagError> {
            self.book_statuses.lock().await.push(status);
            Ok(())
        }
        async fn create_chapter(&self, _chapter: Chapter) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn get_chapter(&self, _book_id: &str, _number: i64) -> Result<Chapter, WorldRagError> {
            unimplemented!()
        }
        async fn set_chapter_status(&self, _book_id: &str, number: i64, status: ChapterStatus) -> Result<(), WorldRagError> {
            self.chapter_statuses.lock().unwrap().push((number, status));
            Ok(())
        }
        async fn set_chapter_mention_summary(&self, _book_id: &str, _number: i64, _summary: MentionSummary) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn create_chunks(&self, _chunks: Vec<Chunk>) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn chunks_without_embeddings(&self, _book_id: &str) -> Result<Vec<Chunk>, WorldRagError> {
            Ok(vec![])
        }
        async fn set_chunk_embedding(&self, _chapter_id: &str, _position: i64, _embedding: Vec<f32>) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn upsert_character(&self, _character: Character) -> Result<String, WorldRagError> {
            Ok("id".into())
        }
        async fn upsert_entity(&self, _entity: EntityRecord) -> Result<String, WorldRagError> {
            Ok("id".into())
        }
        async fn create_event(&self, _event: Event) -> Result<String, WorldRagError> {
            Ok("id".into())
        }
        async fn create_relationships(&self, _relationships: Vec<Relationship>) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn relationships_for_owner(&self, _book_id: &str, _owner_name: &str, _kind: RelationshipKind) -> Result<Vec<Relationship>, WorldRagError> {
            Ok(vec![])
        }
        async fn get_character(&self, _book_id: &str, _canonical_name: &str) -> Result<Character, WorldRagError> {
            unimplemented!()
        }
        async fn append_state_changes(&self, _changes: Vec<StateChange>) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn state_changes_for_character(&self, _book_id: &str, _character_name: &str, _up_to_chapter: i64) -> Result<Vec<StateChange>, WorldRagError> {
            Ok(vec![])
        }
        async fn create_mentions(&self, _mentions: Vec<Mention>) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn load_registry(&self, _book_id: &str) -> Result<EntityRegistry, WorldRagError> {
            Ok(EntityRegistry::default())
        }
        async fn save_registry(&self, _book_id: &str, _registry: &EntityRegistry) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn keyword_search_chunks(&self, _book_id: &str, _query: &str, _limit: usize) -> Result<Vec<ChunkSearchResult>, WorldRagError> {
            Ok(vec![])
        }
        async fn vector_search_chunks(&self, _book_id: &str, _embedding: &[f32], _limit: usize) -> Result<Vec<ChunkSearchResult>, WorldRagError> {
            Ok(vec![])
        }
        async fn entities_mentioned_in_chapters(&self, _book_id: &str, _chapters: &[i64], _limit: usize) -> Result<Vec<EntityRecord>, WorldRagError> {
            Ok(vec![])
        }
    }

    fn chapter(number: i64, text: &str) -> Chapter {
        Chapter {
            book_id: "book1".into(),
            number,
            title: None,
            text: text.into(),
            word_count: text.split_whitespace().count() as i64,
            status: ChapterStatus::Pending,
            regex_matches: vec![],
            mention_summary: None,
            batch_id: None,
        }
    }

    fn context(graph: Arc<dyn GraphStore>) -> PipelineContext {
        PipelineContext::new(
            graph,
            Arc::new(FakeLlmClient::new(serde_json::json!({}))),
            Arc::new(CircuitBreakerRegistry::default()),
            Arc::new(CostTracker::new(10.0, 100.0)),
            Arc::new(DeadLetterQueue::new()),
            PipelineConfig::default(),
            Ontology::default(),
        )
    }

    #[tokio::test]
    async fn process_book_marks_extracted_and_dispatches_embeddings_when_all_chapters_succeed() {
        let graph: Arc<dyn GraphStore> = Arc::new(RecordingGraph::default());
        let ctx = context(graph.clone());
        let mut registry = EntityRegistry::new();
        let dispatcher = InMemoryJobDispatcher::new();

        let chapters = vec![chapter(1, "Jake walked."), chapter(2, "Jake ran.")];
        let status = process_book(&ctx, "book1", "litrpg", &chapters, &mut registry, None, &dispatcher)
            .await
            .unwrap();

        assert_eq!(status, BookStatus::Extracted);
        assert_eq!(dispatcher.embeddings.lock().await.len(), 1);
        assert!(ctx.dlq.is_empty().await);
    }

    #[tokio::test]
    async fn dlq_retry_single_requeues_and_removes_the_entry() {
        let dlq = DeadLetterQueue::new();
        dlq.push("book1", 3, "llm_error", "boom".into(), 2).await;
        let dispatcher = InMemoryJobDispatcher::new();

        let requeued = dlq_retry_single(&dlq, &dispatcher, "book1", 3, "litrpg", None).await.unwrap();
        assert!(requeued);
        assert!(dlq.is_empty().await);
        let jobs = dispatcher.extractions.lock().await;
        assert_eq!(jobs[0].job_id(), "retry:book1:3");
    }

    #[tokio::test]
    async fn dlq_retry_single_returns_false_when_nothing_queued() {
        let dlq = DeadLetterQueue::new();
        let dispatcher = InMemoryJobDispatcher::new();
        let requeued = dlq_retry_single(&dlq, &dispatcher, "book1", 3, "litrpg", None).await.unwrap();
        assert!(!requeued);
    }

    #[tokio::test]
    async fn dlq_retry_all_issues_one_job_per_distinct_book() {
        let dlq = DeadLetterQueue::new();
        dlq.push("book1", 1, "llm_error", "boom".into(), 1).await;
        dlq.push("book1", 2, "llm_error", "boom".into(), 1).await;
        dlq.push("book2", 1, "llm_error", "boom".into(), 1).await;
        let dispatcher = InMemoryJobDispatcher::new();

        let dispatched = dlq_retry_all(&dlq, &dispatcher, |_book_id| ("litrpg".to_string(), None)).await.unwrap();
        assert_eq!(dispatched, 2);
        assert_eq!(dispatcher.extractions.lock().await.len(), 2);
        assert!(dlq.is_empty().await);
    }
}
