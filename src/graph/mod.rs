//! Graph storage adapter (spec §1 "Ambient / supplemented").
//!
//! `GraphStore` is the seam `spec.md` calls "the graph-database adapter we
//! assume"; `SurrealGraphStore` is the one concrete collaborator this
//! repository ships, built the way the teacher builds its connection and
//! migration layers.

pub mod connection;
pub mod schema;
pub mod surreal;

use async_trait::async_trait;

use crate::models::book::{Book, BookCreate, BookStatus};
use crate::models::chapter::{Chapter, ChapterStatus, MentionSummary};
use crate::models::chunk::Chunk;
use crate::models::entity::{Character, EntityRecord, Event};
use crate::models::mention::Mention;
use crate::models::registry::EntityRegistry;
use crate::models::relationship::{Relationship, RelationshipKind};
use crate::models::state_change::StateChange;
use crate::WorldRagError;

pub use connection::{init_db, load_db_config, DbConfig, WorldGraphDb};
pub use surreal::SurrealGraphStore;

/// One hit from a keyword or vector search over chunks, paired with its score
/// (BM25 relevance or cosine similarity, depending on which search produced it).
#[derive(Debug, Clone)]
pub struct ChunkSearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// The graph-database adapter contract. Every operation the pipeline and the
/// retrieval core need from the backing store, independent of which product
/// implements it.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Apply the schema (idempotent — safe to call on every startup).
    async fn init_schema(&self) -> Result<(), WorldRagError>;

    async fn create_book(&self, book: BookCreate) -> Result<Book, WorldRagError>;
    async fn get_book(&self, book_id: &str) -> Result<Book, WorldRagError>;
    async fn set_book_status(&self, book_id: &str, status: BookStatus) -> Result<(), WorldRagError>;

    async fn create_chapter(&self, chapter: Chapter) -> Result<(), WorldRagError>;
    async fn get_chapter(&self, book_id: &str, number: i64) -> Result<Chapter, WorldRagError>;
    async fn set_chapter_status(
        &self,
        book_id: &str,
        number: i64,
        status: ChapterStatus,
    ) -> Result<(), WorldRagError>;
    async fn set_chapter_mention_summary(
        &self,
        book_id: &str,
        number: i64,
        summary: MentionSummary,
    ) -> Result<(), WorldRagError>;

    async fn create_chunks(&self, chunks: Vec<Chunk>) -> Result<(), WorldRagError>;
    async fn chunks_without_embeddings(&self, book_id: &str) -> Result<Vec<Chunk>, WorldRagError>;
    async fn set_chunk_embedding(
        &self,
        chapter_id: &str,
        position: i64,
        embedding: Vec<f32>,
    ) -> Result<(), WorldRagError>;

    /// Conditional upsert keyed on `(book_id, canonical_name)`, per
    /// `EntityKind::Character.merge_key_field()`.
    async fn upsert_character(&self, character: Character) -> Result<String, WorldRagError>;
    /// Conditional upsert keyed on `(book_id, canonical_name)` into the table
    /// named by `entity.kind.table_name()`.
    async fn upsert_entity(&self, entity: EntityRecord) -> Result<String, WorldRagError>;
    /// Events are append-only — no merge key (spec §3).
    async fn create_event(&self, event: Event) -> Result<String, WorldRagError>;

    async fn create_relationships(&self, relationships: Vec<Relationship>) -> Result<(), WorldRagError>;
    /// All relationships of `kind` whose `source_name` is `owner_name`, in
    /// insertion order. Used for the temporal ownership queries
    /// (`HasSkill`/`HasClass`/`HasTitle`/`Possesses`) the StateChange ledger
    /// alone can't answer, since those are edges, not ledger entries.
    async fn relationships_for_owner(
        &self,
        book_id: &str,
        owner_name: &str,
        kind: RelationshipKind,
    ) -> Result<Vec<Relationship>, WorldRagError>;

    /// Single-row lookup keyed on `(book_id, canonical_name)`.
    async fn get_character(
        &self,
        book_id: &str,
        canonical_name: &str,
    ) -> Result<Character, WorldRagError>;

    /// Appends to the immutable ledger. Never updates or deletes existing rows.
    async fn append_state_changes(&self, changes: Vec<StateChange>) -> Result<(), WorldRagError>;
    async fn state_changes_for_character(
        &self,
        book_id: &str,
        character_name: &str,
        up_to_chapter: i64,
    ) -> Result<Vec<StateChange>, WorldRagError>;

    /// Mentions are CREATE-only — one independent edge per occurrence.
    async fn create_mentions(&self, mentions: Vec<Mention>) -> Result<(), WorldRagError>;

    async fn load_registry(&self, book_id: &str) -> Result<EntityRegistry, WorldRagError>;
    async fn save_registry(&self, book_id: &str, registry: &EntityRegistry) -> Result<(), WorldRagError>;

    async fn keyword_search_chunks(
        &self,
        book_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, WorldRagError>;
    async fn vector_search_chunks(
        &self,
        book_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, WorldRagError>;
    /// Entities mentioned in any of `chapters`, for KG enrichment of a
    /// retrieval result (spec §4.12 step 4).
    async fn entities_mentioned_in_chapters(
        &self,
        book_id: &str,
        chapters: &[i64],
        limit: usize,
    ) -> Result<Vec<EntityRecord>, WorldRagError>;
}
