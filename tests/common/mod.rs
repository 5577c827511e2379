//! Shared test double for integration tests: a [`GraphStore`] that records
//! every write in-process instead of talking to SurrealDB, playing the same
//! role the teacher's `TestHarness` plays for its embedded RocksDB instance.
//! The graph-database product itself is out of scope for this crate (spec
//! §1), so these integration tests exercise the module seams the crate does
//! own — extraction, reconciliation, the ledger, resilience — against a
//! faithful recording of the `GraphStore` contract rather than a live store.

use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use worldrag::error::WorldRagError;
use worldrag::graph::{ChunkSearchResult, GraphStore};
use worldrag::models::book::{Book, BookCreate, BookStatus};
use worldrag::models::chapter::{Chapter, ChapterStatus, MentionSummary};
use worldrag::models::chunk::Chunk;
use worldrag::models::entity::{Character, EntityRecord, Event};
use worldrag::models::mention::Mention;
use worldrag::models::registry::EntityRegistry;
use worldrag::models::relationship::{Relationship, RelationshipKind};
use worldrag::models::state_change::StateChange;

#[derive(Default)]
pub struct RecordingGraph {
    pub characters: StdMutex<Vec<Character>>,
    pub entities: StdMutex<Vec<EntityRecord>>,
    pub events: StdMutex<Vec<Event>>,
    pub relationships: StdMutex<Vec<Relationship>>,
    pub state_changes: StdMutex<Vec<StateChange>>,
    pub mentions: StdMutex<Vec<Mention>>,
    pub book_statuses: StdMutex<Vec<BookStatus>>,
    pub chapter_statuses: StdMutex<Vec<(i64, ChapterStatus)>>,
    pub mention_summaries: StdMutex<Vec<(i64, MentionSummary)>>,
    pub saved_registry: StdMutex<Option<EntityRegistry>>,
}

#[async_trait]
impl GraphStore for RecordingGraph {
    async fn init_schema(&self) -> Result<(), WorldRagError> {
        Ok(())
    }

    async fn create_book(&self, _book: BookCreate) -> Result<Book, WorldRagError> {
        unimplemented!("not exercised by these integration tests")
    }

    async fn get_book(&self, _book_id: &str) -> Result<Book, WorldRagError> {
        unimplemented!("not exercised by these integration tests")
    }

    async fn set_book_status(&self, _book_id: &str, status: BookStatus) -> Result<(), WorldRagError> {
        self.book_statuses.lock().unwrap().push(status);
        Ok(())
    }

    async fn create_chapter(&self, _chapter: Chapter) -> Result<(), WorldRagError> {
        Ok(())
    }

    async fn get_chapter(&self, _book_id: &str, number: i64) -> Result<Chapter, WorldRagError> {
        Ok(Chapter {
            book_id: "b1".into(),
            number,
            title: Some(format!("Chapter {number}")),
            text: String::new(),
            word_count: 0,
            status: ChapterStatus::Extracted,
            regex_matches: vec![],
            mention_summary: None,
            batch_id: None,
        })
    }

    async fn set_chapter_status(&self, _book_id: &str, number: i64, status: ChapterStatus) -> Result<(), WorldRagError> {
        self.chapter_statuses.lock().unwrap().push((number, status));
        Ok(())
    }

    async fn set_chapter_mention_summary(&self, _book_id: &str, number: i64, summary: MentionSummary) -> Result<(), WorldRagError> {
        self.mention_summaries.lock().unwrap().push((number, summary));
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

    async fn upsert_character(&self, character: Character) -> Result<String, WorldRagError> {
        let id = character.canonical_name.clone();
        self.characters.lock().unwrap().push(character);
        Ok(id)
    }

    async fn upsert_entity(&self, entity: EntityRecord) -> Result<String, WorldRagError> {
        let id = entity.canonical_name.clone();
        self.entities.lock().unwrap().push(entity);
        Ok(id)
    }

    async fn create_event(&self, event: Event) -> Result<String, WorldRagError> {
        let id = event.name.clone();
        self.events.lock().unwrap().push(event);
        Ok(id)
    }

    async fn create_relationships(&self, relationships: Vec<Relationship>) -> Result<(), WorldRagError> {
        self.relationships.lock().unwrap().extend(relationships);
        Ok(())
    }

    async fn relationships_for_owner(&self, book_id: &str, owner_name: &str, kind: RelationshipKind) -> Result<Vec<Relationship>, WorldRagError> {
        Ok(self
            .relationships
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.book_id == book_id && r.source == owner_name && r.kind == kind)
            .cloned()
            .collect())
    }

    async fn get_character(&self, book_id: &str, canonical_name: &str) -> Result<Character, WorldRagError> {
        self.characters
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.book_id == book_id && c.canonical_name == canonical_name)
            .cloned()
            .ok_or_else(|| WorldRagError::NotFound {
                entity_type: "character".into(),
                id: canonical_name.into(),
            })
    }

    async fn append_state_changes(&self, changes: Vec<StateChange>) -> Result<(), WorldRagError> {
        self.state_changes.lock().unwrap().extend(changes);
        Ok(())
    }

    async fn state_changes_for_character(&self, book_id: &str, character_name: &str, up_to_chapter: i64) -> Result<Vec<StateChange>, WorldRagError> {
        Ok(self
            .state_changes
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.book_id == book_id && c.character_name == character_name && c.chapter <= up_to_chapter)
            .cloned()
            .collect())
    }

    async fn create_mentions(&self, mentions: Vec<Mention>) -> Result<(), WorldRagError> {
        self.mentions.lock().unwrap().extend(mentions);
        Ok(())
    }

    async fn load_registry(&self, _book_id: &str) -> Result<EntityRegistry, WorldRagError> {
        Ok(EntityRegistry::default())
    }

    async fn save_registry(&self, _book_id: &str, registry: &EntityRegistry) -> Result<(), WorldRagError> {
        *self.saved_registry.lock().unwrap() = Some(registry.clone());
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
