//! Concrete [`GraphStore`] implementation backed by SurrealDB.
//!
//! Follows the teacher's CRUD idiom (`db.create`/`db.select`/`db.update(...).merge`)
//! where the model is keyed by a generated RecordId, and falls back to a raw
//! SurrealQL `UPSERT ... WHERE` statement — the one precedent for non-id-keyed
//! conditional writes in the teacher repository (`init.rs`'s `world_meta`
//! upsert) — wherever a type's identity is a business key instead
//! (`canonical_name`, `(book_id, number)`).

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Deserialize;

use crate::graph::connection::WorldGraphDb;
use crate::graph::{ChunkSearchResult, GraphStore};
use crate::models::book::{Book, BookCreate, BookStatus};
use crate::models::chapter::{Chapter, ChapterStatus, MentionSummary};
use crate::models::chunk::Chunk;
use crate::models::entity::{Character, EntityRecord, Event};
use crate::models::mention::Mention;
use crate::models::registry::EntityRegistry;
use crate::models::relationship::{Relationship, RelationshipKind};
use crate::models::state_change::StateChange;
use crate::WorldRagError;

/// Writes within a chapter are batched in groups of 50, mirroring the
/// teacher's `create_characters_batch` chunking (`repository/entity.rs`).
const WRITE_BATCH_SIZE: usize = 50;

pub struct SurrealGraphStore {
    db: WorldGraphDb,
}

impl SurrealGraphStore {
    pub fn new(db: WorldGraphDb) -> Self {
        Self { db }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryRow {
    entries: serde_json::Value,
}

#[async_trait]
impl GraphStore for SurrealGraphStore {
    async fn init_schema(&self) -> Result<(), WorldRagError> {
        crate::graph::schema::apply_schema(&self.db).await
    }

    async fn create_book(&self, book: BookCreate) -> Result<Book, WorldRagError> {
        // Books are keyed by a caller-visible string id rather than a bare
        // generated RecordId, so every other model can reference `book_id` as
        // a plain string. Constructed here instead of round-tripped through
        // the query response, since `id` deserializes as a SurrealDB Thing,
        // not a plain string.
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now();
        self.db
            .query(
                "CREATE type::thing('book', $id) SET title = $title, series_name = $series_name, \
                 order_in_series = $order_in_series, author = $author, genre = $genre, \
                 total_chapters = $total_chapters, status = 'pending', created_at = $created_at",
            )
            .bind(("id", id.clone()))
            .bind(("title", book.title.clone()))
            .bind(("series_name", book.series_name.clone()))
            .bind(("order_in_series", book.order_in_series))
            .bind(("author", book.author.clone()))
            .bind(("genre", book.genre.clone()))
            .bind(("total_chapters", book.total_chapters))
            .bind(("created_at", created_at))
            .await?;
        Ok(Book {
            id,
            title: book.title,
            series_name: book.series_name,
            order_in_series: book.order_in_series,
            author: book.author,
            genre: book.genre,
            total_chapters: book.total_chapters,
            status: BookStatus::Pending,
            created_at,
        })
    }

    async fn get_book(&self, book_id: &str) -> Result<Book, WorldRagError> {
        #[derive(Deserialize)]
        struct Row {
            title: String,
            series_name: Option<String>,
            order_in_series: Option<i64>,
            author: Option<String>,
            genre: String,
            total_chapters: i64,
            status: BookStatus,
            created_at: chrono::DateTime<Utc>,
        }
        let mut response = self
            .db
            .query("SELECT * FROM type::thing('book', $id)")
            .bind(("id", book_id.to_string()))
            .await?;
        let rows: Vec<Row> = response.take(0)?;
        rows.into_iter()
            .next()
            .map(|r| Book {
                id: book_id.to_string(),
                title: r.title,
                series_name: r.series_name,
                order_in_series: r.order_in_series,
                author: r.author,
                genre: r.genre,
                total_chapters: r.total_chapters,
                status: r.status,
                created_at: r.created_at,
            })
            .ok_or_else(|| WorldRagError::NotFound {
                entity_type: "book".to_string(),
                id: book_id.to_string(),
            })
    }

    async fn set_book_status(&self, book_id: &str, status: BookStatus) -> Result<(), WorldRagError> {
        self.db
            .query("UPDATE type::thing('book', $id) SET status = $status")
            .bind(("id", book_id.to_string()))
            .bind(("status", status))
            .await?;
        Ok(())
    }

    async fn create_chapter(&self, chapter: Chapter) -> Result<(), WorldRagError> {
        self.db
            .query(
                "CREATE chapter SET book_id = $book_id, number = $number, title = $title, \
                 text = $text, word_count = $word_count, status = $status, \
                 regex_matches = $regex_matches, mention_summary = $mention_summary, \
                 batch_id = $batch_id",
            )
            .bind(("book_id", chapter.book_id))
            .bind(("number", chapter.number))
            .bind(("title", chapter.title))
            .bind(("text", chapter.text))
            .bind(("word_count", chapter.word_count))
            .bind(("status", chapter.status))
            .bind(("regex_matches", chapter.regex_matches))
            .bind(("mention_summary", chapter.mention_summary))
            .bind(("batch_id", chapter.batch_id))
            .await?;
        Ok(())
    }

    async fn get_chapter(&self, book_id: &str, number: i64) -> Result<Chapter, WorldRagError> {
        let mut response = self
            .db
            .query("SELECT * FROM chapter WHERE book_id = $book_id AND number = $number")
            .bind(("book_id", book_id.to_string()))
            .bind(("number", number))
            .await?;
        let rows: Vec<Chapter> = response.take(0)?;
        rows.into_iter().next().ok_or_else(|| WorldRagError::NotFound {
            entity_type: "chapter".to_string(),
            id: format!("{book_id}#{number}"),
        })
    }

    async fn set_chapter_status(
        &self,
        book_id: &str,
        number: i64,
        status: ChapterStatus,
    ) -> Result<(), WorldRagError> {
        self.db
            .query("UPDATE chapter SET status = $status WHERE book_id = $book_id AND number = $number")
            .bind(("book_id", book_id.to_string()))
            .bind(("number", number))
            .bind(("status", status))
            .await?;
        Ok(())
    }

    async fn set_chapter_mention_summary(
        &self,
        book_id: &str,
        number: i64,
        summary: MentionSummary,
    ) -> Result<(), WorldRagError> {
        self.db
            .query(
                "UPDATE chapter SET mention_summary = $summary \
                 WHERE book_id = $book_id AND number = $number",
            )
            .bind(("book_id", book_id.to_string()))
            .bind(("number", number))
            .bind(("summary", summary))
            .await?;
        Ok(())
    }

    async fn create_chunks(&self, chunks: Vec<Chunk>) -> Result<(), WorldRagError> {
        stream::iter(chunks)
            .chunks(WRITE_BATCH_SIZE)
            .for_each(|batch| async {
                for chunk in batch {
                    if let Err(e) = self
                        .db
                        .query(
                            "CREATE chunk SET chapter_id = $chapter_id, book_id = $book_id, \
                             position = $position, text = $text, token_count = $token_count, \
                             char_offset_start = $char_offset_start, char_offset_end = $char_offset_end, \
                             embedding = $embedding",
                        )
                        .bind(("chapter_id", chunk.chapter_id.clone()))
                        .bind(("book_id", chunk.book_id.clone()))
                        .bind(("position", chunk.position))
                        .bind(("text", chunk.text))
                        .bind(("token_count", chunk.token_count))
                        .bind(("char_offset_start", chunk.char_offset_start as i64))
                        .bind(("char_offset_end", chunk.char_offset_end as i64))
                        .bind(("embedding", chunk.embedding))
                        .await
                    {
                        tracing::warn!("Failed to create chunk: {e}");
                    }
                }
            })
            .await;
        Ok(())
    }

    async fn chunks_without_embeddings(&self, book_id: &str) -> Result<Vec<Chunk>, WorldRagError> {
        let mut response = self
            .db
            .query("SELECT * FROM chunk WHERE book_id = $book_id AND embedding IS NONE")
            .bind(("book_id", book_id.to_string()))
            .await?;
        Ok(response.take(0)?)
    }

    async fn set_chunk_embedding(
        &self,
        chapter_id: &str,
        position: i64,
        embedding: Vec<f32>,
    ) -> Result<(), WorldRagError> {
        self.db
            .query(
                "UPDATE chunk SET embedding = $embedding \
                 WHERE chapter_id = $chapter_id AND position = $position",
            )
            .bind(("chapter_id", chapter_id.to_string()))
            .bind(("position", position))
            .bind(("embedding", embedding))
            .await?;
        Ok(())
    }

    async fn upsert_character(&self, character: Character) -> Result<String, WorldRagError> {
        let mut response = self
            .db
            .query(
                "UPSERT character SET book_id = $book_id, name = $name, \
                 canonical_name = $canonical_name, \
                 aliases = array::union(aliases OR [], $aliases), \
                 description = (IF description = '' THEN $description ELSE description END), \
                 role = $role, species = $species, status = $status, \
                 last_seen_chapter = math::max([last_seen_chapter OR 0, $last_seen_chapter OR 0]), \
                 level = $level, batch_id = $batch_id, \
                 created_at = (created_at OR time::now()) \
                 WHERE book_id = $book_id AND canonical_name = $canonical_name \
                 RETURN AFTER",
            )
            .bind(("book_id", character.book_id))
            .bind(("name", character.name))
            .bind(("canonical_name", character.canonical_name.clone()))
            .bind(("aliases", character.aliases))
            .bind(("description", character.description))
            .bind(("role", character.role))
            .bind(("species", character.species))
            .bind(("status", character.status))
            .bind(("last_seen_chapter", character.last_seen_chapter))
            .bind(("level", character.level))
            .bind(("batch_id", character.batch_id))
            .await?;
        let rows: Vec<serde_json::Value> = response.take(0)?;
        if rows.is_empty() {
            return Err(WorldRagError::Graph(format!(
                "Failed to upsert character '{}'",
                character.canonical_name
            )));
        }
        Ok(character.canonical_name)
    }

    async fn get_character(&self, book_id: &str, canonical_name: &str) -> Result<Character, WorldRagError> {
        let mut response = self
            .db
            .query(
                "SELECT * FROM character \
                 WHERE book_id = $book_id AND canonical_name = $canonical_name LIMIT 1",
            )
            .bind(("book_id", book_id.to_string()))
            .bind(("canonical_name", canonical_name.to_string()))
            .await?;
        let rows: Vec<Character> = response.take(0)?;
        rows.into_iter().next().ok_or_else(|| WorldRagError::NotFound {
            entity_type: "character".to_string(),
            id: canonical_name.to_string(),
        })
    }

    async fn upsert_entity(&self, entity: EntityRecord) -> Result<String, WorldRagError> {
        let table = entity.kind.table_name();
        let stmt = format!(
            "UPSERT {table} SET book_id = $book_id, name = $name, \
             canonical_name = $canonical_name, \
             description = (IF description = '' THEN $description ELSE description END), \
             attributes = object::extend(attributes OR {{}}, $attributes), \
             batch_id = $batch_id, created_at = (created_at OR time::now()) \
             WHERE book_id = $book_id AND canonical_name = $canonical_name \
             RETURN AFTER"
        );
        let mut response = self
            .db
            .query(stmt)
            .bind(("book_id", entity.book_id))
            .bind(("name", entity.name))
            .bind(("canonical_name", entity.canonical_name.clone()))
            .bind(("description", entity.description))
            .bind(("attributes", entity.attributes))
            .bind(("batch_id", entity.batch_id))
            .await?;
        let rows: Vec<serde_json::Value> = response.take(0)?;
        if rows.is_empty() {
            return Err(WorldRagError::Graph(format!(
                "Failed to upsert {table} '{}'",
                entity.canonical_name
            )));
        }
        Ok(entity.canonical_name)
    }

    async fn create_event(&self, event: Event) -> Result<String, WorldRagError> {
        let mut response = self
            .db
            .query(
                "CREATE event SET book_id = $book_id, name = $name, description = $description, \
                 event_type = $event_type, significance = $significance, \
                 participants = $participants, location = $location, chapter = $chapter, \
                 is_flashback = $is_flashback, causes = $causes, batch_id = $batch_id, \
                 created_at = time::now()",
            )
            .bind(("book_id", event.book_id))
            .bind(("name", event.name.clone()))
            .bind(("description", event.description))
            .bind(("event_type", event.event_type))
            .bind(("significance", event.significance))
            .bind(("participants", event.participants))
            .bind(("location", event.location))
            .bind(("chapter", event.chapter))
            .bind(("is_flashback", event.is_flashback))
            .bind(("causes", event.causes))
            .bind(("batch_id", event.batch_id))
            .await?;
        let rows: Vec<serde_json::Value> = response.take(0)?;
        if rows.is_empty() {
            return Err(WorldRagError::Graph(format!("Failed to create event '{}'", event.name)));
        }
        Ok(event.name)
    }

    async fn create_relationships(&self, relationships: Vec<Relationship>) -> Result<(), WorldRagError> {
        stream::iter(relationships)
            .chunks(WRITE_BATCH_SIZE)
            .for_each(|batch| async {
                for rel in batch {
                    if let Err(e) = self
                        .db
                        .query(
                            "CREATE relationship SET book_id = $book_id, kind = $kind, \
                             source_name = $source_name, target_name = $target_name, \
                             rel_subtype = $rel_subtype, context = $context, \
                             valid_from_chapter = $valid_from_chapter, \
                             valid_to_chapter = $valid_to_chapter, value = $value, \
                             batch_id = $batch_id",
                        )
                        .bind(("book_id", rel.book_id.clone()))
                        .bind(("source_name", rel.source.clone()))
                        .bind(("target_name", rel.target.clone()))
                        .bind(("kind", rel.kind))
                        .bind(("rel_subtype", rel.rel_subtype))
                        .bind(("context", rel.context))
                        .bind(("valid_from_chapter", rel.valid_from_chapter))
                        .bind(("valid_to_chapter", rel.valid_to_chapter))
                        .bind(("value", rel.value))
                        .bind(("batch_id", rel.batch_id))
                        .await
                    {
                        tracing::warn!("Failed to create relationship: {e}");
                    }
                }
            })
            .await;
        Ok(())
    }

    async fn relationships_for_owner(
        &self,
        book_id: &str,
        owner_name: &str,
        kind: RelationshipKind,
    ) -> Result<Vec<Relationship>, WorldRagError> {
        #[derive(Deserialize)]
        struct Row {
            book_id: String,
            kind: RelationshipKind,
            source_name: String,
            target_name: String,
            rel_subtype: String,
            context: String,
            valid_from_chapter: Option<i64>,
            valid_to_chapter: Option<i64>,
            value: Option<f64>,
            batch_id: String,
        }

        let mut response = self
            .db
            .query(
                "SELECT * FROM relationship \
                 WHERE book_id = $book_id AND source_name = $owner_name AND kind = $kind \
                 ORDER BY valid_from_chapter ASC",
            )
            .bind(("book_id", book_id.to_string()))
            .bind(("owner_name", owner_name.to_string()))
            .bind(("kind", kind))
            .await?;
        let rows: Vec<Row> = response.take(0)?;
        Ok(rows
            .into_iter()
            .map(|r| Relationship {
                book_id: r.book_id,
                kind: r.kind,
                source: r.source_name,
                target: r.target_name,
                rel_subtype: r.rel_subtype,
                context: r.context,
                valid_from_chapter: r.valid_from_chapter,
                valid_to_chapter: r.valid_to_chapter,
                value: r.value,
                batch_id: r.batch_id,
            })
            .collect())
    }

    async fn append_state_changes(&self, changes: Vec<StateChange>) -> Result<(), WorldRagError> {
        stream::iter(changes)
            .chunks(WRITE_BATCH_SIZE)
            .for_each(|batch| async {
                for change in batch {
                    if let Err(e) = self
                        .db
                        .query(
                            "CREATE state_change SET book_id = $book_id, \
                             character_name = $character_name, chapter = $chapter, \
                             category = $category, name = $name, action = $action, \
                             value_delta = $value_delta, value_after = $value_after, \
                             detail = $detail, batch_id = $batch_id",
                        )
                        .bind(("book_id", change.book_id))
                        .bind(("character_name", change.character_name))
                        .bind(("chapter", change.chapter))
                        .bind(("category", change.category))
                        .bind(("name", change.name))
                        .bind(("action", change.action))
                        .bind(("value_delta", change.value_delta))
                        .bind(("value_after", change.value_after))
                        .bind(("detail", change.detail))
                        .bind(("batch_id", change.batch_id))
                        .await
                    {
                        tracing::warn!("Failed to append state_change: {e}");
                    }
                }
            })
            .await;
        Ok(())
    }

    async fn state_changes_for_character(
        &self,
        book_id: &str,
        character_name: &str,
        up_to_chapter: i64,
    ) -> Result<Vec<StateChange>, WorldRagError> {
        let mut response = self
            .db
            .query(
                "SELECT * FROM state_change \
                 WHERE book_id = $book_id AND character_name = $character_name \
                 AND chapter <= $up_to_chapter ORDER BY chapter ASC",
            )
            .bind(("book_id", book_id.to_string()))
            .bind(("character_name", character_name.to_string()))
            .bind(("up_to_chapter", up_to_chapter))
            .await?;
        Ok(response.take(0)?)
    }

    async fn create_mentions(&self, mentions: Vec<Mention>) -> Result<(), WorldRagError> {
        stream::iter(mentions)
            .chunks(WRITE_BATCH_SIZE)
            .for_each(|batch| async {
                for mention in batch {
                    if let Err(e) = self
                        .db
                        .query(
                            "CREATE mentioned_in SET entity_name = $entity_name, \
                             entity_kind = $entity_kind, book_id = $book_id, chapter = $chapter, \
                             char_start = $char_start, char_end = $char_end, \
                             mention_text = $mention_text, mention_type = $mention_type, \
                             confidence = $confidence, alignment_status = $alignment_status, \
                             pass_name = $pass_name",
                        )
                        .bind(("entity_name", mention.entity_name))
                        .bind(("entity_kind", mention.entity_kind))
                        .bind(("book_id", mention.book_id))
                        .bind(("chapter", mention.chapter))
                        .bind(("char_start", mention.char_start as i64))
                        .bind(("char_end", mention.char_end as i64))
                        .bind(("mention_text", mention.mention_text))
                        .bind(("mention_type", mention.mention_type))
                        .bind(("confidence", mention.confidence))
                        .bind(("alignment_status", mention.alignment_status))
                        .bind(("pass_name", mention.pass_name))
                        .await
                    {
                        tracing::warn!("Failed to create mention: {e}");
                    }
                }
            })
            .await;
        Ok(())
    }

    async fn load_registry(&self, book_id: &str) -> Result<EntityRegistry, WorldRagError> {
        let mut response = self
            .db
            .query("SELECT entries FROM entity_registry WHERE book_id = $book_id")
            .bind(("book_id", book_id.to_string()))
            .await?;
        let rows: Vec<RegistryRow> = response.take(0)?;
        match rows.into_iter().next() {
            Some(row) => Ok(EntityRegistry::from_dict(row.entries)?),
            None => Ok(EntityRegistry::new()),
        }
    }

    async fn save_registry(&self, book_id: &str, registry: &EntityRegistry) -> Result<(), WorldRagError> {
        self.db
            .query(
                "UPSERT entity_registry SET book_id = $book_id, entries = $entries, \
                 updated_at = time::now() WHERE book_id = $book_id",
            )
            .bind(("book_id", book_id.to_string()))
            .bind(("entries", registry.to_dict()))
            .await?;
        Ok(())
    }

    async fn keyword_search_chunks(
        &self,
        book_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, WorldRagError> {
        let mut response = self
            .db
            .query(
                "SELECT *, search::score(1) AS score FROM chunk \
                 WHERE book_id = $book_id AND text @1@ $query \
                 ORDER BY score DESC LIMIT $limit",
            )
            .bind(("book_id", book_id.to_string()))
            .bind(("query", query.to_string()))
            .bind(("limit", limit as i64))
            .await?;
        #[derive(Deserialize)]
        struct Row {
            #[serde(flatten)]
            chunk: Chunk,
            score: f32,
        }
        let rows: Vec<Row> = response.take(0)?;
        Ok(rows
            .into_iter()
            .map(|r| ChunkSearchResult {
                chunk: r.chunk,
                score: r.score,
            })
            .collect())
    }

    async fn vector_search_chunks(
        &self,
        book_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, WorldRagError> {
        let mut response = self
            .db
            .query(
                "SELECT *, vector::similarity::cosine(embedding, $embedding) AS score FROM chunk \
                 WHERE book_id = $book_id AND embedding IS NOT NONE \
                 ORDER BY score DESC LIMIT $limit",
            )
            .bind(("book_id", book_id.to_string()))
            .bind(("embedding", embedding.to_vec()))
            .bind(("limit", limit as i64))
            .await?;
        #[derive(Deserialize)]
        struct Row {
            #[serde(flatten)]
            chunk: Chunk,
            score: f32,
        }
        let rows: Vec<Row> = response.take(0)?;
        Ok(rows
            .into_iter()
            .map(|r| ChunkSearchResult {
                chunk: r.chunk,
                score: r.score,
            })
            .collect())
    }

    async fn entities_mentioned_in_chapters(
        &self,
        book_id: &str,
        chapters: &[i64],
        limit: usize,
    ) -> Result<Vec<EntityRecord>, WorldRagError> {
        #[derive(Deserialize)]
        struct MentionedRow {
            entity_name: String,
            entity_kind: crate::models::entity::EntityKind,
        }
        let mut response = self
            .db
            .query(
                "SELECT entity_name, entity_kind FROM mentioned_in \
                 WHERE book_id = $book_id AND chapter IN $chapters",
            )
            .bind(("book_id", book_id.to_string()))
            .bind(("chapters", chapters.to_vec()))
            .await?;
        let mentioned: Vec<MentionedRow> = response.take(0)?;

        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        let now = Utc::now();
        for row in mentioned {
            if out.len() >= limit {
                break;
            }
            let key = (row.entity_kind, row.entity_name.clone());
            if !seen.insert(key) {
                continue;
            }
            let table = row.entity_kind.table_name();
            let stmt = format!(
                "SELECT name, canonical_name, description, attributes FROM {table} \
                 WHERE book_id = $book_id AND (canonical_name = $name OR name = $name)"
            );
            let mut entity_response = self
                .db
                .query(stmt)
                .bind(("book_id", book_id.to_string()))
                .bind(("name", row.entity_name.clone()))
                .await?;
            #[derive(Deserialize)]
            struct EntityRow {
                name: String,
                canonical_name: String,
                description: String,
                #[serde(default)]
                attributes: std::collections::BTreeMap<String, String>,
            }
            let entity_rows: Vec<EntityRow> = entity_response.take(0)?;
            if let Some(entity) = entity_rows.into_iter().next() {
                out.push(EntityRecord {
                    kind: row.entity_kind,
                    book_id: book_id.to_string(),
                    name: entity.name,
                    canonical_name: entity.canonical_name,
                    description: entity.description,
                    attributes: entity.attributes,
                    batch_id: String::new(),
                    created_at: now,
                });
            }
        }
        Ok(out)
    }
}
