use crate::graph::connection::WorldGraphDb;
use crate::WorldRagError;

const SCHEMA_001_BOOKS: &str = include_str!("migrations/001_books.surql");
const SCHEMA_002_CHAPTERS_CHUNKS: &str = include_str!("migrations/002_chapters_chunks.surql");
const SCHEMA_003_ENTITIES: &str = include_str!("migrations/003_entities.surql");
const SCHEMA_004_RELATIONSHIPS: &str = include_str!("migrations/004_relationships.surql");
const SCHEMA_005_MENTIONS: &str = include_str!("migrations/005_mentions.surql");
const SCHEMA_006_STATE_CHANGE: &str = include_str!("migrations/006_state_change.surql");
const SCHEMA_007_REGISTRY: &str = include_str!("migrations/007_registry.surql");

/// Applies the WorldRAG schema to an initialized database connection.
///
/// Migrations are applied in order:
/// - 001: book table
/// - 002: chapter + chunk tables, fulltext indexes
/// - 003: the closed entity-kind tables (character + the rest + event)
/// - 004: the `relationship` edge table (all 13 kinds, data-tagged by `kind`)
/// - 005: the `mentioned_in` edge table
/// - 006: the immutable `state_change` ledger
/// - 007: the per-book serialized `entity_registry`
///
/// All statements use `IF NOT EXISTS`, so this is safe to call on every
/// startup — SurrealDB leaves existing definitions untouched.
pub async fn apply_schema(db: &WorldGraphDb) -> Result<(), WorldRagError> {
    db.query(SCHEMA_001_BOOKS).await?;
    db.query(SCHEMA_002_CHAPTERS_CHUNKS).await?;
    db.query(SCHEMA_003_ENTITIES).await?;
    db.query(SCHEMA_004_RELATIONSHIPS).await?;
    db.query(SCHEMA_005_MENTIONS).await?;
    db.query(SCHEMA_006_STATE_CHANGE).await?;
    db.query(SCHEMA_007_REGISTRY).await?;
    Ok(())
}

/// Defines the vector index for chunk embeddings. Run separately from the
/// static migrations above because the dimension is a runtime configuration
/// value (the embedding model in use), not a compile-time constant.
pub async fn apply_vector_index(
    db: &WorldGraphDb,
    dimensions: usize,
) -> Result<(), WorldRagError> {
    let stmt = format!(
        "DEFINE INDEX IF NOT EXISTS chunk_embedding_idx ON chunk FIELDS embedding \
         HNSW DIMENSION {dimensions} DIST COSINE TYPE F32"
    );
    db.query(stmt).await?;
    Ok(())
}
