//! Wire shapes for the hybrid retrieval core (spec §4.12, §6): the
//! non-streaming `query(...)` request/response and the streaming SSE event
//! sequence. Grounded in `original_source/backend/app/schemas/chat.py`'s
//! `ChatResponse`/`SourceChunk`/`RelatedEntity` and
//! `services/chat_service.py`'s `query_stream` event shapes.

use serde::{Deserialize, Serialize};

/// A retrieved-and-surfaced passage, truncated to 500 chars the way the
/// source's `SourceChunk.text` slice does, so a client rendering citations
/// never has to paginate a whole chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceChunk {
    pub text: String,
    pub chapter_number: i64,
    pub chapter_title: String,
    pub position: i64,
    pub relevance_score: f32,
}

/// One KG entity surfaced by step 4 (spec §4.12), bounded to 30 per query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub name: String,
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query: String,
    pub book_id: String,
    pub top_k: usize,
    pub rerank_top_n: usize,
    pub min_relevance: f32,
    pub include_sources: bool,
    pub max_chapter: Option<i64>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            book_id: String::new(),
            top_k: 20,
            rerank_top_n: 5,
            min_relevance: 0.1,
            include_sources: true,
            max_chapter: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<SourceChunk>,
    #[serde(default)]
    pub related_entities: Vec<RelatedEntity>,
    pub chunks_retrieved: usize,
    pub chunks_after_rerank: usize,
}

/// One SSE event in the streaming variant's fixed sequence: one `Sources`,
/// then zero or more `Token`, then a terminal `Done` or `Error` (spec §4.12,
/// §6). Serializes to the `{event, data}` shape the (out-of-scope) HTTP
/// layer forwards as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SseEvent {
    Sources {
        sources: Vec<SourceChunk>,
        related_entities: Vec<RelatedEntity>,
        chunks_retrieved: usize,
        chunks_after_rerank: usize,
    },
    Token {
        token: String,
    },
    Done,
    Error {
        message: String,
    },
}
