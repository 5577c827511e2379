//! Hybrid retrieval core (spec §4.12): vector+keyword chunk search → rerank →
//! KG enrichment → LLM generation, plus the streaming SSE variant. Grounded
//! in the teacher's `services/search.rs` (RRF merge) and
//! `original_source/backend/app/services/chat_service.py` (the five-step
//! pipeline shape, the two degenerate-path user messages, the SSE event
//! sequence).

pub mod generate;
pub mod search;
pub mod types;

use async_stream::stream;
use tokio_stream::Stream;

use crate::embedding::EmbeddingService;
use crate::embedding::RerankerService;
use crate::extraction::passes::LlmClient;
use crate::graph::GraphStore;
use crate::resilience::{CircuitBreaker, CostTracker};
use crate::WorldRagError;

use generate::{build_context, generate_answer, ContextChunk};
use search::retrieve_chunks;
use types::{QueryRequest, QueryResponse, RelatedEntity, SourceChunk, SseEvent};

const NO_CONTENT_MESSAGE: &str = "I couldn't find any relevant content in this book for your \
question. Make sure the book has been fully processed (extracted and embedded).";
const NOT_RELEVANT_MESSAGE: &str = "I found some content but it doesn't seem relevant enough \
to your question. Try rephrasing or asking something more specific about the story.";

/// Everything the non-streaming and streaming entry points share: retrieve,
/// rerank, enrich with KG entities. Returns `None` at either degenerate
/// path (spec §4.12) with the user-facing message the caller should surface
/// instead of continuing to generation.
struct RetrievedContext {
    chunks: Vec<ContextChunk>,
    sources: Vec<SourceChunk>,
    related_entities: Vec<RelatedEntity>,
    chunks_retrieved: usize,
    chunks_after_rerank: usize,
}

async fn retrieve_and_enrich(
    graph: &dyn GraphStore,
    embedder: &dyn EmbeddingService,
    reranker: &dyn RerankerService,
    request: &QueryRequest,
    rerank_min_relevance: f32,
    kg_entity_limit: usize,
) -> Result<Result<RetrievedContext, &'static str>, WorldRagError> {
    let query_embedding = if embedder.is_available() {
        Some(embedder.embed_text(&request.query).await?)
    } else {
        None
    };

    let hits = retrieve_chunks(graph, &request.book_id, &request.query, query_embedding.as_deref(), request.top_k).await?;
    let chunks_retrieved = hits.len();
    if hits.is_empty() {
        return Ok(Err(NO_CONTENT_MESSAGE));
    }

    let (kept, scores): (Vec<_>, Vec<f32>) = if reranker.is_available() {
        let texts: Vec<String> = hits.iter().map(|h| h.chunk.text.clone()).collect();
        let ranked = reranker.rerank(&request.query, &texts).await?;
        let mut kept = Vec::new();
        let mut scores = Vec::new();
        for (index, score) in ranked {
            if score < rerank_min_relevance {
                continue;
            }
            if kept.len() >= request.rerank_top_n {
                break;
            }
            kept.push(hits[index].clone());
            scores.push(score);
        }
        (kept, scores)
    } else {
        let kept: Vec<_> = hits.iter().take(request.rerank_top_n).cloned().collect();
        let scores: Vec<f32> = kept.iter().map(|c| c.score).collect();
        (kept, scores)
    };

    if kept.is_empty() {
        return Ok(Err(NOT_RELEVANT_MESSAGE));
    }

    let chapter_numbers: Vec<i64> = {
        let mut numbers: Vec<i64> = kept
            .iter()
            .filter_map(|c| c.chunk.chapter_id.parse::<i64>().ok())
            .collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers
    };

    let related_entities = if chapter_numbers.is_empty() {
        Vec::new()
    } else {
        graph
            .entities_mentioned_in_chapters(&request.book_id, &chapter_numbers, kg_entity_limit)
            .await?
            .into_iter()
            .map(|e| RelatedEntity { name: e.name, label: e.kind.table_name().to_string(), description: e.description })
            .collect()
    };

    let mut context_chunks = Vec::with_capacity(kept.len());
    let mut sources = Vec::with_capacity(kept.len());
    for (chunk_result, score) in kept.iter().zip(scores.iter()) {
        let chapter_number = chunk_result.chunk.chapter_id.parse::<i64>().unwrap_or_default();
        let chapter_title = match graph.get_chapter(&request.book_id, chapter_number).await {
            Ok(chapter) => chapter.title.unwrap_or_default(),
            Err(_) => String::new(),
        };
        context_chunks.push(ContextChunk {
            text: chunk_result.chunk.text.clone(),
            chapter_number,
            chapter_title: chapter_title.clone(),
            relevance_score: *score,
        });
        sources.push(SourceChunk {
            text: chunk_result.chunk.text.chars().take(500).collect(),
            chapter_number,
            chapter_title,
            position: chunk_result.chunk.position,
            relevance_score: *score,
        });
    }

    let chunks_after_rerank = context_chunks.len();
    Ok(Ok(RetrievedContext {
        chunks: context_chunks,
        sources,
        related_entities,
        chunks_retrieved,
        chunks_after_rerank,
    }))
}

/// Non-streaming retrieval-augmented answer, spec §4.12 steps 1-6.
#[allow(clippy::too_many_arguments)]
pub async fn query(
    graph: &dyn GraphStore,
    embedder: &dyn EmbeddingService,
    reranker: &dyn RerankerService,
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    request: QueryRequest,
    rerank_min_relevance: f32,
    kg_entity_limit: usize,
) -> Result<QueryResponse, WorldRagError> {
    let retrieved = retrieve_and_enrich(graph, embedder, reranker, &request, rerank_min_relevance, kg_entity_limit).await?;
    let context = match retrieved {
        Err(message) => {
            return Ok(QueryResponse {
                answer: message.to_string(),
                sources: vec![],
                related_entities: vec![],
                chunks_retrieved: 0,
                chunks_after_rerank: 0,
            })
        }
        Ok(context) => context,
    };

    let context_text = build_context(&context.chunks, &context.related_entities);
    let answer = generate_answer(llm, breaker, cost_tracker, &request.book_id, &request.query, &context_text).await?;

    Ok(QueryResponse {
        answer,
        sources: if request.include_sources { context.sources } else { vec![] },
        related_entities: context.related_entities,
        chunks_retrieved: context.chunks_retrieved,
        chunks_after_rerank: context.chunks_after_rerank,
    })
}

/// Streaming variant, spec §4.12/§6: emits `Sources` once, then `Token` per
/// word of the generated answer (the underlying `LlmClient` is a single
/// structured call, not a token-streaming provider — prompt/provider wiring
/// is out of scope per spec §1, so this degrades the generation step to
/// "stream the finished answer word by word" rather than true
/// token-by-token provider streaming), then a terminal `Done` or `Error`.
#[allow(clippy::too_many_arguments)]
pub fn query_stream<'a>(
    graph: &'a dyn GraphStore,
    embedder: &'a dyn EmbeddingService,
    reranker: &'a dyn RerankerService,
    llm: &'a dyn LlmClient,
    breaker: &'a CircuitBreaker,
    cost_tracker: &'a CostTracker,
    request: QueryRequest,
    rerank_min_relevance: f32,
    kg_entity_limit: usize,
) -> impl Stream<Item = SseEvent> + 'a {
    stream! {
        let retrieved = match retrieve_and_enrich(graph, embedder, reranker, &request, rerank_min_relevance, kg_entity_limit).await {
            Ok(retrieved) => retrieved,
            Err(error) => {
                yield SseEvent::Error { message: error.to_string() };
                return;
            }
        };

        let context = match retrieved {
            Err(message) => {
                yield SseEvent::Error { message: message.to_string() };
                return;
            }
            Ok(context) => context,
        };

        yield SseEvent::Sources {
            sources: context.sources.clone(),
            related_entities: context.related_entities.clone(),
            chunks_retrieved: context.chunks_retrieved,
            chunks_after_rerank: context.chunks_after_rerank,
        };

        let context_text = build_context(&context.chunks, &context.related_entities);
        let answer = match generate_answer(llm, breaker, cost_tracker, &request.book_id, &request.query, &context_text).await {
            Ok(answer) => answer,
            Err(error) => {
                yield SseEvent::Error { message: error.to_string() };
                return;
            }
        };

        for word in answer.split_inclusive(' ') {
            yield SseEvent::Token { token: word.to_string() };
        }

        yield SseEvent::Done;
    }
}
