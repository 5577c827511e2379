//! Vector + keyword retrieval with reciprocal rank fusion, step 2 of spec
//! §4.12. Grounded directly in the teacher's `services/search.rs`
//! (`apply_rrf`, `RRF_K = 60.0`, parallel per-source futures joined and
//! merged) — here fused across exactly two sources (keyword, vector) instead
//! of per-entity-type, since the spec scopes retrieval to chunks only.

use crate::graph::{ChunkSearchResult, GraphStore};
use crate::WorldRagError;

/// Standard RRF constant (k=60 is conventional), same value the teacher uses.
const RRF_K: f32 = 60.0;

fn chunk_key(result: &ChunkSearchResult) -> (String, i64) {
    (result.chunk.chapter_id.clone(), result.chunk.position)
}

/// Merges two ranked chunk lists by reciprocal rank fusion: a chunk's score
/// becomes `sum(1 / (k + rank))` across whichever lists it appears in,
/// sorted descending. Mirrors `apply_rrf` in the teacher one-for-one, keyed
/// on `(chapter_id, position)` instead of a search-result id string.
pub fn apply_rrf(
    keyword_results: &[ChunkSearchResult],
    vector_results: &[ChunkSearchResult],
) -> Vec<ChunkSearchResult> {
    use std::collections::HashMap;

    let mut scored: HashMap<(String, i64), (ChunkSearchResult, f32)> = HashMap::new();

    for (rank, result) in keyword_results.iter().enumerate() {
        let contribution = 1.0 / (RRF_K + (rank + 1) as f32);
        let entry = scored
            .entry(chunk_key(result))
            .or_insert_with(|| (result.clone(), 0.0));
        entry.1 += contribution;
    }
    for (rank, result) in vector_results.iter().enumerate() {
        let contribution = 1.0 / (RRF_K + (rank + 1) as f32);
        let entry = scored
            .entry(chunk_key(result))
            .or_insert_with(|| (result.clone(), 0.0));
        entry.1 += contribution;
    }

    let mut merged: Vec<ChunkSearchResult> = scored
        .into_values()
        .map(|(mut result, rrf_score)| {
            result.score = rrf_score;
            result
        })
        .collect();

    merged.sort_by(|a, b| match b.score.partial_cmp(&a.score) {
        Some(std::cmp::Ordering::Equal) | None => chunk_key(a).cmp(&chunk_key(b)),
        Some(ordering) => ordering,
    });

    merged
}

/// Step 2 of spec §4.12: vector-search top-K chunks by cosine similarity,
/// filtered by `book_id` (and optional `max_chapter`, enforced by the
/// [`GraphStore`] implementation), fused with a keyword pass via RRF so a
/// query that happens to match exact wording doesn't lose to a purely
/// semantic top-K cutoff.
pub async fn retrieve_chunks(
    graph: &dyn GraphStore,
    book_id: &str,
    query: &str,
    query_embedding: Option<&[f32]>,
    top_k: usize,
) -> Result<Vec<ChunkSearchResult>, WorldRagError> {
    let keyword_fut = graph.keyword_search_chunks(book_id, query, top_k * 2);
    match query_embedding {
        Some(embedding) => {
            let vector_fut = graph.vector_search_chunks(book_id, embedding, top_k * 2);
            let (keyword_results, vector_results) = tokio::try_join!(keyword_fut, vector_fut)?;
            let mut merged = apply_rrf(&keyword_results, &vector_results);
            merged.truncate(top_k);
            Ok(merged)
        }
        None => {
            let mut keyword_results = keyword_fut.await?;
            keyword_results.truncate(top_k);
            Ok(keyword_results)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn result(chapter_id: &str, position: i64, score: f32) -> ChunkSearchResult {
        ChunkSearchResult {
            chunk: Chunk {
                book_id: "b1".into(),
                chapter_id: chapter_id.into(),
                position,
                text: format!("chunk {position}"),
                token_count: 100,
                char_offset_start: 0,
                char_offset_end: 100,
                embedding: None,
            },
            score,
        }
    }

    #[test]
    fn rrf_prefers_chunk_ranked_high_in_both_lists() {
        let keyword = vec![result("c1", 0, 0.9), result("c1", 1, 0.5)];
        let vector = vec![result("c1", 1, 0.95), result("c1", 0, 0.4)];

        let merged = apply_rrf(&keyword, &vector);
        assert_eq!(merged.len(), 2);
        // Both appear once in each list at ranks 0/1, so scores should be
        // close; the one appearing at rank 0 in one list and rank 1 in the
        // other ties here — just assert both survive and are sorted
        // descending by score.
        assert!(merged[0].score >= merged[1].score);
    }

    #[test]
    fn rrf_keeps_a_chunk_present_in_only_one_list() {
        let keyword = vec![result("c1", 0, 0.9)];
        let vector = vec![result("c2", 0, 0.9)];

        let merged = apply_rrf(&keyword, &vector);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn rrf_sums_contributions_for_a_chunk_in_both_lists() {
        let keyword = vec![result("c1", 0, 0.9)];
        let vector = vec![result("c1", 0, 0.9)];

        let merged = apply_rrf(&keyword, &vector);
        assert_eq!(merged.len(), 1);
        let expected = 1.0 / (RRF_K + 1.0) + 1.0 / (RRF_K + 1.0);
        assert!((merged[0].score - expected).abs() < 1e-6);
    }
}
