//! 3-tier deduplication (spec §4.5): exact normalization, fuzzy matching, and
//! an LLM tie-breaker for the ambiguous middle band. Operates on a flat list
//! of surface names scoped to one entity type at a time — callers run it
//! once per type (characters, skills, classes, locations, items, factions)
//! and merge the returned alias maps, per §4.6.

use std::collections::BTreeMap;

use rapidfuzz::distance::levenshtein;
use serde::Deserialize;

use super::passes::types::EntityMergeCandidate;
use super::passes::{call_llm_json, LlmClient};
use crate::config::PipelineConfig;
use crate::resilience::{CircuitBreaker, CostTracker};
use crate::WorldRagError;

#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Surviving canonical names, one per equivalence class, in first-seen order.
    pub kept: Vec<String>,
    /// Single-step map from every merged-away surface form to its canonical name.
    pub alias_map: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct MergeDecisionResponse {
    #[serde(default)]
    merges: Vec<EntityMergeCandidate>,
}

/// `strip + lowercase + strip leading {the, a, an}`, per §4.5 Tier 1.
fn normalize(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    for article in ["the ", "an ", "a "] {
        if let Some(stripped) = lowered.strip_prefix(article) {
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }
    lowered
}

struct UnionFind {
    parent: Vec<usize>,
    name: Vec<String>,
}

impl UnionFind {
    fn new(names: &[String]) -> Self {
        Self {
            parent: (0..names.len()).collect(),
            name: names.to_vec(),
        }
    }

    fn find(&mut self, idx: usize) -> usize {
        if self.parent[idx] != idx {
            self.parent[idx] = self.find(self.parent[idx]);
        }
        self.parent[idx]
    }

    /// Unions `a` and `b`'s equivalence classes under `canonical_name` —
    /// the winning root's `name` entry is overwritten so later tiers (and
    /// the final alias map) see the chosen surface form, not whichever
    /// index happened to be first.
    fn union(&mut self, a: usize, b: usize, canonical_name: &str) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            self.name[root_a] = canonical_name.to_string();
            return;
        }
        self.parent[root_b] = root_a;
        self.name[root_a] = canonical_name.to_string();
    }
}

/// Runs all three tiers for one entity type and returns the surviving names
/// plus the single-step alias map. `llm` may be `None` (no client configured
/// for Tier 3): Tier 2 candidates then fall back to `confidence = score/100`
/// with reason `"Fuzzy match fallback"`, matching §4.5's degenerate path.
#[allow(clippy::too_many_arguments)]
pub async fn dedup_entities(
    names: &[String],
    entity_type: &str,
    config: &PipelineConfig,
    llm: Option<&dyn LlmClient>,
    breaker: Option<&CircuitBreaker>,
    cost_tracker: Option<&CostTracker>,
    book_id: &str,
    chapter: i64,
) -> Result<DedupOutcome, WorldRagError> {
    if names.is_empty() {
        return Ok(DedupOutcome::default());
    }

    let mut uf = UnionFind::new(names);

    // Tier 1 — exact, by normalized form. First occurrence of each
    // normalized key is the initial root; later ones union into it
    // unchanged (their surface form doesn't overwrite the kept name).
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    for (idx, name) in names.iter().enumerate() {
        let key = normalize(name);
        match seen.get(&key) {
            Some(&first_idx) => {
                let kept_name = uf.name[uf.find(first_idx)].clone();
                uf.union(first_idx, idx, &kept_name);
            }
            None => {
                seen.insert(key, idx);
            }
        }
    }

    // Tier 2 — fuzzy, pairwise over the surviving roots' normalized forms.
    let mut candidates: Vec<(usize, usize, f64)> = Vec::new();
    let mut roots: Vec<usize> = (0..names.len()).filter(|&i| uf.find(i) == i).collect();
    roots.sort_unstable();

    let mut i = 0;
    while i < roots.len() {
        let mut j = i + 1;
        while j < roots.len() {
            let root_a = uf.find(roots[i]);
            let root_b = uf.find(roots[j]);
            if root_a == root_b {
                j += 1;
                continue;
            }
            let name_a = uf.name[root_a].clone();
            let name_b = uf.name[root_b].clone();
            let norm_a = normalize(&name_a);
            let norm_b = normalize(&name_b);
            let score = levenshtein::normalized_similarity(norm_a.chars(), norm_b.chars()) * 100.0;

            if score >= config.dedup_fuzzy_auto_merge_threshold {
                let canonical = if name_a.len() >= name_b.len() { name_a } else { name_b };
                uf.union(root_a, root_b, &canonical);
            } else if score >= config.dedup_fuzzy_candidate_threshold {
                candidates.push((root_a, root_b, score));
            }
            j += 1;
        }
        i += 1;
    }

    // Tier 3 — LLM tie-break for the candidate band, batched into one call.
    if !candidates.is_empty() {
        let resolved = resolve_candidates(&uf, &candidates, entity_type, config, llm, breaker, cost_tracker, book_id, chapter).await?;
        for (root_a, root_b, canonical) in resolved {
            let a = uf.find(root_a);
            let b = uf.find(root_b);
            if a != b {
                uf.union(a, b, &canonical);
            }
        }
    }

    let mut alias_map = BTreeMap::new();
    let mut kept_roots: Vec<usize> = Vec::new();
    let mut kept_set = std::collections::BTreeSet::new();
    for idx in 0..names.len() {
        let root = uf.find(idx);
        if kept_set.insert(root) {
            kept_roots.push(root);
        }
        if names[idx] != uf.name[root] {
            alias_map.insert(names[idx].clone(), uf.name[root].clone());
        }
    }

    Ok(DedupOutcome {
        kept: kept_roots.into_iter().map(|r| uf.name[r].clone()).collect(),
        alias_map,
    })
}

/// Returns `(root_a, root_b, canonical_name)` for every candidate pair whose
/// resolved confidence clears the merge bar (0.8, per §4.5), whether that
/// confidence came from the LLM or the fuzzy-match fallback.
#[allow(clippy::too_many_arguments)]
async fn resolve_candidates(
    uf: &UnionFind,
    candidates: &[(usize, usize, f64)],
    entity_type: &str,
    config: &PipelineConfig,
    llm: Option<&dyn LlmClient>,
    breaker: Option<&CircuitBreaker>,
    cost_tracker: Option<&CostTracker>,
    book_id: &str,
    chapter: i64,
) -> Result<Vec<(usize, usize, String)>, WorldRagError> {
    const MERGE_CONFIDENCE_THRESHOLD: f64 = 0.8;

    let fallback = |root_a: usize, root_b: usize, score: f64| -> Option<(usize, usize, String)> {
        let confidence = score / 100.0;
        if confidence >= MERGE_CONFIDENCE_THRESHOLD {
            let name_a = &uf.name[root_a];
            let name_b = &uf.name[root_b];
            let canonical = if name_a.len() >= name_b.len() { name_a.clone() } else { name_b.clone() };
            tracing::info!(entity_type, name_a, name_b, confidence, "Fuzzy match fallback");
            Some((root_a, root_b, canonical))
        } else {
            None
        }
    };

    let (Some(llm), Some(breaker), Some(cost_tracker)) = (llm, breaker, cost_tracker) else {
        return Ok(candidates
            .iter()
            .filter_map(|&(a, b, score)| fallback(a, b, score))
            .collect());
    };

    let _ = config;
    let pairs_desc: Vec<String> = candidates
        .iter()
        .map(|&(a, b, score)| format!("a={:?}, b={:?}, fuzzy_score={score:.1}", uf.name[a], uf.name[b]))
        .collect();
    let system_prompt = "Decide whether each candidate name pair refers to the same entity. \
Return a JSON object with a `merges` array of {entity_a_name, entity_b_name, entity_type, \
confidence, canonical_name, reason}, one entry per candidate pair in the order given.";
    let user_prompt = format!("Entity type: {entity_type}\nCandidate pairs:\n{}", pairs_desc.join("\n"));

    let call_result = call_llm_json(llm, breaker, cost_tracker, book_id, chapter, "dedup_tier3", system_prompt, &user_prompt).await;

    let response = match call_result {
        Ok(value) => match serde_json::from_value::<MergeDecisionResponse>(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(error = %e, "dedup_tier3_response_unparseable_falling_back");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "dedup_tier3_call_failed_falling_back");
            None
        }
    };

    let Some(response) = response else {
        return Ok(candidates
            .iter()
            .filter_map(|&(a, b, score)| fallback(a, b, score))
            .collect());
    };

    let mut resolved = Vec::new();
    for (idx, &(root_a, root_b, score)) in candidates.iter().enumerate() {
        let decision = response.merges.get(idx);
        match decision {
            Some(decision) if decision.confidence >= MERGE_CONFIDENCE_THRESHOLD => {
                resolved.push((root_a, root_b, decision.canonical_name.clone()));
            }
            Some(_) => {}
            None => {
                if let Some(merge) = fallback(root_a, root_b, score) {
                    resolved.push(merge);
                }
            }
        }
    }
    Ok(resolved)
}
