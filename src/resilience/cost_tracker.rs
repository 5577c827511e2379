//! Tracks LLM/embedding spend with O(1) aggregated counters and enforces the
//! per-chapter and per-book cost ceilings.
//!
//! Grounded in the cost-tracking module of the original pipeline: same
//! pricing table, same ceiling defaults, same substring-fallback pricing
//! lookup. Guarded by `tokio::sync::Mutex` rather than an `asyncio.Lock`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use tokio::sync::Mutex;

use crate::WorldRagError;

/// (input $ / 1M tokens, output $ / 1M tokens), by model name.
static MODEL_COSTS: LazyLock<BTreeMap<&'static str, (f64, f64)>> = LazyLock::new(|| {
    BTreeMap::from([
        ("gpt-4o", (2.50, 10.00)),
        ("gpt-4o-mini", (0.15, 0.60)),
        ("gpt-4o-2024-11-20", (2.50, 10.00)),
        ("gemini-2.5-flash", (0.15, 0.60)),
        ("gemini-2.0-flash", (0.10, 0.40)),
        ("claude-3-5-sonnet", (3.00, 15.00)),
        ("claude-3-5-haiku", (0.80, 4.00)),
        ("voyage-3.5", (0.06, 0.0)),
        ("BAAI/bge-m3", (0.0, 0.0)),
        ("rerank-v3.5", (0.0, 0.0)),
    ])
});

const DEFAULT_CEILING_PER_CHAPTER: f64 = 0.50;
const DEFAULT_CEILING_PER_BOOK: f64 = 50.00;

/// Pricing lookup: exact match, then substring match against the table (a
/// caller passing a dated/suffixed model name like `gpt-4o-2025-03-01` still
/// prices against the `gpt-4o` family), then falls back to `gpt-4o` pricing
/// with a warning — the same three-step resolution the source tracker uses.
fn calculate_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let (input_rate, output_rate) = MODEL_COSTS.get(model).copied().unwrap_or_else(|| {
        MODEL_COSTS
            .iter()
            .find(|(name, _)| model.contains(*name) || name.contains(&model))
            .map(|(_, rates)| *rates)
            .unwrap_or_else(|| {
                tracing::warn!(model, "unknown_model_cost_fallback_to_gpt4o_pricing");
                *MODEL_COSTS.get("gpt-4o").expect("gpt-4o pricing always present")
            })
    });
    (input_tokens as f64 / 1_000_000.0) * input_rate + (output_tokens as f64 / 1_000_000.0) * output_rate
}

/// Rough token estimate for cost accounting when a usage field isn't
/// available from the provider response. `tokenizers`-backed exact counts are
/// reserved for the embedding path's own tokenizer; for free-form chargeable
/// text this falls back to the same `len(text) / 4` heuristic the Python
/// tracker uses when its `tiktoken` encoder raises.
pub fn count_tokens(text: &str) -> u64 {
    (text.chars().count() as u64 / 4).max(1)
}

#[derive(Debug, Clone)]
pub struct CostEntry {
    pub model: String,
    pub provider: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub operation: String,
    pub book_id: Option<String>,
    pub chapter: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct CostSummary {
    pub total: f64,
    pub by_book: BTreeMap<String, f64>,
    pub by_provider: BTreeMap<String, f64>,
    pub by_operation: BTreeMap<String, f64>,
    pub by_model: BTreeMap<String, f64>,
}

struct Aggregates {
    total: f64,
    by_book: BTreeMap<String, f64>,
    by_chapter: BTreeMap<(String, i64), f64>,
    by_provider: BTreeMap<String, f64>,
    by_operation: BTreeMap<String, f64>,
    by_model: BTreeMap<String, f64>,
}

impl Default for Aggregates {
    fn default() -> Self {
        Self {
            total: 0.0,
            by_book: BTreeMap::new(),
            by_chapter: BTreeMap::new(),
            by_provider: BTreeMap::new(),
            by_operation: BTreeMap::new(),
            by_model: BTreeMap::new(),
        }
    }
}

pub struct CostTracker {
    ceiling_per_chapter: f64,
    ceiling_per_book: f64,
    aggregates: Mutex<Aggregates>,
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CEILING_PER_CHAPTER, DEFAULT_CEILING_PER_BOOK)
    }
}

impl CostTracker {
    pub fn new(ceiling_per_chapter: f64, ceiling_per_book: f64) -> Self {
        Self {
            ceiling_per_chapter,
            ceiling_per_book,
            aggregates: Mutex::new(Aggregates::default()),
        }
    }

    /// Records a chargeable call and returns the entry with its computed
    /// cost, for the caller to log or surface.
    pub async fn record(
        &self,
        model: &str,
        provider: &str,
        input_tokens: u64,
        output_tokens: u64,
        operation: &str,
        book_id: Option<&str>,
        chapter: Option<i64>,
    ) -> CostEntry {
        let cost_usd = calculate_cost(model, input_tokens, output_tokens);
        let mut agg = self.aggregates.lock().await;
        agg.total += cost_usd;
        *agg.by_provider.entry(provider.to_string()).or_insert(0.0) += cost_usd;
        *agg.by_operation.entry(operation.to_string()).or_insert(0.0) += cost_usd;
        *agg.by_model.entry(model.to_string()).or_insert(0.0) += cost_usd;
        if let Some(book_id) = book_id {
            *agg.by_book.entry(book_id.to_string()).or_insert(0.0) += cost_usd;
            if let Some(chapter) = chapter {
                *agg.by_chapter.entry((book_id.to_string(), chapter)).or_insert(0.0) += cost_usd;
            }
        }
        drop(agg);

        CostEntry {
            model: model.to_string(),
            provider: provider.to_string(),
            input_tokens,
            output_tokens,
            cost_usd,
            operation: operation.to_string(),
            book_id: book_id.map(str::to_string),
            chapter,
        }
    }

    /// `true` if the chapter is still under its ceiling (never charged yet,
    /// or charged below it). Callers check this *before* the chargeable call,
    /// per the resolved Open Question on ceiling-check timing.
    pub async fn check_chapter_ceiling(&self, book_id: &str, chapter: i64) -> bool {
        let agg = self.aggregates.lock().await;
        agg.by_chapter.get(&(book_id.to_string(), chapter)).copied().unwrap_or(0.0) < self.ceiling_per_chapter
    }

    pub async fn check_book_ceiling(&self, book_id: &str) -> bool {
        let agg = self.aggregates.lock().await;
        agg.by_book.get(book_id).copied().unwrap_or(0.0) < self.ceiling_per_book
    }

    /// Running total charged against one `(book, chapter)` pair so far, for
    /// the orchestrator to stamp onto its `ChapterExtractionResult`.
    pub async fn cost_for_chapter(&self, book_id: &str, chapter: i64) -> f64 {
        let agg = self.aggregates.lock().await;
        agg.by_chapter.get(&(book_id.to_string(), chapter)).copied().unwrap_or(0.0)
    }

    /// Returns `Err(WorldRagError::CostCeilingExceeded)` when the relevant
    /// ceiling(s) are already breached, otherwise `Ok(())`. Intended to be
    /// called immediately before every chargeable call.
    pub async fn enforce_ceilings(&self, book_id: &str, chapter: Option<i64>) -> Result<(), WorldRagError> {
        if !self.check_book_ceiling(book_id).await {
            return Err(WorldRagError::CostCeilingExceeded { book_id: book_id.to_string(), chapter });
        }
        if let Some(chapter) = chapter {
            if !self.check_chapter_ceiling(book_id, chapter).await {
                return Err(WorldRagError::CostCeilingExceeded { book_id: book_id.to_string(), chapter: Some(chapter) });
            }
        }
        Ok(())
    }

    /// Rounds every aggregate to 4 decimal places, matching the source
    /// tracker's summary rounding.
    pub async fn summary(&self) -> CostSummary {
        let agg = self.aggregates.lock().await;
        fn round4(v: f64) -> f64 {
            (v * 10_000.0).round() / 10_000.0
        }
        CostSummary {
            total: round4(agg.total),
            by_book: agg.by_book.iter().map(|(k, v)| (k.clone(), round4(*v))).collect(),
            by_provider: agg.by_provider.iter().map(|(k, v)| (k.clone(), round4(*v))).collect(),
            by_operation: agg.by_operation.iter().map(|(k, v)| (k.clone(), round4(*v))).collect(),
            by_model: agg.by_model.iter().map(|(k, v)| (k.clone(), round4(*v))).collect(),
        }
    }
}
