//! The phased extraction pipeline (spec §2, §4): regex pre-extraction, the
//! router, the five LLM passes, merge, dedup, reconciliation, the quality
//! filter, mention detection, and the per-chapter [`orchestrator`] that
//! wires them into one directed acyclic run.

pub mod dedup;
pub mod mention_detector;
pub mod merge;
pub mod orchestrator;
pub mod passes;
pub mod quality_filter;
pub mod reconciler;
pub mod regex_extractor;
pub mod router;

pub use dedup::{dedup_entities, DedupOutcome};
pub use mention_detector::detect_mentions;
pub use merge::{merge_pass_results, PassOutcome};
pub use orchestrator::{extract_chapter, ChapterExtractionOutcome};
pub use passes::types::ChapterExtractionResult;
pub use passes::{call_llm_json, LlmClient, LlmCompletion};
pub use quality_filter::{filter_extraction_result, FilterCounts};
pub use reconciler::reconcile;
pub use regex_extractor::extract as extract_regex_matches;
pub use router::{route_extraction_passes, ExtractionPass};
