use std::collections::{BTreeMap, HashSet};

use crate::models::RegexMatch;
use crate::ontology::PatternSet;

/// Runs Passe 0 — free, instant, grounded regex pre-extraction over a
/// chapter's full text. Specific patterns run first; the generic
/// `blue_box_generic` catch-all runs last and skips any span that overlaps
/// a match already claimed by a more specific pattern.
pub fn extract(patterns: &PatternSet, text: &str, chapter_number: i64) -> Vec<RegexMatch> {
    let mut matches = Vec::new();
    let mut seen_spans: Vec<(usize, usize)> = Vec::new();

    for pattern in &patterns.patterns {
        for capture in pattern.regex.captures_iter(text) {
            let whole = capture.get(0).expect("capture group 0 always matches");
            let span = (whole.start(), whole.end());

            if pattern.name == "blue_box_generic"
                && seen_spans
                    .iter()
                    .any(|s| (s.0 <= span.0 && span.0 < s.1) || (s.0 < span.1 && span.1 <= s.1))
            {
                continue;
            }
            seen_spans.push(span);

            let mut captures = BTreeMap::new();
            for (capture_name, group_idx) in &pattern.captures {
                if let Some(value) = capture.get(*group_idx) {
                    let trimmed = value.as_str().trim();
                    if !trimmed.is_empty() {
                        captures.insert(capture_name.clone(), trimmed.to_string());
                    }
                }
            }

            matches.push(RegexMatch {
                pattern_name: pattern.name.clone(),
                entity_type: pattern.entity_type,
                layer: pattern.layer,
                captures,
                raw_text: whole.as_str().to_string(),
                char_offset_start: span.0,
                char_offset_end: span.1,
                chapter_number,
            });
        }
    }

    let by_type: HashSet<_> = matches.iter().map(|m| m.entity_type).collect();
    tracing::info!(
        chapter = chapter_number,
        total_matches = matches.len(),
        distinct_types = by_type.len(),
        "regex_extraction_completed",
    );
    matches
}
