//! Programmatic mention detector (spec §4.9): scans chapter text for every
//! known entity's name and aliases, case-insensitively, with word-boundary
//! anchoring, and keeps one independent edge per occurrence. Uses
//! Aho-Corasick for the multi-pattern scan rather than one regex per entity —
//! a book-length registry can carry hundreds of names, and re-scanning the
//! full chapter text per name would make this step quadratic in
//! `mentions × known_entities`.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

use crate::models::entity::EntityKind;
use crate::models::mention::{AlignmentStatus, Mention, MentionType};

const MIN_NAME_LENGTH: usize = 2;

struct ScanEntry {
    name: String,
    kind: EntityKind,
    is_alias: bool,
}

/// Scans `text` for every `(name, kind, is_alias)` entry at least
/// [`MIN_NAME_LENGTH`] characters long, producing one [`Mention`] per
/// occurrence. Overlapping matches are resolved by keeping the longer span
/// when one strictly contains the other (spec §4.9's overlap rule);
/// `AhoCorasick`'s `LeftmostLongest` match kind already prefers the longest
/// pattern starting at a given position, so the post-pass only needs to drop
/// matches fully nested inside an already-kept one.
pub fn detect_mentions(
    text: &str,
    entities: &[(String, EntityKind, bool)],
    book_id: &str,
    chapter: i64,
) -> Vec<Mention> {
    let scan_entries: Vec<ScanEntry> = entities
        .iter()
        .filter(|(name, _, _)| name.chars().count() >= MIN_NAME_LENGTH)
        .map(|(name, kind, is_alias)| ScanEntry { name: name.clone(), kind: *kind, is_alias: *is_alias })
        .collect();

    if scan_entries.is_empty() {
        return Vec::new();
    }

    let Ok(automaton): Result<AhoCorasick, _> = AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::LeftmostLongest)
        .build(scan_entries.iter().map(|e| e.name.as_str()))
    else {
        tracing::warn!("mention_detector_automaton_build_failed");
        return Vec::new();
    };

    let mut raw_matches: Vec<(usize, usize, usize)> = automaton
        .find_iter(text)
        .map(|m| (m.start(), m.end(), m.pattern().as_usize()))
        .filter(|&(start, end, _)| has_word_boundaries(text, start, end))
        .collect();

    // Longest-span-first so the containment scan below always sees an
    // already-kept superset before a nested candidate arrives.
    raw_matches.sort_by(|a, b| a.0.cmp(&b.0).then((b.1 - b.0).cmp(&(a.1 - a.0))));

    let mut kept: Vec<(usize, usize, usize)> = Vec::new();
    for candidate in raw_matches {
        let (c_start, c_end, _) = candidate;
        let nested_in_existing = kept
            .iter()
            .any(|&(k_start, k_end, _)| k_start <= c_start && c_end <= k_end);
        if nested_in_existing {
            continue;
        }
        kept.retain(|&(k_start, k_end, _)| !(c_start <= k_start && k_end <= c_end));
        kept.push(candidate);
    }
    kept.sort_by_key(|&(start, _, _)| start);

    kept.into_iter()
        .map(|(start, end, pattern_idx)| {
            let entry = &scan_entries[pattern_idx];
            Mention {
                entity_name: entry.name.clone(),
                entity_kind: entry.kind,
                book_id: book_id.to_string(),
                chapter,
                char_start: start,
                char_end: end,
                mention_text: text[start..end].to_string(),
                mention_type: if entry.is_alias { MentionType::Alias } else { MentionType::DirectName },
                confidence: 1.0,
                alignment_status: AlignmentStatus::Exact,
                pass_name: "mention_detector".to_string(),
            }
        })
        .collect()
}

/// True when the byte immediately before `start` and immediately after `end`
/// (if present) are not alphanumeric — rejects substring matches inside
/// other words (`Jake` inside `Jakesson`).
fn has_word_boundaries(text: &str, start: usize, end: usize) -> bool {
    let before_ok = text[..start].chars().next_back().map(|c| !c.is_alphanumeric()).unwrap_or(true);
    let after_ok = text[end..].chars().next().map(|c| !c.is_alphanumeric()).unwrap_or(true);
    before_ok && after_ok
}

/// Reference implementation used only to cross-check [`detect_mentions`] in
/// tests: one regex-style scan per name. Quadratic in
/// `names × text length` — never used on the hot path.
#[cfg(test)]
fn detect_mentions_naive(
    text: &str,
    entities: &[(String, EntityKind, bool)],
    book_id: &str,
    chapter: i64,
) -> Vec<Mention> {
    let lower_text = text.to_lowercase();
    let mut spans: Vec<(usize, usize, usize)> = Vec::new();
    for (idx, (name, _, _)) in entities.iter().enumerate() {
        if name.chars().count() < MIN_NAME_LENGTH {
            continue;
        }
        let lower_name = name.to_lowercase();
        let mut search_from = 0;
        while let Some(rel) = lower_text[search_from..].find(&lower_name) {
            let start = search_from + rel;
            let end = start + lower_name.len();
            if has_word_boundaries(text, start, end) {
                spans.push((start, end, idx));
            }
            search_from = start + 1;
        }
    }
    spans.sort_by(|a, b| a.0.cmp(&b.0).then((b.1 - b.0).cmp(&(a.1 - a.0))));

    let mut kept: Vec<(usize, usize, usize)> = Vec::new();
    for candidate in spans {
        let (c_start, c_end, _) = candidate;
        if kept.iter().any(|&(k_start, k_end, _)| k_start <= c_start && c_end <= k_end) {
            continue;
        }
        kept.retain(|&(k_start, k_end, _)| !(c_start <= k_start && k_end <= c_end));
        kept.push(candidate);
    }
    kept.sort_by_key(|&(start, _, _)| start);

    kept.into_iter()
        .map(|(start, end, idx)| {
            let (name, kind, is_alias) = &entities[idx];
            Mention {
                entity_name: name.clone(),
                entity_kind: *kind,
                book_id: book_id.to_string(),
                chapter,
                char_start: start,
                char_end: end,
                mention_text: text[start..end].to_string(),
                mention_type: if *is_alias { MentionType::Alias } else { MentionType::DirectName },
                confidence: 1.0,
                alignment_status: AlignmentStatus::Exact,
                pass_name: "mention_detector".to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_occurrences_yield_independent_mentions() {
        let text = "Jake walked in. Jake nodded. Then Jake left.";
        let entities = vec![("Jake".to_string(), EntityKind::Character, false)];
        let mentions = detect_mentions(text, &entities, "b1", 1);
        assert_eq!(mentions.len(), 3);
        assert_eq!((mentions[0].char_start, mentions[0].char_end), (0, 4));
        assert_eq!((mentions[1].char_start, mentions[1].char_end), (16, 20));
        assert_eq!((mentions[2].char_start, mentions[2].char_end), (35, 39));
    }

    #[test]
    fn rejects_substring_matches_inside_other_words() {
        let text = "Jakesson walked into the room.";
        let entities = vec![("Jake".to_string(), EntityKind::Character, false)];
        assert!(detect_mentions(text, &entities, "b1", 1).is_empty());
    }

    #[test]
    fn longer_overlapping_name_wins() {
        let text = "Jake Thayne walked in.";
        let entities = vec![
            ("Jake".to_string(), EntityKind::Character, false),
            ("Jake Thayne".to_string(), EntityKind::Character, false),
        ];
        let mentions = detect_mentions(text, &entities, "b1", 1);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].mention_text, "Jake Thayne");
    }

    #[test]
    fn names_shorter_than_two_chars_are_skipped() {
        let text = "I saw him there.";
        let entities = vec![("I".to_string(), EntityKind::Character, false)];
        assert!(detect_mentions(text, &entities, "b1", 1).is_empty());
    }

    #[test]
    fn alias_matches_carry_alias_mention_type() {
        let text = "The Hunter smiled.";
        let entities = vec![("Hunter".to_string(), EntityKind::Character, true)];
        let mentions = detect_mentions(text, &entities, "b1", 1);
        assert_eq!(mentions[0].mention_type, MentionType::Alias);
    }

    #[test]
    fn matches_exact_alignment_invariant() {
        let text = "Jake fought bravely.";
        let entities = vec![("Jake".to_string(), EntityKind::Character, false)];
        let mentions = detect_mentions(text, &entities, "b1", 1);
        assert!(mentions[0].is_grounded_in(text));
    }

    #[test]
    fn matches_naive_reference_implementation() {
        let text = "Jake Thayne met Mira. Jake smiled at Mira again, while Jake Thayne watched.";
        let entities = vec![
            ("Jake".to_string(), EntityKind::Character, false),
            ("Jake Thayne".to_string(), EntityKind::Character, false),
            ("Mira".to_string(), EntityKind::Character, false),
        ];
        let fast = detect_mentions(text, &entities, "b1", 7);
        let naive = detect_mentions_naive(text, &entities, "b1", 7);
        let fast_spans: Vec<(usize, usize)> = fast.iter().map(|m| (m.char_start, m.char_end)).collect();
        let naive_spans: Vec<(usize, usize)> = naive.iter().map(|m| (m.char_start, m.char_end)).collect();
        assert_eq!(fast_spans, naive_spans);
    }
}
