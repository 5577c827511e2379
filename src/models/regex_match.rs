use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which ontology layer a regex pattern (and therefore its matches) came
/// from. Series patterns win ties against genre patterns, which win against
/// core patterns; this field makes that provenance visible on every match for
/// audit (spec §9 open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternLayer {
    Core,
    Genre,
    Series,
}

/// The entity-shaped hint a regex pattern targets. Looser than
/// [`crate::models::entity::EntityKind`] — covers progression events
/// (`Level`, `StatIncrease`, `Evolution`) that aren't persisted entities in
/// their own right but feed the systems extraction pass and StateChange
/// pairing, plus a `SystemNotification` catch-all for the generic bracketed
/// bluebox pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegexTargetKind {
    Skill,
    Level,
    Class,
    Title,
    StatIncrease,
    Evolution,
    Bloodline,
    Profession,
    Church,
    SystemNotification,
}

/// A single hit from the Passe 0 regex pre-extractor. Stored as JSON on the
/// owning [`crate::models::chapter::Chapter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexMatch {
    pub pattern_name: String,
    pub entity_type: RegexTargetKind,
    pub layer: PatternLayer,
    #[serde(default)]
    pub captures: BTreeMap<String, String>,
    pub raw_text: String,
    pub char_offset_start: usize,
    pub char_offset_end: usize,
    pub chapter_number: i64,
}

impl RegexMatch {
    /// Spec §8 round-trip law: slicing the source text at the recorded span
    /// reproduces `raw_text`.
    pub fn slice_matches_raw_text(&self, chapter_text: &str) -> bool {
        chapter_text
            .get(self.char_offset_start..self.char_offset_end)
            .map(|slice| slice == self.raw_text)
            .unwrap_or(false)
    }

    /// Half-open `[start, end)` span as a tuple, for overlap arithmetic.
    pub fn span(&self) -> (usize, usize) {
        (self.char_offset_start, self.char_offset_end)
    }

    /// Whether `self`'s span fully contains `other`'s span.
    pub fn contains(&self, other: &RegexMatch) -> bool {
        self.char_offset_start <= other.char_offset_start
            && other.char_offset_end <= self.char_offset_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(start: usize, end: usize, raw: &str) -> RegexMatch {
        RegexMatch {
            pattern_name: "skill_acquired".into(),
            entity_type: RegexTargetKind::Skill,
            layer: PatternLayer::Genre,
            captures: BTreeMap::new(),
            raw_text: raw.to_string(),
            char_offset_start: start,
            char_offset_end: end,
            chapter_number: 1,
        }
    }

    #[test]
    fn slice_matches_raw_text_round_trips() {
        let text = "[Skill Acquired: Basic Archery - Inferior]";
        let m = make(0, text.len(), text);
        assert!(m.slice_matches_raw_text(text));
    }

    #[test]
    fn contains_checks_full_containment() {
        let outer = make(0, 50, "x".repeat(50).as_str());
        let inner = make(10, 20, "y".repeat(10).as_str());
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }
}
