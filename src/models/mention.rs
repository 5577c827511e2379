use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionType {
    Langextract,
    DirectName,
    Alias,
    Pronoun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStatus {
    Exact,
    Fuzzy,
    Unaligned,
}

/// An independent `MENTIONED_IN` edge recording one occurrence of a name,
/// alias, or pronoun in a chapter's text. Mentions are **never merged or
/// expanded** — every occurrence gets its own edge (spec §3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub entity_name: String,
    pub entity_kind: crate::models::entity::EntityKind,
    pub book_id: String,
    pub chapter: i64,
    pub char_start: usize,
    pub char_end: usize,
    pub mention_text: String,
    pub mention_type: MentionType,
    pub confidence: f64,
    pub alignment_status: AlignmentStatus,
    pub pass_name: String,
}

impl Mention {
    /// Spec §8 universal invariant: when `alignment_status == Exact`,
    /// `chapter.text[char_start:char_end] == mention_text`.
    pub fn is_grounded_in(&self, chapter_text: &str) -> bool {
        if self.alignment_status != AlignmentStatus::Exact {
            return true;
        }
        chapter_text
            .get(self.char_start..self.char_end)
            .map(|slice| slice == self.mention_text)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::entity::EntityKind;

    fn mention(start: usize, end: usize, text: &str) -> Mention {
        Mention {
            entity_name: "Jake".into(),
            entity_kind: EntityKind::Character,
            book_id: "b1".into(),
            chapter: 3,
            char_start: start,
            char_end: end,
            mention_text: text.to_string(),
            mention_type: MentionType::DirectName,
            confidence: 1.0,
            alignment_status: AlignmentStatus::Exact,
            pass_name: "mention_detector".into(),
        }
    }

    #[test]
    fn exact_alignment_requires_slice_match() {
        let text = "Jake walked into the room.";
        let m = mention(0, 4, "Jake");
        assert!(m.is_grounded_in(text));
    }

    #[test]
    fn exact_alignment_rejects_mismatched_slice() {
        let text = "Jake walked into the room.";
        let m = mention(0, 5, "Jake");
        assert!(!m.is_grounded_in(text));
    }

    #[test]
    fn non_exact_alignment_is_not_checked() {
        let mut m = mention(0, 999, "Jake");
        m.alignment_status = AlignmentStatus::Unaligned;
        assert!(m.is_grounded_in("short text"));
    }
}
