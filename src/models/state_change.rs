use serde::{Deserialize, Serialize};

/// The eight progression categories a [`StateChange`] can record, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateChangeCategory {
    Stat,
    Level,
    Skill,
    Class,
    Title,
    Item,
    Bloodline,
    Profession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateChangeAction {
    Gain,
    Lose,
    Acquire,
    Drop,
    Upgrade,
    Evolve,
    Awaken,
}

/// An immutable ledger record. **Never updated, never deleted** in normal
/// operation; a character's present-tense sheet is derived by folding the
/// ledger up to a given chapter (§4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChange {
    pub book_id: String,
    pub character_name: String,
    pub chapter: i64,
    pub category: StateChangeCategory,
    pub name: String,
    pub action: StateChangeAction,
    #[serde(default)]
    pub value_delta: Option<f64>,
    #[serde(default)]
    pub value_after: Option<f64>,
    #[serde(default)]
    pub detail: Option<String>,
    pub batch_id: String,
}

impl StateChange {
    /// Spec §8 invariant: `chapter <= book.total_chapters` and the character exists.
    /// The character-exists half is enforced by the write path (§4.8), which
    /// issues the StateChange CREATE only after the owning entity's MERGE
    /// succeeds; this helper checks the half expressible without a lookup.
    pub fn chapter_in_bounds(&self, book_total_chapters: i64) -> bool {
        self.chapter >= 1 && self.chapter <= book_total_chapters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(chapter: i64) -> StateChange {
        StateChange {
            book_id: "b1".into(),
            character_name: "Jake Thayne".into(),
            chapter,
            category: StateChangeCategory::Level,
            name: "level".into(),
            action: StateChangeAction::Gain,
            value_delta: Some(2.0),
            value_after: Some(88.0),
            detail: Some("D-grade".into()),
            batch_id: "batch-1".into(),
        }
    }

    #[test]
    fn chapter_within_total_is_in_bounds() {
        assert!(change(42).chapter_in_bounds(100));
    }

    #[test]
    fn chapter_beyond_total_is_out_of_bounds() {
        assert!(!change(101).chapter_in_bounds(100));
    }

    #[test]
    fn chapter_zero_is_out_of_bounds() {
        assert!(!change(0).chapter_in_bounds(100));
    }
}
