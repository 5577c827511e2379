use serde::{Deserialize, Serialize};

/// The 13 relationship kinds named in spec §3. `Mentioned`/`FirstMentioned`
/// and `StateChanged` are represented by their own edge types ([`crate::models::mention::Mention`]
/// and the StateChange ledger link respectively) and are not constructed
/// through this type, but are listed here for completeness of the closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    HasSkill,
    HasClass,
    HasTitle,
    Possesses,
    HasStat,
    RelatesTo,
    ParticipatesIn,
    OccursAt,
    LocationPartOf,
    MentionedIn,
    FirstMentionedIn,
    StateChanged,
    GrantsSkill,
}

impl RelationshipKind {
    /// Temporal edges carry `valid_from_chapter` (required) and
    /// `valid_to_chapter` (optional, null = still valid), per spec §3.
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            RelationshipKind::HasSkill
                | RelationshipKind::HasClass
                | RelationshipKind::HasTitle
                | RelationshipKind::Possesses
                | RelationshipKind::RelatesTo
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub book_id: String,
    pub kind: RelationshipKind,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub rel_subtype: String,
    #[serde(default)]
    pub context: String,
    /// Required when `kind.is_temporal()`.
    #[serde(default)]
    pub valid_from_chapter: Option<i64>,
    #[serde(default)]
    pub valid_to_chapter: Option<i64>,
    /// Accumulated delta carried by `HasStat` edges; unused otherwise.
    #[serde(default)]
    pub value: Option<f64>,
    pub batch_id: String,
}

impl Relationship {
    /// Spec §3 invariant: `valid_from_chapter <= valid_to_chapter` when both present.
    pub fn respects_temporal_ordering(&self) -> bool {
        match (self.valid_from_chapter, self.valid_to_chapter) {
            (Some(from), Some(to)) => from <= to,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(kind: RelationshipKind, from: Option<i64>, to: Option<i64>) -> Relationship {
        Relationship {
            book_id: "b1".into(),
            kind,
            source: "a".into(),
            target: "b".into(),
            rel_subtype: String::new(),
            context: String::new(),
            valid_from_chapter: from,
            valid_to_chapter: to,
            value: None,
            batch_id: "batch-1".into(),
        }
    }

    #[test]
    fn temporal_ordering_rejects_inverted_range() {
        let r = rel(RelationshipKind::HasSkill, Some(10), Some(5));
        assert!(!r.respects_temporal_ordering());
    }

    #[test]
    fn temporal_ordering_accepts_open_ended_range() {
        let r = rel(RelationshipKind::HasSkill, Some(10), None);
        assert!(r.respects_temporal_ordering());
    }

    #[test]
    fn only_named_kinds_are_temporal() {
        assert!(RelationshipKind::HasClass.is_temporal());
        assert!(!RelationshipKind::ParticipatesIn.is_temporal());
        assert!(!RelationshipKind::HasStat.is_temporal());
    }
}
