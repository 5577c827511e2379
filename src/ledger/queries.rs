//! State-reconstruction queries (spec §4.11). A character's present-tense
//! sheet is never stored directly — it's folded from the StateChange ledger
//! (for stats/levels) or read off temporal relationship edges (for
//! skills/classes/titles/items) at query time.
//!
//! Each query is split the way the teacher splits its arc-tracking service:
//! a thin async fetch through [`GraphStore`], then a pure function over the
//! fetched rows that does the actual folding. The pure half is what's worth
//! unit-testing without a database.

use std::collections::BTreeMap;

use crate::graph::GraphStore;
use crate::models::relationship::RelationshipKind;
use crate::models::state_change::{StateChange, StateChangeCategory};
use crate::WorldRagError;

#[derive(Debug, Clone, PartialEq)]
pub struct StatSnapshot {
    pub name: String,
    pub value: f64,
    pub last_changed_chapter: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelSnapshot {
    pub level: Option<f64>,
    pub realm: String,
    pub since_chapter: Option<i64>,
}

impl Default for LevelSnapshot {
    fn default() -> Self {
        LevelSnapshot { level: None, realm: String::new(), since_chapter: None }
    }
}

pub struct ProgressionPage {
    pub changes: Vec<StateChange>,
    pub total: usize,
}

/// Folds every `category = stat` StateChange at or before `chapter` into a
/// running per-stat total, per spec §4.11.
pub async fn stats_at(
    graph: &dyn GraphStore,
    book_id: &str,
    character: &str,
    chapter: i64,
) -> Result<Vec<StatSnapshot>, WorldRagError> {
    let changes = graph.state_changes_for_character(book_id, character, chapter).await?;
    Ok(fold_stats(&changes))
}

fn fold_stats(changes: &[StateChange]) -> Vec<StatSnapshot> {
    let mut totals: BTreeMap<String, (f64, i64)> = BTreeMap::new();
    for change in changes {
        if change.category != StateChangeCategory::Stat {
            continue;
        }
        let entry = totals.entry(change.name.clone()).or_insert((0.0, change.chapter));
        entry.0 += change.value_delta.unwrap_or(0.0);
        entry.1 = entry.1.max(change.chapter);
    }
    totals
        .into_iter()
        .map(|(name, (value, last_changed_chapter))| StatSnapshot { name, value, last_changed_chapter })
        .collect()
}

/// The latest `category = level` StateChange at or before `chapter`, per spec §4.11.
pub async fn level_at(
    graph: &dyn GraphStore,
    book_id: &str,
    character: &str,
    chapter: i64,
) -> Result<LevelSnapshot, WorldRagError> {
    let changes = graph.state_changes_for_character(book_id, character, chapter).await?;
    Ok(fold_level(&changes))
}

fn fold_level(changes: &[StateChange]) -> LevelSnapshot {
    changes
        .iter()
        .filter(|c| c.category == StateChangeCategory::Level)
        .max_by_key(|c| c.chapter)
        .map(|c| LevelSnapshot {
            level: c.value_after,
            realm: c.detail.clone().unwrap_or_default(),
            since_chapter: Some(c.chapter),
        })
        .unwrap_or_default()
}

async fn owned_names_at(
    graph: &dyn GraphStore,
    book_id: &str,
    character: &str,
    chapter: i64,
    kind: RelationshipKind,
) -> Result<Vec<String>, WorldRagError> {
    let edges = graph.relationships_for_owner(book_id, character, kind).await?;
    Ok(fold_temporal_owned(&edges, chapter))
}

/// Edges valid at `chapter`: `valid_from_chapter <= chapter AND (valid_to_chapter
/// IS NULL OR valid_to_chapter > chapter)`, per spec §4.11.
fn fold_temporal_owned(edges: &[crate::models::relationship::Relationship], chapter: i64) -> Vec<String> {
    edges
        .iter()
        .filter(|e| e.valid_from_chapter.map(|from| from <= chapter).unwrap_or(false))
        .filter(|e| e.valid_to_chapter.map(|to| to > chapter).unwrap_or(true))
        .map(|e| e.target.clone())
        .collect()
}

pub async fn skills_at(graph: &dyn GraphStore, book_id: &str, character: &str, chapter: i64) -> Result<Vec<String>, WorldRagError> {
    owned_names_at(graph, book_id, character, chapter, RelationshipKind::HasSkill).await
}

pub async fn classes_at(graph: &dyn GraphStore, book_id: &str, character: &str, chapter: i64) -> Result<Vec<String>, WorldRagError> {
    owned_names_at(graph, book_id, character, chapter, RelationshipKind::HasClass).await
}

pub async fn titles_at(graph: &dyn GraphStore, book_id: &str, character: &str, chapter: i64) -> Result<Vec<String>, WorldRagError> {
    owned_names_at(graph, book_id, character, chapter, RelationshipKind::HasTitle).await
}

pub async fn items_at(graph: &dyn GraphStore, book_id: &str, character: &str, chapter: i64) -> Result<Vec<String>, WorldRagError> {
    owned_names_at(graph, book_id, character, chapter, RelationshipKind::Possesses).await
}

/// Every StateChange in `(from, to]`, per spec §4.11.
pub async fn changes_between(
    graph: &dyn GraphStore,
    book_id: &str,
    character: &str,
    from: i64,
    to: i64,
) -> Result<Vec<StateChange>, WorldRagError> {
    let changes = graph.state_changes_for_character(book_id, character, to).await?;
    Ok(filter_between(changes, from, to))
}

fn filter_between(changes: Vec<StateChange>, from: i64, to: i64) -> Vec<StateChange> {
    changes.into_iter().filter(|c| c.chapter > from && c.chapter <= to).collect()
}

/// Paginated ledger slice plus total count, optionally filtered to one
/// category, per spec §4.11. `up_to_chapter` of `i64::MAX` effectively reads
/// the full ledger through [`GraphStore::state_changes_for_character`].
pub async fn progression_milestones(
    graph: &dyn GraphStore,
    book_id: &str,
    character: &str,
    category: Option<StateChangeCategory>,
    offset: usize,
    limit: usize,
) -> Result<ProgressionPage, WorldRagError> {
    let mut changes = graph.state_changes_for_character(book_id, character, i64::MAX).await?;
    if let Some(category) = category {
        changes.retain(|c| c.category == category);
    }
    let total = changes.len();
    let page = changes.into_iter().skip(offset).take(limit).collect();
    Ok(ProgressionPage { changes: page, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::relationship::Relationship;
    use crate::models::state_change::StateChangeAction;

    fn stat_change(name: &str, chapter: i64, delta: f64) -> StateChange {
        StateChange {
            book_id: "b1".into(),
            character_name: "Jake Thayne".into(),
            chapter,
            category: StateChangeCategory::Stat,
            name: name.into(),
            action: if delta >= 0.0 { StateChangeAction::Gain } else { StateChangeAction::Lose },
            value_delta: Some(delta),
            value_after: None,
            detail: None,
            batch_id: "batch-1".into(),
        }
    }

    fn level_change(chapter: i64, value_after: f64, realm: &str) -> StateChange {
        StateChange {
            book_id: "b1".into(),
            character_name: "Jake Thayne".into(),
            chapter,
            category: StateChangeCategory::Level,
            name: "level".into(),
            action: StateChangeAction::Gain,
            value_delta: None,
            value_after: Some(value_after),
            detail: Some(realm.into()),
            batch_id: "batch-1".into(),
        }
    }

    #[test]
    fn fold_stats_sums_deltas_per_name_up_to_latest_chapter() {
        let changes = vec![stat_change("Perception", 5, 2.0), stat_change("Perception", 20, 1.0), stat_change("Strength", 5, 3.0)];
        let snapshots = fold_stats(&changes);
        let perception = snapshots.iter().find(|s| s.name == "Perception").unwrap();
        assert_eq!(perception.value, 3.0);
        assert_eq!(perception.last_changed_chapter, 20);
    }

    #[test]
    fn fold_level_picks_latest_chapter_entry() {
        let changes = vec![level_change(5, 40.0, "E-grade"), level_change(42, 88.0, "D-grade")];
        let snapshot = fold_level(&changes);
        assert_eq!(snapshot.level, Some(88.0));
        assert_eq!(snapshot.realm, "D-grade");
        assert_eq!(snapshot.since_chapter, Some(42));
    }

    #[test]
    fn fold_level_defaults_when_no_level_changes() {
        let snapshot = fold_level(&[]);
        assert_eq!(snapshot, LevelSnapshot::default());
    }

    fn temporal_edge(target: &str, from: i64, to: Option<i64>) -> Relationship {
        Relationship {
            book_id: "b1".into(),
            kind: RelationshipKind::HasSkill,
            source: "Jake Thayne".into(),
            target: target.into(),
            rel_subtype: String::new(),
            context: String::new(),
            valid_from_chapter: Some(from),
            valid_to_chapter: to,
            value: None,
            batch_id: "batch-1".into(),
        }
    }

    #[test]
    fn fold_temporal_owned_excludes_edges_not_yet_valid() {
        let edges = vec![temporal_edge("Basic Archery", 5, None), temporal_edge("Mana Manipulation", 50, None)];
        let owned = fold_temporal_owned(&edges, 10);
        assert_eq!(owned, vec!["Basic Archery".to_string()]);
    }

    #[test]
    fn fold_temporal_owned_excludes_edges_closed_before_query_chapter() {
        let edges = vec![temporal_edge("Old Skill", 1, Some(5))];
        assert!(fold_temporal_owned(&edges, 10).is_empty());
        assert_eq!(fold_temporal_owned(&edges, 3), vec!["Old Skill".to_string()]);
    }

    #[test]
    fn filter_between_is_exclusive_of_from_and_inclusive_of_to() {
        let changes = vec![stat_change("a", 5, 1.0), stat_change("a", 10, 1.0), stat_change("a", 11, 1.0)];
        let filtered = filter_between(changes, 5, 10);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].chapter, 10);
    }
}
