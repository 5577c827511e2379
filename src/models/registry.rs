use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::entity::EntityKind;

/// One known entity in a book's growing registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub canonical_name: String,
    pub entity_type: EntityKind,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub significance: String,
    pub first_seen_chapter: i64,
    pub last_seen_chapter: i64,
    #[serde(default)]
    pub description: String,
}

/// Per-book, growing catalog of known canonical entities plus aliases. Used
/// as prompt context for the next chapter's extraction passes and, merged
/// across books in a series, for cross-book reconciliation (spec §3, §4.6).
///
/// Kept as an explicit context object threaded through the pipeline rather
/// than a module-level global, per the spec's concurrency design note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRegistry {
    pub entities: BTreeMap<String, RegistryEntry>,
    pub alias_map: BTreeMap<String, String>,
    #[serde(default)]
    pub chapter_summaries: Vec<String>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn canonical_key(name: &str, kind: EntityKind) -> String {
        format!("{:?}:{}", kind, name.to_lowercase())
    }

    /// Register a canonical entity, or extend an existing entry's aliases and
    /// `last_seen_chapter` if the canonical key already exists.
    pub fn add(
        &mut self,
        canonical_name: &str,
        entity_type: EntityKind,
        aliases: &[String],
        significance: &str,
        chapter: i64,
        description: &str,
    ) {
        let key = Self::canonical_key(canonical_name, entity_type);
        self.alias_map
            .insert(canonical_name.to_lowercase(), key.clone());
        for alias in aliases {
            self.alias_map.insert(alias.to_lowercase(), key.clone());
        }

        match self.entities.get_mut(&key) {
            Some(entry) => {
                for alias in aliases {
                    if !entry.aliases.contains(alias) {
                        entry.aliases.push(alias.clone());
                    }
                }
                entry.last_seen_chapter = entry.last_seen_chapter.max(chapter);
                if entry.description.is_empty() && !description.is_empty() {
                    entry.description = description.to_string();
                }
            }
            None => {
                self.entities.insert(
                    key,
                    RegistryEntry {
                        canonical_name: canonical_name.to_string(),
                        entity_type,
                        aliases: aliases.to_vec(),
                        significance: significance.to_string(),
                        first_seen_chapter: chapter,
                        last_seen_chapter: chapter,
                        description: description.to_string(),
                    },
                );
            }
        }
    }

    /// Resolve a surface name (or alias) to its registry entry, if known.
    pub fn lookup(&self, surface_name: &str) -> Option<&RegistryEntry> {
        self.alias_map
            .get(&surface_name.to_lowercase())
            .and_then(|key| self.entities.get(key))
    }

    pub fn update_last_seen(&mut self, canonical_name: &str, entity_type: EntityKind, chapter: i64) {
        let key = Self::canonical_key(canonical_name, entity_type);
        if let Some(entry) = self.entities.get_mut(&key) {
            entry.last_seen_chapter = entry.last_seen_chapter.max(chapter);
        }
    }

    pub fn add_chapter_summary(&mut self, summary: String) {
        self.chapter_summaries.push(summary);
    }

    /// All known surface names (canonical + aliases), for the mention
    /// detector's scan vocabulary.
    pub fn get_all_names(&self) -> Vec<(String, EntityKind)> {
        self.entities
            .values()
            .flat_map(|entry| {
                std::iter::once(entry.canonical_name.clone())
                    .chain(entry.aliases.iter().cloned())
                    .map(|name| (name, entry.entity_type))
            })
            .collect()
    }

    /// Condensed context block for the next chapter's extraction prompt.
    /// Prompt text itself is out of scope; this only produces the data the
    /// (external) prompt template would interpolate.
    pub fn to_prompt_context(&self, max_entities: usize) -> Vec<String> {
        let mut entries: Vec<&RegistryEntry> = self.entities.values().collect();
        entries.sort_by(|a, b| b.last_seen_chapter.cmp(&a.last_seen_chapter));
        entries
            .into_iter()
            .take(max_entities)
            .map(|e| format!("{} ({:?}): {}", e.canonical_name, e.entity_type, e.description))
            .collect()
    }

    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("EntityRegistry always serializes")
    }

    pub fn from_dict(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Merge another registry's entries into this one — used to fold a prior
    /// book's registry into a later book's for cross-book reconciliation.
    pub fn merge(&mut self, other: &EntityRegistry) {
        for entry in other.entities.values() {
            self.add(
                &entry.canonical_name,
                entry.entity_type,
                &entry.aliases,
                &entry.significance,
                entry.first_seen_chapter,
                &entry.description,
            );
        }
        self.chapter_summaries
            .extend(other.chapter_summaries.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_all_fields() {
        let mut r = EntityRegistry::new();
        r.add(
            "Jake Thayne",
            EntityKind::Character,
            &["Jake".to_string()],
            "protagonist",
            5,
            "the primal hunter",
        );
        r.add_chapter_summary("Jake fought a slime.".to_string());

        let round_tripped = EntityRegistry::from_dict(r.to_dict()).unwrap();
        assert_eq!(r, round_tripped);
    }

    #[test]
    fn lookup_resolves_aliases() {
        let mut r = EntityRegistry::new();
        r.add(
            "Jake Thayne",
            EntityKind::Character,
            &["Jake".to_string()],
            "protagonist",
            1,
            "",
        );
        assert_eq!(r.lookup("jake").unwrap().canonical_name, "Jake Thayne");
        assert_eq!(r.lookup("Jake Thayne").unwrap().canonical_name, "Jake Thayne");
        assert!(r.lookup("nobody").is_none());
    }

    #[test]
    fn add_is_idempotent_for_last_seen_chapter() {
        let mut r = EntityRegistry::new();
        r.add("Jake Thayne", EntityKind::Character, &[], "", 5, "");
        r.add("Jake Thayne", EntityKind::Character, &[], "", 3, "");
        assert_eq!(r.entities.len(), 1);
        assert_eq!(
            r.entities.values().next().unwrap().last_seen_chapter,
            5,
            "last_seen_chapter should never move backwards"
        );
    }

    #[test]
    fn merge_combines_entities_and_summaries() {
        let mut prior = EntityRegistry::new();
        prior.add("Jake Thayne", EntityKind::Character, &[], "", 1, "");
        prior.add_chapter_summary("book 1 summary".into());

        let mut current = EntityRegistry::new();
        current.merge(&prior);

        assert!(current.lookup("jake thayne").is_some());
        assert_eq!(current.chapter_summaries, vec!["book 1 summary".to_string()]);
    }
}
