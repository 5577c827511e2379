use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of entity types the core extracts. Series-specific types
/// (`Bloodline`, `Profession`, `PrimordialChurch`) are part of the same closed
/// set, not an open extension point — new series types require a code change,
/// matching the "closed algebraic type" design note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Skill,
    Class,
    Title,
    Event,
    Location,
    Item,
    Creature,
    Faction,
    Concept,
    Bloodline,
    Profession,
    PrimordialChurch,
}

impl EntityKind {
    /// The identity invariant from spec §3: `canonical_name` is the MERGE key
    /// for Characters, `name` for everything else.
    pub fn merge_key_field(self) -> &'static str {
        match self {
            EntityKind::Character => "canonical_name",
            _ => "name",
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::Character => "character",
            EntityKind::Skill => "skill",
            EntityKind::Class => "class",
            EntityKind::Title => "title",
            EntityKind::Event => "event",
            EntityKind::Location => "location",
            EntityKind::Item => "item",
            EntityKind::Creature => "creature",
            EntityKind::Faction => "faction",
            EntityKind::Concept => "concept",
            EntityKind::Bloodline => "bloodline",
            EntityKind::Profession => "profession",
            EntityKind::PrimordialChurch => "primordial_church",
        }
    }

    /// Whether this kind's ownership edge is a temporal relationship (carries
    /// `valid_from_chapter`/`valid_to_chapter`), per spec §3.
    pub fn has_temporal_ownership(self) -> bool {
        matches!(
            self,
            EntityKind::Skill
                | EntityKind::Class
                | EntityKind::Title
                | EntityKind::Item
                | EntityKind::Bloodline
                | EntityKind::Profession
        )
    }

    /// Inverse of [`Self::table_name`], used when reading back a row whose
    /// kind is only known from which table it came from (e.g. a graph
    /// traversal across the closed entity-kind set).
    pub fn from_table_name(table_name: &str) -> Option<Self> {
        Some(match table_name {
            "character" => EntityKind::Character,
            "skill" => EntityKind::Skill,
            "class" => EntityKind::Class,
            "title" => EntityKind::Title,
            "event" => EntityKind::Event,
            "location" => EntityKind::Location,
            "item" => EntityKind::Item,
            "creature" => EntityKind::Creature,
            "faction" => EntityKind::Faction,
            "concept" => EntityKind::Concept,
            "bloodline" => EntityKind::Bloodline,
            "profession" => EntityKind::Profession,
            "primordial_church" => EntityKind::PrimordialChurch,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterStatus {
    Alive,
    Dead,
    Unknown,
    Transformed,
}

impl Default for CharacterStatus {
    fn default() -> Self {
        CharacterStatus::Alive
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub book_id: String,
    pub name: String,
    pub canonical_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub species: String,
    #[serde(default)]
    pub status: CharacterStatus,
    #[serde(default)]
    pub last_seen_chapter: Option<i64>,
    #[serde(default)]
    pub level: Option<i64>,
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
}

/// Persisted record for every non-Character entity kind. Kind-specific fields
/// that aren't part of the spec's universal shape (e.g. `item_type`, `rank`,
/// `tier`) live in `attributes`, matched against the ontology's enum
/// constraints rather than hardcoded as Rust fields for every kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub book_id: String,
    pub name: String,
    pub canonical_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Action,
    StateChange,
    Achievement,
    Process,
    Dialogue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    Minor,
    Moderate,
    Major,
    Critical,
    ArcDefining,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub book_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub event_type: EventType,
    pub significance: Significance,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub chapter: i64,
    #[serde(default)]
    pub is_flashback: bool,
    #[serde(default)]
    pub causes: Vec<String>,
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
}
