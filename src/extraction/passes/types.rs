use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which ontology layer produced an extracted value, carried through so
/// downstream reconciliation can prefer series-specific terms over generic
/// genre ones. Mirrors `BaseExtractedEntity.extraction_layer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionLayer {
    Narrative,
    Genre,
    Series,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatSource {
    BlueBox,
    Narrative,
    Inferred,
}

impl Default for StatSource {
    fn default() -> Self {
        StatSource::BlueBox
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedStatBlock {
    pub character_name: String,
    pub stats: BTreeMap<String, i64>,
    pub total: Option<i64>,
    #[serde(default)]
    pub source: StatSource,
    pub chapter_number: i64,
}

// ── Pass 1: Characters & Relationships ──────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedRelationship {
    pub source: String,
    pub target: String,
    /// ally, enemy, mentor, family, romantic, rival, patron, subordinate.
    pub rel_type: String,
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub context: String,
    pub since_chapter: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedCharacter {
    pub name: String,
    #[serde(default)]
    pub canonical_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub species: String,
    pub first_appearance_chapter: Option<i64>,
    #[serde(default = "default_status")]
    pub status: String,
    pub last_seen_chapter: Option<i64>,
    pub evolution_of: Option<String>,
}

fn default_role() -> String {
    "minor".to_string()
}

fn default_status() -> String {
    "alive".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterExtractionResult {
    #[serde(default)]
    pub characters: Vec<ExtractedCharacter>,
    #[serde(default)]
    pub relationships: Vec<ExtractedRelationship>,
}

// ── Pass 2: Systems & Progression ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedSkill {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_skill_type")]
    pub skill_type: String,
    #[serde(default)]
    pub rank: String,
    #[serde(default)]
    pub owner: String,
    pub acquired_chapter: Option<i64>,
}

fn default_skill_type() -> String {
    "active".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedClass {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tier: Option<i64>,
    #[serde(default)]
    pub owner: String,
    pub acquired_chapter: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedTitle {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default)]
    pub owner: String,
    pub acquired_chapter: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedLevelChange {
    pub character: String,
    pub old_level: Option<i64>,
    pub new_level: Option<i64>,
    #[serde(default)]
    pub realm: String,
    pub chapter: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedStatChange {
    #[serde(default)]
    pub character: String,
    pub stat_name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemExtractionResult {
    #[serde(default)]
    pub skills: Vec<ExtractedSkill>,
    #[serde(default)]
    pub classes: Vec<ExtractedClass>,
    #[serde(default)]
    pub titles: Vec<ExtractedTitle>,
    #[serde(default)]
    pub level_changes: Vec<ExtractedLevelChange>,
    #[serde(default)]
    pub stat_changes: Vec<ExtractedStatChange>,
}

// ── Pass 3: Events & Timeline ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEvent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default = "default_significance")]
    pub significance: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub location: String,
    pub chapter: Option<i64>,
    #[serde(default)]
    pub is_flashback: bool,
    #[serde(default)]
    pub causes: Vec<String>,
}

fn default_event_type() -> String {
    "action".to_string()
}

fn default_significance() -> String {
    "moderate".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventExtractionResult {
    #[serde(default)]
    pub events: Vec<ExtractedEvent>,
}

// ── Pass 4: Lore & Worldbuilding ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedLocation {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_location_type")]
    pub location_type: String,
    #[serde(default)]
    pub parent_location: String,
}

fn default_location_type() -> String {
    "region".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_item_type")]
    pub item_type: String,
    #[serde(default)]
    pub rarity: String,
    #[serde(default)]
    pub owner: String,
}

fn default_item_type() -> String {
    "key_item".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedCreature {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub species: String,
    #[serde(default)]
    pub threat_level: String,
    #[serde(default)]
    pub habitat: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedFaction {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub faction_type: String,
    #[serde(default)]
    pub alignment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedConcept {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub domain: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoreExtractionResult {
    #[serde(default)]
    pub locations: Vec<ExtractedLocation>,
    #[serde(default)]
    pub items: Vec<ExtractedItem>,
    #[serde(default)]
    pub creatures: Vec<ExtractedCreature>,
    #[serde(default)]
    pub factions: Vec<ExtractedFaction>,
    #[serde(default)]
    pub concepts: Vec<ExtractedConcept>,
}

// ── Grounding ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedEntity {
    pub entity_type: String,
    pub entity_name: String,
    pub extraction_text: String,
    pub char_offset_start: usize,
    pub char_offset_end: usize,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub pass_name: String,
    #[serde(default = "default_alignment_status")]
    pub alignment_status: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_alignment_status() -> String {
    "exact".to_string()
}

fn default_confidence() -> f64 {
    1.0
}

// ── Unified extraction result ───────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChapterExtractionResult {
    pub book_id: String,
    pub chapter_number: i64,
    #[serde(default)]
    pub characters: CharacterExtractionResult,
    #[serde(default)]
    pub systems: SystemExtractionResult,
    #[serde(default)]
    pub events: EventExtractionResult,
    #[serde(default)]
    pub lore: LoreExtractionResult,
    /// Only present for series with a registered Layer-3 pattern set (spec §4.2).
    #[serde(default)]
    pub series: Option<Layer3ExtractionResult>,
    #[serde(default)]
    pub grounded_entities: Vec<GroundedEntity>,
    #[serde(default)]
    pub alias_map: BTreeMap<String, String>,
    #[serde(default)]
    pub total_entities: usize,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub passes_completed: Vec<String>,
}

impl ChapterExtractionResult {
    /// Recounts and stores the total entity count across all passes.
    pub fn count_entities(&mut self) -> usize {
        let count = self.characters.characters.len()
            + self.characters.relationships.len()
            + self.systems.skills.len()
            + self.systems.classes.len()
            + self.systems.titles.len()
            + self.systems.level_changes.len()
            + self.systems.stat_changes.len()
            + self.events.events.len()
            + self.lore.locations.len()
            + self.lore.items.len()
            + self.lore.creatures.len()
            + self.lore.factions.len()
            + self.lore.concepts.len()
            + self
                .series
                .as_ref()
                .map(|s| s.bloodlines.len() + s.professions.len() + s.churches.len())
                .unwrap_or(0);
        self.total_entities = count;
        count
    }
}

// ── Reconciliation ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMergeCandidate {
    pub entity_a_name: String,
    pub entity_b_name: String,
    pub entity_type: String,
    pub confidence: f64,
    pub canonical_name: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationResult {
    #[serde(default)]
    pub merges: Vec<EntityMergeCandidate>,
    #[serde(default)]
    pub alias_map: BTreeMap<String, String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
}

// ── Provenance ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillProvenance {
    pub skill_name: String,
    #[serde(default = "default_source_type")]
    pub source_type: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default = "default_provenance_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub context: String,
}

fn default_source_type() -> String {
    "unknown".to_string()
}

fn default_provenance_confidence() -> f64 {
    0.5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvenanceResult {
    #[serde(default)]
    pub provenances: Vec<SkillProvenance>,
}

// ── Layer 3: Series-specific entities ────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedBloodline {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub owner: String,
    pub awakened_chapter: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedProfession {
    pub name: String,
    pub tier: Option<i64>,
    #[serde(default)]
    pub profession_type: String,
    #[serde(default)]
    pub owner: String,
    pub acquired_chapter: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedChurch {
    pub deity_name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub blessing: String,
    #[serde(default)]
    pub worshipper: String,
    pub valid_from_chapter: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Layer3ExtractionResult {
    #[serde(default)]
    pub bloodlines: Vec<ExtractedBloodline>,
    #[serde(default)]
    pub professions: Vec<ExtractedProfession>,
    #[serde(default)]
    pub churches: Vec<ExtractedChurch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_entities_sums_all_passes() {
        let mut result = ChapterExtractionResult {
            book_id: "b1".into(),
            chapter_number: 1,
            ..Default::default()
        };
        result.characters.characters.push(ExtractedCharacter {
            name: "Jake".into(),
            canonical_name: "Jake Thayne".into(),
            aliases: vec![],
            description: "".into(),
            role: default_role(),
            species: "".into(),
            first_appearance_chapter: Some(1),
            status: default_status(),
            last_seen_chapter: None,
            evolution_of: None,
        });
        result.events.events.push(ExtractedEvent {
            name: "fight".into(),
            description: "".into(),
            event_type: default_event_type(),
            significance: default_significance(),
            participants: vec![],
            location: "".into(),
            chapter: Some(1),
            is_flashback: false,
            causes: vec![],
        });
        assert_eq!(result.count_entities(), 2);
        assert_eq!(result.total_entities, 2);
    }
}
