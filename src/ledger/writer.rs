//! Write path (spec §4.8): entity upsert plus the paired StateChange
//! dual-write. Writes one chapter in the order the spec fixes — characters,
//! then their relationships, then every other entity type fanned out
//! concurrently — and pairs every progression-relevant upsert with a
//! StateChange record sharing the same `batch_id`.
//!
//! [`write_owned_entities`] is the single dispatch point for the seven
//! "entity with an owner" kinds (skill/class/title/item/bloodline/profession/
//! primordial_church): a closed set, described by a small per-kind table
//! rather than duplicated per-type write functions. Churches have no
//! StateChange category (spec §3 defines none), so they pass `category:
//! None` and only the entity upsert runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::extraction::passes::types::{
    ChapterExtractionResult, ExtractedBloodline, ExtractedChurch, ExtractedClass, ExtractedItem,
    ExtractedLocation, ExtractedProfession, ExtractedSkill, ExtractedTitle,
};
use crate::graph::GraphStore;
use crate::models::entity::{Character, CharacterStatus, EntityKind, EntityRecord, Event, EventType, Significance};
use crate::models::relationship::{Relationship, RelationshipKind};
use crate::models::state_change::{StateChange, StateChangeAction, StateChangeCategory};
use crate::WorldRagError;

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteCounts {
    pub entities: usize,
    pub relationships: usize,
    pub state_changes: usize,
}

impl std::ops::AddAssign for WriteCounts {
    fn add_assign(&mut self, other: Self) {
        self.entities += other.entities;
        self.relationships += other.relationships;
        self.state_changes += other.state_changes;
    }
}

/// Writes one reconciled, filtered chapter result to the graph, in the
/// fixed order spec §4.8 and §5 require: characters, then their
/// relationships, then every other type fanned out concurrently.
pub async fn write_chapter(
    graph: &dyn GraphStore,
    result: &ChapterExtractionResult,
    batch_id: &str,
) -> Result<WriteCounts, WorldRagError> {
    let now = Utc::now();
    let mut counts = WriteCounts::default();

    counts.entities += write_characters(graph, result, batch_id, now).await?;
    counts.relationships += write_character_relationships(graph, result, batch_id).await?;

    let (skills, classes, titles, items, bloodlines, professions, churches, level_stat, events, lore) = tokio::try_join!(
        write_owned_entities(
            graph,
            EntityKind::Skill,
            result.systems.skills.iter().map(skill_descriptor).collect(),
            Some(RelationshipKind::HasSkill),
            Some(StateChangeCategory::Skill),
            result,
            batch_id,
            now,
        ),
        write_owned_entities(
            graph,
            EntityKind::Class,
            result.systems.classes.iter().map(class_descriptor).collect(),
            Some(RelationshipKind::HasClass),
            Some(StateChangeCategory::Class),
            result,
            batch_id,
            now,
        ),
        write_owned_entities(
            graph,
            EntityKind::Title,
            result.systems.titles.iter().map(title_descriptor).collect(),
            Some(RelationshipKind::HasTitle),
            Some(StateChangeCategory::Title),
            result,
            batch_id,
            now,
        ),
        write_owned_entities(
            graph,
            EntityKind::Item,
            result.lore.items.iter().map(item_descriptor).collect(),
            Some(RelationshipKind::Possesses),
            Some(StateChangeCategory::Item),
            result,
            batch_id,
            now,
        ),
        write_owned_entities(
            graph,
            EntityKind::Bloodline,
            result
                .series
                .iter()
                .flat_map(|s| s.bloodlines.iter())
                .map(bloodline_descriptor)
                .collect(),
            None,
            Some(StateChangeCategory::Bloodline),
            result,
            batch_id,
            now,
        ),
        write_owned_entities(
            graph,
            EntityKind::Profession,
            result
                .series
                .iter()
                .flat_map(|s| s.professions.iter())
                .map(profession_descriptor)
                .collect(),
            None,
            Some(StateChangeCategory::Profession),
            result,
            batch_id,
            now,
        ),
        write_owned_entities(
            graph,
            EntityKind::PrimordialChurch,
            result
                .series
                .iter()
                .flat_map(|s| s.churches.iter())
                .map(church_descriptor)
                .collect(),
            None,
            None,
            result,
            batch_id,
            now,
        ),
        write_level_and_stat_changes(graph, result, batch_id),
        write_events(graph, result, batch_id, now),
        write_lore(graph, result, batch_id, now),
    )?;

    for group in [skills, classes, titles, items, bloodlines, professions, churches] {
        counts += group;
    }
    counts.state_changes += level_stat;
    counts += events;
    counts += lore;

    Ok(counts)
}

async fn write_characters(
    graph: &dyn GraphStore,
    result: &ChapterExtractionResult,
    batch_id: &str,
    now: DateTime<Utc>,
) -> Result<usize, WorldRagError> {
    let mut written = 0;
    for extracted in &result.characters.characters {
        let character = Character {
            book_id: result.book_id.clone(),
            name: extracted.name.clone(),
            canonical_name: if extracted.canonical_name.is_empty() {
                extracted.name.clone()
            } else {
                extracted.canonical_name.clone()
            },
            aliases: extracted.aliases.clone(),
            description: extracted.description.clone(),
            role: extracted.role.clone(),
            species: extracted.species.clone(),
            status: parse_character_status(&extracted.status),
            last_seen_chapter: extracted.last_seen_chapter.or(Some(result.chapter_number)),
            level: None,
            batch_id: batch_id.to_string(),
            created_at: now,
        };
        graph.upsert_character(character).await?;
        written += 1;
    }
    Ok(written)
}

fn parse_character_status(status: &str) -> CharacterStatus {
    match status.to_lowercase().as_str() {
        "dead" => CharacterStatus::Dead,
        "transformed" => CharacterStatus::Transformed,
        "unknown" => CharacterStatus::Unknown,
        _ => CharacterStatus::Alive,
    }
}

async fn write_character_relationships(
    graph: &dyn GraphStore,
    result: &ChapterExtractionResult,
    batch_id: &str,
) -> Result<usize, WorldRagError> {
    if result.characters.relationships.is_empty() {
        return Ok(0);
    }
    let relationships: Vec<Relationship> = result
        .characters
        .relationships
        .iter()
        .map(|r| Relationship {
            book_id: result.book_id.clone(),
            kind: RelationshipKind::RelatesTo,
            source: r.source.clone(),
            target: r.target.clone(),
            rel_subtype: if r.subtype.is_empty() { r.rel_type.clone() } else { format!("{}:{}", r.rel_type, r.subtype) },
            context: r.context.clone(),
            valid_from_chapter: Some(r.since_chapter.unwrap_or(result.chapter_number)),
            valid_to_chapter: None,
            value: None,
            batch_id: batch_id.to_string(),
        })
        .collect();
    let count = relationships.len();
    graph.create_relationships(relationships).await?;
    Ok(count)
}

/// The common shape every "entity with an owner" upsert reduces to, ahead of
/// dispatch through [`write_owned_entities`].
struct OwnedEntityDescriptor {
    name: String,
    description: String,
    attributes: BTreeMap<String, String>,
    owner: String,
    valid_from_chapter: Option<i64>,
}

fn skill_descriptor(s: &ExtractedSkill) -> OwnedEntityDescriptor {
    OwnedEntityDescriptor {
        name: s.name.clone(),
        description: s.description.clone(),
        attributes: BTreeMap::from([("skill_type".to_string(), s.skill_type.clone()), ("rank".to_string(), s.rank.clone())]),
        owner: s.owner.clone(),
        valid_from_chapter: s.acquired_chapter,
    }
}

fn class_descriptor(c: &ExtractedClass) -> OwnedEntityDescriptor {
    OwnedEntityDescriptor {
        name: c.name.clone(),
        description: c.description.clone(),
        attributes: c.tier.map(|t| BTreeMap::from([("tier".to_string(), t.to_string())])).unwrap_or_default(),
        owner: c.owner.clone(),
        valid_from_chapter: c.acquired_chapter,
    }
}

fn title_descriptor(t: &ExtractedTitle) -> OwnedEntityDescriptor {
    OwnedEntityDescriptor {
        name: t.name.clone(),
        description: t.description.clone(),
        attributes: BTreeMap::from([("effects".to_string(), t.effects.join("; "))]),
        owner: t.owner.clone(),
        valid_from_chapter: t.acquired_chapter,
    }
}

fn item_descriptor(i: &ExtractedItem) -> OwnedEntityDescriptor {
    OwnedEntityDescriptor {
        name: i.name.clone(),
        description: i.description.clone(),
        attributes: BTreeMap::from([("item_type".to_string(), i.item_type.clone()), ("rarity".to_string(), i.rarity.clone())]),
        owner: i.owner.clone(),
        valid_from_chapter: None,
    }
}

fn bloodline_descriptor(b: &ExtractedBloodline) -> OwnedEntityDescriptor {
    OwnedEntityDescriptor {
        name: b.name.clone(),
        description: b.description.clone(),
        attributes: BTreeMap::from([("effects".to_string(), b.effects.join("; ")), ("origin".to_string(), b.origin.clone())]),
        owner: b.owner.clone(),
        valid_from_chapter: b.awakened_chapter,
    }
}

fn profession_descriptor(p: &ExtractedProfession) -> OwnedEntityDescriptor {
    OwnedEntityDescriptor {
        name: p.name.clone(),
        description: String::new(),
        attributes: BTreeMap::from([
            ("profession_type".to_string(), p.profession_type.clone()),
            ("tier".to_string(), p.tier.map(|t| t.to_string()).unwrap_or_default()),
        ]),
        owner: p.owner.clone(),
        valid_from_chapter: p.acquired_chapter,
    }
}

fn church_descriptor(c: &ExtractedChurch) -> OwnedEntityDescriptor {
    OwnedEntityDescriptor {
        name: c.deity_name.clone(),
        description: c.blessing.clone(),
        attributes: BTreeMap::from([("domain".to_string(), c.domain.clone())]),
        owner: c.worshipper.clone(),
        valid_from_chapter: c.valid_from_chapter,
    }
}

/// Upserts every descriptor's entity, and — only for owners that are
/// non-empty — writes the temporal ownership edge (when `relationship_kind`
/// is `Some`, per the closed set in [`RelationshipKind`]) and the paired
/// StateChange record (when `category` is `Some` — churches have no
/// StateChange category per spec §3, so they upsert the entity only).
/// Owners left empty skip both the relationship and the StateChange write,
/// per spec §4.8.
async fn write_owned_entities(
    graph: &dyn GraphStore,
    kind: EntityKind,
    descriptors: Vec<OwnedEntityDescriptor>,
    relationship_kind: Option<RelationshipKind>,
    category: Option<StateChangeCategory>,
    result: &ChapterExtractionResult,
    batch_id: &str,
    now: DateTime<Utc>,
) -> Result<WriteCounts, WorldRagError> {
    let mut counts = WriteCounts::default();
    let mut relationships = Vec::new();
    let mut state_changes = Vec::new();

    for descriptor in descriptors {
        let entity = EntityRecord {
            kind,
            book_id: result.book_id.clone(),
            name: descriptor.name.clone(),
            canonical_name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            attributes: descriptor.attributes.clone(),
            batch_id: batch_id.to_string(),
            created_at: now,
        };
        graph.upsert_entity(entity).await?;
        counts.entities += 1;

        if descriptor.owner.is_empty() {
            continue;
        }

        if let Some(relationship_kind) = relationship_kind {
            relationships.push(Relationship {
                book_id: result.book_id.clone(),
                kind: relationship_kind,
                source: descriptor.owner.clone(),
                target: descriptor.name.clone(),
                rel_subtype: String::new(),
                context: String::new(),
                valid_from_chapter: Some(descriptor.valid_from_chapter.unwrap_or(result.chapter_number)),
                valid_to_chapter: None,
                value: None,
                batch_id: batch_id.to_string(),
            });
        }

        let Some(category) = category else {
            continue;
        };
        let action = if category == StateChangeCategory::Bloodline { StateChangeAction::Awaken } else { StateChangeAction::Acquire };
        state_changes.push(StateChange {
            book_id: result.book_id.clone(),
            character_name: descriptor.owner,
            chapter: result.chapter_number,
            category,
            name: descriptor.name,
            action,
            value_delta: None,
            value_after: None,
            detail: None,
            batch_id: batch_id.to_string(),
        });
    }

    if !relationships.is_empty() {
        counts.relationships += relationships.len();
        graph.create_relationships(relationships).await?;
    }
    if !state_changes.is_empty() {
        counts.state_changes += state_changes.len();
        graph.append_state_changes(state_changes).await?;
    }
    Ok(counts)
}

async fn write_level_and_stat_changes(
    graph: &dyn GraphStore,
    result: &ChapterExtractionResult,
    batch_id: &str,
) -> Result<usize, WorldRagError> {
    let mut changes = Vec::new();
    for level_change in &result.systems.level_changes {
        let (old, new) = (level_change.old_level, level_change.new_level);
        changes.push(StateChange {
            book_id: result.book_id.clone(),
            character_name: level_change.character.clone(),
            chapter: level_change.chapter.unwrap_or(result.chapter_number),
            category: StateChangeCategory::Level,
            name: "level".to_string(),
            action: StateChangeAction::Gain,
            value_delta: match (old, new) {
                (Some(old), Some(new)) => Some((new - old) as f64),
                _ => None,
            },
            value_after: new.map(|n| n as f64),
            detail: if level_change.realm.is_empty() { None } else { Some(level_change.realm.clone()) },
            batch_id: batch_id.to_string(),
        });
    }
    for stat_change in &result.systems.stat_changes {
        if stat_change.character.is_empty() {
            continue;
        }
        changes.push(StateChange {
            book_id: result.book_id.clone(),
            character_name: stat_change.character.clone(),
            chapter: result.chapter_number,
            category: StateChangeCategory::Stat,
            name: stat_change.stat_name.clone(),
            action: if stat_change.value >= 0 { StateChangeAction::Gain } else { StateChangeAction::Lose },
            value_delta: Some(stat_change.value as f64),
            value_after: None,
            detail: None,
            batch_id: batch_id.to_string(),
        });
    }
    let count = changes.len();
    if !changes.is_empty() {
        graph.append_state_changes(changes).await?;
    }
    Ok(count)
}

async fn write_events(
    graph: &dyn GraphStore,
    result: &ChapterExtractionResult,
    batch_id: &str,
    now: DateTime<Utc>,
) -> Result<WriteCounts, WorldRagError> {
    let mut counts = WriteCounts::default();
    let mut relationships = Vec::new();

    for extracted in &result.events.events {
        let event = Event {
            book_id: result.book_id.clone(),
            name: extracted.name.clone(),
            description: extracted.description.clone(),
            event_type: parse_event_type(&extracted.event_type),
            significance: parse_significance(&extracted.significance),
            participants: extracted.participants.clone(),
            location: if extracted.location.is_empty() { None } else { Some(extracted.location.clone()) },
            chapter: extracted.chapter.unwrap_or(result.chapter_number),
            is_flashback: extracted.is_flashback,
            causes: extracted.causes.clone(),
            batch_id: batch_id.to_string(),
            created_at: now,
        };
        graph.create_event(event).await?;
        counts.entities += 1;

        for participant in &extracted.participants {
            relationships.push(Relationship {
                book_id: result.book_id.clone(),
                kind: RelationshipKind::ParticipatesIn,
                source: participant.clone(),
                target: extracted.name.clone(),
                rel_subtype: String::new(),
                context: String::new(),
                valid_from_chapter: None,
                valid_to_chapter: None,
                value: None,
                batch_id: batch_id.to_string(),
            });
        }
        if !extracted.location.is_empty() {
            relationships.push(Relationship {
                book_id: result.book_id.clone(),
                kind: RelationshipKind::OccursAt,
                source: extracted.name.clone(),
                target: extracted.location.clone(),
                rel_subtype: String::new(),
                context: String::new(),
                valid_from_chapter: None,
                valid_to_chapter: None,
                value: None,
                batch_id: batch_id.to_string(),
            });
        }
    }

    if !relationships.is_empty() {
        counts.relationships += relationships.len();
        graph.create_relationships(relationships).await?;
    }
    Ok(counts)
}

fn parse_event_type(value: &str) -> EventType {
    match value.to_lowercase().as_str() {
        "state_change" => EventType::StateChange,
        "achievement" => EventType::Achievement,
        "process" => EventType::Process,
        "dialogue" => EventType::Dialogue,
        _ => EventType::Action,
    }
}

fn parse_significance(value: &str) -> Significance {
    match value.to_lowercase().as_str() {
        "minor" => Significance::Minor,
        "major" => Significance::Major,
        "critical" => Significance::Critical,
        "arc_defining" => Significance::ArcDefining,
        _ => Significance::Moderate,
    }
}

/// Locations, creatures, factions, and concepts are plain entity upserts —
/// none is progression-relevant, so none pairs with a StateChange (§4.8).
/// Locations with a `parent_location` also get a `LocationPartOf` edge.
async fn write_lore(
    graph: &dyn GraphStore,
    result: &ChapterExtractionResult,
    batch_id: &str,
    now: DateTime<Utc>,
) -> Result<WriteCounts, WorldRagError> {
    let mut counts = WriteCounts::default();
    let mut relationships = Vec::new();

    for location in &result.lore.locations {
        upsert_plain(graph, EntityKind::Location, &location_record(location, result, batch_id, now)).await?;
        counts.entities += 1;
        if !location.parent_location.is_empty() {
            relationships.push(Relationship {
                book_id: result.book_id.clone(),
                kind: RelationshipKind::LocationPartOf,
                source: location.name.clone(),
                target: location.parent_location.clone(),
                rel_subtype: String::new(),
                context: String::new(),
                valid_from_chapter: None,
                valid_to_chapter: None,
                value: None,
                batch_id: batch_id.to_string(),
            });
        }
    }
    for creature in &result.lore.creatures {
        let record = EntityRecord {
            kind: EntityKind::Creature,
            book_id: result.book_id.clone(),
            name: creature.name.clone(),
            canonical_name: creature.name.clone(),
            description: creature.description.clone(),
            attributes: BTreeMap::from([
                ("species".to_string(), creature.species.clone()),
                ("threat_level".to_string(), creature.threat_level.clone()),
                ("habitat".to_string(), creature.habitat.clone()),
            ]),
            batch_id: batch_id.to_string(),
            created_at: now,
        };
        graph.upsert_entity(record).await?;
        counts.entities += 1;
    }
    for faction in &result.lore.factions {
        let record = EntityRecord {
            kind: EntityKind::Faction,
            book_id: result.book_id.clone(),
            name: faction.name.clone(),
            canonical_name: faction.name.clone(),
            description: faction.description.clone(),
            attributes: BTreeMap::from([
                ("faction_type".to_string(), faction.faction_type.clone()),
                ("alignment".to_string(), faction.alignment.clone()),
            ]),
            batch_id: batch_id.to_string(),
            created_at: now,
        };
        graph.upsert_entity(record).await?;
        counts.entities += 1;
    }
    for concept in &result.lore.concepts {
        let record = EntityRecord {
            kind: EntityKind::Concept,
            book_id: result.book_id.clone(),
            name: concept.name.clone(),
            canonical_name: concept.name.clone(),
            description: concept.description.clone(),
            attributes: BTreeMap::from([("domain".to_string(), concept.domain.clone())]),
            batch_id: batch_id.to_string(),
            created_at: now,
        };
        graph.upsert_entity(record).await?;
        counts.entities += 1;
    }

    if !relationships.is_empty() {
        counts.relationships += relationships.len();
        graph.create_relationships(relationships).await?;
    }
    Ok(counts)
}

fn location_record(
    location: &ExtractedLocation,
    result: &ChapterExtractionResult,
    batch_id: &str,
    now: DateTime<Utc>,
) -> EntityRecord {
    EntityRecord {
        kind: EntityKind::Location,
        book_id: result.book_id.clone(),
        name: location.name.clone(),
        canonical_name: location.name.clone(),
        description: location.description.clone(),
        attributes: BTreeMap::from([("location_type".to_string(), location.location_type.clone())]),
        batch_id: batch_id.to_string(),
        created_at: now,
    }
}

async fn upsert_plain(graph: &dyn GraphStore, _kind: EntityKind, record: &EntityRecord) -> Result<(), WorldRagError> {
    graph.upsert_entity(record.clone()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::graph::ChunkSearchResult;
    use crate::models::book::{Book, BookCreate, BookStatus};
    use crate::models::chapter::{Chapter, ChapterStatus, MentionSummary};
    use crate::models::chunk::Chunk;
    use crate::models::entity::{Character, EntityRecord, Event};
    use crate::models::mention::Mention;
    use crate::models::registry::EntityRegistry;

    #[derive(Default)]
    struct RecordingGraphStore {
        characters: Mutex<Vec<Character>>,
        entities: Mutex<Vec<EntityRecord>>,
        relationships: Mutex<Vec<Relationship>>,
        state_changes: Mutex<Vec<StateChange>>,
        events: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl GraphStore for RecordingGraphStore {
        async fn init_schema(&self) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn create_book(&self, _book: BookCreate) -> Result<Book, WorldRagError> {
            unimplemented!()
        }
        async fn get_book(&self, _book_id: &str) -> Result<Book, WorldRagError> {
            unimplemented!()
        }
        async fn set_book_status(&self, _book_id: &str, _status: BookStatus) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn create_chapter(&self, _chapter: Chapter) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn get_chapter(&self, _book_id: &str, _number: i64) -> Result<Chapter, WorldRagError> {
            unimplemented!()
        }
        async fn set_chapter_status(&self, _book_id: &str, _number: i64, _status: ChapterStatus) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn set_chapter_mention_summary(&self, _book_id: &str, _number: i64, _summary: MentionSummary) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn create_chunks(&self, _chunks: Vec<Chunk>) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn chunks_without_embeddings(&self, _book_id: &str) -> Result<Vec<Chunk>, WorldRagError> {
            Ok(vec![])
        }
        async fn set_chunk_embedding(&self, _chapter_id: &str, _position: i64, _embedding: Vec<f32>) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn upsert_character(&self, character: Character) -> Result<String, WorldRagError> {
            self.characters.lock().unwrap().push(character.clone());
            Ok(character.canonical_name)
        }
        async fn upsert_entity(&self, entity: EntityRecord) -> Result<String, WorldRagError> {
            let name = entity.name.clone();
            self.entities.lock().unwrap().push(entity);
            Ok(name)
        }
        async fn create_event(&self, event: Event) -> Result<String, WorldRagError> {
            let name = event.name.clone();
            self.events.lock().unwrap().push(event);
            Ok(name)
        }
        async fn create_relationships(&self, relationships: Vec<Relationship>) -> Result<(), WorldRagError> {
            self.relationships.lock().unwrap().extend(relationships);
            Ok(())
        }
        async fn relationships_for_owner(&self, _book_id: &str, _owner_name: &str, _kind: RelationshipKind) -> Result<Vec<Relationship>, WorldRagError> {
            Ok(vec![])
        }
        async fn get_character(&self, _book_id: &str, _canonical_name: &str) -> Result<Character, WorldRagError> {
            unimplemented!()
        }
        async fn append_state_changes(&self, changes: Vec<StateChange>) -> Result<(), WorldRagError> {
            self.state_changes.lock().unwrap().extend(changes);
            Ok(())
        }
        async fn state_changes_for_character(&self, _book_id: &str, _character_name: &str, _up_to_chapter: i64) -> Result<Vec<StateChange>, WorldRagError> {
            Ok(vec![])
        }
        async fn create_mentions(&self, _mentions: Vec<Mention>) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn load_registry(&self, _book_id: &str) -> Result<EntityRegistry, WorldRagError> {
            Ok(EntityRegistry::new())
        }
        async fn save_registry(&self, _book_id: &str, _registry: &EntityRegistry) -> Result<(), WorldRagError> {
            Ok(())
        }
        async fn keyword_search_chunks(&self, _book_id: &str, _query: &str, _limit: usize) -> Result<Vec<ChunkSearchResult>, WorldRagError> {
            Ok(vec![])
        }
        async fn vector_search_chunks(&self, _book_id: &str, _embedding: &[f32], _limit: usize) -> Result<Vec<ChunkSearchResult>, WorldRagError> {
            Ok(vec![])
        }
        async fn entities_mentioned_in_chapters(&self, _book_id: &str, _chapters: &[i64], _limit: usize) -> Result<Vec<EntityRecord>, WorldRagError> {
            Ok(vec![])
        }
    }

    fn sample_result() -> ChapterExtractionResult {
        use crate::extraction::passes::types::{ExtractedCharacter, ExtractedSkill};
        let mut result = ChapterExtractionResult {
            book_id: "b1".into(),
            chapter_number: 5,
            ..Default::default()
        };
        result.characters.characters.push(ExtractedCharacter {
            name: "Jake Thayne".into(),
            canonical_name: "Jake Thayne".into(),
            aliases: vec!["Jake".into()],
            description: "".into(),
            role: "protagonist".into(),
            species: "".into(),
            first_appearance_chapter: Some(1),
            status: "alive".into(),
            last_seen_chapter: None,
            evolution_of: None,
        });
        result.systems.skills.push(ExtractedSkill {
            name: "Predator Sense".into(),
            description: "".into(),
            skill_type: "passive".into(),
            rank: "".into(),
            owner: "Jake Thayne".into(),
            acquired_chapter: Some(5),
        });
        result
    }

    #[tokio::test]
    async fn writes_owner_edge_and_state_change_for_skill() {
        let store = RecordingGraphStore::default();
        let result = sample_result();
        let counts = write_chapter(&store, &result, "batch-1").await.unwrap();

        assert_eq!(counts.entities, 2); // character + skill
        assert_eq!(store.characters.lock().unwrap().len(), 1);
        assert_eq!(store.entities.lock().unwrap().len(), 1);

        let relationships = store.relationships.lock().unwrap();
        assert!(relationships.iter().any(|r| r.kind == RelationshipKind::HasSkill && r.source == "Jake Thayne"));

        let changes = store.state_changes.lock().unwrap();
        assert!(changes.iter().any(|c| c.category == StateChangeCategory::Skill && c.action == StateChangeAction::Acquire));
    }

    #[tokio::test]
    async fn church_upserts_entity_without_state_change_or_relationship() {
        use crate::extraction::passes::types::{ExtractedChurch, Layer3ExtractionResult};

        let store = RecordingGraphStore::default();
        let mut result = sample_result();
        result.series = Some(Layer3ExtractionResult {
            churches: vec![ExtractedChurch {
                deity_name: "The Endless Hunt".into(),
                domain: "predation".into(),
                blessing: "quarry sense".into(),
                worshipper: "Jake Thayne".into(),
                valid_from_chapter: Some(5),
            }],
            ..Default::default()
        });

        let counts = write_chapter(&store, &result, "batch-1").await.unwrap();
        assert_eq!(counts.entities, 3); // character + skill + church

        let entities = store.entities.lock().unwrap();
        assert!(entities.iter().any(|e| e.kind == EntityKind::PrimordialChurch && e.name == "The Endless Hunt"));

        let relationships = store.relationships.lock().unwrap();
        assert!(!relationships.iter().any(|r| r.target == "The Endless Hunt"));

        let changes = store.state_changes.lock().unwrap();
        assert!(!changes.iter().any(|c| c.name == "The Endless Hunt"));
    }

    #[tokio::test]
    async fn owner_less_upserts_skip_state_change_write() {
        let store = RecordingGraphStore::default();
        let mut result = sample_result();
        result.systems.skills[0].owner = String::new();
        write_chapter(&store, &result, "batch-1").await.unwrap();

        assert!(store.state_changes.lock().unwrap().is_empty());
        assert!(store.relationships.lock().unwrap().is_empty());
    }
}
