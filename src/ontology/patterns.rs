use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::models::{PatternLayer, RegexTargetKind};
use crate::WorldRagError;

/// A compiled regex pattern for entity extraction, grounded in
/// `regex_extractor.py`'s `RegexPattern` dataclass.
#[derive(Debug, Clone)]
pub struct RegexPattern {
    pub name: String,
    pub regex: Regex,
    pub entity_type: RegexTargetKind,
    pub layer: PatternLayer,
    /// capture_name -> capture group index (1-based, matching `Regex::captures`).
    pub captures: BTreeMap<String, usize>,
}

/// On-disk shape for one pattern entry in an ontology layer's `regex_patterns`
/// YAML section.
#[derive(Debug, Deserialize)]
struct RawPattern {
    pattern: String,
    entity_type: RegexTargetKind,
    #[serde(default)]
    captures: BTreeMap<String, usize>,
}

/// A whole ontology layer file: `{regex_patterns: {name: RawPattern}}`. Node
/// and relationship type sections from `ontology_loader.py` are intentionally
/// not modeled here — entity/relationship shape validation against ontology
/// enum constraints is out of this core's scope beyond what the
/// entity-quality filter already enforces.
#[derive(Debug, Deserialize, Default)]
struct OntologyLayerFile {
    #[serde(default)]
    regex_patterns: BTreeMap<String, RawPattern>,
}

/// An ordered collection of compiled patterns across up to three layers
/// (core, genre, series). Series patterns are tried after genre patterns,
/// which are tried after core patterns — this ordering is what lets
/// `RegexExtractor::extract` resolve layer conflicts by "series wins"
/// (spec §9).
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    pub patterns: Vec<RegexPattern>,
}

impl PatternSet {
    /// The ten hardcoded default patterns from `regex_extractor.py::default()`,
    /// used when no ontology YAML is configured.
    pub fn default_patterns() -> Self {
        let compile = |src: &str| Regex::new(src).expect("default patterns are valid regex");

        let mut patterns = vec![
            RegexPattern {
                name: "skill_acquired".into(),
                regex: compile(
                    r"(?i)\[(?:Skill|Ability)\s+(?:Acquired|Learned|Gained):\s*([^-\]]+?)(?:\s*-\s*([^\]]+?))?\]",
                ),
                entity_type: RegexTargetKind::Skill,
                layer: PatternLayer::Genre,
                captures: BTreeMap::from([("name".into(), 1), ("rank".into(), 2)]),
            },
            RegexPattern {
                name: "level_up".into(),
                regex: compile(r"(?i)Level:\s*(\d+)\s*(?:→|->|=>)\s*(\d+)"),
                entity_type: RegexTargetKind::Level,
                layer: PatternLayer::Genre,
                captures: BTreeMap::from([("old_value".into(), 1), ("new_value".into(), 2)]),
            },
            RegexPattern {
                name: "class_obtained".into(),
                regex: compile(r"(?i)Class:\s*([^(\n]+?)\s*\(([^)]+?)\)"),
                entity_type: RegexTargetKind::Class,
                layer: PatternLayer::Genre,
                captures: BTreeMap::from([("name".into(), 1), ("tier_info".into(), 2)]),
            },
            RegexPattern {
                name: "title_earned".into(),
                regex: compile(r"(?im)Title\s+(?:earned|obtained|acquired):\s*(.+?)(?:\n|$)"),
                entity_type: RegexTargetKind::Title,
                layer: PatternLayer::Genre,
                captures: BTreeMap::from([("name".into(), 1)]),
            },
            RegexPattern {
                name: "stat_increase".into(),
                regex: compile(
                    r"(?i)\+(\d+)\s+(Strength|Agility|Endurance|Vitality|Toughness|Wisdom|Intelligence|Perception|Willpower|Charisma)",
                ),
                entity_type: RegexTargetKind::StatIncrease,
                layer: PatternLayer::Core,
                captures: BTreeMap::from([("value".into(), 1), ("stat_name".into(), 2)]),
            },
            RegexPattern {
                name: "evolution".into(),
                regex: compile(r"(?im)(?:Evolution|Upgrade|Breakthrough).*?(?:→|->|=>)\s*(.+?)(?:\n|$)"),
                entity_type: RegexTargetKind::Evolution,
                layer: PatternLayer::Genre,
                captures: BTreeMap::from([("target".into(), 1)]),
            },
            RegexPattern {
                name: "bloodline_notification".into(),
                regex: compile(r"(?i)\[Bloodline\s+(?:Awakened|Evolved|Activated):\s*([^\]]+?)\]"),
                entity_type: RegexTargetKind::Bloodline,
                layer: PatternLayer::Series,
                captures: BTreeMap::from([("name".into(), 1)]),
            },
            RegexPattern {
                name: "profession_obtained".into(),
                regex: compile(
                    r"(?im)Profession\s+(?:Obtained|Acquired|Gained):\s*([^(\n]+?)\s*(?:\(([^)]+?)\))?$",
                ),
                entity_type: RegexTargetKind::Profession,
                layer: PatternLayer::Series,
                captures: BTreeMap::from([("name".into(), 1), ("tier_info".into(), 2)]),
            },
            RegexPattern {
                name: "blessing_received".into(),
                regex: compile(r"(?i)\[Blessing\s+(?:of|from)\s+(.+?)(?:\s+received|\])"),
                entity_type: RegexTargetKind::Church,
                layer: PatternLayer::Series,
                captures: BTreeMap::from([("name".into(), 1)]),
            },
            RegexPattern {
                name: "blue_box_generic".into(),
                regex: compile(r"\[([^\[\]]{5,200})\]"),
                entity_type: RegexTargetKind::SystemNotification,
                layer: PatternLayer::Core,
                captures: BTreeMap::from([("content".into(), 1)]),
            },
        ];
        // `extract` relies on `blue_box_generic` running last so it can skip
        // spans already claimed by a specific pattern.
        patterns.sort_by_key(|p| (p.name == "blue_box_generic") as u8);
        Self { patterns }
    }

    /// Load additional/overriding patterns from an ontology YAML layer file
    /// (core, genre, or series), merging them on top of the patterns already
    /// present. Invalid regex entries are skipped with a warning rather than
    /// failing the whole load, matching `regex_extractor.py`'s tolerance.
    pub fn load_layer(
        &mut self,
        path: &Path,
        layer: PatternLayer,
    ) -> Result<(), WorldRagError> {
        let contents = std::fs::read_to_string(path)?;
        let file: OntologyLayerFile = serde_yaml_ng::from_str(&contents)
            .map_err(|e| WorldRagError::Config(format!("invalid ontology layer {}: {e}", path.display())))?;

        for (name, raw) in file.regex_patterns {
            match Regex::new(&raw.pattern) {
                Ok(regex) => {
                    self.patterns.retain(|p| p.name != name);
                    self.patterns.push(RegexPattern {
                        name,
                        regex,
                        entity_type: raw.entity_type,
                        layer,
                        captures: raw.captures,
                    });
                }
                Err(e) => {
                    tracing::warn!(pattern_name = %name, error = %e, "regex_compile_failed");
                }
            }
        }
        // Generic catch-all must stay last regardless of load order.
        self.patterns.sort_by_key(|p| (p.name == "blue_box_generic") as u8);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patterns_compile_and_order_catchall_last() {
        let set = PatternSet::default_patterns();
        assert_eq!(set.patterns.len(), 10);
        assert_eq!(set.patterns.last().unwrap().name, "blue_box_generic");
    }

    #[test]
    fn skill_acquired_captures_name_and_rank() {
        let set = PatternSet::default_patterns();
        let pattern = set.patterns.iter().find(|p| p.name == "skill_acquired").unwrap();
        let caps = pattern
            .regex
            .captures("[Skill Acquired: Basic Archery - Inferior]")
            .unwrap();
        assert_eq!(caps.get(1).unwrap().as_str().trim(), "Basic Archery");
        assert_eq!(caps.get(2).unwrap().as_str().trim(), "Inferior");
    }
}
