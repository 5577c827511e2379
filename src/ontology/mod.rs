pub mod filters;
pub mod keywords;
pub mod patterns;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::models::PatternLayer;
use crate::WorldRagError;
pub use patterns::{PatternSet, RegexPattern};

/// A single property definition from a node or relationship type, ported
/// from `ontology_loader.py`'s `OntologyProperty`.
#[derive(Debug, Clone, Deserialize)]
pub struct OntologyProperty {
    #[serde(rename = "type", default = "default_property_type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub values: Option<Vec<String>>,
}

fn default_property_type() -> String {
    "string".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OntologyNodeType {
    #[serde(default)]
    pub properties: BTreeMap<String, OntologyProperty>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OntologyRelationType {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub properties: BTreeMap<String, OntologyProperty>,
}

#[derive(Debug, Deserialize, Default)]
struct OntologyLayerFile {
    #[serde(default)]
    node_types: BTreeMap<String, OntologyNodeType>,
    #[serde(default)]
    relationship_types: BTreeMap<String, OntologyRelationType>,
}

/// Composed 3-layer ontology (core → genre → series), with enum constraint
/// validation. Threaded through the pipeline as an explicit context value
/// rather than a process-wide singleton — `get_ontology()`'s module-level
/// cache in `ontology_loader.py` doesn't survive the move to a
/// multi-book, potentially-concurrent pipeline.
#[derive(Debug, Clone, Default)]
pub struct Ontology {
    pub node_types: BTreeMap<String, OntologyNodeType>,
    pub relationship_types: BTreeMap<String, OntologyRelationType>,
    pub patterns: PatternSet,
    pub layers_loaded: Vec<String>,
}

impl Ontology {
    /// Compose the core layer (always), a genre layer, and an optional
    /// series layer from `{ontology_dir}/{layer}.yaml`. Missing genre/series
    /// files are tolerated (logged and skipped), matching the original
    /// loader's behavior; a missing core file is also tolerated since the
    /// hardcoded [`PatternSet::default_patterns`] already cover Passe 0.
    pub fn from_layers(
        ontology_dir: &Path,
        genre: &str,
        series: Option<&str>,
    ) -> Result<Self, WorldRagError> {
        let mut ontology = Ontology {
            patterns: PatternSet::default_patterns(),
            ..Default::default()
        };

        ontology.try_load_layer(&ontology_dir.join("core.yaml"), "core", PatternLayer::Core)?;
        ontology.try_load_layer(
            &ontology_dir.join(format!("{genre}.yaml")),
            genre,
            PatternLayer::Genre,
        )?;
        if let Some(series) = series {
            ontology.try_load_layer(
                &ontology_dir.join(format!("{series}.yaml")),
                series,
                PatternLayer::Series,
            )?;
        }

        Ok(ontology)
    }

    fn try_load_layer(
        &mut self,
        path: &PathBuf,
        layer_name: &str,
        layer: PatternLayer,
    ) -> Result<(), WorldRagError> {
        if !path.exists() {
            tracing::warn!(layer = layer_name, path = %path.display(), "ontology_layer_not_found");
            return Ok(());
        }
        let contents = std::fs::read_to_string(path)?;
        let file: OntologyLayerFile = serde_yaml_ng::from_str(&contents)
            .map_err(|e| WorldRagError::Config(format!("invalid ontology layer {layer_name}: {e}")))?;

        for (name, node_type) in file.node_types {
            self.node_types
                .entry(name)
                .and_modify(|existing| existing.properties.extend(node_type.properties.clone()))
                .or_insert(node_type);
        }
        for (name, rel_type) in file.relationship_types {
            self.relationship_types.insert(name, rel_type);
        }
        self.patterns.load_layer(path, layer)?;
        self.layers_loaded.push(layer_name.to_string());
        Ok(())
    }

    /// Validate a single value against a node type's enum constraint, if any.
    /// Returns `None` when valid or when the property isn't a constrained
    /// enum — anything goes for free-form properties.
    pub fn validate_value(&self, node_type: &str, property: &str, value: &str) -> Option<String> {
        let allowed = self
            .node_types
            .get(node_type)?
            .properties
            .get(property)
            .filter(|p| p.kind == "enum")?
            .values
            .as_ref()?;
        if allowed.iter().any(|v| v == value) {
            None
        } else {
            Some(format!(
                "invalid {property}={value:?} for {node_type}; allowed: {allowed:?}"
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_layers_fall_back_to_default_patterns() {
        let ontology = Ontology::from_layers(Path::new("/nonexistent"), "litrpg", None).unwrap();
        assert_eq!(ontology.patterns.patterns.len(), 10);
        assert!(ontology.layers_loaded.is_empty());
    }

    #[test]
    fn validate_value_passes_through_non_enum_properties() {
        let ontology = Ontology::default();
        assert!(ontology.validate_value("Character", "role", "wizard").is_none());
    }
}
