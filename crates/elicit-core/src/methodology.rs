//! Methodology schema - the typed ontology an interview runs against.
//!
//! Loaded once from YAML, validated, and cached by name for the process
//! lifetime. Connection admissibility is purely the wildcard-aware
//! permitted-connections list.

use crate::error::{Error, Result};
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct NodeTypeSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
    /// Hierarchy level (0 = most concrete). None for flat ontologies.
    pub level: Option<u32>,
    /// Terminal node types end a chain (no further expansion).
    pub terminal: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeTypeSpec {
    pub name: String,
    pub description: String,
    /// `[source_type, target_type]` pairs; either side may be `*`.
    #[serde(default)]
    pub permitted_connections: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MethodBlock {
    pub name: String,
    pub version: String,
    pub goal: String,
    /// Methodology-specific guidance for opening question generation.
    pub opening_bias: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OntologySpec {
    pub nodes: Vec<NodeTypeSpec>,
    pub edges: Vec<EdgeTypeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MethodologySchema {
    #[serde(default)]
    pub method: MethodBlock,
    pub ontology: OntologySpec,
    #[serde(default)]
    pub extraction_guidelines: Vec<String>,
    pub concept_naming_convention: Option<String>,
}

impl MethodologySchema {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let schema: MethodologySchema = serde_yaml::from_str(yaml)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Structural validation run once at load. No partial loads: any
    /// failure rejects the whole schema.
    pub fn validate(&self) -> Result<()> {
        let mut node_names = HashSet::new();
        for node in &self.ontology.nodes {
            if !node_names.insert(node.name.as_str()) {
                return Err(Error::SchemaViolation(format!(
                    "duplicate node type '{}'",
                    node.name
                )));
            }
        }

        let mut edge_names = HashSet::new();
        for edge in &self.ontology.edges {
            if !edge_names.insert(edge.name.as_str()) {
                return Err(Error::SchemaViolation(format!(
                    "duplicate edge type '{}'",
                    edge.name
                )));
            }
            for (src, dst) in &edge.permitted_connections {
                for side in [src, dst] {
                    if side != "*" && !node_names.contains(side.as_str()) {
                        return Err(Error::SchemaViolation(format!(
                            "edge '{}' references undefined node type '{}'",
                            edge.name, side
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn is_valid_node_type(&self, name: &str) -> bool {
        self.ontology.nodes.iter().any(|n| n.name == name)
    }

    pub fn is_valid_edge_type(&self, name: &str) -> bool {
        self.ontology.edges.iter().any(|e| e.name == name)
    }

    /// Whether `edge_type` permits `source_type -> target_type`,
    /// wildcards included.
    pub fn is_valid_connection(&self, edge_type: &str, source_type: &str, target_type: &str) -> bool {
        self.ontology
            .edges
            .iter()
            .filter(|e| e.name == edge_type)
            .flat_map(|e| e.permitted_connections.iter())
            .any(|(src, dst)| {
                (src == "*" || src == source_type) && (dst == "*" || dst == target_type)
            })
    }

    pub fn node_type_names(&self) -> Vec<String> {
        self.ontology.nodes.iter().map(|n| n.name.clone()).collect()
    }

    pub fn level_for(&self, node_type: &str) -> Option<u32> {
        self.ontology
            .nodes
            .iter()
            .find(|n| n.name == node_type)
            .and_then(|n| n.level)
    }

    pub fn is_terminal(&self, node_type: &str) -> Option<bool> {
        self.ontology
            .nodes
            .iter()
            .find(|n| n.name == node_type)
            .and_then(|n| n.terminal)
    }

    /// `{name: "description (e.g., 'ex1', 'ex2', 'ex3')"}` for LLM
    /// prompts. At most three examples per type.
    pub fn node_descriptions(&self) -> BTreeMap<String, String> {
        self.ontology
            .nodes
            .iter()
            .map(|n| {
                let examples = n
                    .examples
                    .iter()
                    .take(3)
                    .map(|e| format!("'{}'", e))
                    .collect::<Vec<_>>()
                    .join(", ");
                let desc = if examples.is_empty() {
                    n.description.clone()
                } else {
                    format!("{} (e.g., {})", n.description, examples)
                };
                (n.name.clone(), desc)
            })
            .collect()
    }

    /// `{name: "description (valid: src→dst, ...)"}` so the extraction
    /// LLM knows which node-type pairs each edge accepts.
    pub fn edge_descriptions_with_connections(&self) -> BTreeMap<String, String> {
        self.ontology
            .edges
            .iter()
            .map(|e| {
                let connections = e
                    .permitted_connections
                    .iter()
                    .map(|(src, dst)| format!("{}→{}", src, dst))
                    .collect::<Vec<_>>()
                    .join(", ");
                let desc = if connections.is_empty() {
                    e.description.clone()
                } else {
                    format!("{} (valid: {})", e.description, connections)
                };
                (e.name.clone(), desc)
            })
            .collect()
    }
}

/// Load-once methodology cache, keyed by name. Unknown names are a hard
/// error.
pub struct MethodologyRegistry {
    schema_dir: PathBuf,
    cache: DashMap<String, Arc<MethodologySchema>>,
}

impl MethodologyRegistry {
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            cache: DashMap::new(),
        }
    }

    /// Register a schema directly (tests, embedded defaults).
    pub fn insert(&self, name: &str, schema: MethodologySchema) {
        self.cache.insert(name.to_string(), Arc::new(schema));
    }

    pub fn get(&self, name: &str) -> Result<Arc<MethodologySchema>> {
        if let Some(schema) = self.cache.get(name) {
            return Ok(schema.clone());
        }
        let schema = Arc::new(self.load_from_disk(name)?);
        self.cache.insert(name.to_string(), schema.clone());
        Ok(schema)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cache.contains_key(name) || self.path_for(name).exists()
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.schema_dir.join(format!("{}.yaml", name))
    }

    fn load_from_disk(&self, name: &str) -> Result<MethodologySchema> {
        let path = self.path_for(name);
        let content = std::fs::read_to_string(&path)
            .map_err(|_| Error::NotFound(format!("methodology '{}' ({})", name, path.display())))?;
        let schema = MethodologySchema::from_yaml_str(&content)?;
        info!(
            methodology = name,
            node_types = schema.ontology.nodes.len(),
            edge_types = schema.ontology.edges.len(),
            "methodology loaded"
        );
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEC_YAML: &str = r#"
method:
  name: means_end_chain
  version: "1.0"
  goal: Trace attribute-consequence-value chains
  opening_bias: Start with concrete attributes
ontology:
  nodes:
    - name: attribute
      description: Concrete product property
      examples: ["creamy texture", "price"]
      level: 0
    - name: value
      description: Personal value
      level: 2
      terminal: true
  edges:
    - name: leads_to
      description: Causal link up the chain
      permitted_connections:
        - [attribute, value]
    - name: revises
      description: Belief revision
      permitted_connections:
        - ["*", "*"]
"#;

    #[test]
    fn wildcard_connections_match_anything() {
        let schema = MethodologySchema::from_yaml_str(MEC_YAML).unwrap();
        assert!(schema.is_valid_connection("revises", "attribute", "value"));
        assert!(schema.is_valid_connection("revises", "value", "attribute"));
        assert!(schema.is_valid_connection("leads_to", "attribute", "value"));
        assert!(!schema.is_valid_connection("leads_to", "value", "attribute"));
        assert!(!schema.is_valid_connection("unknown_edge", "attribute", "value"));
    }

    #[test]
    fn duplicate_node_type_rejected() {
        let yaml = MEC_YAML.replace("name: value", "name: attribute");
        assert!(MethodologySchema::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn node_descriptions_cap_examples_at_three() {
        let schema = MethodologySchema::from_yaml_str(MEC_YAML).unwrap();
        let descriptions = schema.node_descriptions();
        assert!(descriptions["attribute"].contains("'creamy texture'"));
        assert!(descriptions["value"].starts_with("Personal value"));
    }
}
