//! Concept catalogs - the stimulus elements coverage is measured against.

use crate::error::{Error, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// One element of a concept's stimulus catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptElement {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ConceptElement {
    /// All terms that count as a mention of this element.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.label.as_str()).chain(self.aliases.iter().map(|a| a.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptCatalog {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Interview objective shown to the question generator.
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub elements: Vec<ConceptElement>,
}

/// Load-once concept catalog cache, same shape as the methodology
/// registry.
pub struct ConceptRegistry {
    catalog_dir: PathBuf,
    cache: DashMap<String, Arc<ConceptCatalog>>,
}

impl ConceptRegistry {
    pub fn new(catalog_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog_dir: catalog_dir.into(),
            cache: DashMap::new(),
        }
    }

    pub fn insert(&self, catalog: ConceptCatalog) {
        self.cache.insert(catalog.id.clone(), Arc::new(catalog));
    }

    pub fn get(&self, id: &str) -> Result<Arc<ConceptCatalog>> {
        if let Some(catalog) = self.cache.get(id) {
            return Ok(catalog.clone());
        }
        let path = self.catalog_dir.join(format!("{}.yaml", id));
        let content = std::fs::read_to_string(&path)
            .map_err(|_| Error::NotFound(format!("concept '{}' ({})", id, path.display())))?;
        let catalog: ConceptCatalog = serde_yaml::from_str(&content)?;
        let catalog = Arc::new(catalog);
        self.cache.insert(id.to_string(), catalog.clone());
        Ok(catalog)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cache.contains_key(id) || self.catalog_dir.join(format!("{}.yaml", id)).exists()
    }
}
