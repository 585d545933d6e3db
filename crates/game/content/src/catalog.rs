//! In-memory feature catalog backing the content oracle.

use std::collections::HashMap;

use saga_core::env::{ContentOracle, FeatureDefinition, FeatureId};
use saga_core::state::Collection;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Every grantable feat, talent, item, power and weapon, keyed by collection and id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureCatalog {
    features: HashMap<(Collection, FeatureId), FeatureDefinition>,
}

impl FeatureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog, keeping the last definition when an id repeats.
    pub fn from_definitions(definitions: impl IntoIterator<Item = FeatureDefinition>) -> Self {
        let mut catalog = Self::new();
        for definition in definitions {
            catalog.insert(definition);
        }
        catalog
    }

    /// Adds a definition, returning the one it replaced.
    pub fn insert(&mut self, definition: FeatureDefinition) -> Option<FeatureDefinition> {
        let key = (definition.collection, definition.id.clone());
        let replaced = self.features.insert(key, definition);
        if let Some(old) = &replaced {
            warn!(target: "saga::content", id = %old.id, collection = %old.collection, "duplicate feature definition replaced");
        }
        replaced
    }

    pub fn get(&self, collection: Collection, id: &FeatureId) -> Option<&FeatureDefinition> {
        self.features.get(&(collection, id.clone()))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Definitions in one collection, in no particular order.
    pub fn in_collection(&self, collection: Collection) -> impl Iterator<Item = &FeatureDefinition> {
        self.features
            .iter()
            .filter(move |((c, _), _)| *c == collection)
            .map(|(_, definition)| definition)
    }
}

impl ContentOracle for FeatureCatalog {
    fn feature(&self, collection: Collection, id: &FeatureId) -> Option<FeatureDefinition> {
        self.get(collection, id).cloned()
    }
}

/// On-disk shape of a feature catalog file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCatalogFile {
    pub features: Vec<FeatureDefinition>,
}

impl From<FeatureCatalogFile> for FeatureCatalog {
    fn from(file: FeatureCatalogFile) -> Self {
        Self::from_definitions(file.features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feat(id: &str, name: &str) -> FeatureDefinition {
        FeatureDefinition {
            id: FeatureId::new(id),
            collection: Collection::Feats,
            name: name.into(),
            payload: Default::default(),
        }
    }

    #[test]
    fn lookup_is_scoped_by_collection() {
        let catalog = FeatureCatalog::from_definitions([feat("feat.dodge", "Dodge")]);
        let id = FeatureId::new("feat.dodge");
        assert_eq!(
            catalog.feature(Collection::Feats, &id).map(|f| f.name),
            Some("Dodge".to_owned())
        );
        assert!(catalog.feature(Collection::Talents, &id).is_none());
    }

    #[test]
    fn duplicates_keep_the_last_definition() {
        let mut catalog = FeatureCatalog::new();
        catalog.insert(feat("feat.dodge", "Dodge"));
        let replaced = catalog.insert(feat("feat.dodge", "Improved Dodge"));
        assert_eq!(replaced.map(|f| f.name), Some("Dodge".to_owned()));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.in_collection(Collection::Feats).count(), 1);
    }
}
