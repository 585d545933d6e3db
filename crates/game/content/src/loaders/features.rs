//! Feature catalog loader.

use std::path::Path;

use tracing::debug;

use crate::catalog::{FeatureCatalog, FeatureCatalogFile};
use crate::loaders::{LoadResult, read_file};

/// Loader for feature catalogs from RON files.
///
/// ```ron
/// (
///     features: [
///         (id: "feat.toughness", collection: feats, name: "Toughness"),
///         (id: "power.push", collection: force_powers, name: "Move Object",
///          payload: {"force_points": 1}),
///     ],
/// )
/// ```
pub struct FeatureLoader;

impl FeatureLoader {
    pub fn load(path: &Path) -> LoadResult<FeatureCatalog> {
        let content = read_file(path)?;
        let catalog = Self::parse(&content)?;
        debug!(target: "saga::content", path = %path.display(), features = catalog.len(), "feature catalog loaded");
        Ok(catalog)
    }

    pub fn parse(content: &str) -> LoadResult<FeatureCatalog> {
        let file: FeatureCatalogFile = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse feature catalog RON: {}", e))?;
        if let Some(blank) = file.features.iter().find(|f| f.id.as_str().is_empty()) {
            anyhow::bail!("feature '{}' has an empty id", blank.name);
        }
        Ok(file.into())
    }
}

#[cfg(test)]
mod tests {
    use saga_core::env::{ContentOracle, FeatureId};
    use saga_core::state::Collection;

    use super::*;

    const CATALOG: &str = r#"(
        features: [
            (id: "feat.toughness", collection: feats, name: "Toughness"),
            (id: "power.push", collection: force_powers, name: "Move Object",
             payload: {"force_points": 1}),
        ],
    )"#;

    #[test]
    fn parses_catalog() {
        let catalog = FeatureLoader::parse(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);
        let push = catalog
            .feature(Collection::ForcePowers, &FeatureId::new("power.push"))
            .unwrap();
        assert_eq!(push.payload["force_points"], 1);
    }

    #[test]
    fn empty_id_is_rejected() {
        let err = FeatureLoader::parse(r#"(features: [(id: "", collection: feats, name: "Blank")])"#)
            .unwrap_err();
        assert!(err.to_string().contains("Blank"));
    }
}
