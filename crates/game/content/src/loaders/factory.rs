//! Content factory for building oracles from a data directory.

use std::path::{Path, PathBuf};

use saga_core::{GameConfig, RulesTables};

use crate::catalog::FeatureCatalog;
use crate::loaders::{ConfigLoader, FeatureLoader, LoadResult, TablesLoader};

/// Everything the kernel's oracles need, loaded together.
#[derive(Clone, Debug)]
pub struct ContentBundle {
    pub config: GameConfig,
    pub tables: RulesTables,
    pub features: FeatureCatalog,
}

/// Content factory that loads all game content from a data directory.
///
/// # Directory Structure
///
/// ```text
/// data_dir/
/// ├── config.toml
/// ├── tables.toml
/// └── features.ron
/// ```
///
/// A missing `config.toml` or `tables.toml` falls back to defaults; a
/// missing `features.ron` yields an empty catalog.
pub struct ContentFactory {
    data_dir: PathBuf,
}

impl ContentFactory {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Load game configuration from `config.toml`.
    pub fn load_config(&self) -> LoadResult<GameConfig> {
        let path = self.data_dir.join("config.toml");
        if !path.exists() {
            return Ok(GameConfig::default());
        }
        ConfigLoader::load(&path)
    }

    /// Load game rules tables from `tables.toml`.
    pub fn load_tables(&self) -> LoadResult<RulesTables> {
        let path = self.data_dir.join("tables.toml");
        if !path.exists() {
            return Ok(RulesTables::default());
        }
        TablesLoader::load(&path)
    }

    /// Load the feature catalog from `features.ron`.
    pub fn load_features(&self) -> LoadResult<FeatureCatalog> {
        let path = self.data_dir.join("features.ron");
        if !path.exists() {
            return Ok(FeatureCatalog::new());
        }
        FeatureLoader::load(&path)
    }

    pub fn load_all(&self) -> LoadResult<ContentBundle> {
        Ok(ContentBundle {
            config: self.load_config()?,
            tables: self.load_tables()?,
            features: self.load_features()?,
        })
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use saga_core::DayScopePolicy;

    use super::*;

    #[test]
    fn test_factory_paths() {
        let factory = ContentFactory::new("/tmp/data");
        assert_eq!(factory.data_dir(), Path::new("/tmp/data"));
    }

    #[test]
    fn loads_directory_with_defaults_for_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "day_scope = \"reject\"\n").unwrap();
        std::fs::write(
            dir.path().join("features.ron"),
            r#"(features: [(id: "talent.block", collection: talents, name: "Block")])"#,
        )
        .unwrap();

        let bundle = ContentFactory::new(dir.path()).load_all().unwrap();
        assert_eq!(bundle.config.day_scope, DayScopePolicy::Reject);
        assert_eq!(bundle.tables, RulesTables::default());
        assert_eq!(bundle.features.len(), 1);
    }

    #[test]
    fn malformed_file_names_the_format() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tables.toml"), "die_faces = \"twenty\"").unwrap();
        let err = ContentFactory::new(dir.path()).load_tables().unwrap_err();
        assert!(err.to_string().contains("tables TOML"));
    }
}
