//! Game configuration loader.

use std::path::Path;

use saga_core::GameConfig;

use crate::loaders::{LoadResult, read_file};

/// Loader for game configuration from TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a [`GameConfig`] from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> LoadResult<GameConfig> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LoadResult<GameConfig> {
        let config: GameConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?;
        if config.max_hook_depth == 0 {
            anyhow::bail!("max_hook_depth must be at least 1");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use saga_core::DayScopePolicy;

    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = ConfigLoader::parse("day_scope = \"reject\"\n").unwrap();
        assert_eq!(config.day_scope, DayScopePolicy::Reject);
        assert_eq!(
            config.max_records_per_collection,
            GameConfig::DEFAULT_MAX_RECORDS_PER_COLLECTION
        );
    }

    #[test]
    fn zero_hook_depth_is_rejected() {
        assert!(ConfigLoader::parse("max_hook_depth = 0").is_err());
    }
}
