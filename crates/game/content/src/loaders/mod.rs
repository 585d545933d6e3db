//! Content loaders for reading game data from files.
//!
//! Feature catalogs are RON; rules tables and configuration are TOML.

pub mod config;
pub mod factory;
pub mod features;
pub mod tables;

pub use config::ConfigLoader;
pub use factory::ContentFactory;
pub use features::FeatureLoader;
pub use tables::TablesLoader;

use std::path::Path;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}
