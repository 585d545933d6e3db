//! Rules tables loader.

use std::path::Path;

use saga_core::RulesTables;
use tracing::debug;

use crate::loaders::{LoadResult, read_file};

/// Loader for [`RulesTables`] from TOML files.
///
/// Any table left out of the file keeps the standard rules value.
pub struct TablesLoader;

impl TablesLoader {
    pub fn load(path: &Path) -> LoadResult<RulesTables> {
        let content = read_file(path)?;
        let tables = Self::parse(&content)?;
        debug!(target: "saga::content", path = %path.display(), "rules tables loaded");
        Ok(tables)
    }

    pub fn parse(content: &str) -> LoadResult<RulesTables> {
        let tables: RulesTables = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse tables TOML: {}", e))?;
        if tables.die_faces < 2 {
            anyhow::bail!("die_faces must be at least 2 (got {})", tables.die_faces);
        }
        if tables.scale.iter().flatten().any(|factor| factor.den == 0) {
            anyhow::bail!("scale factors need a non-zero denominator");
        }
        Ok(tables)
    }
}
