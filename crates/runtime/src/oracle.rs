//! Shared ownership of the oracles the kernel reads.
//!
//! The kernel borrows its oracles through [`GameEnv`]; the worker outlives
//! every borrow, so it keeps them here behind `Arc`s and builds a fresh
//! environment per command. Oracle data is immutable at runtime.

use std::sync::Arc;

use saga_content::{ContentBundle, FeatureCatalog};
use saga_core::{
    ConfigOracle, ContentOracle, GameConfig, GameEnv, PcgRng, RngOracle, RulesTables,
    TablesOracle,
};

/// Manages all oracle implementations and provides unified access
#[derive(Clone)]
pub struct OracleManager {
    content: Arc<dyn ContentOracle>,
    tables: Arc<dyn TablesOracle>,
    config: Arc<dyn ConfigOracle>,
    rng: Arc<dyn RngOracle>,
}

impl OracleManager {
    /// Creates a manager using the stateless [`PcgRng`] for dice.
    pub fn new(
        content: Arc<dyn ContentOracle>,
        tables: Arc<dyn TablesOracle>,
        config: Arc<dyn ConfigOracle>,
    ) -> Self {
        Self {
            content,
            tables,
            config,
            rng: Arc::new(PcgRng),
        }
    }

    /// Standard rules tables and an empty feature catalog.
    pub fn from_config(config: GameConfig) -> Self {
        Self::new(
            Arc::new(FeatureCatalog::new()),
            Arc::new(RulesTables::default()),
            Arc::new(config),
        )
    }

    pub fn from_bundle(bundle: ContentBundle) -> Self {
        Self::new(
            Arc::new(bundle.features),
            Arc::new(bundle.tables),
            Arc::new(bundle.config),
        )
    }

    /// Replaces the dice source.
    pub fn with_rng(mut self, rng: Arc<dyn RngOracle>) -> Self {
        self.rng = rng;
        self
    }

    /// Converts the oracle manager into a [`GameEnv`] for one kernel.
    pub fn as_game_env(&self) -> GameEnv<'_> {
        let content: &dyn ContentOracle = self.content.as_ref();
        let tables: &dyn TablesOracle = self.tables.as_ref();
        let config: &dyn ConfigOracle = self.config.as_ref();
        let rng: &dyn RngOracle = self.rng.as_ref();
        GameEnv::new(Some(content), Some(tables), Some(config), Some(rng))
    }

    pub fn config(&self) -> &dyn ConfigOracle {
        self.config.as_ref()
    }
}

impl std::fmt::Debug for OracleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleManager")
            .field("max_records_per_collection", &self.config.max_records_per_collection())
            .finish_non_exhaustive()
    }
}
