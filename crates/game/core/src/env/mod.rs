//! Traits describing read-only rules data.
//!
//! Oracles expose feature content, rules tables, configuration and dice. The
//! [`Env`] aggregate bundles them so the kernel and the combat pipeline can
//! reach everything they need without coupling to concrete implementations.
mod config;
mod content;
mod error;
mod rng;
mod tables;

pub use config::ConfigOracle;
pub use content::{ContentOracle, FeatureDefinition, FeatureId};
pub use error::OracleError;
pub use rng::{PcgRng, RngOracle, compute_seed};
pub use tables::{
    RulesTables, ScaleFactor, SizeModifiers, SubsystemPenalty, TablesOracle, TierPenalties,
};

/// Aggregates read-only oracles required by the kernel.
pub struct Env<'a, Co, T, C, R>
where
    Co: ContentOracle + ?Sized,
    T: TablesOracle + ?Sized,
    C: ConfigOracle + ?Sized,
    R: RngOracle + ?Sized,
{
    content: Option<&'a Co>,
    tables: Option<&'a T>,
    config: Option<&'a C>,
    rng: Option<&'a R>,
}

impl<Co, T, C, R> Clone for Env<'_, Co, T, C, R>
where
    Co: ContentOracle + ?Sized,
    T: TablesOracle + ?Sized,
    C: ConfigOracle + ?Sized,
    R: RngOracle + ?Sized,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<Co, T, C, R> Copy for Env<'_, Co, T, C, R>
where
    Co: ContentOracle + ?Sized,
    T: TablesOracle + ?Sized,
    C: ConfigOracle + ?Sized,
    R: RngOracle + ?Sized,
{
}

pub type GameEnv<'a> = Env<
    'a,
    dyn ContentOracle + 'a,
    dyn TablesOracle + 'a,
    dyn ConfigOracle + 'a,
    dyn RngOracle + 'a,
>;

impl<'a, Co, T, C, R> Env<'a, Co, T, C, R>
where
    Co: ContentOracle + ?Sized,
    T: TablesOracle + ?Sized,
    C: ConfigOracle + ?Sized,
    R: RngOracle + ?Sized,
{
    pub fn new(
        content: Option<&'a Co>,
        tables: Option<&'a T>,
        config: Option<&'a C>,
        rng: Option<&'a R>,
    ) -> Self {
        Self {
            content,
            tables,
            config,
            rng,
        }
    }

    pub fn with_all(content: &'a Co, tables: &'a T, config: &'a C, rng: &'a R) -> Self {
        Self::new(Some(content), Some(tables), Some(config), Some(rng))
    }

    pub fn empty() -> Self {
        Self {
            content: None,
            tables: None,
            config: None,
            rng: None,
        }
    }

    /// Returns the ContentOracle, or an error if not available.
    pub fn content(&self) -> Result<&'a Co, OracleError> {
        self.content.ok_or(OracleError::ContentNotAvailable)
    }

    /// Returns the TablesOracle, or an error if not available.
    pub fn tables(&self) -> Result<&'a T, OracleError> {
        self.tables.ok_or(OracleError::TablesNotAvailable)
    }

    /// Returns the ConfigOracle, or an error if not available.
    pub fn config(&self) -> Result<&'a C, OracleError> {
        self.config.ok_or(OracleError::ConfigNotAvailable)
    }

    /// Returns the RngOracle, or an error if not available.
    pub fn rng(&self) -> Result<&'a R, OracleError> {
        self.rng.ok_or(OracleError::RngNotAvailable)
    }
}

impl<'a, Co, T, C, R> Env<'a, Co, T, C, R>
where
    Co: ContentOracle + 'a,
    T: TablesOracle + 'a,
    C: ConfigOracle + 'a,
    R: RngOracle + 'a,
{
    /// Converts this environment into a trait-object based `GameEnv`.
    pub fn into_game_env(self) -> GameEnv<'a> {
        let content: Option<&'a dyn ContentOracle> = self.content.map(|c| c as _);
        let tables: Option<&'a dyn TablesOracle> = self.tables.map(|t| t as _);
        let config: Option<&'a dyn ConfigOracle> = self.config.map(|c| c as _);
        let rng: Option<&'a dyn RngOracle> = self.rng.map(|r| r as _);
        Env::new(content, tables, config, rng)
    }
}

impl<'a> GameEnv<'a> {
    /// Builds an environment without a content oracle.
    ///
    /// Kernel operations that resolve content ids fail with
    /// [`OracleError::ContentNotAvailable`] under this environment.
    pub fn rules_only(
        tables: &'a dyn TablesOracle,
        config: &'a dyn ConfigOracle,
        rng: &'a dyn RngOracle,
    ) -> Self {
        Env::new(None, Some(tables), Some(config), Some(rng))
    }
}
