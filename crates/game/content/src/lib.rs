//! Data-driven content for the saga kernel.
//!
//! This crate turns data files into oracle implementations:
//! - Feature catalogs (feats, talents, items, powers, weapons) from RON
//! - Rules tables from TOML
//! - Game configuration from TOML
//!
//! Content is consumed through the core oracle traits and never appears in
//! world state except as records created from it.

pub mod catalog;

#[cfg(feature = "loaders")]
pub mod loaders;

pub use catalog::{FeatureCatalog, FeatureCatalogFile};

#[cfg(feature = "loaders")]
pub use loaders::{
    ConfigLoader, ContentFactory, FeatureLoader, LoadResult, TablesLoader, factory::ContentBundle,
};
