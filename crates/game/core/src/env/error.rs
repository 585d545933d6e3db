//! Oracle access errors.

use crate::error::{ErrorSeverity, GameError};
use crate::state::Collection;

use super::FeatureId;

/// Errors that occur when accessing oracle data.
///
/// Missing oracles are fatal: the kernel cannot recompute or roll without
/// them. Missing content is a validation failure of the request that named it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("ContentOracle not available")]
    ContentNotAvailable,

    #[error("TablesOracle not available")]
    TablesNotAvailable,

    #[error("ConfigOracle not available")]
    ConfigNotAvailable,

    #[error("RngOracle not available")]
    RngNotAvailable,

    #[error("feature '{id}' not found in {collection}")]
    FeatureNotFound { collection: Collection, id: FeatureId },
}

impl GameError for OracleError {
    fn severity(&self) -> ErrorSeverity {
        use OracleError::*;
        match self {
            ContentNotAvailable | TablesNotAvailable | ConfigNotAvailable | RngNotAvailable => {
                ErrorSeverity::Fatal
            }
            FeatureNotFound { .. } => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        use OracleError::*;
        match self {
            ContentNotAvailable => "ORACLE_CONTENT_NOT_AVAILABLE",
            TablesNotAvailable => "ORACLE_TABLES_NOT_AVAILABLE",
            ConfigNotAvailable => "ORACLE_CONFIG_NOT_AVAILABLE",
            RngNotAvailable => "ORACLE_RNG_NOT_AVAILABLE",
            FeatureNotFound { .. } => "ORACLE_FEATURE_NOT_FOUND",
        }
    }
}
