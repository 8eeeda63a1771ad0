use crate::config::ConfigError;
use crate::mongo::MongoError;
use thiserror::Error;

/// Top-level error type for the foil library.
///
/// Every fallible public operation returns this type. The `Display`
/// implementation carries the human-readable message; the variants exist
/// so callers can match on the failing component.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FoilError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("mongo error: {0}")]
    Mongo(#[from] MongoError),

    #[error("not a recognized boolean token: '{0}'")]
    InvalidBool(String),
}

/// Result alias used throughout the crate.
pub type Result<T, E = FoilError> = std::result::Result<T, E>;
