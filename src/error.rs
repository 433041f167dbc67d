use thiserror::Error;

use crate::export::playlist::ExportMode;

/// Errors raised by source or destination catalog implementations.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Errors raised by export cache stores.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors that abort a whole matching or export operation.
///
/// Per-track failures never surface here; they are contained and recorded
/// in the structured results instead.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export was cancelled")]
    Cancelled,

    #[error("An existing playlist id is required for {mode} mode")]
    MissingPlaylistId { mode: ExportMode },

    #[error("Cached export data is required for update mode")]
    MissingCachedRecord,

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl ExportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExportError::Cancelled)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },

    #[error("Cannot load environment: {0}")]
    Env(String),
}

pub type Result<T> = std::result::Result<T, ExportError>;
