//! Error types for the help engine

use thiserror::Error;

/// Main error type for the help engine
#[derive(Error, Debug)]
pub enum HelpError {
    /// The persistence backend is missing; the engine keeps running in memory
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Opening or migrating the structured store failed
    #[error("Store init failed: {0}")]
    StoreInitFailure(String),

    /// A stored record could not be decoded
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    /// Resync after reconnecting failed
    #[error("Sync failed: {0}")]
    SyncFailure(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Another writer kept bumping the record version; the write was dropped
    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The knowledge data violates an authoring invariant
    #[error("Invalid knowledge data: {0}")]
    InvalidKnowledge(String),
}

/// Result type alias for help engine operations
pub type Result<T> = std::result::Result<T, HelpError>;

impl From<HelpError> for String {
    fn from(e: HelpError) -> Self {
        e.to_string()
    }
}
