use thiserror::Error;

/// Faults raised by the persisted-state, portal and loading layers.
///
/// None of these are fatal to an application: callers log them and fall
/// back (see `PersistentValue::new`) or reflect them in component state
/// (see `LoadStatus::Error`).
#[derive(Debug, Error)]
pub enum HarborError {
    #[error("persisted state for key '{key}' is corrupt: {source}")]
    CorruptPersistedState {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize value for key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("durable store rejected key '{key}': {message}")]
    Storage { key: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("portal target '{0}' is not mounted")]
    MissingPortalTarget(String),

    #[error("page fetch failed: {0}")]
    FetchFailure(String),
}

pub type Result<T> = std::result::Result<T, HarborError>;
