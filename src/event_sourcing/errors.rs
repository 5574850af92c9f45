// ============================================================================
// Persistence Errors
// ============================================================================
//
// One error type for the codec, the type registry and the store. The host
// contract swallows these after logging; the `try_*` provider methods return
// them as values.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Payload could not be serialized, or its type was never registered.
    #[error("Failed to encode payload of type {type_name}: {reason}")]
    Encoding { type_name: String, reason: String },

    #[error("Unknown payload type: {0}")]
    UnknownType(String),

    /// Type tag resolved, but the body does not fit the type.
    #[error("Failed to decode payload of type {type_name}: {source}")]
    Decoding {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),

    #[error("Type registry not initialized")]
    RegistryNotInitialized,

    #[error("Type registry already initialized")]
    RegistryAlreadyInitialized,

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl PersistenceError {
    /// True when the store rejected a row because `(actor_name, sequence_number)`
    /// (or the id) already exists.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            PersistenceError::Store(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PersistenceError::Encoding { .. } => "encoding",
            PersistenceError::UnknownType(_) => "unknown_type",
            PersistenceError::Decoding { .. } => "decoding",
            PersistenceError::InvalidEnvelope(_) => "invalid_envelope",
            PersistenceError::RegistryNotInitialized => "registry_not_initialized",
            PersistenceError::RegistryAlreadyInitialized => "registry_already_initialized",
            PersistenceError::Store(e) if is_unique(e) => "duplicate_sequence",
            PersistenceError::Store(_) => "store",
        }
    }
}

fn is_unique(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
