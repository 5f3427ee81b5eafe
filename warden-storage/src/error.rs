use thiserror::Error;

/// Errors from policy storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// `add` was called with a uid that is already persisted.
    #[error("policy '{uid}' already exists")]
    PolicyExists {
        /// The duplicated identifier.
        uid: String,
    },

    /// The addressed policy is not in the storage.
    #[error("policy '{uid}' not found")]
    NotFound {
        /// The missing identifier.
        uid: String,
    },

    /// The backend failed; wraps the underlying cause.
    #[error("storage backend error: {0}")]
    Backend(String),
}
