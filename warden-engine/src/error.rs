use thiserror::Error;

use warden_storage::StorageError;

/// Errors from checker pattern handling.
///
/// These surface per policy: the guard logs them and treats the offending
/// policy as not fitting, without aborting the decision.
#[derive(Debug, Error)]
pub enum CheckError {
    /// A pattern opens a regex section that never closes.
    #[error("unbalanced regex tags in pattern '{0}'")]
    UnbalancedTags(String),

    /// The regex spliced out of a pattern does not compile.
    #[error("invalid regex in pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending policy pattern.
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors surfaced by the guard.
///
/// Only infrastructure failures reach the caller; per-policy evaluation
/// failures are contained (see [`CheckError`]).
#[derive(Debug, Error)]
pub enum GuardError {
    /// The candidate fetch from storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
