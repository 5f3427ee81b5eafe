use warden_core::{Inquiry, Policy};

use crate::error::StorageError;

/// Identifies a checker strategy.
///
/// Passed to [`Storage::find_for_inquiry`] so a backend that understands the
/// strategy can pre-filter its candidate set (a regex-aware backend can
/// translate patterns into a native query, an exact-match backend can index
/// on equality). Backends are free to ignore the hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckerKind {
    /// Case-sensitive string equality.
    StringExact,
    /// Case-sensitive substring matching.
    StringFuzzy,
    /// Tag-delimited regex matching.
    Regex,
    /// Rule-based matching for rules-typed policies.
    Rules,
}

/// Persistence contract for policies.
///
/// Implementations must be `Send + Sync` and must serialize mutations
/// against readers so that every read observes a consistent policy.
pub trait Storage: Send + Sync {
    /// Persist a new policy.
    ///
    /// # Errors
    ///
    /// [`StorageError::PolicyExists`] when the uid is already present.
    fn add(&self, policy: Policy) -> Result<(), StorageError>;

    /// Fetch a policy by uid. Returns `None` when it is not persisted.
    fn get(&self, uid: &str) -> Result<Option<Policy>, StorageError>;

    /// Fetch a page of policies.
    ///
    /// The order is stable for a given storage but unspecified across
    /// implementations. A `limit` of zero yields an empty page; an `offset`
    /// past the end yields an empty page.
    fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<Policy>, StorageError>;

    /// Replace the policy carrying the same uid.
    ///
    /// Whether a missing uid is an error or a no-op is backend-defined and
    /// must be documented on the implementation.
    fn update(&self, policy: Policy) -> Result<(), StorageError>;

    /// Remove a policy by uid. A missing uid is a no-op.
    fn delete(&self, uid: &str) -> Result<(), StorageError>;

    /// Candidate policies for an inquiry.
    ///
    /// The result MUST be a superset of the policies that truly fit the
    /// inquiry; the guard re-verifies every candidate. `checker` hints at
    /// the active matching strategy so a backend may narrow the set;
    /// returning every stored policy is always conformant.
    fn find_for_inquiry(
        &self,
        inquiry: &Inquiry,
        checker: Option<CheckerKind>,
    ) -> Result<Vec<Policy>, StorageError>;
}
