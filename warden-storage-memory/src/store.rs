use indexmap::IndexMap;
use parking_lot::RwLock;

use warden_core::{Inquiry, Policy};
use warden_storage::{CheckerKind, Storage, StorageError};

/// In-memory [`Storage`] backed by an insertion-ordered map behind a
/// read-write lock.
///
/// Pagination iterates insertion order. `find_for_inquiry` is maximally
/// conservative and returns every stored policy. `update` on a missing uid
/// returns [`StorageError::NotFound`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    policies: RwLock<IndexMap<String, Policy>>,
}

impl MemoryStorage {
    /// Create a new, empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.read().len()
    }

    /// Whether no policy is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn add(&self, policy: Policy) -> Result<(), StorageError> {
        let mut policies = self.policies.write();
        if policies.contains_key(policy.uid()) {
            return Err(StorageError::PolicyExists {
                uid: policy.uid().to_owned(),
            });
        }
        policies.insert(policy.uid().to_owned(), policy);
        Ok(())
    }

    fn get(&self, uid: &str) -> Result<Option<Policy>, StorageError> {
        Ok(self.policies.read().get(uid).cloned())
    }

    fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<Policy>, StorageError> {
        Ok(self
            .policies
            .read()
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn update(&self, policy: Policy) -> Result<(), StorageError> {
        let mut policies = self.policies.write();
        match policies.get_mut(policy.uid()) {
            Some(stored) => {
                *stored = policy;
                Ok(())
            }
            None => Err(StorageError::NotFound {
                uid: policy.uid().to_owned(),
            }),
        }
    }

    fn delete(&self, uid: &str) -> Result<(), StorageError> {
        // shift_remove keeps the insertion order of the survivors stable.
        self.policies.write().shift_remove(uid);
        Ok(())
    }

    fn find_for_inquiry(
        &self,
        _inquiry: &Inquiry,
        _checker: Option<CheckerKind>,
    ) -> Result<Vec<Policy>, StorageError> {
        Ok(self.policies.read().values().cloned().collect())
    }
}
