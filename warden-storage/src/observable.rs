use std::sync::Arc;

use parking_lot::RwLock;

use warden_core::{Inquiry, Policy};

use crate::error::StorageError;
use crate::store::{CheckerKind, Storage};

/// Receives a notification after every successful mutation of an
/// [`ObservableStorage`].
pub trait StorageObserver: Send + Sync {
    /// Called after a policy was added, updated, or deleted.
    fn on_storage_change(&self);
}

/// Wraps a storage and notifies subscribers of mutations.
///
/// Mutating operations proxy to the inner storage and, when they succeed,
/// notify every subscriber; read operations are plain proxies. Typical use
/// is invalidating a decision cache when the policy population changes.
pub struct ObservableStorage<S> {
    inner: S,
    observers: RwLock<Vec<Arc<dyn StorageObserver>>>,
}

impl<S> ObservableStorage<S> {
    /// Wrap a storage with an empty subscriber list.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe an observer to mutation notifications.
    pub fn subscribe(&self, observer: Arc<dyn StorageObserver>) {
        self.observers.write().push(observer);
    }

    /// Remove a previously subscribed observer, matched by identity.
    pub fn unsubscribe(&self, observer: &Arc<dyn StorageObserver>) {
        self.observers
            .write()
            .retain(|subscribed| !Arc::ptr_eq(subscribed, observer));
    }

    fn notify(&self) {
        for observer in self.observers.read().iter() {
            observer.on_storage_change();
        }
    }
}

impl<S: Storage> Storage for ObservableStorage<S> {
    fn add(&self, policy: Policy) -> Result<(), StorageError> {
        self.inner.add(policy)?;
        self.notify();
        Ok(())
    }

    fn get(&self, uid: &str) -> Result<Option<Policy>, StorageError> {
        self.inner.get(uid)
    }

    fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<Policy>, StorageError> {
        self.inner.get_all(limit, offset)
    }

    fn update(&self, policy: Policy) -> Result<(), StorageError> {
        self.inner.update(policy)?;
        self.notify();
        Ok(())
    }

    fn delete(&self, uid: &str) -> Result<(), StorageError> {
        self.inner.delete(uid)?;
        self.notify();
        Ok(())
    }

    fn find_for_inquiry(
        &self,
        inquiry: &Inquiry,
        checker: Option<CheckerKind>,
    ) -> Result<Vec<Policy>, StorageError> {
        self.inner.find_for_inquiry(inquiry, checker)
    }
}
