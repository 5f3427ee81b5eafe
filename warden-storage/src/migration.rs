use thiserror::Error;

use crate::error::StorageError;

/// Errors from the migration framework.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A migration declares a zero or duplicate order.
    #[error("invalid migration order {0}")]
    InvalidOrder(u32),

    /// No migration in the set carries the requested order.
    #[error("no migration with order {0}")]
    UnknownOrder(u32),

    /// The underlying storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A step failed for a backend-specific reason.
    #[error("migration step failed: {0}")]
    Step(String),
}

/// A single schema-evolution step for a storage backend.
///
/// Orders start at 1 and are unique within a set. `up` and `down` must
/// leave the storage consistent even when they fail partway; the framework
/// provides no transactions.
pub trait Migration: Send + Sync {
    /// Position of this step within its set.
    fn order(&self) -> u32;

    /// Apply the step.
    fn up(&self) -> Result<(), MigrationError>;

    /// Reverse the step.
    fn down(&self) -> Result<(), MigrationError>;
}

/// The migrations of one storage backend, plus the bookkeeping for the
/// most recently applied order, persisted inside the storage itself.
pub trait MigrationSet: Send + Sync {
    /// Every migration of the managed storage, in no particular order.
    fn migrations(&self) -> &[Box<dyn Migration>];

    /// Persist the order of the most recently applied migration.
    fn save_last_applied(&self, order: u32) -> Result<(), MigrationError>;

    /// Read the persisted order back; zero when nothing was applied yet.
    fn last_applied(&self) -> Result<u32, MigrationError>;
}

/// Drives a [`MigrationSet`] up and down.
///
/// Each successful step immediately persists the new `last_applied` order,
/// so a failing step aborts the run with the already-committed steps still
/// applied and the bookkeeping pointing at the last success.
pub struct Migrator {
    set: Box<dyn MigrationSet>,
}

impl Migrator {
    /// Wrap a migration set, validating that every order is unique and
    /// at least 1.
    pub fn new(set: Box<dyn MigrationSet>) -> Result<Self, MigrationError> {
        let mut seen = Vec::new();
        for migration in set.migrations() {
            let order = migration.order();
            if order == 0 || seen.contains(&order) {
                return Err(MigrationError::InvalidOrder(order));
            }
            seen.push(order);
        }
        Ok(Self { set })
    }

    /// Apply migrations.
    ///
    /// With `number`, applies just the migration carrying that order. Without
    /// it, applies every not-yet-applied migration in ascending order. The
    /// persisted `last_applied` is advanced after each successful step; a
    /// failing step aborts the run and surfaces its error.
    pub fn up(&self, number: Option<u32>) -> Result<(), MigrationError> {
        match number {
            Some(order) => {
                self.find(order)?.up()?;
                self.set.save_last_applied(order)
            }
            None => {
                let last = self.set.last_applied()?;
                for migration in self.sorted() {
                    if migration.order() <= last {
                        continue;
                    }
                    migration.up()?;
                    self.set.save_last_applied(migration.order())?;
                }
                Ok(())
            }
        }
    }

    /// Reverse migrations.
    ///
    /// With `number`, reverses just the migration carrying that order.
    /// Without it, reverses every applied migration in descending order,
    /// stopping before order 0. Bookkeeping and failure behavior mirror
    /// [`Migrator::up`].
    pub fn down(&self, number: Option<u32>) -> Result<(), MigrationError> {
        match number {
            Some(order) => {
                self.find(order)?.down()?;
                self.set.save_last_applied(order - 1)
            }
            None => {
                let last = self.set.last_applied()?;
                for migration in self.sorted().into_iter().rev() {
                    if migration.order() > last {
                        continue;
                    }
                    migration.down()?;
                    self.set.save_last_applied(migration.order() - 1)?;
                }
                Ok(())
            }
        }
    }

    fn find(&self, order: u32) -> Result<&dyn Migration, MigrationError> {
        self.set
            .migrations()
            .iter()
            .find(|migration| migration.order() == order)
            .map(|migration| &**migration)
            .ok_or(MigrationError::UnknownOrder(order))
    }

    fn sorted(&self) -> Vec<&dyn Migration> {
        let mut migrations: Vec<&dyn Migration> = self
            .set
            .migrations()
            .iter()
            .map(|migration| &**migration)
            .collect();
        migrations.sort_by_key(|migration| migration.order());
        migrations
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Records applied orders in memory and can fail on request.
    struct FakeMigration {
        order: u32,
        fail_up: bool,
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl Migration for FakeMigration {
        fn order(&self) -> u32 {
            self.order
        }

        fn up(&self) -> Result<(), MigrationError> {
            if self.fail_up {
                return Err(MigrationError::Step(format!("step {} broke", self.order)));
            }
            self.journal.lock().push(format!("up-{}", self.order));
            Ok(())
        }

        fn down(&self) -> Result<(), MigrationError> {
            self.journal.lock().push(format!("down-{}", self.order));
            Ok(())
        }
    }

    struct FakeSet {
        migrations: Vec<Box<dyn Migration>>,
        last_applied: Arc<AtomicU32>,
    }

    impl FakeSet {
        fn new(orders: &[u32], failing: &[u32], journal: &Arc<Mutex<Vec<String>>>) -> Self {
            let migrations = orders
                .iter()
                .map(|&order| {
                    Box::new(FakeMigration {
                        order,
                        fail_up: failing.contains(&order),
                        journal: Arc::clone(journal),
                    }) as Box<dyn Migration>
                })
                .collect();
            Self {
                migrations,
                last_applied: Arc::new(AtomicU32::new(0)),
            }
        }

        /// Shared handle onto the persisted order, for assertions after the
        /// set is boxed away.
        fn bookkeeping(&self) -> Arc<AtomicU32> {
            Arc::clone(&self.last_applied)
        }
    }

    impl MigrationSet for FakeSet {
        fn migrations(&self) -> &[Box<dyn Migration>] {
            &self.migrations
        }

        fn save_last_applied(&self, order: u32) -> Result<(), MigrationError> {
            self.last_applied.store(order, Ordering::SeqCst);
            Ok(())
        }

        fn last_applied(&self) -> Result<u32, MigrationError> {
            Ok(self.last_applied.load(Ordering::SeqCst))
        }
    }

    #[test]
    fn up_applies_in_ascending_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        // Declared out of order on purpose.
        let migrator =
            Migrator::new(Box::new(FakeSet::new(&[2, 1, 3], &[], &journal))).unwrap();

        migrator.up(None).unwrap();
        assert_eq!(*journal.lock(), vec!["up-1", "up-2", "up-3"]);
    }

    #[test]
    fn up_skips_already_applied() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let set = FakeSet::new(&[1, 2, 3], &[], &journal);
        set.save_last_applied(2).unwrap();
        let migrator = Migrator::new(Box::new(set)).unwrap();

        migrator.up(None).unwrap();
        assert_eq!(*journal.lock(), vec!["up-3"]);
    }

    #[test]
    fn up_single_number() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let migrator =
            Migrator::new(Box::new(FakeSet::new(&[1, 2, 3], &[], &journal))).unwrap();

        migrator.up(Some(2)).unwrap();
        assert_eq!(*journal.lock(), vec!["up-2"]);
    }

    #[test]
    fn up_unknown_number_errors() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let migrator = Migrator::new(Box::new(FakeSet::new(&[1], &[], &journal))).unwrap();

        assert!(matches!(
            migrator.up(Some(9)),
            Err(MigrationError::UnknownOrder(9))
        ));
    }

    #[test]
    fn failed_step_aborts_and_keeps_committed_steps() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let set = FakeSet::new(&[1, 2, 3], &[2], &journal);
        let last_applied = set.bookkeeping();
        let migrator = Migrator::new(Box::new(set)).unwrap();

        let result = migrator.up(None);
        assert!(matches!(result, Err(MigrationError::Step(_))));
        // Step 1 committed, step 3 never ran, bookkeeping points at the
        // last success.
        assert_eq!(*journal.lock(), vec!["up-1"]);
        assert_eq!(last_applied.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn down_reverses_in_descending_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let set = FakeSet::new(&[1, 2, 3], &[], &journal);
        let migrator = Migrator::new(Box::new(set)).unwrap();

        migrator.up(None).unwrap();
        journal.lock().clear();

        migrator.down(None).unwrap();
        assert_eq!(*journal.lock(), vec!["down-3", "down-2", "down-1"]);
    }

    #[test]
    fn up_then_down_restores_last_applied() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let set = FakeSet::new(&[1, 2], &[], &journal);
        let last_applied = set.bookkeeping();
        let migrator = Migrator::new(Box::new(set)).unwrap();

        migrator.up(None).unwrap();
        assert_eq!(last_applied.load(Ordering::SeqCst), 2);

        migrator.down(None).unwrap();
        assert_eq!(last_applied.load(Ordering::SeqCst), 0);
        assert_eq!(*journal.lock(), vec!["up-1", "up-2", "down-2", "down-1"]);
    }

    #[test]
    fn down_single_number_rewinds_bookkeeping() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let set = FakeSet::new(&[1, 2], &[], &journal);
        set.save_last_applied(2).unwrap();
        let last_applied = set.bookkeeping();
        let migrator = Migrator::new(Box::new(set)).unwrap();

        migrator.down(Some(2)).unwrap();
        assert_eq!(*journal.lock(), vec!["down-2"]);
        assert_eq!(last_applied.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_order_is_invalid() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let result = Migrator::new(Box::new(FakeSet::new(&[0, 1], &[], &journal)));
        assert!(matches!(result, Err(MigrationError::InvalidOrder(0))));
    }

    #[test]
    fn duplicate_order_is_invalid() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let result = Migrator::new(Box::new(FakeSet::new(&[1, 1], &[], &journal)));
        assert!(matches!(result, Err(MigrationError::InvalidOrder(1))));
    }
}
