//! Conformance suite for [`Storage`] backends.
//!
//! Call [`run_storage_conformance_tests`] from a backend's test module with
//! a fresh storage instance.

use warden_core::{Effect, Inquiry, Policy};

use crate::error::StorageError;
use crate::store::Storage;

fn test_policy(uid: &str) -> Policy {
    Policy::new(
        uid,
        Effect::Allow,
        vec![uid.into()],
        vec!["read".into()],
        vec!["book".into()],
    )
    .expect("string-only test policy")
}

/// Run the full storage conformance test suite.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub fn run_storage_conformance_tests(storage: &dyn Storage) -> Result<(), StorageError> {
    test_get_missing(storage)?;
    test_add_and_get(storage)?;
    test_add_duplicate_uid(storage)?;
    test_pagination(storage)?;
    test_delete(storage)?;
    test_delete_missing_is_noop(storage)?;
    test_find_for_inquiry_superset(storage)?;
    Ok(())
}

fn test_get_missing(storage: &dyn Storage) -> Result<(), StorageError> {
    let policy = storage.get("conf-missing")?;
    assert!(policy.is_none(), "get on a missing uid should return None");
    Ok(())
}

fn test_add_and_get(storage: &dyn Storage) -> Result<(), StorageError> {
    let policy = test_policy("conf-add");
    storage.add(policy.clone())?;
    let fetched = storage.get("conf-add")?;
    assert_eq!(fetched.as_ref(), Some(&policy), "stored policy should round-trip");
    Ok(())
}

fn test_add_duplicate_uid(storage: &dyn Storage) -> Result<(), StorageError> {
    storage.add(test_policy("conf-dup"))?;
    let result = storage.add(test_policy("conf-dup"));
    assert!(
        matches!(result, Err(StorageError::PolicyExists { .. })),
        "adding a duplicate uid should fail with PolicyExists"
    );
    Ok(())
}

fn test_pagination(storage: &dyn Storage) -> Result<(), StorageError> {
    for i in 0..5 {
        storage.add(test_policy(&format!("conf-page-{i}")))?;
    }

    let empty = storage.get_all(0, 0)?;
    assert!(empty.is_empty(), "a zero limit should yield an empty page");

    let total = storage.get_all(usize::MAX, 0)?.len();
    assert!(total >= 5, "all added policies should be listed");

    // Two consecutive pages must tile the listing without overlap.
    let first = storage.get_all(2, 0)?;
    let second = storage.get_all(2, 2)?;
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert!(
        first.iter().all(|p| second.iter().all(|q| p.uid() != q.uid())),
        "pages at distinct offsets should not overlap"
    );

    let past_end = storage.get_all(10, total + 10)?;
    assert!(past_end.is_empty(), "an offset past the end yields an empty page");
    Ok(())
}

fn test_delete(storage: &dyn Storage) -> Result<(), StorageError> {
    storage.add(test_policy("conf-del"))?;
    storage.delete("conf-del")?;
    assert!(storage.get("conf-del")?.is_none(), "deleted policy should be gone");
    Ok(())
}

fn test_delete_missing_is_noop(storage: &dyn Storage) -> Result<(), StorageError> {
    storage.delete("conf-never-added")?;
    Ok(())
}

fn test_find_for_inquiry_superset(storage: &dyn Storage) -> Result<(), StorageError> {
    let policy = test_policy("conf-find");
    storage.add(policy.clone())?;

    let inquiry = Inquiry::new("conf-find", "read", "book");
    let candidates = storage.find_for_inquiry(&inquiry, None)?;
    assert!(
        candidates.iter().any(|candidate| candidate.uid() == policy.uid()),
        "candidate set must contain every policy that fits the inquiry"
    );
    Ok(())
}
