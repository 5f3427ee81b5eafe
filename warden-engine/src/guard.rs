use std::sync::Arc;

use tracing::{error, info, instrument};

use warden_core::{Dialect, Effect, Inquiry, Policy, PolicyField};
use warden_storage::Storage;

use crate::checker::{Checker, RulesChecker};
use crate::error::{CheckError, GuardError};

/// The decision procedure combining storage, checker, and context rules.
///
/// The configured checker governs string-typed policies; rules-typed
/// policies are always matched by the built-in [`RulesChecker`], so one
/// guard serves a mixed policy population.
///
/// A guard is stateless across inquiries; concurrent `is_allowed` calls are
/// safe provided the storage and checker are.
pub struct Guard {
    storage: Arc<dyn Storage>,
    checker: Box<dyn Checker>,
    rules_checker: RulesChecker,
}

impl Guard {
    /// Create a guard over a storage with the given string-matching
    /// strategy.
    pub fn new(storage: Arc<dyn Storage>, checker: Box<dyn Checker>) -> Self {
        Self {
            storage,
            checker,
            rules_checker: RulesChecker::new(),
        }
    }

    /// Decide an inquiry.
    ///
    /// Fetches candidates from storage, re-verifies each field-wise and
    /// against the policy's context rules, then applies deny-overrides
    /// precedence: any fitting deny wins, otherwise any fitting allow
    /// grants, otherwise the default is deny. A policy whose evaluation
    /// fails is logged and treated as not fitting.
    ///
    /// # Errors
    ///
    /// Only a failing candidate fetch surfaces; see [`GuardError`].
    #[instrument(skip_all, fields(subject = %inquiry.subject, action = %inquiry.action, resource = %inquiry.resource))]
    pub fn is_allowed(&self, inquiry: &Inquiry) -> Result<bool, GuardError> {
        info!("deciding inquiry");
        let candidates = self
            .storage
            .find_for_inquiry(inquiry, Some(self.checker.kind()))?;

        let mut any_allow = false;
        let mut any_deny = false;
        for policy in &candidates {
            match self.fits(policy, inquiry) {
                Ok(true) => match policy.effect() {
                    Effect::Deny => any_deny = true,
                    Effect::Allow => any_allow = true,
                },
                Ok(false) => {}
                Err(e) => {
                    error!(
                        policy = policy.uid(),
                        error = %e,
                        "policy evaluation failed, treating policy as not fitting"
                    );
                }
            }
        }

        let allowed = !any_deny && any_allow;
        info!(
            allowed,
            candidates = candidates.len(),
            "access decision"
        );
        Ok(allowed)
    }

    /// Whether a single policy fits the inquiry under the policy's own
    /// dialect.
    pub fn fits(&self, policy: &Policy, inquiry: &Inquiry) -> Result<bool, CheckError> {
        let checker: &dyn Checker = match policy.dialect() {
            Dialect::RuleBased => &self.rules_checker,
            Dialect::StringBased => self.checker.as_ref(),
        };

        for field in [
            PolicyField::Actions,
            PolicyField::Resources,
            PolicyField::Subjects,
        ] {
            if !checker.fits(policy, field, inquiry)? {
                return Ok(false);
            }
        }

        Ok(context_satisfied(policy, inquiry))
    }
}

/// Every context key of the policy must be present in the inquiry context
/// with its rule satisfied; a missing key fails.
fn context_satisfied(policy: &Policy, inquiry: &Inquiry) -> bool {
    policy.context().iter().all(|(key, rule)| {
        inquiry
            .context
            .get(key)
            .is_some_and(|value| rule.satisfied(value, Some(inquiry)))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use warden_core::Rule;
    use warden_storage_memory::MemoryStorage;

    use crate::checker::RegexChecker;

    use super::*;

    fn guard_over(policies: Vec<Policy>) -> Guard {
        let storage = MemoryStorage::new();
        for policy in policies {
            storage.add(policy).unwrap();
        }
        Guard::new(Arc::new(storage), Box::new(RegexChecker::new()))
    }

    fn allow_books() -> Policy {
        Policy::new(
            "p-books",
            Effect::Allow,
            vec!["<[A-Z][a-z]+>".into()],
            vec!["<read|get>".into()],
            vec!["book:<.+>".into()],
        )
        .unwrap()
    }

    #[test]
    fn empty_storage_denies_by_default() {
        let guard = guard_over(vec![]);
        let inquiry = Inquiry::new("Alice", "read", "book:moby");
        assert!(!guard.is_allowed(&inquiry).unwrap());
    }

    #[test]
    fn fitting_allow_policy_grants() {
        let guard = guard_over(vec![allow_books()]);
        let inquiry = Inquiry::new("Alice", "read", "book:moby");
        assert!(guard.is_allowed(&inquiry).unwrap());
    }

    #[test]
    fn non_fitting_field_denies() {
        let guard = guard_over(vec![allow_books()]);
        let inquiry = Inquiry::new("alice", "read", "book:moby");
        assert!(!guard.is_allowed(&inquiry).unwrap());
    }

    #[test]
    fn deny_overrides_allow() {
        let deny_all = Policy::new(
            "p-deny",
            Effect::Deny,
            vec!["<.+>".into()],
            vec!["<.+>".into()],
            vec!["<.+>".into()],
        )
        .unwrap();
        let guard = guard_over(vec![allow_books(), deny_all]);
        let inquiry = Inquiry::new("Alice", "read", "book:moby");
        assert!(!guard.is_allowed(&inquiry).unwrap());
    }

    #[test]
    fn context_rules_gate_the_decision() {
        let policy = allow_books().with_context(HashMap::from([(
            "ip".to_owned(),
            Rule::cidr("192.168.2.0/24").unwrap(),
        )]));
        let guard = guard_over(vec![policy]);

        let fitting = Inquiry::new("Alice", "read", "book:moby")
            .with_context(HashMap::from([("ip".to_owned(), json!("192.168.2.42"))]));
        assert!(guard.is_allowed(&fitting).unwrap());

        let outside = Inquiry::new("Alice", "read", "book:moby")
            .with_context(HashMap::from([("ip".to_owned(), json!("10.0.0.1"))]));
        assert!(!guard.is_allowed(&outside).unwrap());
    }

    #[test]
    fn missing_context_key_denies() {
        let policy = allow_books().with_context(HashMap::from([(
            "secret".to_owned(),
            Rule::StrEqual {
                value: "x".to_owned(),
                case_insensitive: false,
            },
        )]));
        let guard = guard_over(vec![policy]);
        let inquiry = Inquiry::new("Alice", "read", "book:moby");
        assert!(!guard.is_allowed(&inquiry).unwrap());
    }

    #[test]
    fn rules_typed_policy_matches_under_any_configured_checker() {
        let mapping: HashMap<String, Rule> = HashMap::from([
            ("name".to_owned(), Rule::Any),
            ("stars".to_owned(), Rule::Greater { value: json!(50) }),
        ]);
        let policy = Policy::new(
            "p-rules",
            Effect::Allow,
            vec![mapping.into()],
            vec![Rule::Eq {
                value: json!("fork"),
            }
            .into()],
            vec![Rule::Any.into()],
        )
        .unwrap();
        // The guard is built with a Regex checker; dialect dispatch must
        // still route this policy through the rules checker.
        let guard = guard_over(vec![policy]);

        let inquiry = Inquiry::new(json!({"name": "Brin", "stars": 80}), "fork", "repo");
        assert!(guard.is_allowed(&inquiry).unwrap());
    }

    #[test]
    fn string_policy_rejects_mapping_inquiry_fields() {
        let guard = guard_over(vec![allow_books()]);
        let inquiry = Inquiry::new(json!({"name": "Alice"}), "read", "book:moby");
        assert!(!guard.is_allowed(&inquiry).unwrap());
    }

    #[test]
    fn broken_policy_is_skipped_not_fatal() {
        let broken = Policy::new(
            "p-broken",
            Effect::Allow,
            vec!["<[unclosed>".into()],
            vec!["<.+>".into()],
            vec!["<.+>".into()],
        )
        .unwrap();
        let guard = guard_over(vec![broken, allow_books()]);

        let inquiry = Inquiry::new("Alice", "read", "book:moby");
        assert!(guard.is_allowed(&inquiry).unwrap());
    }

    #[test]
    fn empty_matcher_lists_never_match() {
        let policy = Policy::new("p-empty", Effect::Allow, vec![], vec![], vec![]).unwrap();
        let guard = guard_over(vec![policy]);
        let inquiry = Inquiry::new("Alice", "read", "book:moby");
        assert!(!guard.is_allowed(&inquiry).unwrap());
    }
}
