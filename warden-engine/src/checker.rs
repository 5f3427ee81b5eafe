use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;

use warden_core::{Inquiry, Matcher, Policy, PolicyField};
use warden_storage::CheckerKind;

use crate::error::CheckError;
use crate::pattern::compile_phrase;

/// Strategy for matching an inquiry against one field of a policy.
///
/// String checkers interpret plain-string matchers and require the inquiry
/// field to be a string; they never fit a rules-typed policy. The
/// [`RulesChecker`] is the converse. An error from `fits` concerns the
/// single policy under test; the guard logs it and moves on.
pub trait Checker: Send + Sync {
    /// Identifier storages may use to pre-filter candidates.
    fn kind(&self) -> CheckerKind;

    /// Whether the policy's matcher list for `field` fits the inquiry.
    fn fits(
        &self,
        policy: &Policy,
        field: PolicyField,
        inquiry: &Inquiry,
    ) -> Result<bool, CheckError>;
}

/// Strip one leading `start_tag` and one trailing `end_tag`, when both are
/// present.
fn strip_tags<'a>(pattern: &'a str, start_tag: &str, end_tag: &str) -> &'a str {
    pattern
        .strip_prefix(start_tag)
        .and_then(|inner| inner.strip_suffix(end_tag))
        .unwrap_or(pattern)
}

/// List-OR over a policy's literal patterns against a scalar inquiry field.
fn string_fits(
    policy: &Policy,
    field: PolicyField,
    inquiry: &Inquiry,
    compare: impl Fn(&str, &str) -> bool,
) -> bool {
    let Some(what) = inquiry.field(field).as_str() else {
        return false;
    };
    policy
        .matchers(field)
        .iter()
        .filter_map(Matcher::as_literal)
        .any(|pattern| {
            let pattern = strip_tags(pattern, policy.start_tag(), policy.end_tag());
            compare(pattern, what)
        })
}

/// Case-sensitive string equality between policy pattern and inquiry value.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringExactChecker;

impl StringExactChecker {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Checker for StringExactChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::StringExact
    }

    fn fits(
        &self,
        policy: &Policy,
        field: PolicyField,
        inquiry: &Inquiry,
    ) -> Result<bool, CheckError> {
        Ok(string_fits(policy, field, inquiry, |pattern, what| {
            pattern == what
        }))
    }
}

/// Case-sensitive substring test: the policy pattern must occur inside the
/// inquiry value.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringFuzzyChecker;

impl StringFuzzyChecker {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Checker for StringFuzzyChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::StringFuzzy
    }

    fn fits(
        &self,
        policy: &Policy,
        field: PolicyField,
        inquiry: &Inquiry,
    ) -> Result<bool, CheckError> {
        Ok(string_fits(policy, field, inquiry, |pattern, what| {
            what.contains(pattern)
        }))
    }
}

/// Matches patterns carrying tag-delimited regex sections.
///
/// A pattern containing neither of the policy's tags is compared by plain
/// equality. Anything else is compiled through [`compile_phrase`] and must
/// match the entire inquiry value. Compiled regexes are kept in a bounded
/// least-recently-used cache shared across threads.
///
/// ```text
/// 'Dog', 'Doge', 'Dogs' fit '<Dog[se]?>'; 'Dogger' does not.
/// ```
pub struct RegexChecker {
    cache: Mutex<LruCache<(String, String, String), Regex>>,
}

impl RegexChecker {
    /// Default number of cached compiled patterns.
    pub const DEFAULT_CACHE_SIZE: usize = 1024;

    /// Create a checker with the default cache size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cache_size(Self::DEFAULT_CACHE_SIZE)
    }

    /// Create a checker caching at most `cache_size` compiled patterns.
    /// A size of zero is clamped to one entry.
    #[must_use]
    pub fn with_cache_size(cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn compiled(
        &self,
        phrase: &str,
        start_tag: &str,
        end_tag: &str,
    ) -> Result<Regex, CheckError> {
        let key = (
            phrase.to_owned(),
            start_tag.to_owned(),
            end_tag.to_owned(),
        );
        let mut cache = self.cache.lock();
        if let Some(regex) = cache.get(&key) {
            return Ok(regex.clone());
        }
        let regex = compile_phrase(phrase, start_tag, end_tag)?;
        cache.put(key, regex.clone());
        Ok(regex)
    }
}

impl Default for RegexChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker for RegexChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Regex
    }

    fn fits(
        &self,
        policy: &Policy,
        field: PolicyField,
        inquiry: &Inquiry,
    ) -> Result<bool, CheckError> {
        let Some(what) = inquiry.field(field).as_str() else {
            return Ok(false);
        };
        for pattern in policy.matchers(field).iter().filter_map(Matcher::as_literal) {
            if !pattern.contains(policy.start_tag()) && !pattern.contains(policy.end_tag()) {
                if pattern == what {
                    return Ok(true);
                }
                continue;
            }
            let regex = self.compiled(pattern, policy.start_tag(), policy.end_tag())?;
            if regex.is_match(what) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Matches rules-typed policies by delegating to the rule algebra.
///
/// A rule matcher applies to the whole inquiry field value. A mapping
/// matcher requires every one of its keys to be present in the inquiry's
/// attribute mapping with the associated rule satisfied. Tags and string
/// patterns play no part here.
#[derive(Debug, Default, Clone, Copy)]
pub struct RulesChecker;

impl RulesChecker {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Checker for RulesChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Rules
    }

    fn fits(
        &self,
        policy: &Policy,
        field: PolicyField,
        inquiry: &Inquiry,
    ) -> Result<bool, CheckError> {
        let what = inquiry.field(field);
        Ok(policy
            .matchers(field)
            .iter()
            .any(|matcher| matcher_satisfied(matcher, what, inquiry)))
    }
}

fn matcher_satisfied(matcher: &Matcher, what: &Value, inquiry: &Inquiry) -> bool {
    match matcher {
        Matcher::Literal(_) => false,
        Matcher::Rule(rule) => rule.satisfied(what, Some(inquiry)),
        Matcher::Mapping(mapping) => {
            let Some(attributes) = what.as_object() else {
                return false;
            };
            mapping.iter().all(|(key, rule)| {
                attributes
                    .get(key)
                    .is_some_and(|value| rule.satisfied(value, Some(inquiry)))
            })
        }
    }
}
