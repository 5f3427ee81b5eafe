use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::effect::Effect;
use crate::error::PolicyError;
use crate::rule::Rule;

/// Which of a policy's three matcher lists is being matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyField {
    Subjects,
    Actions,
    Resources,
}

/// A single entry in a policy's subject, action, or resource list.
///
/// Plain strings belong to the string dialect; rules and mappings to the
/// rules dialect. A mapping matcher is satisfied when every one of its keys
/// is present in the inquiry's attribute mapping and the associated rule
/// holds for that attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Matcher {
    /// A plain string pattern, interpreted by the configured checker.
    Literal(String),
    /// A rule applied to the whole inquiry field value.
    Rule(Rule),
    /// Per-attribute rules applied to a mapping field value.
    Mapping(HashMap<String, Rule>),
}

impl Matcher {
    /// The pattern text, when this matcher is a plain string.
    #[must_use]
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(pattern) => Some(pattern),
            _ => None,
        }
    }
}

impl From<&str> for Matcher {
    fn from(pattern: &str) -> Self {
        Self::Literal(pattern.to_owned())
    }
}

impl From<String> for Matcher {
    fn from(pattern: String) -> Self {
        Self::Literal(pattern)
    }
}

impl From<Rule> for Matcher {
    fn from(rule: Rule) -> Self {
        Self::Rule(rule)
    }
}

impl From<HashMap<String, Rule>> for Matcher {
    fn from(mapping: HashMap<String, Rule>) -> Self {
        Self::Mapping(mapping)
    }
}

/// Whether a policy's matchers are plain strings or rules/mappings.
///
/// The two dialects are matched by different strategies and may not be
/// mixed within one policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// Every matcher is a plain string (also the case for empty lists).
    #[default]
    StringBased,
    /// At least one matcher is a rule or a mapping.
    RuleBased,
}

fn default_start_tag() -> String {
    "<".to_owned()
}

fn default_end_tag() -> String {
    ">".to_owned()
}

fn is_default_start_tag(tag: &str) -> bool {
    tag == "<"
}

fn is_default_end_tag(tag: &str) -> bool {
    tag == ">"
}

/// A declarative access grant or refusal.
///
/// When an inquiry satisfies all three matcher lists and every context
/// rule, the policy *fits* and contributes its effect to the decision.
/// Empty `subjects`, `actions`, or `resources` mean the policy never fits.
///
/// The dialect is detected at construction: matcher lists mixing plain
/// strings with rules or mappings are rejected. `start_tag` and `end_tag`
/// delimit regex sections inside string patterns (defaults `<` and `>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolicyDoc")]
pub struct Policy {
    uid: String,
    effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    subjects: Vec<Matcher>,
    actions: Vec<Matcher>,
    resources: Vec<Matcher>,
    context: HashMap<String, Rule>,
    #[serde(skip_serializing_if = "is_default_start_tag")]
    start_tag: String,
    #[serde(skip_serializing_if = "is_default_end_tag")]
    end_tag: String,
    #[serde(skip)]
    dialect: Dialect,
}

impl Policy {
    /// Create a policy from its identifier, effect, and matcher lists.
    ///
    /// Fails when the lists mix plain strings with rules or mappings.
    pub fn new(
        uid: impl Into<String>,
        effect: Effect,
        subjects: Vec<Matcher>,
        actions: Vec<Matcher>,
        resources: Vec<Matcher>,
    ) -> Result<Self, PolicyError> {
        let uid = uid.into();
        let dialect = detect_dialect(&uid, [&subjects, &actions, &resources])?;
        Ok(Self {
            uid,
            effect,
            description: None,
            subjects,
            actions,
            resources,
            context: HashMap::new(),
            start_tag: default_start_tag(),
            end_tag: default_end_tag(),
            dialect,
        })
    }

    /// Attach a free-form description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach context rules, evaluated against the inquiry's context.
    #[must_use]
    pub fn with_context(mut self, context: HashMap<String, Rule>) -> Self {
        self.context = context;
        self
    }

    /// Override the regex section delimiters used in string patterns.
    #[must_use]
    pub fn with_tags(mut self, start_tag: impl Into<String>, end_tag: impl Into<String>) -> Self {
        self.start_tag = start_tag.into();
        self.end_tag = end_tag.into();
        self
    }

    /// Identifier, unique within a storage.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    #[must_use]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The matching dialect detected at construction.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub fn context(&self) -> &HashMap<String, Rule> {
        &self.context
    }

    #[must_use]
    pub fn start_tag(&self) -> &str {
        &self.start_tag
    }

    #[must_use]
    pub fn end_tag(&self) -> &str {
        &self.end_tag
    }

    /// The matcher list for the given field.
    #[must_use]
    pub fn matchers(&self, field: PolicyField) -> &[Matcher] {
        match field {
            PolicyField::Subjects => &self.subjects,
            PolicyField::Actions => &self.actions,
            PolicyField::Resources => &self.resources,
        }
    }

    /// Encode this policy as a JSON document.
    pub fn to_json(&self) -> Result<String, PolicyError> {
        serde_json::to_string(self).map_err(PolicyError::Json)
    }

    /// Decode a policy from a JSON document, re-running dialect detection.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(json).map_err(PolicyError::Json)
    }
}

fn detect_dialect(uid: &str, lists: [&Vec<Matcher>; 3]) -> Result<Dialect, PolicyError> {
    let mut strings = false;
    let mut rules = false;
    for matcher in lists.into_iter().flatten() {
        match matcher {
            Matcher::Literal(_) => strings = true,
            Matcher::Rule(_) | Matcher::Mapping(_) => rules = true,
        }
    }
    if strings && rules {
        return Err(PolicyError::MixedDialect {
            uid: uid.to_owned(),
        });
    }
    Ok(if rules {
        Dialect::RuleBased
    } else {
        Dialect::StringBased
    })
}

/// Wire shape of a policy; validated into [`Policy`] on deserialization.
#[derive(Deserialize)]
struct PolicyDoc {
    uid: String,
    #[serde(default)]
    effect: Effect,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    subjects: Vec<Matcher>,
    #[serde(default)]
    actions: Vec<Matcher>,
    #[serde(default)]
    resources: Vec<Matcher>,
    #[serde(default)]
    context: HashMap<String, Rule>,
    #[serde(default = "default_start_tag")]
    start_tag: String,
    #[serde(default = "default_end_tag")]
    end_tag: String,
}

impl TryFrom<PolicyDoc> for Policy {
    type Error = PolicyError;

    fn try_from(doc: PolicyDoc) -> Result<Self, Self::Error> {
        let mut policy = Policy::new(doc.uid, doc.effect, doc.subjects, doc.actions, doc.resources)?;
        policy.description = doc.description;
        policy.context = doc.context;
        policy.start_tag = doc.start_tag;
        policy.end_tag = doc.end_tag;
        Ok(policy)
    }
}
