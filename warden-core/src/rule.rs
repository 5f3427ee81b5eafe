use std::cmp::Ordering;
use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuleError;
use crate::inquiry::Inquiry;

/// A regular expression compiled once at rule construction.
///
/// Serializes as the pattern source text; two specs are equal when their
/// sources are equal.
#[derive(Debug, Clone)]
pub struct RegexSpec(Regex);

impl RegexSpec {
    /// Compile a pattern. A malformed pattern is a construction error.
    pub fn new(pattern: &str) -> Result<Self, RuleError> {
        Regex::new(pattern)
            .map(Self)
            .map_err(|source| RuleError::InvalidPattern {
                pattern: pattern.to_owned(),
                source,
            })
    }

    /// The pattern source text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }
}

impl PartialEq for RegexSpec {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Serialize for RegexSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for RegexSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        Self::new(&pattern).map_err(serde::de::Error::custom)
    }
}

/// One or more CIDR blocks parsed once at rule construction.
///
/// Accepts a comma-separated list of ranges; a bare address is treated as a
/// host route. Serializes as the original text.
#[derive(Debug, Clone)]
pub struct CidrSpec {
    raw: String,
    nets: Vec<IpNet>,
}

impl CidrSpec {
    /// Parse a CIDR specification. A malformed range is a construction error.
    pub fn new(spec: &str) -> Result<Self, RuleError> {
        let mut nets = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            let net = IpNet::from_str(part)
                .or_else(|_| IpAddr::from_str(part).map(IpNet::from))
                .map_err(|_| RuleError::InvalidCidr(spec.to_owned()))?;
            nets.push(net);
        }
        Ok(Self {
            raw: spec.to_owned(),
            nets,
        })
    }

    /// The specification source text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn contains(&self, addr: IpAddr) -> bool {
        self.nets.iter().any(|net| net.contains(&addr))
    }
}

impl PartialEq for CidrSpec {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Serialize for CidrSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for CidrSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let spec = String::deserialize(deserializer)?;
        Self::new(&spec).map_err(serde::de::Error::custom)
    }
}

/// A pure predicate over an attribute value.
///
/// Rules are total: an operand of an incompatible type yields `false`,
/// never an error. Container variants (`Not`, `And`, `Or`) own their child
/// rules and forward the inquiry to them unchanged.
///
/// Every variant serializes as a JSON object tagged with a `"type"` key
/// naming the variant; the remaining keys are the constructor arguments.
/// Decoding an unknown `"type"` fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Rule {
    // Comparison. Operands must be mutually orderable: numbers compare
    // numerically, strings lexicographically, anything else is false.
    /// Operand equals the given value.
    Eq { value: Value },
    /// Operand differs from the given value.
    NotEq { value: Value },
    /// Operand is strictly greater than the given value.
    Greater { value: Value },
    /// Operand is strictly less than the given value.
    Less { value: Value },
    /// Operand is greater than or equal to the given value.
    GreaterOrEqual { value: Value },
    /// Operand is less than or equal to the given value.
    LessOrEqual { value: Value },

    // Logic.
    /// Operand is boolean `true`.
    IsTrue,
    /// Operand is boolean `false`.
    IsFalse,
    /// Inverts the inner rule.
    Not { rule: Box<Rule> },
    /// Every inner rule holds; an empty list holds.
    And { rules: Vec<Rule> },
    /// At least one inner rule holds; an empty list does not.
    Or { rules: Vec<Rule> },
    /// Always holds.
    Any,
    /// Never holds.
    Neither,

    // String.
    /// Operand is a string equal to the given one.
    StrEqual {
        value: String,
        #[serde(default)]
        case_insensitive: bool,
    },
    /// Operand is a list of 2-lists whose string members are pairwise equal.
    PairsEqual,
    /// Operand is a string matched by the pattern (unanchored search).
    RegexMatch { pattern: RegexSpec },
    /// Operand is a string starting with the given prefix.
    StartsWith {
        value: String,
        #[serde(default)]
        case_insensitive: bool,
    },
    /// Operand is a string ending with the given suffix.
    EndsWith {
        value: String,
        #[serde(default)]
        case_insensitive: bool,
    },
    /// Operand is a string containing the given substring.
    Contains {
        value: String,
        #[serde(default)]
        case_insensitive: bool,
    },

    // Inquiry-scoped. These ignore the attribute under test and read from
    // the inquiry itself; without an inquiry in scope they are false.
    /// The given value equals the inquiry's subject.
    SubjectEqual { value: Value },
    /// The given value equals the inquiry's action.
    ActionEqual { value: Value },
    /// The given value equals, or is contained in, the inquiry's resource.
    ResourceIn { value: Value },

    // Network.
    /// Operand is a textual IP address inside one of the given CIDR blocks.
    Cidr { cidr: CidrSpec },

    // List.
    /// Operand is one of the given values.
    In { values: Vec<Value> },
    /// Operand is none of the given values.
    NotIn { values: Vec<Value> },
    /// Operand is a list whose every element is among the given values.
    AllIn { values: Vec<Value> },
    /// Operand is a list none of whose elements is among the given values.
    AllNotIn { values: Vec<Value> },
    /// Operand is a list with at least one element among the given values.
    AnyIn { values: Vec<Value> },
    /// Operand is a list with at least one element not among the given values.
    AnyNotIn { values: Vec<Value> },
}

impl Rule {
    /// Build a [`Rule::RegexMatch`], compiling the pattern.
    pub fn regex_match(pattern: &str) -> Result<Self, RuleError> {
        Ok(Self::RegexMatch {
            pattern: RegexSpec::new(pattern)?,
        })
    }

    /// Build a [`Rule::Cidr`], parsing the comma-separated ranges.
    pub fn cidr(spec: &str) -> Result<Self, RuleError> {
        Ok(Self::Cidr {
            cidr: CidrSpec::new(spec)?,
        })
    }

    /// Evaluate this rule against an attribute value.
    ///
    /// `inquiry` carries the full inquiry for the inquiry-scoped variants;
    /// every other variant ignores it.
    #[must_use]
    pub fn satisfied(&self, what: &Value, inquiry: Option<&Inquiry>) -> bool {
        match self {
            Self::Eq { value } => what == value,
            Self::NotEq { value } => what != value,
            Self::Greater { value } => compare(what, value).is_some_and(Ordering::is_gt),
            Self::Less { value } => compare(what, value).is_some_and(Ordering::is_lt),
            Self::GreaterOrEqual { value } => compare(what, value).is_some_and(Ordering::is_ge),
            Self::LessOrEqual { value } => compare(what, value).is_some_and(Ordering::is_le),

            Self::IsTrue => what == &Value::Bool(true),
            Self::IsFalse => what == &Value::Bool(false),
            Self::Not { rule } => !rule.satisfied(what, inquiry),
            Self::And { rules } => rules.iter().all(|rule| rule.satisfied(what, inquiry)),
            Self::Or { rules } => rules.iter().any(|rule| rule.satisfied(what, inquiry)),
            Self::Any => true,
            Self::Neither => false,

            Self::StrEqual {
                value,
                case_insensitive,
            } => str_test(what, value, *case_insensitive, |operand, value| {
                operand == value
            }),
            Self::PairsEqual => pairs_equal(what),
            Self::RegexMatch { pattern } => what.as_str().is_some_and(|s| pattern.is_match(s)),
            Self::StartsWith {
                value,
                case_insensitive,
            } => str_test(what, value, *case_insensitive, |operand, value| {
                operand.starts_with(value)
            }),
            Self::EndsWith {
                value,
                case_insensitive,
            } => str_test(what, value, *case_insensitive, |operand, value| {
                operand.ends_with(value)
            }),
            Self::Contains {
                value,
                case_insensitive,
            } => str_test(what, value, *case_insensitive, |operand, value| {
                operand.contains(value)
            }),

            Self::SubjectEqual { value } => inquiry.is_some_and(|inq| &inq.subject == value),
            Self::ActionEqual { value } => inquiry.is_some_and(|inq| &inq.action == value),
            Self::ResourceIn { value } => {
                inquiry.is_some_and(|inq| resource_in(value, &inq.resource))
            }

            Self::Cidr { cidr } => what
                .as_str()
                .and_then(|s| s.parse::<IpAddr>().ok())
                .is_some_and(|addr| cidr.contains(addr)),

            Self::In { values } => values.contains(what),
            Self::NotIn { values } => !values.contains(what),
            Self::AllIn { values } => what
                .as_array()
                .is_some_and(|items| items.iter().all(|item| values.contains(item))),
            Self::AllNotIn { values } => what
                .as_array()
                .is_some_and(|items| items.iter().all(|item| !values.contains(item))),
            Self::AnyIn { values } => what
                .as_array()
                .is_some_and(|items| items.iter().any(|item| values.contains(item))),
            Self::AnyNotIn { values } => what
                .as_array()
                .is_some_and(|items| items.iter().any(|item| !values.contains(item))),
        }
    }

    /// Encode this rule as a JSON document.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a rule from a JSON document. An unknown `"type"` discriminator
    /// fails.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Ordering between two attribute values: numbers numerically, strings
/// lexicographically. Cross-type pairs do not order.
fn compare(what: &Value, value: &Value) -> Option<Ordering> {
    match (what, value) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn str_test(
    what: &Value,
    value: &str,
    case_insensitive: bool,
    test: impl Fn(&str, &str) -> bool,
) -> bool {
    let Some(operand) = what.as_str() else {
        return false;
    };
    if case_insensitive {
        test(&operand.to_lowercase(), &value.to_lowercase())
    } else {
        test(operand, value)
    }
}

fn pairs_equal(what: &Value) -> bool {
    let Some(pairs) = what.as_array() else {
        return false;
    };
    pairs.iter().all(|pair| {
        pair.as_array().is_some_and(|members| {
            members.len() == 2
                && matches!(
                    (&members[0], &members[1]),
                    (Value::String(a), Value::String(b)) if a == b
                )
        })
    })
}

fn resource_in(value: &Value, resource: &Value) -> bool {
    if value == resource {
        return true;
    }
    match (value, resource) {
        (Value::String(needle), Value::String(haystack)) => haystack.contains(needle.as_str()),
        (_, Value::Array(items)) => items.contains(value),
        _ => false,
    }
}
