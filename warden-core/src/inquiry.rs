use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::policy::PolicyField;

/// A single authorization question presented to the engine.
///
/// `subject`, `action` and `resource` are plain strings when matched by a
/// string-typed policy, or attribute mappings when matched by a rules-typed
/// one. `context` carries the remaining attributes of the access attempt
/// (client address, time of day, request metadata) for a policy's context
/// rules.
///
/// Inquiries are transient values: build one per access attempt and drop it
/// after the decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inquiry {
    /// The party attempting the access.
    #[serde(default)]
    pub subject: Value,
    /// What the party wants to do.
    #[serde(default)]
    pub action: Value,
    /// What the action is aimed at.
    #[serde(default)]
    pub resource: Value,
    /// Attributes evaluated against a policy's context rules.
    #[serde(default)]
    pub context: HashMap<String, Value>,
}

impl Inquiry {
    /// Create an inquiry with an empty context.
    pub fn new(
        subject: impl Into<Value>,
        action: impl Into<Value>,
        resource: impl Into<Value>,
    ) -> Self {
        Self {
            subject: subject.into(),
            action: action.into(),
            resource: resource.into(),
            context: HashMap::new(),
        }
    }

    /// Attach context attributes to this inquiry.
    #[must_use]
    pub fn with_context(mut self, context: HashMap<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// The inquiry value matched against the given policy field.
    #[must_use]
    pub fn field(&self, field: PolicyField) -> &Value {
        match field {
            PolicyField::Subjects => &self.subject,
            PolicyField::Actions => &self.action,
            PolicyField::Resources => &self.resource,
        }
    }

    /// Encode this inquiry as a JSON document.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode an inquiry from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
