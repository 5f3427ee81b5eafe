use serde::{Deserialize, Serialize};

/// The outcome a policy contributes to a decision when it fits an inquiry.
///
/// Serializes as the lowercase strings `"allow"` and `"deny"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Grant the inquired access.
    Allow,
    /// Refuse the inquired access.
    #[default]
    Deny,
}

impl Effect {
    /// Returns `true` for [`Effect::Allow`].
    #[must_use]
    pub fn is_allow(self) -> bool {
        matches!(self, Self::Allow)
    }
}
