use thiserror::Error;

/// Errors raised while constructing rules.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The supplied regular expression does not compile.
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern text.
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The supplied CIDR specification does not parse.
    #[error("invalid CIDR range '{0}'")]
    InvalidCidr(String),
}

/// Errors raised while constructing or decoding policies.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A policy's field lists mix plain strings with rules or mappings.
    #[error("policy '{uid}' mixes plain-string and rule matchers")]
    MixedDialect {
        /// Identifier of the offending policy.
        uid: String,
    },

    /// The JSON document is malformed or names an unknown rule variant.
    #[error("malformed policy document: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = PolicyError::MixedDialect { uid: "p-1".into() };
        assert_eq!(
            err.to_string(),
            "policy 'p-1' mixes plain-string and rule matchers"
        );

        let err = RuleError::InvalidCidr("10.0.0.0/99".into());
        assert_eq!(err.to_string(), "invalid CIDR range '10.0.0.0/99'");
    }
}
