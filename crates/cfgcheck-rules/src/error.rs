use thiserror::Error;

/// Errors that can occur while loading and validating rule sets.
///
/// All of these are configuration defects: they abort loading before any
/// group is evaluated, and the message names the offending constraint.
#[derive(Debug, Error)]
pub enum RuleParseError {
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid version identifier '{0}'")]
    InvalidVersion(String),

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Invalid constraint '{name}': {reason}")]
    InvalidConstraint { name: String, reason: String },

    #[error("Unknown check type '{check_type}' in constraint '{name}'")]
    UnknownCheckType { name: String, check_type: String },

    #[error("Constraint '{name}': role '{role}' has no link to any earlier role")]
    UnlinkedRole { name: String, role: String },

    #[error("Constraint '{name}': expression parse error: {reason}")]
    Expression { name: String, reason: String },

    #[error("Expression parse error: {0}")]
    ExpressionSyntax(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuleParseError {
    /// Shorthand for an `InvalidConstraint` with an owned name.
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        RuleParseError::InvalidConstraint {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleParseError>;
