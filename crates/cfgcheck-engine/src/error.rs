//! Engine-specific error types.

use thiserror::Error;

/// Errors that can abort a validation run before any report is produced.
///
/// Note that `validate` expression failures are NOT here: at evaluation
/// time they degrade to `evaluation_error` violations inside the report,
/// so one bad expression never hides the rest of the results.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A rule set failed to load, or version selection failed.
    #[error("rule error: {0}")]
    Rules(#[from] cfgcheck_rules::RuleParseError),

    /// The group input was not valid JSON.
    #[error("group input error: {0}")]
    Json(#[from] serde_json::Error),

    /// The group input parsed but has the wrong shape.
    #[error("invalid group input: {0}")]
    InvalidGroups(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A failure while evaluating a single `validate` expression.
///
/// These are per-assignment and recoverable: the validator converts them
/// into `evaluation_error` violations rather than aborting the run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalFailure {
    #[error("unknown role '{0}' in expression")]
    UnknownRole(String),

    #[error("field '{field}' not present on role '{role}'")]
    UnresolvedField { role: String, field: String },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression result is not a boolean: {0}")]
    NonBoolean(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
