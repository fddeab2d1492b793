//! Error types for statement building.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatementError {
    #[error("Creation mode {mode} requires a primary key")]
    MissingPrimaryKey { mode: String },

    #[error("{role} attribute {name} is not among the declared attributes")]
    UnknownAttribute { role: &'static str, name: String },

    #[error("At least one attribute must be declared")]
    EmptyAttributes,

    #[error("Attribute {0} is declared more than once")]
    DuplicateAttribute(String),

    #[error("{0} must not be empty")]
    EmptyName(&'static str),
}

impl StatementError {
    /// Programming-contract violations, as opposed to data/shape problems.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            StatementError::MissingPrimaryKey { .. } | StatementError::EmptyName(_)
        )
    }
}
