//! The rendered statement type.

use std::fmt;

/// Name of the single parameter every bulk statement receives.
pub const ROWS_PARAM: &str = "rows";

/// An immutable, parameterized Cypher statement.
///
/// Bulk statements produced by the builders expect exactly one parameter,
/// `$rows`: a list of rows, each a list of values aligned to the attribute
/// list the statement was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement(String);

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Statement {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Statement {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl AsRef<str> for Statement {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
