//! Bulk node-creation statements.

use std::collections::{HashMap, HashSet};

use rowgraph_core::NodeCreationMode;

use crate::error::StatementError;
use crate::patterns::{inline_attributes, node_pattern, row_as_map};
use crate::statement::{Statement, ROWS_PARAM};

/// Builds the `UNWIND $rows ...` statement that writes one node per row.
///
/// ```
/// # use rowgraph_cypher::NodeStatementBuilder;
/// let stmt = NodeStatementBuilder::new(["x", "y"]).label("P").build().unwrap();
/// assert_eq!(
///     stmt.as_str(),
///     "UNWIND $rows AS row\nWITH {x: row[0], y: row[1]} AS row\nCREATE (n:`P`)\nSET n = row"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct NodeStatementBuilder {
    attributes: Vec<String>,
    labels: Vec<String>,
    primary_key: Option<String>,
    mode: NodeCreationMode,
    rename: HashMap<String, String>,
}

impl NodeStatementBuilder {
    /// Start from the ordered attribute names the row values align to.
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = Some(key.into());
        self
    }

    pub fn maybe_primary_key(mut self, key: Option<String>) -> Self {
        self.primary_key = key;
        self
    }

    pub fn mode(mut self, mode: NodeCreationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Store the row column `from` under the attribute name `to`.
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rename.insert(from.into(), to.into());
        self
    }

    pub fn renames(mut self, map: &HashMap<String, String>) -> Self {
        self.rename
            .extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Stored attribute name of a row column.
    pub fn stored_name<'a>(&'a self, attribute: &'a str) -> &'a str {
        self.rename
            .get(attribute)
            .map(String::as_str)
            .unwrap_or(attribute)
    }

    /// Stored attribute names the statement matches on, if any.
    ///
    /// This is the primary key for the merge-on-id modes and every attribute
    /// for `MergeOnAllAttributes`.
    pub fn match_attributes(&self) -> Vec<String> {
        match self.mode {
            NodeCreationMode::Create => Vec::new(),
            NodeCreationMode::MergeIgnoreOnMatch | NodeCreationMode::MergeUpdateOnMatch => self
                .primary_key
                .iter()
                .map(|k| self.stored_name(k).to_string())
                .collect(),
            NodeCreationMode::MergeOnAllAttributes => self
                .attributes
                .iter()
                .map(|a| self.stored_name(a).to_string())
                .collect(),
        }
    }

    /// Stored attribute names worth indexing before the write.
    ///
    /// Every attribute for `MergeOnAllAttributes`, otherwise the primary key
    /// whenever one is given, even in `Create` mode, so that later edge
    /// writes can find the nodes by it.
    pub fn indexed_attributes(&self) -> Vec<String> {
        match self.mode {
            NodeCreationMode::MergeOnAllAttributes => self.match_attributes(),
            _ => self
                .primary_key
                .iter()
                .map(|k| self.stored_name(k).to_string())
                .collect(),
        }
    }

    pub fn is_parallel_safe(&self) -> bool {
        self.mode.is_parallel_safe()
    }

    fn validate(&self) -> Result<Vec<String>, StatementError> {
        if self.mode.requires_primary_key() && self.primary_key.is_none() {
            return Err(StatementError::MissingPrimaryKey {
                mode: format!("{:?}", self.mode),
            });
        }
        if self.labels.iter().any(String::is_empty) {
            return Err(StatementError::EmptyName("label"));
        }
        let stored = validate_attributes(&self.attributes, |a| self.stored_name(a))?;
        if let Some(key) = &self.primary_key {
            if !self.attributes.contains(key) {
                return Err(StatementError::UnknownAttribute {
                    role: "primary key",
                    name: key.clone(),
                });
            }
        }
        Ok(stored)
    }

    pub fn build(&self) -> Result<Statement, StatementError> {
        let stored = self.validate()?;

        let (verb, match_attributes, set_clause) = match self.mode {
            NodeCreationMode::Create => ("CREATE", Vec::new(), Some("SET n = row")),
            NodeCreationMode::MergeIgnoreOnMatch => {
                ("MERGE", self.match_attributes(), Some("ON CREATE SET n = row"))
            }
            NodeCreationMode::MergeUpdateOnMatch => {
                ("MERGE", self.match_attributes(), Some("SET n = row"))
            }
            NodeCreationMode::MergeOnAllAttributes => ("MERGE", stored.clone(), None),
        };

        let pattern = node_pattern(
            "n",
            &self.labels,
            &inline_attributes(&match_attributes, "row"),
        );

        let mut lines = vec![
            format!("UNWIND ${ROWS_PARAM} AS row"),
            format!("WITH {}", row_as_map(&stored, "row", "row", None)),
            format!("{verb} {pattern}"),
        ];
        if let Some(set) = set_clause {
            lines.push(set.to_string());
        }

        let statement = Statement::new(lines.join("\n"));
        tracing::debug!(mode = ?self.mode, statement = %statement, "Built node statement");
        Ok(statement)
    }
}

/// Check a declared attribute list and return the stored names in order.
pub(crate) fn validate_attributes<'a>(
    attributes: &'a [String],
    stored_name: impl Fn(&'a str) -> &'a str,
) -> Result<Vec<String>, StatementError> {
    if attributes.is_empty() {
        return Err(StatementError::EmptyAttributes);
    }
    let mut seen = HashSet::new();
    let mut stored = Vec::with_capacity(attributes.len());
    for attribute in attributes {
        let name = stored_name(attribute);
        if name.is_empty() {
            return Err(StatementError::EmptyName("attribute name"));
        }
        if !seen.insert(name) {
            return Err(StatementError::DuplicateAttribute(name.to_string()));
        }
        stored.push(name.to_string());
    }
    Ok(stored)
}
