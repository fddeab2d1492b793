//! Bulk edge-creation statements.

use std::collections::{HashMap, HashSet};

use rowgraph_core::{edge_parallel_safe, RelCreationMode, RelNodeCreationMode};

use crate::error::StatementError;
use crate::nodes::validate_attributes;
use crate::patterns::{inline_attributes, node_pattern, rel_pattern, row_as_map};
use crate::statement::{Statement, ROWS_PARAM};

/// One end of an edge: how to find (or create) the node a row points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub labels: Vec<String>,
    /// Row column identifying the node.
    pub key: String,
    /// Further row columns stored on, and matched against, the node.
    pub attributes: Vec<String>,
    pub mode: RelNodeCreationMode,
}

impl Endpoint {
    pub fn new(label: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            labels: vec![label.into()],
            key: key.into(),
            attributes: Vec::new(),
            mode: RelNodeCreationMode::default(),
        }
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn with_mode(mut self, mode: RelNodeCreationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Key first, then the extra attributes.
    pub fn columns(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.key).chain(self.attributes.iter())
    }
}

/// Stored attribute names claimed by each part of an edge statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeLayout {
    pub all: Vec<String>,
    pub src: Vec<String>,
    pub dst: Vec<String>,
    pub rel: Vec<String>,
}

/// Builds the `UNWIND $rows ...` statement that writes one edge per row.
#[derive(Debug, Clone)]
pub struct EdgeStatementBuilder {
    attributes: Vec<String>,
    src: Endpoint,
    dst: Endpoint,
    rel_type: String,
    mode: RelCreationMode,
    rename: HashMap<String, String>,
}

impl EdgeStatementBuilder {
    pub fn new<I, S>(attributes: I, src: Endpoint, rel_type: impl Into<String>, dst: Endpoint) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
            src,
            dst,
            rel_type: rel_type.into(),
            mode: RelCreationMode::default(),
            rename: HashMap::new(),
        }
    }

    pub fn mode(mut self, mode: RelCreationMode) -> Self {
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

    pub fn source(&self) -> &Endpoint {
        &self.src
    }

    pub fn target(&self) -> &Endpoint {
        &self.dst
    }

    pub fn rel_type(&self) -> &str {
        &self.rel_type
    }

    pub fn is_parallel_safe(&self) -> bool {
        edge_parallel_safe(self.src.mode, self.dst.mode, self.mode)
    }

    fn stored_name<'a>(&'a self, attribute: &'a str) -> &'a str {
        self.rename
            .get(attribute)
            .map(String::as_str)
            .unwrap_or(attribute)
    }

    /// Validate the declared attributes and partition them between the two
    /// endpoints and the edge. Edge attributes are everything no endpoint
    /// claims, in declared order.
    pub fn layout(&self) -> Result<EdgeLayout, StatementError> {
        if self.rel_type.is_empty() {
            return Err(StatementError::EmptyName("relationship type"));
        }
        for endpoint in [&self.src, &self.dst] {
            if endpoint.labels.iter().any(String::is_empty) {
                return Err(StatementError::EmptyName("label"));
            }
        }
        let all = validate_attributes(&self.attributes, |a| self.stored_name(a))?;

        let mut claimed = HashSet::new();
        let mut endpoint_columns = |endpoint: &Endpoint, role: &'static str| {
            endpoint
                .columns()
                .map(|column| {
                    if !self.attributes.contains(column) {
                        return Err(StatementError::UnknownAttribute {
                            role,
                            name: column.clone(),
                        });
                    }
                    claimed.insert(column.clone());
                    Ok(self.stored_name(column).to_string())
                })
                .collect::<Result<Vec<_>, _>>()
        };
        let src = endpoint_columns(&self.src, "source")?;
        let dst = endpoint_columns(&self.dst, "target")?;

        let rel = self
            .attributes
            .iter()
            .filter(|a| !claimed.contains(*a))
            .map(|a| self.stored_name(a).to_string())
            .collect();

        Ok(EdgeLayout { all, src, dst, rel })
    }

    pub fn build(&self) -> Result<Statement, StatementError> {
        let layout = self.layout()?;

        let src = node_pattern(
            "src",
            &self.src.labels,
            &inline_attributes(&layout.src, "row"),
        );
        let dst = node_pattern(
            "dst",
            &self.dst.labels,
            &inline_attributes(&layout.dst, "row"),
        );
        let rel = rel_pattern(
            "(src)",
            "(dst)",
            "r",
            &self.rel_type,
            &inline_attributes(&layout.rel, "row"),
            true,
        );

        let statement = Statement::new(
            [
                format!("UNWIND ${ROWS_PARAM} AS row"),
                format!("WITH {}", row_as_map(&layout.all, "row", "row", None)),
                format!("{} {src}", self.src.mode.keyword()),
                format!("{} {dst}", self.dst.mode.keyword()),
                format!("{} {rel}", self.mode.keyword()),
            ]
            .join("\n"),
        );
        tracing::debug!(
            src_mode = ?self.src.mode,
            dst_mode = ?self.dst.mode,
            mode = ?self.mode,
            statement = %statement,
            "Built edge statement"
        );
        Ok(statement)
    }
}
