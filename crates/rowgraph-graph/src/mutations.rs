//! Bulk writes of nodes and edges, and the indexes backing them.

use std::collections::HashMap;

use rowgraph_core::{NodeCreationMode, RelCreationMode, RowSource};
use rowgraph_cypher::{schema, EdgeStatementBuilder, Endpoint, NodeStatementBuilder, Statement};

use crate::batch::BatchReport;
use crate::client::GraphError;
use crate::connector::Connector;
use crate::session::{Params, SessionProvider};

/// How to write a row source as nodes.
#[derive(Debug, Clone, Default)]
pub struct EntitySpec {
    pub labels: Vec<String>,
    /// Attribute names the row values align to. Defaults to the source's
    /// column names; required for sources without names.
    pub attributes: Option<Vec<String>>,
    pub primary_key: Option<String>,
    /// `None` means [`NodeCreationMode::Create`].
    pub mode: Option<NodeCreationMode>,
    /// Row column to stored attribute name.
    pub rename: HashMap<String, String>,
    /// Overrides the connector's batch size.
    pub batch_size: Option<usize>,
    /// Replaces the generated statement. Always runs sequentially.
    pub statement: Option<Statement>,
}

impl EntitySpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            labels: vec![label.into()],
            ..Default::default()
        }
    }

    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = Some(key.into());
        self
    }

    pub fn mode(mut self, mode: NodeCreationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rename.insert(from.into(), to.into());
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn statement(mut self, statement: impl Into<Statement>) -> Self {
        self.statement = Some(statement.into());
        self
    }
}

/// How to write a row source as edges.
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub rel_type: String,
    pub src: Endpoint,
    pub dst: Endpoint,
    pub attributes: Option<Vec<String>>,
    /// `None` means [`RelCreationMode::Create`].
    pub mode: Option<RelCreationMode>,
    pub rename: HashMap<String, String>,
    pub batch_size: Option<usize>,
    pub statement: Option<Statement>,
}

impl EdgeSpec {
    pub fn new(src: Endpoint, rel_type: impl Into<String>, dst: Endpoint) -> Self {
        Self {
            rel_type: rel_type.into(),
            src,
            dst,
            attributes: None,
            mode: None,
            rename: HashMap::new(),
            batch_size: None,
            statement: None,
        }
    }

    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    pub fn mode(mut self, mode: RelCreationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rename.insert(from.into(), to.into());
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn statement(mut self, statement: impl Into<Statement>) -> Self {
        self.statement = Some(statement.into());
        self
    }
}

/// Attribute names for `source`: declared ones, else the source's own.
fn resolve_attributes<S: RowSource + ?Sized>(
    source: &S,
    declared: Option<&Vec<String>>,
) -> Result<Vec<String>, GraphError> {
    let attributes = match (declared, source.column_names()) {
        (Some(declared), _) => declared.clone(),
        (None, Some(columns)) => columns.to_vec(),
        (None, None) => {
            return Err(GraphError::Usage(
                "attribute names are required for sources without column names".into(),
            ))
        }
    };
    if attributes.len() != source.width() {
        return Err(GraphError::Validation(format!(
            "{} attribute names declared for a source with {} columns",
            attributes.len(),
            source.width()
        )));
    }
    Ok(attributes)
}

fn check_custom_statement<M: std::fmt::Debug>(
    statement: &Option<Statement>,
    mode: &Option<M>,
) -> Result<(), GraphError> {
    if let (Some(_), Some(mode)) = (statement, mode) {
        return Err(GraphError::Usage(format!(
            "creation mode {mode:?} cannot be combined with a custom statement"
        )));
    }
    Ok(())
}

impl<P: SessionProvider> Connector<P> {
    // ── Indexes ──────────────────────────────────────────────────

    /// Create an index on `label` over `attributes` unless it exists.
    /// Returns the index name, or `None` when `attributes` is empty.
    pub async fn create_node_index<S: AsRef<str>>(
        &self,
        label: &str,
        attributes: &[S],
    ) -> Result<Option<String>, GraphError> {
        let Some((name, statement)) = schema::node_index(label, attributes) else {
            return Ok(None);
        };
        self.write_query(statement, Params::new()).await?;
        tracing::debug!(index = %name, label, "Node index ensured");
        Ok(Some(name))
    }

    /// Create an index on relationship type `rel_type` over `attributes`
    /// unless it exists.
    pub async fn create_rel_index<S: AsRef<str>>(
        &self,
        rel_type: &str,
        attributes: &[S],
    ) -> Result<Option<String>, GraphError> {
        let Some((name, statement)) = schema::rel_index(rel_type, attributes) else {
            return Ok(None);
        };
        self.write_query(statement, Params::new()).await?;
        tracing::debug!(index = %name, rel_type, "Relationship index ensured");
        Ok(Some(name))
    }

    // ── Bulk writes ──────────────────────────────────────────────

    /// Write every row of `source` as a node.
    ///
    /// Create and MergeIgnoreOnMatch writes run their batches in parallel;
    /// the other modes, and custom statements, run sequentially.
    pub async fn create_entities<S>(
        &self,
        source: &S,
        spec: &EntitySpec,
    ) -> Result<BatchReport, GraphError>
    where
        S: RowSource + ?Sized,
    {
        if spec.labels.is_empty() {
            return Err(GraphError::Usage("at least one label is required".into()));
        }
        check_custom_statement(&spec.statement, &spec.mode)?;
        let attributes = resolve_attributes(source, spec.attributes.as_ref())?;
        let mode = spec.mode.unwrap_or_default();

        let builder = NodeStatementBuilder::new(attributes)
            .labels(spec.labels.iter().cloned())
            .maybe_primary_key(spec.primary_key.clone())
            .mode(mode)
            .renames(&spec.rename);
        let generated = builder.build()?;

        let (statement, parallel) = match &spec.statement {
            Some(custom) => (custom.clone(), false),
            None => (generated, builder.is_parallel_safe()),
        };

        if spec.statement.is_none() && self.options.create_indexes {
            let indexed = builder.indexed_attributes();
            for label in &spec.labels {
                self.create_node_index(label, &indexed).await?;
            }
        }

        let batch_size = spec.batch_size.unwrap_or(self.options.batch_size);
        let report = self
            .run_batches(source, &statement, batch_size, parallel)
            .await?;
        tracing::info!(
            labels = ?spec.labels,
            mode = ?mode,
            rows = report.rows,
            batches = report.batches,
            parallel = report.parallel,
            "Entities written"
        );
        Ok(report)
    }

    /// Write every row of `source` as an edge between two endpoint nodes.
    ///
    /// Batches run in parallel only when the edge is created and both
    /// endpoints are matched or created.
    pub async fn create_edges<S>(&self, source: &S, spec: &EdgeSpec) -> Result<BatchReport, GraphError>
    where
        S: RowSource + ?Sized,
    {
        check_custom_statement(&spec.statement, &spec.mode)?;
        let attributes = resolve_attributes(source, spec.attributes.as_ref())?;
        let mode = spec.mode.unwrap_or_default();

        let builder = EdgeStatementBuilder::new(
            attributes,
            spec.src.clone(),
            spec.rel_type.clone(),
            spec.dst.clone(),
        )
        .mode(mode)
        .renames(&spec.rename);
        let layout = builder.layout()?;
        let generated = builder.build()?;

        let (statement, parallel) = match &spec.statement {
            Some(custom) => (custom.clone(), false),
            None => (generated, builder.is_parallel_safe()),
        };

        if spec.statement.is_none() && self.options.create_indexes {
            for label in &spec.src.labels {
                self.create_node_index(label, &layout.src).await?;
            }
            for label in &spec.dst.labels {
                self.create_node_index(label, &layout.dst).await?;
            }
            self.create_rel_index(&spec.rel_type, &layout.rel).await?;
        }

        let batch_size = spec.batch_size.unwrap_or(self.options.batch_size);
        let report = self
            .run_batches(source, &statement, batch_size, parallel)
            .await?;
        tracing::info!(
            rel_type = %spec.rel_type,
            mode = ?mode,
            rows = report.rows,
            batches = report.batches,
            parallel = report.parallel,
            "Edges written"
        );
        Ok(report)
    }
}
