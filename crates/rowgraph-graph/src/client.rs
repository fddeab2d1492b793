//! Neo4j connection management and the `neo4rs`-backed session provider.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use neo4rs::{BoltNull, BoltType, ConfigBuilder, Graph};
use rowgraph_core::{LoaderConfig, NodeValue, RelationValue, TableError, Value};
use rowgraph_cypher::StatementError;
use serde::de::IgnoredAny;

use crate::result::QueryResult;
use crate::session::{Bookmark, GraphSession, Params, SessionProvider};

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Statement error: {0}")]
    Statement(#[from] StatementError),

    #[error("Row source error: {0}")]
    Table(#[from] TableError),

    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Session backend error: {0}")]
    Backend(#[from] anyhow::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Parallel task failed: {0}")]
    TaskFailed(String),
}

impl GraphError {
    /// Whether the error comes from misusing the API rather than from the
    /// data or the database.
    pub fn is_usage(&self) -> bool {
        match self {
            GraphError::Usage(_) => true,
            GraphError::Statement(e) => e.is_usage(),
            _ => false,
        }
    }
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::from(&LoaderConfig::default())
    }
}

impl From<&LoaderConfig> for GraphConfig {
    fn from(config: &LoaderConfig) -> Self {
        Self {
            uri: config.uri.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            max_connections: config.max_connections,
            fetch_size: config.fetch_size,
        }
    }
}

/// Session provider over a pooled `neo4rs::Graph`.
///
/// `neo4rs` does not surface server bookmarks, so sessions mint a local
/// token per close and ignore the bookmarks they are seeded with. Causal
/// ordering then relies on the pooled connections of a single server.
#[derive(Clone)]
pub struct Neo4jProvider {
    graph: Graph,
    commits: Arc<AtomicU64>,
}

impl Neo4jProvider {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self {
            graph,
            commits: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Get a reference to the underlying neo4rs Graph for direct operations.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }
}

#[async_trait::async_trait]
impl SessionProvider for Neo4jProvider {
    type Session = Neo4jSession;

    async fn open_session(
        &self,
        database: Option<&str>,
        bookmarks: &[Bookmark],
    ) -> Result<Self::Session, GraphError> {
        tracing::trace!(database = ?database, bookmarks = bookmarks.len(), "Opening Neo4j session");
        if !bookmarks.is_empty() {
            // neo4rs cannot seed a session with bookmarks.
            tracing::debug!(
                database = ?database,
                dropped = bookmarks.len(),
                "Bookmark seed not forwarded to the Neo4j driver"
            );
        }
        Ok(Neo4jSession {
            graph: self.graph.clone(),
            database: database.map(str::to_string),
            commits: Arc::clone(&self.commits),
            wrote: false,
        })
    }
}

/// One logical session. Every statement runs in its own auto-commit
/// transaction on a pooled connection.
pub struct Neo4jSession {
    graph: Graph,
    database: Option<String>,
    commits: Arc<AtomicU64>,
    wrote: bool,
}

impl Neo4jSession {
    async fn execute(&mut self, statement: &str, params: Params) -> Result<QueryResult, GraphError> {
        let mut query = neo4rs::query(statement);
        for (name, value) in params {
            query = query.param(&name, to_bolt(value));
        }

        let mut stream = match &self.database {
            Some(db) => self.graph.execute_on(db.as_str(), query).await?,
            None => self.graph.execute(query).await?,
        };

        let mut keys: Option<Vec<String>> = None;
        let mut records = Vec::new();
        while let Some(row) = stream.next().await? {
            if keys.is_none() {
                keys = Some(row_keys(&row)?);
            }
            let fields = keys.as_deref().unwrap_or_default();
            let record = fields
                .iter()
                .map(|key| decode_field(&row, key))
                .collect::<Result<Vec<_>, _>>()?;
            records.push(record);
        }

        QueryResult::new(keys.unwrap_or_default(), records)
    }
}

#[async_trait::async_trait]
impl GraphSession for Neo4jSession {
    async fn run_write(&mut self, statement: &str, params: Params) -> Result<QueryResult, GraphError> {
        let result = self.execute(statement, params).await?;
        self.wrote = true;
        Ok(result)
    }

    async fn run_read(&mut self, statement: &str, params: Params) -> Result<QueryResult, GraphError> {
        self.execute(statement, params).await
    }

    async fn close(&mut self) -> Result<Option<Bookmark>, GraphError> {
        if !std::mem::take(&mut self.wrote) {
            return Ok(None);
        }
        let seq = self.commits.fetch_add(1, Ordering::Relaxed) + 1;
        let db = self.database.as_deref().unwrap_or("default");
        Ok(Some(Bookmark(format!("local:{db}:{seq}"))))
    }
}

// ── Value conversion ─────────────────────────────────────────────

/// Convert a parameter value into its Bolt representation.
pub(crate) fn to_bolt(value: Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => b.into(),
        Value::Int(i) => i.into(),
        Value::Float(f) => f.into(),
        Value::String(s) => s.into(),
        Value::List(items) => items.into_iter().map(to_bolt).collect::<Vec<_>>().into(),
        Value::Map(map) => bolt_map(map),
        Value::Node(node) => bolt_map(node.properties),
        Value::Relation(rel) => bolt_map(rel.properties),
    }
}

fn bolt_map(map: BTreeMap<String, Value>) -> BoltType {
    map.into_iter()
        .map(|(k, v)| (k, to_bolt(v)))
        .collect::<HashMap<String, BoltType>>()
        .into()
}

/// Column names of a row, in sorted order.
fn row_keys(row: &neo4rs::Row) -> Result<Vec<String>, GraphError> {
    let fields: BTreeMap<String, IgnoredAny> = row
        .to()
        .map_err(|e| GraphError::Decode(format!("cannot read row keys: {e}")))?;
    Ok(fields.into_keys().collect())
}

fn decode_field(row: &neo4rs::Row, key: &str) -> Result<Value, GraphError> {
    if let Ok(node) = row.get::<neo4rs::Node>(key) {
        return Ok(Value::Node(decode_node(&node)?));
    }
    if let Ok(rel) = row.get::<neo4rs::Relation>(key) {
        return Ok(Value::Relation(decode_relation(&rel)?));
    }
    row.get::<Value>(key)
        .map_err(|e| GraphError::Decode(format!("field `{key}`: {e}")))
}

fn decode_node(node: &neo4rs::Node) -> Result<NodeValue, GraphError> {
    let mut properties = BTreeMap::new();
    for key in node.keys() {
        let value = node
            .get::<Value>(key)
            .map_err(|e| GraphError::Decode(format!("node property `{key}`: {e}")))?;
        properties.insert(key.to_string(), value);
    }
    Ok(NodeValue {
        id: node.id(),
        labels: node.labels().iter().map(|l| l.to_string()).collect(),
        properties,
    })
}

fn decode_relation(rel: &neo4rs::Relation) -> Result<RelationValue, GraphError> {
    let mut properties = BTreeMap::new();
    for key in rel.keys() {
        let value = rel
            .get::<Value>(key)
            .map_err(|e| GraphError::Decode(format!("relationship property `{key}`: {e}")))?;
        properties.insert(key.to_string(), value);
    }
    Ok(RelationValue {
        id: rel.id(),
        rel_type: rel.typ().to_string(),
        start_id: rel.start_node_id(),
        end_id: rel.end_node_id(),
        properties,
    })
}
