//! The connector handle: raw queries and parallelism scopes.

use std::future::Future;
use std::sync::Arc;

use rowgraph_core::LoaderConfig;
use rowgraph_cypher::Statement;

use crate::client::{GraphConfig, GraphError, Neo4jProvider};
use crate::result::QueryResult;
use crate::session::{AccessMode, Bookmark, Params, PendingQuery, SessionManager, SessionProvider};

/// Per-connector settings that do not concern the connection itself.
#[derive(Debug, Clone)]
pub struct ConnectorOptions {
    /// Target database; `None` for the server default.
    pub database: Option<String>,
    pub batch_size: usize,
    /// Upper bound on concurrently running parallel units.
    pub threads: usize,
    pub create_indexes: bool,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self::from(&LoaderConfig::default())
    }
}

impl From<&LoaderConfig> for ConnectorOptions {
    fn from(config: &LoaderConfig) -> Self {
        Self {
            database: config.database.clone(),
            batch_size: config.batch_size,
            threads: config.threads,
            create_indexes: config.create_indexes,
        }
    }
}

/// Handle for bulk loading into, and querying, a graph database.
///
/// Clone is cheap: clones share the bookmark state, the parallel-mode flag
/// and the worker pool. A clone obtained through [`Connector::on_database`]
/// targets another database with the same shared state.
pub struct Connector<P: SessionProvider> {
    pub(crate) sessions: Arc<SessionManager<P>>,
    pub(crate) options: Arc<ConnectorOptions>,
    pub(crate) database: Option<String>,
}

impl<P: SessionProvider> Clone for Connector<P> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            options: Arc::clone(&self.options),
            database: self.database.clone(),
        }
    }
}

impl Connector<Neo4jProvider> {
    /// Connect to Neo4j using a loader configuration.
    pub async fn connect(config: &LoaderConfig) -> Result<Self, GraphError> {
        let provider = Neo4jProvider::connect(&GraphConfig::from(config)).await?;
        Ok(Self::new(provider, ConnectorOptions::from(config)))
    }
}

impl<P: SessionProvider> Connector<P> {
    pub fn new(provider: P, options: ConnectorOptions) -> Self {
        tracing::debug!(
            database = ?options.database,
            threads = options.threads,
            batch_size = options.batch_size,
            "Connector created"
        );
        Self {
            sessions: Arc::new(SessionManager::new(provider, options.threads)),
            database: options.database.clone(),
            options: Arc::new(options),
        }
    }

    /// A handle on `database` sharing this connector's state.
    pub fn on_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..self.clone()
        }
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn options(&self) -> &ConnectorOptions {
        &self.options
    }

    pub fn provider(&self) -> &P {
        self.sessions.provider()
    }

    pub fn is_parallel(&self) -> bool {
        self.sessions.is_parallel()
    }

    /// Bookmarks the next session on this connector's database starts from.
    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.sessions.bookmarks(self.database())
    }

    // ── Raw queries ──────────────────────────────────────────────

    /// Run a read statement in a sequential session.
    pub async fn read_query(
        &self,
        statement: impl Into<Statement>,
        params: Params,
    ) -> Result<QueryResult, GraphError> {
        let statement = statement.into();
        self.sessions
            .run_sequential(self.database(), AccessMode::Read, statement.as_str(), params)
            .await
    }

    /// Run a write statement in a sequential session.
    pub async fn write_query(
        &self,
        statement: impl Into<Statement>,
        params: Params,
    ) -> Result<QueryResult, GraphError> {
        let statement = statement.into();
        self.sessions
            .run_sequential(self.database(), AccessMode::Write, statement.as_str(), params)
            .await
    }

    /// Dispatch a read statement to the worker pool. Only valid inside
    /// [`Connector::with_parallelism`].
    pub fn parallel_read_query(
        &self,
        statement: impl Into<Statement>,
        params: Params,
    ) -> Result<PendingQuery, GraphError> {
        self.spawn(AccessMode::Read, statement.into(), params)
    }

    /// Dispatch a write statement to the worker pool. Only valid inside
    /// [`Connector::with_parallelism`].
    pub fn parallel_write_query(
        &self,
        statement: impl Into<Statement>,
        params: Params,
    ) -> Result<PendingQuery, GraphError> {
        self.spawn(AccessMode::Write, statement.into(), params)
    }

    fn spawn(
        &self,
        access: AccessMode,
        statement: Statement,
        params: Params,
    ) -> Result<PendingQuery, GraphError> {
        let statement: Arc<str> = Arc::from(statement.into_string());
        self.sessions
            .spawn_parallel(self.database(), access, statement, params)
    }

    // ── Parallelism scope ────────────────────────────────────────

    /// Run `body` with parallel dispatch enabled.
    ///
    /// Every unit `body` dispatched is awaited before this returns, whether
    /// `body` succeeded or not, and their bookmarks become the current ones.
    /// An error from `body` takes precedence over unit failures.
    ///
    /// If `body` panics or the returned future is dropped early, parallel
    /// mode is still left: finished units keep their bookmarks and the
    /// others are aborted.
    pub async fn with_parallelism<F, Fut, T>(&self, body: F) -> Result<T, GraphError>
    where
        F: FnOnce(Connector<P>) -> Fut,
        Fut: Future<Output = Result<T, GraphError>>,
    {
        let scope = self.sessions.scope()?;
        let outcome = body(self.clone()).await;
        let drained = scope.exit().await;

        match outcome {
            Ok(value) => drained.map(|()| value),
            Err(e) => {
                if let Err(unit) = drained {
                    tracing::warn!(error = %unit, "Parallel unit failed after scope body error");
                }
                Err(e)
            }
        }
    }
}
