//! Sessions and causal bookmarks.
//!
//! The [`SessionManager`] keeps one bookmark list per target database and
//! seeds every session it opens with it, so a session always observes the
//! writes made earlier through the same connector. It runs in one of two
//! mutually exclusive modes:
//!
//! - **Sequential**: each session's closing bookmark replaces the database's
//!   bookmark list.
//! - **Parallel**: sessions run as spawned tasks, bounded by a semaphore.
//!   Their closing bookmarks are collected under a lock and only become the
//!   database's bookmark list once every task of the scope has finished.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rowgraph_core::Value;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;

use crate::client::GraphError;
use crate::result::QueryResult;

/// Named statement parameters.
pub type Params = BTreeMap<String, Value>;

/// Opaque causal-consistency token handed out by the database when a
/// session closes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bookmark(pub String);

impl Bookmark {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Bookmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a statement runs in a read or a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// Opens sessions against the graph database.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync + 'static {
    type Session: GraphSession;

    /// Open a session on `database` (`None` for the server default) that
    /// observes at least the writes represented by `bookmarks`.
    async fn open_session(
        &self,
        database: Option<&str>,
        bookmarks: &[Bookmark],
    ) -> Result<Self::Session, GraphError>;
}

/// A single session. Each `run_*` call is one transaction.
#[async_trait::async_trait]
pub trait GraphSession: Send {
    async fn run_write(&mut self, statement: &str, params: Params)
        -> Result<QueryResult, GraphError>;

    async fn run_read(&mut self, statement: &str, params: Params)
        -> Result<QueryResult, GraphError>;

    /// Close the session and return the bookmark covering its writes, if the
    /// backend produced one.
    async fn close(&mut self) -> Result<Option<Bookmark>, GraphError>;
}

async fn run_in<S: GraphSession>(
    session: &mut S,
    access: AccessMode,
    statement: &str,
    params: Params,
) -> Result<QueryResult, GraphError> {
    match access {
        AccessMode::Read => session.run_read(statement, params).await,
        AccessMode::Write => session.run_write(statement, params).await,
    }
}

/// Result of a query dispatched inside a parallelism scope.
#[derive(Debug)]
pub struct PendingQuery {
    rx: oneshot::Receiver<QueryResult>,
}

impl PendingQuery {
    /// Wait for the query to finish.
    ///
    /// A failed query only yields [`GraphError::TaskFailed`] here; the
    /// underlying error is returned when the parallelism scope exits.
    pub async fn wait(self) -> Result<QueryResult, GraphError> {
        self.rx.await.map_err(|_| {
            GraphError::TaskFailed(
                "parallel query did not complete; its error is reported at scope exit".into(),
            )
        })
    }
}

type DatabaseKey = Option<String>;

fn key(database: Option<&str>) -> DatabaseKey {
    database.map(str::to_string)
}

/// Bookmark bookkeeping and session dispatch for one connector.
pub struct SessionManager<P: SessionProvider> {
    provider: P,
    bookmarks: Mutex<HashMap<DatabaseKey, Vec<Bookmark>>>,
    parallel_bookmarks: Mutex<HashMap<DatabaseKey, Vec<Bookmark>>>,
    parallel: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<Result<(), GraphError>>>>,
    workers: Semaphore,
    threads: usize,
}

impl<P: SessionProvider> SessionManager<P> {
    /// Create a manager whose parallel units are limited to `threads`
    /// concurrently running sessions.
    pub fn new(provider: P, threads: usize) -> Self {
        let threads = threads.max(1);
        Self {
            provider,
            bookmarks: Mutex::new(HashMap::new()),
            parallel_bookmarks: Mutex::new(HashMap::new()),
            parallel: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            workers: Semaphore::new(threads),
            threads,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel.load(Ordering::Acquire)
    }

    /// The bookmark list the next session on `database` will be seeded with.
    pub fn bookmarks(&self, database: Option<&str>) -> Vec<Bookmark> {
        self.bookmarks
            .lock()
            .get(&key(database))
            .cloned()
            .unwrap_or_default()
    }

    fn ensure_sequential(&self) -> Result<(), GraphError> {
        if self.is_parallel() {
            return Err(GraphError::Usage(
                "Cannot execute this operation within a parallelism scope".into(),
            ));
        }
        Ok(())
    }

    fn ensure_parallel(&self) -> Result<(), GraphError> {
        if !self.is_parallel() {
            return Err(GraphError::Usage(
                "Cannot execute this operation outside a parallelism scope".into(),
            ));
        }
        Ok(())
    }

    /// Run one statement in a fresh sequential session.
    ///
    /// On success the session's bookmark replaces the database's bookmark
    /// list and any leftover parallel bookmarks for it are discarded.
    pub async fn run_sequential(
        &self,
        database: Option<&str>,
        access: AccessMode,
        statement: &str,
        params: Params,
    ) -> Result<QueryResult, GraphError> {
        self.ensure_sequential()?;

        let bookmarks = self.bookmarks(database);
        let mut session = self.provider.open_session(database, &bookmarks).await?;
        tracing::debug!(
            database = ?database,
            access = ?access,
            bookmarks = bookmarks.len(),
            "Sequential session opened"
        );

        let result = match run_in(&mut session, access, statement, params).await {
            Ok(result) => result,
            Err(e) => {
                close_after_failure(&mut session, database).await;
                return Err(e);
            }
        };

        let bookmark = session.close().await?;
        self.record_sequential(database, bookmark);
        Ok(result)
    }

    fn record_sequential(&self, database: Option<&str>, bookmark: Option<Bookmark>) {
        let db = key(database);
        self.parallel_bookmarks.lock().remove(&db);
        match bookmark {
            Some(bookmark) => {
                self.bookmarks.lock().insert(db, vec![bookmark]);
            }
            None => tracing::debug!(database = ?database, "Session closed without a bookmark"),
        }
    }

    /// Enter parallel mode and return a guard that leaves it again.
    ///
    /// Call [`ParallelScope::exit`] to drain the scope. If the guard is
    /// dropped first, because the body panicked or the scope future was
    /// cancelled, the scope is abandoned instead.
    pub fn scope(&self) -> Result<ParallelScope<'_, P>, GraphError> {
        self.enter_parallel()?;
        Ok(ParallelScope {
            sessions: self,
            active: true,
        })
    }

    /// Enter parallel mode.
    pub fn enter_parallel(&self) -> Result<(), GraphError> {
        self.parallel
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| GraphError::Usage("Parallelism scopes cannot be nested".into()))
    }

    /// Spawn one statement as a parallel unit.
    ///
    /// The session is seeded with the bookmarks current at submission; those
    /// do not change until the scope exits.
    pub fn spawn_parallel(
        self: &Arc<Self>,
        database: Option<&str>,
        access: AccessMode,
        statement: Arc<str>,
        params: Params,
    ) -> Result<PendingQuery, GraphError> {
        self.ensure_parallel()?;

        let bookmarks = self.bookmarks(database);
        let database = key(database);
        let (tx, rx) = oneshot::channel();
        let manager = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let _permit = manager
                .workers
                .acquire()
                .await
                .map_err(|e| GraphError::TaskFailed(e.to_string()))?;
            let result = manager
                .run_parallel_unit(database.as_deref(), access, &statement, params, &bookmarks)
                .await?;
            // The caller may have dropped its handle; the result is then unused.
            let _ = tx.send(result);
            Ok(())
        });

        self.tasks.lock().push(handle);
        Ok(PendingQuery { rx })
    }

    async fn run_parallel_unit(
        &self,
        database: Option<&str>,
        access: AccessMode,
        statement: &str,
        params: Params,
        bookmarks: &[Bookmark],
    ) -> Result<QueryResult, GraphError> {
        self.ensure_parallel()?;

        let mut session = self.provider.open_session(database, bookmarks).await?;
        let result = match run_in(&mut session, access, statement, params).await {
            Ok(result) => result,
            Err(e) => {
                close_after_failure(&mut session, database).await;
                return Err(e);
            }
        };

        if let Some(bookmark) = session.close().await? {
            self.parallel_bookmarks
                .lock()
                .entry(key(database))
                .or_default()
                .push(bookmark);
        }
        Ok(result)
    }

    /// Leave parallel mode.
    ///
    /// Awaits every unit spawned in the scope, then makes the bookmarks they
    /// produced the new bookmark list of their database. The first failure
    /// (in submission order) is returned, but only after all units finished.
    pub async fn exit_parallel(&self) -> Result<(), GraphError> {
        let mut first_error = None;
        let mut units = 0usize;

        loop {
            let handles = std::mem::take(&mut *self.tasks.lock());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                units += 1;
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(join) => Err(GraphError::TaskFailed(join.to_string())),
                };
                if let Err(e) = outcome {
                    tracing::warn!(error = %e, "Parallel unit failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        self.consolidate();
        self.parallel.store(false, Ordering::Release);
        tracing::debug!(units, failed = first_error.is_some(), "Parallelism scope closed");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Leave parallel mode without waiting for the scope's units.
    ///
    /// Units still running are aborted. Bookmarks of the units that already
    /// finished become the current ones.
    pub fn abandon_parallel(&self) {
        let handles = std::mem::take(&mut *self.tasks.lock());
        let mut aborted = 0usize;
        for handle in &handles {
            if !handle.is_finished() {
                handle.abort();
                aborted += 1;
            }
        }

        self.consolidate();
        self.parallel.store(false, Ordering::Release);
        tracing::warn!(
            units = handles.len(),
            aborted,
            "Parallelism scope dropped before exit; unfinished units aborted"
        );
    }

    fn consolidate(&self) {
        let pending = std::mem::take(&mut *self.parallel_bookmarks.lock());
        let mut bookmarks = self.bookmarks.lock();
        for (database, tokens) in pending {
            if !tokens.is_empty() {
                bookmarks.insert(database, tokens);
            }
        }
    }
}

/// Guard for an open parallelism scope, see [`SessionManager::scope`].
#[must_use = "dropping the guard abandons the scope"]
pub struct ParallelScope<'a, P: SessionProvider> {
    sessions: &'a SessionManager<P>,
    active: bool,
}

impl<P: SessionProvider> ParallelScope<'_, P> {
    /// Await every unit of the scope and leave parallel mode.
    pub async fn exit(mut self) -> Result<(), GraphError> {
        let drained = self.sessions.exit_parallel().await;
        self.active = false;
        drained
    }
}

impl<P: SessionProvider> Drop for ParallelScope<'_, P> {
    fn drop(&mut self) {
        if self.active {
            self.sessions.abandon_parallel();
        }
    }
}

async fn close_after_failure<S: GraphSession>(session: &mut S, database: Option<&str>) {
    if let Err(e) = session.close().await {
        tracing::warn!(database = ?database, error = %e, "Failed to close session after error");
    }
}
