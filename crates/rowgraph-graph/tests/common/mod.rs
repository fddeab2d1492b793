//! In-memory session provider for exercising the connector without Neo4j.
//!
//! Every write gets a bookmark `bm:<n>` and remembers the bookmarks its
//! session was seeded with. A read answers with one record whose `visible`
//! field counts the writes causally reachable from its own seed, which is
//! exactly what a read would be guaranteed to observe on a real cluster.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rowgraph_core::Value;
use rowgraph_cypher::ROWS_PARAM;
use rowgraph_graph::{
    AccessMode, Bookmark, Connector, ConnectorOptions, GraphError, GraphSession, Params,
    QueryResult, SessionProvider,
};

#[derive(Debug, Clone)]
pub struct Opened {
    pub database: Option<String>,
    pub bookmarks: Vec<Bookmark>,
}

#[derive(Debug, Clone)]
pub struct Executed {
    pub database: Option<String>,
    pub access: AccessMode,
    pub statement: String,
    pub params: Params,
}

impl Executed {
    /// Rows bound to `$rows`, if any.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        match self.params.get(ROWS_PARAM) {
            Some(Value::List(rows)) => rows
                .iter()
                .map(|row| match row {
                    Value::List(values) => values.clone(),
                    other => panic!("row is not a list: {other:?}"),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Default)]
struct State {
    opened: Mutex<Vec<Opened>>,
    executed: Mutex<Vec<Executed>>,
    /// Write bookmark -> bookmarks its session was seeded with.
    writes: Mutex<HashMap<Bookmark, Vec<Bookmark>>>,
    canned: Mutex<Vec<(String, QueryResult)>>,
    fail_statement: Mutex<Option<String>>,
    fail_value: Mutex<Option<Value>>,
    fail_reads: Mutex<bool>,
    seq: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

#[derive(Clone, Default)]
pub struct FakeProvider {
    state: Arc<State>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> Vec<Opened> {
        self.state.opened.lock().clone()
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.state.executed.lock().clone()
    }

    pub fn writes(&self) -> usize {
        self.state.writes.lock().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Answer reads whose statement starts with `prefix` with `result`.
    pub fn respond(&self, prefix: &str, result: QueryResult) {
        self.state.canned.lock().push((prefix.to_string(), result));
    }

    pub fn fail_statements_containing(&self, needle: &str) {
        *self.state.fail_statement.lock() = Some(needle.to_string());
    }

    /// Fail writes whose bound rows contain `value`.
    pub fn fail_rows_containing(&self, value: Value) {
        *self.state.fail_value.lock() = Some(value);
    }

    pub fn fail_reads(&self) {
        *self.state.fail_reads.lock() = true;
    }

    pub fn delay_writes(&self, delay: Duration) {
        *self.state.delay.lock() = Some(delay);
    }

    /// Number of writes causally reachable from `seed`.
    fn visible(&self, seed: &[Bookmark]) -> usize {
        let writes = self.state.writes.lock();
        let mut seen = HashSet::new();
        let mut stack: Vec<Bookmark> = seed.to_vec();
        while let Some(bookmark) = stack.pop() {
            if let Some(deps) = writes.get(&bookmark) {
                if seen.insert(bookmark.clone()) {
                    stack.extend(deps.iter().cloned());
                }
            }
        }
        seen.len()
    }
}

#[async_trait::async_trait]
impl SessionProvider for FakeProvider {
    type Session = FakeSession;

    async fn open_session(
        &self,
        database: Option<&str>,
        bookmarks: &[Bookmark],
    ) -> Result<Self::Session, GraphError> {
        self.state.opened.lock().push(Opened {
            database: database.map(str::to_string),
            bookmarks: bookmarks.to_vec(),
        });
        Ok(FakeSession {
            provider: self.clone(),
            database: database.map(str::to_string),
            seed: bookmarks.to_vec(),
            last: None,
        })
    }
}

pub struct FakeSession {
    provider: FakeProvider,
    database: Option<String>,
    seed: Vec<Bookmark>,
    last: Option<Bookmark>,
}

impl FakeSession {
    fn record(&self, access: AccessMode, statement: &str, params: &Params) {
        self.provider.state.executed.lock().push(Executed {
            database: self.database.clone(),
            access,
            statement: statement.to_string(),
            params: params.clone(),
        });
    }

    fn injected_failure(&self, statement: &str, params: &Params) -> Option<GraphError> {
        let state = &self.provider.state;
        if let Some(needle) = state.fail_statement.lock().as_deref() {
            if statement.contains(needle) {
                return Some(GraphError::Backend(anyhow::anyhow!("injected failure")));
            }
        }
        if let Some(value) = state.fail_value.lock().as_ref() {
            let executed = Executed {
                database: None,
                access: AccessMode::Write,
                statement: String::new(),
                params: params.clone(),
            };
            if executed.rows().iter().any(|row| row.contains(value)) {
                return Some(GraphError::Backend(anyhow::anyhow!("injected row failure")));
            }
        }
        None
    }
}

#[async_trait::async_trait]
impl GraphSession for FakeSession {
    async fn run_write(&mut self, statement: &str, params: Params) -> Result<QueryResult, GraphError> {
        let state = Arc::clone(&self.provider.state);
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *state.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        state.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.record(AccessMode::Write, statement, &params);
        if let Some(err) = self.injected_failure(statement, &params) {
            return Err(err);
        }

        let mut deps = self.seed.clone();
        deps.extend(self.last.iter().cloned());
        let seq = state.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let bookmark = Bookmark::new(format!("bm:{seq}"));
        state.writes.lock().insert(bookmark.clone(), deps);
        self.last = Some(bookmark);
        Ok(QueryResult::default())
    }

    async fn run_read(&mut self, statement: &str, params: Params) -> Result<QueryResult, GraphError> {
        self.record(AccessMode::Read, statement, &params);
        if *self.provider.state.fail_reads.lock() {
            return Err(GraphError::Backend(anyhow::anyhow!("injected read failure")));
        }

        let canned = self
            .provider
            .state
            .canned
            .lock()
            .iter()
            .find(|(prefix, _)| statement.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone());
        if let Some(result) = canned {
            return Ok(result);
        }

        let mut seed = self.seed.clone();
        seed.extend(self.last.iter().cloned());
        let visible = self.provider.visible(&seed) as i64;
        QueryResult::new(vec!["visible".into()], vec![vec![Value::Int(visible)]])
    }

    async fn close(&mut self) -> Result<Option<Bookmark>, GraphError> {
        Ok(self.last.take())
    }
}

pub fn connector(provider: &FakeProvider) -> Connector<FakeProvider> {
    connector_with(provider, |_| {})
}

pub fn connector_with(
    provider: &FakeProvider,
    tweak: impl FnOnce(&mut ConnectorOptions),
) -> Connector<FakeProvider> {
    let mut options = ConnectorOptions {
        database: None,
        batch_size: 10_000,
        threads: 4,
        create_indexes: true,
    };
    tweak(&mut options);
    Connector::new(provider.clone(), options)
}

/// `visible` from a fake read result.
pub fn visible(result: &QueryResult) -> i64 {
    result
        .get(0, "visible")
        .and_then(Value::as_i64)
        .expect("read result carries `visible`")
}
