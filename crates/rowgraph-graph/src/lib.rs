//! rowgraph-graph: batched, causally consistent bulk loading into Neo4j.
//!
//! A [`Connector`] turns row sources into batched `UNWIND` writes, reads
//! nodes and edges back as tables, and runs raw statements. Every session it
//! opens is seeded with the bookmarks of the previous writes, so reads always
//! observe what was written before them, including writes that ran
//! concurrently inside a [`Connector::with_parallelism`] scope.

pub mod batch;
pub mod client;
pub mod connector;
pub mod mutations;
pub mod queries;
pub mod result;
pub mod session;

pub use batch::{batch_ranges, BatchReport};
pub use client::{GraphConfig, GraphError, Neo4jProvider, Neo4jSession};
pub use connector::{Connector, ConnectorOptions};
pub use mutations::{EdgeSpec, EntitySpec};
pub use result::QueryResult;
pub use session::{
    AccessMode, Bookmark, GraphSession, ParallelScope, Params, PendingQuery, SessionManager,
    SessionProvider,
};
