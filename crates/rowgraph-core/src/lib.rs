//! rowgraph-core: shared types for the rowgraph bulk loader.
//!
//! This crate holds everything the statement builder and the session layer
//! agree on:
//! - `Value`, the scalar/compound value carried in rows and query results
//! - Creation modes for nodes, edge endpoints and edges
//! - Row sources (`Table`, `Array`) and the `RowSource` trait
//! - Loader configuration

pub mod config;
pub mod error;
pub mod table;
pub mod types;

pub use config::LoaderConfig;
pub use error::TableError;
pub use table::{Array, Row, RowSource, Table};
pub use types::{
    edge_parallel_safe, NodeCreationMode, NodeValue, RelCreationMode, RelNodeCreationMode,
    RelationValue, Value,
};
