//! rowgraph-cypher: Cypher rendering for bulk loads.
//!
//! Everything here is pure string building. Every label and attribute name
//! that reaches statement text goes through [`escape`]; row data never does,
//! it is bound through the single `$rows` parameter.

pub mod edges;
pub mod error;
pub mod escape;
pub mod nodes;
pub mod patterns;
pub mod schema;
pub mod statement;

pub use edges::{EdgeStatementBuilder, Endpoint};
pub use error::StatementError;
pub use escape::{escape_identifier, escape_string_literal, map_key, unescape_identifier};
pub use nodes::NodeStatementBuilder;
pub use statement::{Statement, ROWS_PARAM};
