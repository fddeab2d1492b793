//! Reading nodes and edges back as row sources.

use rowgraph_core::{Array, Table};
use rowgraph_cypher::schema;

use crate::client::GraphError;
use crate::connector::Connector;
use crate::session::{Params, SessionProvider};

impl<P: SessionProvider> Connector<P> {
    /// Properties of every node carrying all of `labels`, one row per node.
    ///
    /// Columns are the union of the property names found; nodes lacking a
    /// property get a null.
    pub async fn load_entities_by_label<S: AsRef<str>>(
        &self,
        labels: &[S],
    ) -> Result<Table, GraphError> {
        let result = self
            .read_query(schema::match_nodes(labels), Params::new())
            .await?;
        let table = result.to_nodes_table()?;
        tracing::debug!(rows = result.len(), "Entities loaded");
        Ok(table)
    }

    /// Same as [`Connector::load_entities_by_label`], as attribute names
    /// plus a rectangular array.
    pub async fn load_entities_array<S: AsRef<str>>(
        &self,
        labels: &[S],
    ) -> Result<(Vec<String>, Array), GraphError> {
        let result = self
            .read_query(schema::match_nodes(labels), Params::new())
            .await?;
        result.to_nodes_array()
    }

    /// Properties of every relationship of `rel_type`, one row per
    /// relationship.
    pub async fn load_edges_by_label(&self, rel_type: &str) -> Result<Table, GraphError> {
        let result = self
            .read_query(schema::match_rels(rel_type), Params::new())
            .await?;
        let table = result.to_rels_table()?;
        tracing::debug!(rel_type, rows = result.len(), "Edges loaded");
        Ok(table)
    }
}
