//! Query results and their conversion to row sources.

use std::collections::{BTreeMap, HashSet};

use rowgraph_core::{Array, Table, Value};
use serde::Serialize;

use crate::client::GraphError;

/// Ordered, distinct keys and the records aligned to them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    keys: Vec<String>,
    records: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Build a result, checking that keys are distinct and every record has
    /// one value per key.
    pub fn new(keys: Vec<String>, records: Vec<Vec<Value>>) -> Result<Self, GraphError> {
        let mut seen = HashSet::new();
        if let Some(dup) = keys.iter().find(|k| !seen.insert(k.as_str())) {
            return Err(GraphError::Decode(format!("duplicate result key `{dup}`")));
        }
        if let Some((i, record)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != keys.len())
        {
            return Err(GraphError::Decode(format!(
                "record {i} has {} values, expected {}",
                record.len(),
                keys.len()
            )));
        }
        Ok(Self { keys, records })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn records(&self) -> &[Vec<Value>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Value of `key` in record `index`.
    pub fn get(&self, index: usize, key: &str) -> Option<&Value> {
        let column = self.keys.iter().position(|k| k == key)?;
        self.records.get(index).map(|r| &r[column])
    }

    /// Project onto `keys`, in the requested order.
    pub fn select(&self, keys: &[&str]) -> Result<QueryResult, GraphError> {
        let columns = keys
            .iter()
            .map(|key| {
                self.keys
                    .iter()
                    .position(|k| k == key)
                    .ok_or_else(|| GraphError::Validation(format!("unknown result key `{key}`")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let records = self
            .records
            .iter()
            .map(|r| columns.iter().map(|&c| r[c].clone()).collect())
            .collect();
        QueryResult::new(keys.iter().map(|k| k.to_string()).collect(), records)
    }

    /// One column per key.
    pub fn to_table(&self) -> Result<Table, GraphError> {
        let rows = self.records.iter().cloned();
        Ok(Table::from_rows(self.keys.iter().cloned(), rows)?)
    }

    /// Keys plus the records as a rectangular array.
    pub fn to_array(&self) -> Result<(Vec<String>, Array), GraphError> {
        let flat: Vec<Value> = self.records.iter().flatten().cloned().collect();
        Ok((self.keys.clone(), Array::from_flat(flat, self.keys.len())?))
    }

    fn single_column(&self, what: &str) -> Result<impl Iterator<Item = &Value>, GraphError> {
        if self.keys.len() != 1 {
            return Err(GraphError::Decode(format!(
                "{what} conversion needs exactly one result key, got {}",
                self.keys.len()
            )));
        }
        Ok(self.records.iter().map(|r| &r[0]))
    }

    fn node_records(&self) -> Result<Vec<&BTreeMap<String, Value>>, GraphError> {
        self.single_column("node")?
            .enumerate()
            .map(|(i, value)| match value {
                Value::Node(node) => Ok(&node.properties),
                other => Err(GraphError::Decode(format!(
                    "record {i} holds {other} where a node was expected"
                ))),
            })
            .collect()
    }

    /// Properties of the single node column, one row per node.
    ///
    /// Columns are the union of all property names; missing properties are
    /// null.
    pub fn to_nodes_table(&self) -> Result<Table, GraphError> {
        Ok(Table::from_records(self.node_records()?))
    }

    /// Properties of the single relationship column, one row per
    /// relationship.
    pub fn to_rels_table(&self) -> Result<Table, GraphError> {
        let records = self
            .single_column("relationship")?
            .enumerate()
            .map(|(i, value)| match value {
                Value::Relation(rel) => Ok(&rel.properties),
                other => Err(GraphError::Decode(format!(
                    "record {i} holds {other} where a relationship was expected"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Table::from_records(records))
    }

    /// Node properties as attribute names plus an array.
    pub fn to_nodes_array(&self) -> Result<(Vec<String>, Array), GraphError> {
        let table = self.to_nodes_table()?;
        let columns = table.columns().to_vec();
        Ok((columns, table.into_array()))
    }
}
