//! Index and load statements.

use crate::escape::escape_identifier;
use crate::patterns::{label_suffix, node_pattern};
use crate::statement::Statement;

/// Deterministic index name: attributes are sorted and every `_` inside a
/// part is doubled so distinct inputs never collide.
fn index_name<S: AsRef<str>>(prefix: &str, label: &str, attributes: &[S]) -> String {
    let mut attrs: Vec<&str> = attributes.iter().map(AsRef::as_ref).collect();
    attrs.sort_unstable();
    let attrs: Vec<String> = attrs.iter().map(|a| a.replace('_', "__")).collect();
    format!("{prefix}_{}_{}", label.replace('_', "__"), attrs.join("_"))
}

fn property_list<S: AsRef<str>>(var: &str, attributes: &[S]) -> String {
    let mut attrs: Vec<&str> = attributes.iter().map(AsRef::as_ref).collect();
    attrs.sort_unstable();
    attrs
        .iter()
        .map(|a| format!("{var}.{}", escape_identifier(a)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE INDEX ... IF NOT EXISTS` on a node label. Returns the index name
/// alongside the statement. `None` when `attributes` is empty.
pub fn node_index<S: AsRef<str>>(label: &str, attributes: &[S]) -> Option<(String, Statement)> {
    if attributes.is_empty() {
        return None;
    }
    let name = index_name("node_index", label, attributes);
    let statement = Statement::new(format!(
        "CREATE INDEX {} IF NOT EXISTS FOR (n:{}) ON ({})",
        escape_identifier(&name),
        escape_identifier(label),
        property_list("n", attributes)
    ));
    Some((name, statement))
}

/// `CREATE INDEX ... IF NOT EXISTS` on a relationship type.
pub fn rel_index<S: AsRef<str>>(rel_type: &str, attributes: &[S]) -> Option<(String, Statement)> {
    if attributes.is_empty() {
        return None;
    }
    let name = index_name("rel_index", rel_type, attributes);
    let statement = Statement::new(format!(
        "CREATE INDEX {} IF NOT EXISTS FOR ()-[r:{}]-() ON ({})",
        escape_identifier(&name),
        escape_identifier(rel_type),
        property_list("r", attributes)
    ));
    Some((name, statement))
}

/// ``MATCH (n:`A`:`B`) RETURN n``
pub fn match_nodes<S: AsRef<str>>(labels: &[S]) -> Statement {
    Statement::new(format!("MATCH {} RETURN n", node_pattern("n", labels, "")))
}

/// ``MATCH ()-[r:`T`]->() RETURN r``
pub fn match_rels(rel_type: &str) -> Statement {
    Statement::new(format!(
        "MATCH ()-[r{}]->() RETURN r",
        label_suffix(&[rel_type])
    ))
}
