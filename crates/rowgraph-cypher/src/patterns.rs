//! Statement fragments shared by the node and edge builders.

use crate::escape::{escape_identifier, escape_string_literal, map_key};

/// Project a positional row into a map, e.g. `{x: row[0], y: row[1]} AS row`.
///
/// `indexes`, when given, overrides the positional index of each attribute.
pub fn row_as_map<S: AsRef<str>>(
    attributes: &[S],
    in_name: &str,
    out_name: &str,
    indexes: Option<&[usize]>,
) -> String {
    let pairs: Vec<String> = attributes
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let index = indexes.and_then(|ix| ix.get(i).copied()).unwrap_or(i);
            format!("{}: {}[{}]", map_key(key.as_ref()), map_key(in_name), index)
        })
        .collect();
    format!("{{{}}} AS {}", pairs.join(", "), map_key(out_name))
}

/// Inline property map reading each attribute from the projected row,
/// e.g. `{id: row["id"]}`. Empty when there are no attributes.
pub fn inline_attributes<S: AsRef<str>>(attributes: &[S], row_name: &str) -> String {
    if attributes.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = attributes
        .iter()
        .map(|key| {
            let key = key.as_ref();
            format!(
                "{}: {}[{}]",
                map_key(key),
                map_key(row_name),
                escape_string_literal(key)
            )
        })
        .collect();
    format!("{{{}}}", pairs.join(", "))
}

/// Label suffix such as ``:`Person`:`Employee` ``.
pub fn label_suffix<S: AsRef<str>>(labels: &[S]) -> String {
    labels
        .iter()
        .map(|l| format!(":{}", escape_identifier(l.as_ref())))
        .collect()
}

/// Node pattern such as ``(n:`Person` {id: row["id"]})``.
pub fn node_pattern<S: AsRef<str>>(name: &str, labels: &[S], attributes: &str) -> String {
    let mut out = format!("({}{}", map_key(name), label_suffix(labels));
    if !attributes.is_empty() {
        out.push(' ');
        out.push_str(attributes);
    }
    out.push(')');
    out
}

/// Relationship pattern between two already-rendered node patterns.
pub fn rel_pattern(
    src: &str,
    dst: &str,
    name: &str,
    rel_type: &str,
    attributes: &str,
    directed: bool,
) -> String {
    let mut rel = format!("{}:{}", map_key(name), escape_identifier(rel_type));
    if !attributes.is_empty() {
        rel.push(' ');
        rel.push_str(attributes);
    }
    let tip = if directed { ">" } else { "" };
    format!("{src}-[{rel}]-{tip}{dst}")
}
