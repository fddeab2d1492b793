//! Value and creation-mode types shared by the statement builder and the
//! session layer.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Serialize;

// ── Values ────────────────────────────────────────────────────────

/// A single cell of a row, or a single field of a query result record.
///
/// `Node` and `Relation` only appear on the read side; they are decoded from
/// query results and never bound as write parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Node(NodeValue),
    Relation(RelationValue),
}

/// A node returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeValue {
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
}

/// A relationship returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationValue {
    pub id: i64,
    pub rel_type: String,
    pub start_id: i64,
    pub end_id: i64,
    pub properties: BTreeMap<String, Value>,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Property bag of a node, relationship or map value.
    pub fn properties(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Node(n) => Some(&n.properties),
            Value::Relation(r) => Some(&r.properties),
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s}"),
            other => match serde_json::to_string(other) {
                Ok(json) => write!(f, "{json}"),
                Err(_) => write!(f, "{other:?}"),
            },
        }
    }
}

// Self-describing formats (JSON, the Bolt row deserializer) hand us plain
// scalars, sequences and maps. Nodes and relationships come back as maps.
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a graph value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        match i64::try_from(v) {
            Ok(i) => Ok(Value::Int(i)),
            Err(_) => Ok(Value::Float(v as f64)),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::List(v.iter().map(|b| Value::Int(*b as i64)).collect()))
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            entries.insert(key, value);
        }
        Ok(Value::Map(entries))
    }
}

// ── Creation Modes ────────────────────────────────────────────────

/// How bulk node writes treat rows that may already exist in the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCreationMode {
    /// Always create a new node per row. Fastest; may introduce duplicates.
    #[default]
    Create,
    /// `MERGE` on the primary key; rows whose key already exists are skipped.
    MergeIgnoreOnMatch,
    /// `MERGE` on the primary key; existing nodes get the row's attributes.
    MergeUpdateOnMatch,
    /// `MERGE` on every declared attribute; exact duplicates are skipped.
    MergeOnAllAttributes,
}

impl NodeCreationMode {
    /// Whether this mode matches on a primary key and therefore needs one.
    pub fn requires_primary_key(self) -> bool {
        matches!(
            self,
            NodeCreationMode::MergeIgnoreOnMatch | NodeCreationMode::MergeUpdateOnMatch
        )
    }

    /// Whether batches written with this mode commute.
    ///
    /// Under `MergeUpdateOnMatch` and `MergeOnAllAttributes` a later row may
    /// need to observe an earlier row's write, so those run sequentially.
    pub fn is_parallel_safe(self) -> bool {
        matches!(
            self,
            NodeCreationMode::Create | NodeCreationMode::MergeIgnoreOnMatch
        )
    }
}

/// How an edge's endpoint node is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelNodeCreationMode {
    /// Match the endpoint, creating it when absent.
    #[default]
    Merge,
    /// Match only; rows whose endpoint does not exist are skipped.
    Match,
    /// Always create a fresh endpoint node.
    Create,
}

impl RelNodeCreationMode {
    pub fn keyword(self) -> &'static str {
        match self {
            RelNodeCreationMode::Merge => "MERGE",
            RelNodeCreationMode::Match => "MATCH",
            RelNodeCreationMode::Create => "CREATE",
        }
    }
}

/// How the edge itself is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelCreationMode {
    #[default]
    Create,
    Merge,
}

impl RelCreationMode {
    pub fn keyword(self) -> &'static str {
        match self {
            RelCreationMode::Create => "CREATE",
            RelCreationMode::Merge => "MERGE",
        }
    }
}

/// Whether edge batches written with these modes commute.
///
/// Only plain `CREATE` edges whose endpoints are matched or created (never
/// merged) are free of cross-batch dependencies.
pub fn edge_parallel_safe(
    src: RelNodeCreationMode,
    dst: RelNodeCreationMode,
    rel: RelCreationMode,
) -> bool {
    let endpoint_ok =
        |m: RelNodeCreationMode| matches!(m, RelNodeCreationMode::Match | RelNodeCreationMode::Create);
    rel == RelCreationMode::Create && endpoint_ok(src) && endpoint_ok(dst)
}
