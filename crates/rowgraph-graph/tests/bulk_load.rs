//! Bulk writes and loads through the connector, against the in-memory
//! provider.

mod common;

use std::collections::BTreeMap;

use common::{connector, connector_with, FakeProvider};
use rowgraph_core::{
    Array, NodeCreationMode, NodeValue, RelCreationMode, RelNodeCreationMode, RelationValue,
    RowSource, Table, Value,
};
use rowgraph_cypher::Endpoint;
use rowgraph_graph::{AccessMode, EdgeSpec, EntitySpec, GraphError, QueryResult};

fn people(n: i64) -> Table {
    Table::new([
        ("id", (0..n).map(Value::from).collect()),
        ("name", (0..n).map(|i| Value::from(format!("p{i}"))).collect()),
    ])
    .unwrap()
}

fn bulk_writes(provider: &FakeProvider) -> Vec<common::Executed> {
    provider
        .executed()
        .into_iter()
        .filter(|e| e.statement.starts_with("UNWIND"))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn create_mode_writes_batches_in_parallel() {
    let provider = FakeProvider::new();
    let conn = connector(&provider);
    let table = people(25);

    let report = conn
        .create_entities(&table, &EntitySpec::new("Person").batch_size(10))
        .await
        .unwrap();
    assert_eq!((report.batches, report.rows, report.parallel), (3, 25, true));

    let writes = bulk_writes(&provider);
    assert_eq!(writes.len(), 3);
    assert_eq!(
        writes[0].statement,
        "UNWIND $rows AS row\nWITH {id: row[0], name: row[1]} AS row\nCREATE (n:`Person`)\nSET n = row"
    );

    // Every row is written exactly once, whatever order the batches ran in.
    let mut ids: Vec<i64> = writes
        .iter()
        .flat_map(|w| w.rows())
        .map(|row| row[0].as_i64().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..25).collect::<Vec<_>>());

    // Create mode matches on nothing, so there is nothing to index.
    assert!(!provider
        .executed()
        .iter()
        .any(|e| e.statement.starts_with("CREATE INDEX")));
}

#[tokio::test]
async fn merge_update_runs_sequentially_in_row_order() {
    let provider = FakeProvider::new();
    let conn = connector(&provider);
    let table = people(5);

    let spec = EntitySpec::new("Person")
        .primary_key("id")
        .mode(NodeCreationMode::MergeUpdateOnMatch)
        .batch_size(2);
    let report = conn.create_entities(&table, &spec).await.unwrap();
    assert!(!report.parallel);
    assert_eq!(report.batches, 3);

    let executed = provider.executed();
    assert_eq!(
        executed[0].statement,
        "CREATE INDEX `node_index_Person_id` IF NOT EXISTS FOR (n:`Person`) ON (n.`id`)"
    );
    let batches: Vec<Vec<Vec<Value>>> = bulk_writes(&provider).iter().map(|w| w.rows()).collect();
    assert_eq!(batches, vec![table.rows(0..2), table.rows(2..4), table.rows(4..5)]);

    // Each batch session starts from the previous batch's bookmark.
    let opened = provider.opened();
    assert_eq!(opened.len(), 4);
    for pair in opened.windows(2) {
        assert_eq!(pair[1].bookmarks.len(), 1);
        assert_ne!(pair[0].bookmarks, pair[1].bookmarks);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn merge_ignore_is_parallel_and_indexed() {
    let provider = FakeProvider::new();
    let conn = connector(&provider);

    let spec = EntitySpec::new("Person")
        .primary_key("id")
        .mode(NodeCreationMode::MergeIgnoreOnMatch);
    let report = conn.create_entities(&people(3), &spec).await.unwrap();
    assert!(report.parallel);
    assert_eq!(report.batches, 1);

    let writes = bulk_writes(&provider);
    assert!(writes[0]
        .statement
        .contains("MERGE (n:`Person` {id: row[\"id\"]})\nON CREATE SET n = row"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn create_mode_indexes_the_primary_key() {
    let provider = FakeProvider::new();
    let conn = connector(&provider);

    let spec = EntitySpec::new("Person").primary_key("id").rename("id", "uid");
    let report = conn.create_entities(&people(4), &spec).await.unwrap();
    assert!(report.parallel);

    let executed = provider.executed();
    assert_eq!(
        executed[0].statement,
        "CREATE INDEX `node_index_Person_uid` IF NOT EXISTS FOR (n:`Person`) ON (n.`uid`)"
    );
    assert!(executed[1].statement.contains("CREATE (n:`Person`)"));
}

#[tokio::test]
async fn every_label_gets_an_index() {
    let provider = FakeProvider::new();
    let conn = connector(&provider);

    let spec = EntitySpec::with_labels(["Person", "Employee"])
        .primary_key("id")
        .mode(NodeCreationMode::MergeUpdateOnMatch);
    conn.create_entities(&people(1), &spec).await.unwrap();

    let statements: Vec<String> = provider.executed().into_iter().map(|e| e.statement).collect();
    assert!(statements[0].contains("FOR (n:`Person`)"));
    assert!(statements[1].contains("FOR (n:`Employee`)"));
    assert!(statements[2].contains("MERGE (n:`Person`:`Employee` {id: row[\"id\"]})"));
}

#[tokio::test]
async fn index_creation_can_be_disabled() {
    let provider = FakeProvider::new();
    let conn = connector_with(&provider, |o| o.create_indexes = false);

    let spec = EntitySpec::new("Person").mode(NodeCreationMode::MergeOnAllAttributes);
    conn.create_entities(&people(2), &spec).await.unwrap();

    let executed = provider.executed();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].statement.starts_with("UNWIND"));
}

#[tokio::test]
async fn arrays_use_declared_attributes_and_renames() {
    let provider = FakeProvider::new();
    let conn = connector_with(&provider, |o| o.create_indexes = false);
    let array = Array::from_flat(vec![1i64, 10, 2, 20], 2).unwrap();

    let spec = EntitySpec::new("Point")
        .attributes(["x_col", "y"])
        .rename("x_col", "x");
    conn.create_entities(&array, &spec).await.unwrap();

    let writes = bulk_writes(&provider);
    assert!(writes[0].statement.contains("WITH {x: row[0], y: row[1]} AS row"));
    assert_eq!(writes[0].rows(), array.rows(0..2));

    let err = conn
        .create_entities(&array, &EntitySpec::new("Point"))
        .await
        .unwrap_err();
    assert!(err.is_usage());
}

#[tokio::test]
async fn invalid_specs_fail_before_any_session() {
    let provider = FakeProvider::new();
    let conn = connector(&provider);
    let table = people(3);

    let custom_with_mode = EntitySpec::new("Person")
        .statement("UNWIND $rows AS row CREATE (:Person)")
        .mode(NodeCreationMode::Create);
    assert!(conn
        .create_entities(&table, &custom_with_mode)
        .await
        .unwrap_err()
        .is_usage());

    let missing_key = EntitySpec::new("Person").mode(NodeCreationMode::MergeIgnoreOnMatch);
    assert!(conn
        .create_entities(&table, &missing_key)
        .await
        .unwrap_err()
        .is_usage());

    let unknown_key = EntitySpec::new("Person")
        .primary_key("nope")
        .mode(NodeCreationMode::MergeIgnoreOnMatch);
    let err = conn.create_entities(&table, &unknown_key).await.unwrap_err();
    assert!(matches!(err, GraphError::Statement(_)));
    assert!(!err.is_usage());

    let zero_batch = EntitySpec::new("Person").batch_size(0);
    let err = conn.create_entities(&table, &zero_batch).await.unwrap_err();
    assert!(matches!(err, GraphError::Validation(_)));

    assert!(provider.opened().is_empty());
}

#[tokio::test]
async fn custom_statement_runs_sequentially() {
    let provider = FakeProvider::new();
    let conn = connector(&provider);
    let custom = "UNWIND $rows AS row MERGE (:Person {id: row[0]})";

    let spec = EntitySpec::new("Person").statement(custom).batch_size(2);
    let report = conn.create_entities(&people(3), &spec).await.unwrap();
    assert!(!report.parallel);

    let executed = provider.executed();
    assert_eq!(executed.len(), 2);
    assert!(executed.iter().all(|e| e.statement == custom));
}

#[tokio::test]
async fn failing_sequential_batch_stops_the_load() {
    let provider = FakeProvider::new();
    provider.fail_rows_containing(Value::from(3i64));
    let conn = connector(&provider);

    let spec = EntitySpec::new("Person")
        .primary_key("id")
        .mode(NodeCreationMode::MergeUpdateOnMatch)
        .batch_size(2);
    let err = conn.create_entities(&people(8), &spec).await.unwrap_err();
    assert!(matches!(err, GraphError::Backend(_)));
    // Index, batch 0..2, failing batch 2..4; nothing after it.
    assert_eq!(provider.executed().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_parallel_batch_fails_the_load() {
    let provider = FakeProvider::new();
    provider.fail_rows_containing(Value::from(3i64));
    let conn = connector(&provider);

    let err = conn
        .create_entities(&people(8), &EntitySpec::new("Person").batch_size(2))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::Backend(_)));
    assert_eq!(bulk_writes(&provider).len(), 4);
    assert!(!conn.is_parallel());
}

fn knows() -> Table {
    Table::new([
        ("from", vec![Value::from(1i64), Value::from(2i64)]),
        ("to", vec![Value::from(2i64), Value::from(3i64)]),
        ("since", vec![Value::from(2001i64), Value::from(2002i64)]),
    ])
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn edges_between_matched_nodes_run_in_parallel() {
    let provider = FakeProvider::new();
    let conn = connector(&provider);

    let spec = EdgeSpec::new(
        Endpoint::new("Person", "from").with_mode(RelNodeCreationMode::Match),
        "KNOWS",
        Endpoint::new("Person", "to").with_mode(RelNodeCreationMode::Match),
    );
    let report = conn.create_edges(&knows(), &spec).await.unwrap();
    assert!(report.parallel);

    let statements: Vec<String> = provider.executed().into_iter().map(|e| e.statement).collect();
    assert!(statements.contains(
        &"CREATE INDEX `node_index_Person_from` IF NOT EXISTS FOR (n:`Person`) ON (n.`from`)"
            .to_string()
    ));
    assert!(statements.contains(
        &"CREATE INDEX `node_index_Person_to` IF NOT EXISTS FOR (n:`Person`) ON (n.`to`)"
            .to_string()
    ));
    assert!(statements.contains(
        &"CREATE INDEX `rel_index_KNOWS_since` IF NOT EXISTS FOR ()-[r:`KNOWS`]-() ON (r.`since`)"
            .to_string()
    ));

    let writes = bulk_writes(&provider);
    assert_eq!(writes.len(), 1);
    assert!(writes[0]
        .statement
        .ends_with("CREATE (src)-[r:`KNOWS` {since: row[\"since\"]}]->(dst)"));
}

#[tokio::test]
async fn merged_edges_run_sequentially() {
    let provider = FakeProvider::new();
    let conn = connector_with(&provider, |o| o.create_indexes = false);

    let matched = |key: &str| Endpoint::new("Person", key).with_mode(RelNodeCreationMode::Match);

    let spec = EdgeSpec::new(matched("from"), "KNOWS", matched("to")).mode(RelCreationMode::Merge);
    assert!(!conn.create_edges(&knows(), &spec).await.unwrap().parallel);

    // Default endpoints merge, which is never parallel.
    let spec = EdgeSpec::new(
        Endpoint::new("Person", "from"),
        "KNOWS",
        Endpoint::new("Person", "to"),
    );
    assert!(!conn.create_edges(&knows(), &spec).await.unwrap().parallel);
}

#[tokio::test]
async fn edge_endpoint_must_be_a_declared_attribute() {
    let provider = FakeProvider::new();
    let conn = connector(&provider);

    let spec = EdgeSpec::new(
        Endpoint::new("Person", "from"),
        "KNOWS",
        Endpoint::new("Person", "missing"),
    );
    let err = conn.create_edges(&knows(), &spec).await.unwrap_err();
    assert!(matches!(err, GraphError::Statement(_)));
    assert!(provider.opened().is_empty());
}

fn node(id: i64, props: &[(&str, Value)]) -> Value {
    Value::Node(NodeValue {
        id,
        labels: vec!["Person".into()],
        properties: props.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
    })
}

#[tokio::test]
async fn load_entities_as_table_and_array() {
    let provider = FakeProvider::new();
    provider.respond(
        "MATCH (n:`Person`)",
        QueryResult::new(
            vec!["n".into()],
            vec![
                vec![node(1, &[("id", 1.into()), ("name", "ann".into())])],
                vec![node(2, &[("id", 2.into())])],
            ],
        )
        .unwrap(),
    );
    let conn = connector(&provider);

    let table = conn.load_entities_by_label(&["Person"]).await.unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.column("name").unwrap(), &[Value::from("ann"), Value::Null]);

    let (columns, array) = conn.load_entities_array(&["Person"]).await.unwrap();
    assert_eq!(columns.len(), 2);
    assert_eq!(array.shape(), (2, 2));

    let executed = provider.executed();
    assert_eq!(executed[0].statement, "MATCH (n:`Person`) RETURN n");
    assert_eq!(executed[0].access, AccessMode::Read);
}

#[tokio::test]
async fn load_edges_as_table() {
    let provider = FakeProvider::new();
    let rel = Value::Relation(RelationValue {
        id: 7,
        rel_type: "KNOWS".into(),
        start_id: 1,
        end_id: 2,
        properties: BTreeMap::from([("since".to_string(), Value::from(1999i64))]),
    });
    provider.respond(
        "MATCH ()-[r:`KNOWS`]->()",
        QueryResult::new(vec!["r".into()], vec![vec![rel]]).unwrap(),
    );
    let conn = connector(&provider);

    let table = conn.load_edges_by_label("KNOWS").await.unwrap();
    assert_eq!(table.columns(), ["since"]);
    assert_eq!(table.row(0), Some(vec![Value::from(1999i64)]));
}

#[tokio::test]
async fn loading_non_nodes_is_a_decode_error() {
    let provider = FakeProvider::new();
    provider.respond(
        "MATCH (n:`Person`)",
        QueryResult::new(vec!["n".into()], vec![vec![Value::from(1i64)]]).unwrap(),
    );
    let conn = connector(&provider);

    let err = conn.load_entities_by_label(&["Person"]).await.unwrap_err();
    assert!(matches!(err, GraphError::Decode(_)));
}

#[tokio::test]
async fn failed_read_propagates() {
    let provider = FakeProvider::new();
    provider.fail_reads();
    let conn = connector(&provider);

    let err = conn.load_edges_by_label("KNOWS").await.unwrap_err();
    assert!(matches!(err, GraphError::Backend(_)));
}
