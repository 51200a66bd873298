//! Discovery against the in-memory session
//!
//! Covers both describe strategies, the fallback listing used when metadata
//! privileges are missing, and the error paths for tables that do not exist.

use cassduck_client::{
    describe_query, describe_table, keyspace_exists, list_keyspaces, list_tables, primary_key,
    table_exists, ColumnRole, ConnectionConfig, DescribeStrategy, Error, KeyspaceRef,
    MemorySession, MemoryTable, TableRef, SYSTEM_KEYSPACE,
};
use cassduck_types::{CqlValue, LogicalType};

fn events_table() -> MemoryTable {
    MemoryTable::new("demo", "events")
        .partition_key("id", "uuid")
        .clustering_key("ts", "timestamp")
        .column("val", "double")
        .column("tags", "list<text>")
        .static_column("owner", "text")
}

fn cluster() -> MemorySession {
    MemorySession::new()
        .with_keyspace("system")
        .with_table(events_table())
        .with_table(MemoryTable::new("demo", "users").partition_key("name", "text"))
        .with_table(MemoryTable::new("metrics", "samples").partition_key("k", "int"))
}

#[test]
fn test_list_keyspaces_is_live() {
    let session = cluster();
    let names: Vec<String> = list_keyspaces(&session)
        .iter()
        .map(|ks| ks.name().to_string())
        .collect();
    assert_eq!(names, vec!["demo", "metrics", "system"]);
    assert!(keyspace_exists(&session, "metrics"));
    assert!(!keyspace_exists(&session, "absent"));
}

#[test]
fn test_list_keyspaces_falls_back_without_privileges() {
    let config = ConnectionConfig::from_connection_string("keyspace=demo").unwrap();
    let session = cluster().with_config(config).restrict_metadata();
    let names: Vec<String> = list_keyspaces(&session)
        .iter()
        .map(|ks| ks.name().to_string())
        .collect();
    assert_eq!(names, vec![SYSTEM_KEYSPACE.to_string(), "demo".to_string()]);
}

#[test]
fn test_list_tables() {
    let session = cluster();
    let demo = KeyspaceRef::new("demo").unwrap();
    let tables: Vec<String> = list_tables(&session, &demo)
        .iter()
        .map(|t| t.qualified_name())
        .collect();
    assert_eq!(tables, vec!["demo.events", "demo.users"]);

    assert!(table_exists(&session, &TableRef::new("demo", "users")));
    assert!(!table_exists(&session, &TableRef::new("demo", "nope")));

    let restricted = cluster().restrict_metadata();
    assert!(list_tables(&restricted, &demo).is_empty());
}

#[test]
fn test_describe_with_metadata() {
    let session = cluster();
    let columns = describe_table(
        &session,
        &TableRef::new("demo", "events"),
        DescribeStrategy::Metadata,
    )
    .unwrap();

    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "ts", "owner", "tags", "val"]);

    let positions: Vec<usize> = columns.iter().map(|c| c.position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3, 4]);

    assert_eq!(columns[0].role, ColumnRole::PartitionKey);
    assert_eq!(columns[1].role, ColumnRole::ClusteringKey);
    assert_eq!(columns[2].role, ColumnRole::Static);
    assert_eq!(columns[0].logical_type, LogicalType::Uuid);
    assert_eq!(columns[1].logical_type, LogicalType::TimestampTz);
    assert_eq!(columns[3].logical_type, LogicalType::Json);
    assert_eq!(columns[3].source_type, "list<text>");
    assert_eq!(columns[4].logical_type, LogicalType::Double);

    assert_eq!(primary_key(&columns), vec!["id", "ts"]);
}

#[test]
fn test_describe_missing_table_is_an_error() {
    let session = cluster();
    let missing = TableRef::new("demo", "missing");

    for strategy in [
        DescribeStrategy::Auto,
        DescribeStrategy::Metadata,
        DescribeStrategy::Probe,
    ] {
        let err = describe_table(&session, &missing, strategy).unwrap_err();
        assert!(err.is_discovery(), "{:?} gave {:?}", strategy, err);
    }
}

#[test]
fn test_describe_by_probe_reads_descriptor() {
    // No rows at all: the descriptor alone is enough
    let session = cluster();
    let columns = describe_table(
        &session,
        &TableRef::new("demo", "events"),
        DescribeStrategy::Probe,
    )
    .unwrap();
    assert_eq!(columns.len(), 5);
    assert!(columns.iter().all(|c| c.role == ColumnRole::Unknown));
    assert_eq!(columns[0].name, "id");
    assert!(session
        .executed_queries()
        .iter()
        .any(|q| q == "SELECT * FROM \"demo\".\"events\" LIMIT 1"));
}

#[test]
fn test_auto_falls_back_to_probe() {
    let session = cluster().restrict_metadata();
    let columns = describe_table(
        &session,
        &TableRef::new("demo", "events"),
        DescribeStrategy::Auto,
    )
    .unwrap();
    assert_eq!(columns.len(), 5);
    assert_eq!(columns[2].logical_type, LogicalType::Double);
}

#[test]
fn test_metadata_failure_is_discovery_error() {
    let session = cluster().restrict_metadata();
    let err = describe_table(
        &session,
        &TableRef::new("demo", "events"),
        DescribeStrategy::Metadata,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Discovery(_)));
}

#[test]
fn test_describe_query_uses_result_columns() {
    let session = cluster().with_table(
        MemoryTable::new("demo", "kv")
            .partition_key("k", "text")
            .column("v", "bigint")
            .row(vec![Some(CqlValue::Text("a".into())), Some(CqlValue::BigInt(1))]),
    );
    let columns = describe_query(&session, "SELECT v FROM demo.kv").unwrap();
    assert_eq!(columns.len(), 1);
    assert_eq!(columns[0].name, "v");
    assert_eq!(columns[0].logical_type, LogicalType::BigInt);
    assert_eq!(session.open_cursors(), 0);
    // Described through a prepare, never executed
    assert!(session.executed_queries().is_empty());
    assert_eq!(session.prepared_queries(), vec!["SELECT v FROM demo.kv".to_string()]);

    let err = describe_query(&session, "SELECT v FROM demo.nope").unwrap_err();
    assert!(matches!(err, Error::QueryExecution { .. }));
}
