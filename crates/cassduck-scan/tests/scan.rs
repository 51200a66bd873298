//! Scan execution against the in-memory session

use arrow::array::{Array, AsArray};
use arrow::datatypes::{Float64Type, Int64Type, TimestampMicrosecondType};
use cassduck_client::{
    describe_table, CqlSession, DescribeStrategy, MemorySession, MemoryTable, SessionRef, TableRef,
};
use cassduck_scan::{ScanColumn, ScanError, ScanExecutor, ScanPhase, ScanSource, VECTOR_SIZE};
use cassduck_types::{CqlValue, LogicalType};
use std::sync::Arc;
use uuid::Uuid;

fn numbers(n: i64) -> MemoryTable {
    MemoryTable::new("demo", "numbers")
        .partition_key("n", "bigint")
        .column("label", "text")
        .rows((0..n).map(|i| {
            let label = if i % 3 == 0 {
                None
            } else {
                Some(CqlValue::Text(format!("row-{}", i)))
            };
            vec![Some(CqlValue::BigInt(i)), label]
        }))
}

fn table_scan(session: Arc<MemorySession>, table: &str) -> ScanExecutor {
    let table = TableRef::new("demo", table);
    let columns = describe_table(session.as_ref(), &table, DescribeStrategy::Metadata).unwrap();
    let session: Arc<dyn CqlSession> = session;
    ScanExecutor::new(
        SessionRef::Owned(session),
        ScanSource::Table {
            table,
            filter: None,
        },
        columns.iter().map(ScanColumn::from).collect(),
    )
}

#[test]
fn test_batches_cover_all_rows_then_exhaust() {
    for (n, batch) in [(10usize, 3usize), (9, 3), (1, 5), (5000, VECTOR_SIZE)] {
        let session = Arc::new(MemorySession::new().with_table(numbers(n as i64)));
        let mut scan = table_scan(Arc::clone(&session), "numbers");
        assert_eq!(scan.phase(), ScanPhase::Unstarted);

        let mut non_empty = 0;
        let mut total = 0;
        loop {
            let rb = scan.next_batch(batch).unwrap();
            if rb.num_rows() == 0 {
                break;
            }
            assert!(rb.num_rows() <= batch);
            non_empty += 1;
            total += rb.num_rows();
            assert_eq!(scan.phase(), ScanPhase::Streaming);
        }

        assert_eq!(non_empty, n.div_ceil(batch), "n={} batch={}", n, batch);
        assert_eq!(total, n);
        assert_eq!(scan.phase(), ScanPhase::Exhausted);
        assert_eq!(session.open_cursors(), 0);

        // Exhausted is terminal and never re-runs the query
        let queries = session.executed_queries().len();
        assert_eq!(scan.next_batch(batch).unwrap().num_rows(), 0);
        assert_eq!(session.executed_queries().len(), queries);
    }
}

#[test]
fn test_batch_size_is_bounded_by_vector_width() {
    let session = Arc::new(MemorySession::new().with_table(numbers(5000)));
    let mut scan = table_scan(session, "numbers");
    assert_eq!(scan.next_batch(usize::MAX).unwrap().num_rows(), VECTOR_SIZE);
    assert_eq!(scan.next_batch(0).unwrap().num_rows(), 1);
}

#[test]
fn test_nulls_are_flagged() {
    let session = Arc::new(MemorySession::new().with_table(numbers(4)));
    let mut scan = table_scan(session, "numbers");
    let batch = scan.next_batch(VECTOR_SIZE).unwrap();

    let n = batch.column(0).as_primitive::<Int64Type>();
    let label = batch.column(1).as_string::<i32>();
    assert_eq!(n.values().to_vec(), vec![0, 1, 2, 3]);
    assert!(label.is_null(0));
    assert_eq!(label.value(1), "row-1");
    assert!(label.is_null(3));
    assert_eq!(label.null_count(), 2);
}

#[test]
fn test_events_scenario() {
    let id = Uuid::parse_str("7f1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d").unwrap();
    let val = std::f64::consts::PI / 7.0;
    let session = Arc::new(
        MemorySession::new().with_table(
            MemoryTable::new("demo", "events")
                .partition_key("id", "uuid")
                .clustering_key("ts", "timestamp")
                .column("val", "double")
                .row(vec![
                    Some(CqlValue::Uuid(id)),
                    Some(CqlValue::Timestamp(1_700_000_000_123)),
                    Some(CqlValue::Double(val)),
                ]),
        ),
    );
    let mut scan = table_scan(Arc::clone(&session), "events");
    let batch = scan.next_batch(VECTOR_SIZE).unwrap();
    assert_eq!(batch.num_rows(), 1);

    let ids = batch.column(0).as_fixed_size_binary();
    assert_eq!(ids.value(0), id.as_bytes());
    let ts = batch.column(1).as_primitive::<TimestampMicrosecondType>();
    assert_eq!(ts.value(0), 1_700_000_000_123_000);
    let vals = batch.column(2).as_primitive::<Float64Type>();
    assert_eq!(vals.value(0).to_bits(), val.to_bits());

    assert!(session
        .executed_queries()
        .iter()
        .any(|q| q == "SELECT \"id\", \"ts\", \"val\" FROM \"demo\".\"events\""));
}

#[test]
fn test_list_column_is_text() {
    let session = Arc::new(
        MemorySession::new().with_table(
            MemoryTable::new("demo", "tagged")
                .partition_key("k", "int")
                .column("tags", "list<text>")
                .row(vec![
                    Some(CqlValue::Int(1)),
                    Some(CqlValue::List(vec![
                        CqlValue::Text("red".into()),
                        CqlValue::Text("blue".into()),
                    ])),
                ]),
        ),
    );
    let mut scan = table_scan(session, "tagged");
    assert_eq!(scan.columns()[1].logical_type, LogicalType::Json);

    let batch = scan.next_batch(VECTOR_SIZE).unwrap();
    let tags = batch.column(1).as_string::<i32>();
    assert!(!tags.is_null(0));
    let text = tags.value(0);
    assert!(text.contains("red") && text.contains("blue"), "{}", text);
    let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
    assert!(parsed.is_array());
}

#[test]
fn test_declared_type_wins_over_source_type() {
    // Column bound as BIGINT while the result carries INT values
    let session: Arc<dyn CqlSession> = Arc::new(
        MemorySession::new().with_table(
            MemoryTable::new("demo", "small")
                .partition_key("k", "int")
                .rows((0..3).map(|i| vec![Some(CqlValue::Int(i))])),
        ),
    );
    let mut scan = ScanExecutor::new(
        SessionRef::Owned(session),
        ScanSource::Query("SELECT k FROM demo.small".into()),
        vec![ScanColumn {
            name: "k".into(),
            logical_type: LogicalType::BigInt,
        }],
    );
    let batch = scan.next_batch(VECTOR_SIZE).unwrap();
    assert_eq!(
        batch.column(0).as_primitive::<Int64Type>().values().to_vec(),
        vec![0, 1, 2]
    );
}

#[test]
fn test_extra_bound_columns_read_as_null() {
    let session: Arc<dyn CqlSession> =
        Arc::new(MemorySession::new().with_table(numbers(2)));
    let mut scan = ScanExecutor::new(
        SessionRef::Owned(session),
        ScanSource::Query("SELECT n FROM demo.numbers".into()),
        vec![
            ScanColumn {
                name: "n".into(),
                logical_type: LogicalType::BigInt,
            },
            ScanColumn {
                name: "missing".into(),
                logical_type: LogicalType::Varchar,
            },
        ],
    );
    let batch = scan.next_batch(VECTOR_SIZE).unwrap();
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.column(1).null_count(), 2);
}

#[test]
fn test_query_failure_is_reported_and_terminal() {
    let session = Arc::new(
        MemorySession::new()
            .with_table(numbers(3))
            .fail_queries_matching("\"numbers\""),
    );
    let mut scan = {
        let columns = vec![ScanColumn {
            name: "n".into(),
            logical_type: LogicalType::BigInt,
        }];
        let dyn_session: Arc<dyn CqlSession> = session.clone();
        ScanExecutor::new(
            SessionRef::Owned(dyn_session),
            ScanSource::Table {
                table: TableRef::new("demo", "numbers"),
                filter: Some("n > 0".into()),
            },
            columns,
        )
    };

    let err = scan.next_batch(10).unwrap_err();
    match err {
        ScanError::Client(cassduck_client::Error::QueryExecution { query, .. }) => {
            assert_eq!(query, "SELECT \"n\" FROM \"demo\".\"numbers\" WHERE n > 0");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(scan.phase(), ScanPhase::Exhausted);
    assert_eq!(scan.next_batch(10).unwrap().num_rows(), 0);
    assert_eq!(session.executed_queries().len(), 1);
}

#[test]
fn test_cursor_released_on_drop_and_close() {
    let session = Arc::new(MemorySession::new().with_table(numbers(100)));

    let mut scan = table_scan(Arc::clone(&session), "numbers");
    scan.next_batch(10).unwrap();
    assert_eq!(session.open_cursors(), 1);
    drop(scan);
    assert_eq!(session.open_cursors(), 0);

    let mut scan = table_scan(Arc::clone(&session), "numbers");
    scan.next_batch(10).unwrap();
    scan.close();
    assert_eq!(session.open_cursors(), 0);
    assert_eq!(scan.phase(), ScanPhase::Exhausted);
}

#[test]
fn test_detached_session_fails_on_first_pull() {
    let session: Arc<dyn CqlSession> = Arc::new(MemorySession::new().with_table(numbers(1)));
    let weak = SessionRef::attached(&session);
    drop(session);

    let mut scan = ScanExecutor::new(
        weak,
        ScanSource::Query("SELECT n FROM demo.numbers".into()),
        vec![ScanColumn {
            name: "n".into(),
            logical_type: LogicalType::BigInt,
        }],
    );
    assert!(matches!(
        scan.next_batch(1),
        Err(ScanError::Client(cassduck_client::Error::Connection(_)))
    ));
}
