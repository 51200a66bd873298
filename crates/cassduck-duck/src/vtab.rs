//! DuckDB table functions `cassandra_scan`, `cassandra_query` and
//! `cassandra_attach`
//!
//! With `catalog := 'name'` a scan resolves its table through the attached
//! catalog and shares that catalog's session. Without it, the function opens
//! its own session at bind time from the `CASSANDRA_*` environment, an
//! optional `connection` string and per-call named parameters, in that order.

use crate::catalog::{CassandraCatalog, TableEntry};
use crate::chunk::{logical_type_handle, write_batch};
use crate::error::BridgeError;
use crate::registry::{self, DEFAULT_CATALOG};
use cassduck_client::{
    connect, describe_query, describe_table, ColumnInfo, ConnectionConfig, CqlSession,
    DescribeStrategy, Result, SessionRef, TableRef,
};
use cassduck_scan::{ScanColumn, ScanExecutor, ScanSource, VECTOR_SIZE};
use cassduck_types::LogicalType;
use duckdb::core::{DataChunkHandle, LogicalTypeHandle, LogicalTypeId};
use duckdb::vtab::{BindInfo, InitInfo, TableFunctionInfo, VTab};
use duckdb::Connection;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const SCAN_FUNCTION: &str = "cassandra_scan";
pub const QUERY_FUNCTION: &str = "cassandra_query";
pub const ATTACH_FUNCTION: &str = "cassandra_attach";

/// Named parameter carrying a whole attach string
const CONNECTION_PARAM: &str = "connection";
/// Raw CQL predicate appended to table scans
const FILTER_PARAM: &str = "filter";
/// Name of an attached catalog to scan through
const CATALOG_PARAM: &str = "catalog";
/// Name to attach under
const NAME_PARAM: &str = "name";

const TEXT_PARAMS: &[&str] = &[
    "host",
    "contact_points",
    "keyspace",
    "username",
    "password",
    "consistency",
    "certfile",
    "cacert",
    "usercert",
    "userkey",
    "certfile_b64",
    "usercert_b64",
    "userkey_b64",
    "client_id",
    "client_secret",
    "astra_host",
    "astra_dc",
    "astra_ca_cert",
    "astra_client_cert",
    "astra_client_key",
    "astra_ca_cert_b64",
    "astra_client_cert_b64",
    "astra_client_key_b64",
];
const INTEGER_PARAMS: &[&str] = &["port", "astra_port"];
const BOOLEAN_PARAMS: &[&str] = &["ssl", "use_ssl", "verify_peer"];

/// Where a bound scan gets its rows
#[derive(Debug, Clone)]
enum ScanTarget {
    /// A session, owned by this call or borrowed from a catalog
    Session(SessionRef),
    /// A table resolved through an attached catalog
    Table(TableEntry),
}

/// Everything a scan needs once DuckDB has fixed the output schema
pub struct ScanBindData {
    columns: Vec<ScanColumn>,
    source: ScanSource,
    target: ScanTarget,
}

impl ScanBindData {
    pub fn columns(&self) -> &[ScanColumn] {
        &self.columns
    }

    pub fn source(&self) -> &ScanSource {
        &self.source
    }

    pub fn types(&self) -> Vec<LogicalType> {
        self.columns.iter().map(|c| c.logical_type).collect()
    }

    /// True when rows come from an attached catalog's session
    pub fn is_attached(&self) -> bool {
        match &self.target {
            ScanTarget::Table(_) => true,
            ScanTarget::Session(session) => matches!(session, SessionRef::Attached(_)),
        }
    }

    fn executor(&self) -> ScanExecutor {
        match &self.target {
            ScanTarget::Table(entry) => {
                let filter = match &self.source {
                    ScanSource::Table { filter, .. } => filter.clone(),
                    ScanSource::Query(_) => None,
                };
                entry.get_scan_function(filter)
            }
            ScanTarget::Session(session) => {
                ScanExecutor::new(session.clone(), self.source.clone(), self.columns.clone())
            }
        }
    }
}

impl std::fmt::Debug for ScanBindData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanBindData")
            .field("columns", &self.columns)
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

/// Created empty; the executor starts on the first `func` call
#[derive(Default)]
pub struct ScanInitData {
    executor: Mutex<Option<ScanExecutor>>,
}

/// Bind a whole-table scan: describe `table` and project every column
pub fn bind_table(
    session: Arc<dyn CqlSession>,
    table: TableRef,
    filter: Option<String>,
) -> Result<ScanBindData> {
    let columns = describe_table(session.as_ref(), &table, DescribeStrategy::Auto)?;
    Ok(ScanBindData {
        columns: scan_columns(&columns),
        source: ScanSource::Table { table, filter },
        target: ScanTarget::Session(SessionRef::Owned(session)),
    })
}

/// Bind a raw query: the output schema comes from its result descriptor
pub fn bind_query(session: Arc<dyn CqlSession>, query: &str) -> Result<ScanBindData> {
    bind_query_on(SessionRef::Owned(session), query)
}

/// Bind a table of an attached catalog: keyspace and table lookups go
/// through the catalog and the scan runs on its shared session
pub fn bind_catalog_table(
    catalog: &CassandraCatalog,
    table: &TableRef,
    filter: Option<String>,
) -> Result<ScanBindData> {
    let entry = catalog
        .lookup_schema(&table.keyspace)?
        .lookup_table(&table.table)?;
    Ok(ScanBindData {
        columns: scan_columns(entry.columns()),
        source: ScanSource::Table {
            table: entry.table().clone(),
            filter,
        },
        target: ScanTarget::Table(entry),
    })
}

/// Bind a raw query against an attached catalog's session
pub fn bind_catalog_query(catalog: &CassandraCatalog, query: &str) -> Result<ScanBindData> {
    bind_query_on(catalog.session(), query)
}

fn bind_query_on(session: SessionRef, query: &str) -> Result<ScanBindData> {
    let columns = describe_query(session.session()?.as_ref(), query)?;
    Ok(ScanBindData {
        columns: scan_columns(&columns),
        source: ScanSource::Query(query.to_string()),
        target: ScanTarget::Session(session),
    })
}

fn scan_columns(columns: &[ColumnInfo]) -> Vec<ScanColumn> {
    columns.iter().map(ScanColumn::from).collect()
}

/// Pull one vector's worth of rows into `output`; zero rows ends the scan
fn fill_chunk(
    bind: &ScanBindData,
    init: &ScanInitData,
    output: &mut DataChunkHandle,
) -> std::result::Result<(), BridgeError> {
    let mut guard = init.executor.lock().map_err(|_| BridgeError::Poisoned)?;
    let executor = guard.get_or_insert_with(|| bind.executor());
    let batch = executor.next_batch(VECTOR_SIZE)?;
    write_batch(&batch, &bind.types(), output)
}

fn text_parameter(bind: &BindInfo, name: &str) -> Option<String> {
    bind.get_named_parameter(name)
        .map(|value| value.to_string())
        .filter(|value| !value.trim().is_empty())
}

fn connection_config(bind: &BindInfo) -> Result<ConnectionConfig> {
    let mut config = ConnectionConfig::from_env()?;
    if let Some(connection) = bind.get_named_parameter(CONNECTION_PARAM) {
        config.apply_connection_string(&connection.to_string())?;
    }
    for key in TEXT_PARAMS
        .iter()
        .chain(INTEGER_PARAMS)
        .chain(BOOLEAN_PARAMS)
    {
        if let Some(value) = bind.get_named_parameter(key) {
            config.set(key, &value.to_string())?;
        }
    }
    Ok(config)
}

fn connection_parameters() -> Vec<(String, LogicalTypeHandle)> {
    let typed = |names: &[&str], id: LogicalTypeId| {
        names
            .iter()
            .map(|name| (name.to_string(), LogicalTypeHandle::from(id)))
            .collect::<Vec<_>>()
    };
    let mut params = vec![
        (
            CONNECTION_PARAM.to_string(),
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        ),
        (
            CATALOG_PARAM.to_string(),
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        ),
    ];
    params.extend(typed(TEXT_PARAMS, LogicalTypeId::Varchar));
    params.extend(typed(INTEGER_PARAMS, LogicalTypeId::Integer));
    params.extend(typed(BOOLEAN_PARAMS, LogicalTypeId::Boolean));
    params
}

fn add_result_columns(bind: &BindInfo, data: &ScanBindData) {
    for column in &data.columns {
        bind.add_result_column(&column.name, logical_type_handle(column.logical_type));
    }
}

/// `SELECT * FROM cassandra_scan('keyspace.table', filter := 'id = 1')`
pub struct CassandraScanVTab;

impl VTab for CassandraScanVTab {
    type BindData = ScanBindData;
    type InitData = ScanInitData;

    fn bind(bind: &BindInfo) -> std::result::Result<Self::BindData, Box<dyn Error>> {
        let table = TableRef::parse(&bind.get_parameter(0).to_string())?;
        let filter = text_parameter(bind, FILTER_PARAM);

        let data = match text_parameter(bind, CATALOG_PARAM) {
            Some(name) => bind_catalog_table(&*registry::attached(&name)?, &table, filter)?,
            None => bind_table(connect(&connection_config(bind)?)?, table, filter)?,
        };
        tracing::debug!(
            source = ?data.source,
            columns = data.columns.len(),
            attached = data.is_attached(),
            "Bound Cassandra scan"
        );
        add_result_columns(bind, &data);
        Ok(data)
    }

    fn init(init: &InitInfo) -> std::result::Result<Self::InitData, Box<dyn Error>> {
        init.set_max_threads(1);
        Ok(ScanInitData::default())
    }

    fn func(
        func: &TableFunctionInfo<Self>,
        output: &mut DataChunkHandle,
    ) -> std::result::Result<(), Box<dyn Error>> {
        fill_chunk(func.get_bind_data(), func.get_init_data(), output)?;
        Ok(())
    }

    fn parameters() -> Option<Vec<LogicalTypeHandle>> {
        Some(vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)])
    }

    fn named_parameters() -> Option<Vec<(String, LogicalTypeHandle)>> {
        let mut params = connection_parameters();
        params.push((
            FILTER_PARAM.to_string(),
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        ));
        Some(params)
    }
}

/// `SELECT * FROM cassandra_query('SELECT id, val FROM demo.events')`
pub struct CassandraQueryVTab;

impl VTab for CassandraQueryVTab {
    type BindData = ScanBindData;
    type InitData = ScanInitData;

    fn bind(bind: &BindInfo) -> std::result::Result<Self::BindData, Box<dyn Error>> {
        let query = bind.get_parameter(0).to_string();
        let data = match text_parameter(bind, CATALOG_PARAM) {
            Some(name) => bind_catalog_query(&*registry::attached(&name)?, &query)?,
            None => bind_query(connect(&connection_config(bind)?)?, &query)?,
        };
        tracing::debug!(
            query = %query,
            columns = data.columns.len(),
            attached = data.is_attached(),
            "Bound Cassandra query"
        );
        add_result_columns(bind, &data);
        Ok(data)
    }

    fn init(init: &InitInfo) -> std::result::Result<Self::InitData, Box<dyn Error>> {
        init.set_max_threads(1);
        Ok(ScanInitData::default())
    }

    fn func(
        func: &TableFunctionInfo<Self>,
        output: &mut DataChunkHandle,
    ) -> std::result::Result<(), Box<dyn Error>> {
        fill_chunk(func.get_bind_data(), func.get_init_data(), output)?;
        Ok(())
    }

    fn parameters() -> Option<Vec<LogicalTypeHandle>> {
        Some(vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)])
    }

    fn named_parameters() -> Option<Vec<(String, LogicalTypeHandle)>> {
        Some(connection_parameters())
    }
}

#[derive(Debug)]
pub struct AttachBindData {
    name: String,
    connection_string: String,
}

#[derive(Debug, Default)]
pub struct AttachInitData {
    done: AtomicBool,
}

/// `SELECT * FROM cassandra_attach('host=10.0.0.1 keyspace=demo', name := 'cass')`
///
/// Attaches on execution and returns a single `success` row. Later scans
/// reach the catalog with `catalog := 'cass'`.
pub struct CassandraAttachVTab;

impl VTab for CassandraAttachVTab {
    type BindData = AttachBindData;
    type InitData = AttachInitData;

    fn bind(bind: &BindInfo) -> std::result::Result<Self::BindData, Box<dyn Error>> {
        let connection_string = bind.get_parameter(0).to_string();
        // Reject a malformed attach string before anything connects
        ConnectionConfig::from_connection_string(&connection_string)?;
        let name = text_parameter(bind, NAME_PARAM).unwrap_or_else(|| DEFAULT_CATALOG.to_string());

        bind.add_result_column("success", LogicalTypeHandle::from(LogicalTypeId::Boolean));
        Ok(AttachBindData {
            name,
            connection_string,
        })
    }

    fn init(init: &InitInfo) -> std::result::Result<Self::InitData, Box<dyn Error>> {
        init.set_max_threads(1);
        Ok(AttachInitData::default())
    }

    fn func(
        func: &TableFunctionInfo<Self>,
        output: &mut DataChunkHandle,
    ) -> std::result::Result<(), Box<dyn Error>> {
        if func.get_init_data().done.swap(true, Ordering::SeqCst) {
            output.set_len(0);
            return Ok(());
        }
        let bind = func.get_bind_data();
        registry::attach(&bind.name, &bind.connection_string)?;

        unsafe { output.flat_vector(0).as_mut_slice::<bool>()[0] = true };
        output.set_len(1);
        Ok(())
    }

    fn parameters() -> Option<Vec<LogicalTypeHandle>> {
        Some(vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)])
    }

    fn named_parameters() -> Option<Vec<(String, LogicalTypeHandle)>> {
        Some(vec![(
            NAME_PARAM.to_string(),
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        )])
    }
}

/// Register the Cassandra table functions on `conn`
pub fn register(conn: &Connection) -> duckdb::Result<()> {
    conn.register_table_function::<CassandraScanVTab>(SCAN_FUNCTION)?;
    conn.register_table_function::<CassandraQueryVTab>(QUERY_FUNCTION)?;
    conn.register_table_function::<CassandraAttachVTab>(ATTACH_FUNCTION)?;
    tracing::debug!(
        "Registered {}, {} and {}",
        SCAN_FUNCTION,
        QUERY_FUNCTION,
        ATTACH_FUNCTION
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cassduck_client::{MemorySession, MemoryTable};
    use cassduck_types::CqlValue;

    fn session() -> Arc<MemorySession> {
        Arc::new(
            MemorySession::new().with_table(
                MemoryTable::new("demo", "events")
                    .partition_key("id", "int")
                    .column("val", "double")
                    .rows((0..5).map(|i| {
                        vec![Some(CqlValue::Int(i)), Some(CqlValue::Double(i as f64 / 2.0))]
                    })),
            ),
        )
    }

    #[test]
    fn test_bind_table_uses_declared_columns() {
        let data = bind_table(session(), TableRef::new("demo", "events"), None).unwrap();
        let names: Vec<&str> = data.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "val"]);
        assert_eq!(data.types(), vec![LogicalType::Integer, LogicalType::Double]);
    }

    #[test]
    fn test_bind_missing_table_fails() {
        let err = bind_table(session(), TableRef::new("demo", "nope"), None).unwrap_err();
        assert!(err.is_discovery(), "{:?}", err);
    }

    #[test]
    fn test_bind_query_reads_descriptor() {
        let data = bind_query(session(), "SELECT val FROM demo.events").unwrap();
        assert_eq!(data.types(), vec![LogicalType::Double]);
        assert_eq!(
            data.source(),
            &ScanSource::Query("SELECT val FROM demo.events".to_string())
        );
    }

    #[test]
    fn test_fill_chunk_streams_until_empty() {
        let data = bind_table(session(), TableRef::new("demo", "events"), None).unwrap();
        let init = ScanInitData::default();
        let handles: Vec<LogicalTypeHandle> = data
            .types()
            .into_iter()
            .map(logical_type_handle)
            .collect();

        let mut chunk = DataChunkHandle::new(&handles);
        fill_chunk(&data, &init, &mut chunk).unwrap();
        assert_eq!(chunk.len(), 5);
        let ids = chunk.flat_vector(0);
        assert_eq!(unsafe { &ids.as_slice::<i32>()[..5] }, &[0, 1, 2, 3, 4]);

        let mut chunk = DataChunkHandle::new(&handles);
        fill_chunk(&data, &init, &mut chunk).unwrap();
        assert_eq!(chunk.len(), 0);
    }

    fn readings() -> Arc<MemorySession> {
        let id = |text: &str| Some(CqlValue::Uuid(uuid::Uuid::parse_str(text).unwrap()));
        Arc::new(
            MemorySession::new().with_table(
                MemoryTable::new("demo", "readings")
                    .partition_key("id", "uuid")
                    .clustering_key("ts", "timestamp")
                    .column("val", "double")
                    .column("tags", "list<text>")
                    .column("payload", "blob")
                    .column("ok", "boolean")
                    .row(vec![
                        id("f47ac10b-58cc-4372-a567-0e02b2c3d479"),
                        Some(CqlValue::Timestamp(1_700_000_000_123)),
                        Some(CqlValue::Double(1.5)),
                        Some(CqlValue::List(vec![
                            CqlValue::Text("a".into()),
                            CqlValue::Text("b".into()),
                        ])),
                        Some(CqlValue::Blob(vec![0x00, 0x01, 0xff])),
                        Some(CqlValue::Boolean(true)),
                    ])
                    .row(vec![
                        id("0ba7b810-9dad-11d1-80b4-00c04fd430c8"),
                        Some(CqlValue::Timestamp(0)),
                        None,
                        None,
                        None,
                        None,
                    ]),
            ),
        )
    }

    fn duckdb() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();
        conn
    }

    #[test]
    fn test_scan_through_attached_catalog_reuses_its_session() {
        let memory = session();
        registry::attach_session("vtab_shared", "host=127.0.0.1", memory.clone()).unwrap();
        let conn = duckdb();

        for _ in 0..2 {
            let total: f64 = conn
                .query_row(
                    "SELECT sum(val) FROM cassandra_scan('demo.events', catalog := 'vtab_shared')",
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(total, 5.0);
        }

        let scans = memory
            .executed_queries()
            .iter()
            .filter(|q| q.starts_with("SELECT \"id\", \"val\" FROM \"demo\".\"events\""))
            .count();
        assert_eq!(scans, 2);
        assert_eq!(memory.open_cursors(), 0);
        registry::detach("vtab_shared");
    }

    #[test]
    fn test_catalog_scan_binds_through_lookup() {
        let memory = session();
        let catalog = registry::attach_session("vtab_lookup", "host=127.0.0.1", memory).unwrap();

        let data = bind_catalog_table(&catalog, &TableRef::new("demo", "events"), None).unwrap();
        assert!(data.is_attached());
        assert_eq!(data.types(), vec![LogicalType::Integer, LogicalType::Double]);

        let err = bind_catalog_table(&catalog, &TableRef::new("nope", "events"), None).unwrap_err();
        assert!(matches!(err, cassduck_client::Error::NotFound(_)), "{:?}", err);
        let err = bind_catalog_table(&catalog, &TableRef::new("demo", "nope"), None).unwrap_err();
        assert!(err.is_discovery(), "{:?}", err);
        registry::detach("vtab_lookup");
    }

    #[test]
    fn test_scan_fails_once_catalog_is_detached() {
        let catalog = registry::attach_session("vtab_detached", "host=127.0.0.1", session()).unwrap();
        let data = bind_catalog_table(&catalog, &TableRef::new("demo", "events"), None).unwrap();
        drop(catalog);
        assert!(registry::detach("vtab_detached"));

        let handles: Vec<LogicalTypeHandle> =
            data.types().into_iter().map(logical_type_handle).collect();
        let mut chunk = DataChunkHandle::new(&handles);
        let err = fill_chunk(&data, &ScanInitData::default(), &mut chunk).unwrap_err();
        assert!(matches!(err, BridgeError::Scan(_)), "{:?}", err);

        let conn = duckdb();
        let missing = conn.query_row(
            "SELECT count(*) FROM cassandra_scan('demo.events', catalog := 'vtab_detached')",
            [],
            |row| row.get::<_, i64>(0),
        );
        assert!(missing.is_err());
    }

    #[test]
    fn test_query_through_attached_catalog_is_prepared_not_run() {
        let memory = session();
        registry::attach_session("vtab_query", "host=127.0.0.1", memory.clone()).unwrap();
        let conn = duckdb();

        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM cassandra_query('SELECT id FROM demo.events', catalog := 'vtab_query')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 5);
        assert_eq!(memory.prepared_queries(), vec!["SELECT id FROM demo.events".to_string()]);
        assert_eq!(memory.executed_queries(), vec!["SELECT id FROM demo.events".to_string()]);
        registry::detach("vtab_query");
    }

    #[test]
    fn test_values_reach_duckdb_intact() {
        registry::attach_session("vtab_values", "host=127.0.0.1", readings()).unwrap();
        let conn = duckdb();

        let mut stmt = conn
            .prepare(
                "SELECT id::VARCHAR, ts = TIMESTAMPTZ '2023-11-14 22:13:20.123+00', val, tags, hex(payload), ok \
                 FROM cassandra_scan('demo.readings', catalog := 'vtab_values') ORDER BY ts DESC",
            )
            .unwrap();
        type Reading = (
            String,
            bool,
            Option<f64>,
            Option<String>,
            Option<String>,
            Option<bool>,
        );
        let rows: Vec<Reading> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .unwrap()
            .collect::<duckdb::Result<_>>()
            .unwrap();

        assert_eq!(
            rows,
            vec![
                (
                    "f47ac10b-58cc-4372-a567-0e02b2c3d479".to_string(),
                    true,
                    Some(1.5),
                    Some(r#"["a","b"]"#.to_string()),
                    Some("0001FF".to_string()),
                    Some(true),
                ),
                (
                    "0ba7b810-9dad-11d1-80b4-00c04fd430c8".to_string(),
                    false,
                    None,
                    None,
                    None,
                    None,
                ),
            ]
        );

        let sorted: Vec<String> = conn
            .prepare("SELECT id::VARCHAR FROM cassandra_scan('demo.readings', catalog := 'vtab_values') ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<duckdb::Result<_>>()
            .unwrap();
        assert_eq!(
            sorted,
            vec![
                "0ba7b810-9dad-11d1-80b4-00c04fd430c8".to_string(),
                "f47ac10b-58cc-4372-a567-0e02b2c3d479".to_string(),
            ]
        );
        registry::detach("vtab_values");
    }

    #[test]
    fn test_attach_function_rejects_bad_connection_string() {
        let conn = duckdb();
        let result = conn.query_row(
            "SELECT success FROM cassandra_attach('host=127.0.0.1 port=nine', name := 'vtab_bad')",
            [],
            |row| row.get::<_, bool>(0),
        );
        assert!(result.is_err());
        assert!(registry::attached("vtab_bad").is_err());
    }

    #[test]
    #[ignore = "requires a running Cassandra cluster"]
    fn test_attach_function_against_live_cluster() {
        let conn = duckdb();
        let connection = std::env::var("CASSDUCK_CONNECTION").unwrap_or_else(|_| "host=127.0.0.1".into());
        let sql = format!(
            "SELECT success FROM cassandra_attach('{}', name := 'vtab_live')",
            connection.replace('\'', "''")
        );
        let success: bool = conn.query_row(&sql, [], |row| row.get(0)).unwrap();
        assert!(success);

        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM cassandra_scan('system.local', catalog := 'vtab_live')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
        registry::detach("vtab_live");
    }

    #[test]
    #[ignore = "requires a running Cassandra cluster"]
    fn test_scan_function_against_live_cluster() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM cassandra_scan('system.local')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
