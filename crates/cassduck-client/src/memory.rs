//! In-memory session for tests and local development
//!
//! Answers the schema-metadata queries issued by discovery from registered
//! tables, and evaluates `SELECT <columns|*> FROM ks.table [WHERE ..] [LIMIT n]`
//! against their rows. WHERE clauses are accepted but not evaluated.

use crate::config::ConnectionConfig;
use crate::discovery::{COLUMNS_QUERY, KEYSPACES_QUERY, TABLES_QUERY};
use crate::error::{Error, Result};
use crate::session::{ColumnDesc, CqlSession, ResultSet, Row, RowCursor};
use cassduck_types::{CqlType, CqlValue};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct MemoryColumn {
    name: String,
    cql_type: CqlType,
    kind: &'static str,
    position: i32,
}

/// A table definition with its rows, built up fluently
#[derive(Debug, Clone)]
pub struct MemoryTable {
    keyspace: String,
    name: String,
    columns: Vec<MemoryColumn>,
    rows: Vec<Row>,
}

impl MemoryTable {
    pub fn new(keyspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn partition_key(self, name: &str, cql_type: &str) -> Self {
        let position = self.count_kind("partition_key");
        self.push_column(name, cql_type, "partition_key", position)
    }

    pub fn clustering_key(self, name: &str, cql_type: &str) -> Self {
        let position = self.count_kind("clustering");
        self.push_column(name, cql_type, "clustering", position)
    }

    pub fn static_column(self, name: &str, cql_type: &str) -> Self {
        self.push_column(name, cql_type, "static", -1)
    }

    pub fn column(self, name: &str, cql_type: &str) -> Self {
        self.push_column(name, cql_type, "regular", -1)
    }

    /// Append a row; cells follow the column declaration order
    pub fn row(mut self, cells: Vec<Option<CqlValue>>) -> Self {
        self.rows.push(cells);
        self
    }

    pub fn rows<I>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<Option<CqlValue>>>,
    {
        self.rows.extend(rows);
        self
    }

    fn count_kind(&self, kind: &str) -> i32 {
        self.columns.iter().filter(|c| c.kind == kind).count() as i32
    }

    fn push_column(mut self, name: &str, cql_type: &str, kind: &'static str, position: i32) -> Self {
        self.columns.push(MemoryColumn {
            name: name.to_string(),
            cql_type: CqlType::parse(cql_type),
            kind,
            position,
        });
        self
    }
}

#[derive(Default)]
pub struct MemorySession {
    config: ConnectionConfig,
    keyspaces: BTreeSet<String>,
    tables: Vec<MemoryTable>,
    canned: HashMap<String, ResultSet>,
    failing: Vec<String>,
    restrict_metadata: bool,
    executed: Mutex<Vec<String>>,
    prepared: Mutex<Vec<String>>,
    open_cursors: Arc<AtomicUsize>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_keyspace(mut self, name: impl Into<String>) -> Self {
        self.keyspaces.insert(name.into());
        self
    }

    pub fn with_table(mut self, table: MemoryTable) -> Self {
        self.keyspaces.insert(table.keyspace.clone());
        self.tables.push(table);
        self
    }

    /// Answer `cql` verbatim with `result`
    pub fn with_query(mut self, cql: impl Into<String>, result: ResultSet) -> Self {
        self.canned.insert(cql.into(), result);
        self
    }

    /// Fail every query containing `pattern`
    pub fn fail_queries_matching(mut self, pattern: impl Into<String>) -> Self {
        self.failing.push(pattern.into());
        self
    }

    /// Reject reads of `system_schema`, as a role without metadata grants would see
    pub fn restrict_metadata(mut self) -> Self {
        self.restrict_metadata = true;
        self
    }

    pub fn executed_queries(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }

    /// Statements described without being run
    pub fn prepared_queries(&self) -> Vec<String> {
        self.prepared
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }

    /// Cursors handed out and not yet dropped
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    fn record(log: &Mutex<Vec<String>>, cql: &str) {
        if let Ok(mut queries) = log.lock() {
            queries.push(cql.to_string());
        }
    }

    fn run(&self, cql: &str, params: &[&str]) -> Result<ResultSet> {
        Self::record(&self.executed, cql);
        self.answer(cql, params)
    }

    fn answer(&self, cql: &str, params: &[&str]) -> Result<ResultSet> {
        if let Some(pattern) = self.failing.iter().find(|p| cql.contains(p.as_str())) {
            return Err(Error::query(cql, format!("simulated failure for '{}'", pattern)));
        }
        if self.restrict_metadata && cql.contains("system_schema") {
            return Err(Error::query(cql, "Unauthorized: no SELECT permission on system_schema"));
        }
        if let Some(result) = self.canned.get(cql) {
            return Ok(result.clone());
        }

        match cql {
            KEYSPACES_QUERY => Ok(self.keyspaces_result()),
            TABLES_QUERY => Ok(self.tables_result(param(cql, params, 0)?)),
            COLUMNS_QUERY => Ok(self.columns_result(param(cql, params, 0)?, param(cql, params, 1)?)),
            _ => self.select(cql),
        }
    }

    fn keyspaces_result(&self) -> ResultSet {
        ResultSet {
            columns: vec![ColumnDesc::new("keyspace_name", CqlType::Text)],
            rows: self
                .keyspaces
                .iter()
                .map(|ks| vec![Some(CqlValue::Text(ks.clone()))])
                .collect(),
        }
    }

    fn tables_result(&self, keyspace: &str) -> ResultSet {
        let names: BTreeSet<&str> = self
            .tables
            .iter()
            .filter(|t| t.keyspace == keyspace)
            .map(|t| t.name.as_str())
            .collect();
        ResultSet {
            columns: vec![ColumnDesc::new("table_name", CqlType::Text)],
            rows: names
                .into_iter()
                .map(|name| vec![Some(CqlValue::Text(name.to_string()))])
                .collect(),
        }
    }

    fn columns_result(&self, keyspace: &str, table: &str) -> ResultSet {
        let columns = vec![
            ColumnDesc::new("column_name", CqlType::Text),
            ColumnDesc::new("type", CqlType::Text),
            ColumnDesc::new("kind", CqlType::Text),
            ColumnDesc::new("position", CqlType::Int),
        ];
        let rows = self
            .find_table(keyspace, table)
            .map(|t| {
                t.columns
                    .iter()
                    .map(|c| {
                        vec![
                            Some(CqlValue::Text(c.name.clone())),
                            Some(CqlValue::Text(c.cql_type.to_string())),
                            Some(CqlValue::Text(c.kind.to_string())),
                            Some(CqlValue::Int(c.position)),
                        ]
                    })
                    .collect()
            })
            .unwrap_or_default();
        ResultSet { columns, rows }
    }

    fn find_table(&self, keyspace: &str, table: &str) -> Option<&MemoryTable> {
        self.tables
            .iter()
            .find(|t| t.keyspace == keyspace && t.name == table)
    }

    fn select(&self, cql: &str) -> Result<ResultSet> {
        let select = SelectStatement::parse(cql)?;
        let table = self
            .find_table(&select.keyspace, &select.table)
            .ok_or_else(|| {
                Error::query(
                    cql,
                    format!("unconfigured table {}.{}", select.keyspace, select.table),
                )
            })?;

        let indices: Vec<usize> = match &select.projection {
            None => (0..table.columns.len()).collect(),
            Some(names) => names
                .iter()
                .map(|name| {
                    table
                        .columns
                        .iter()
                        .position(|c| &c.name == name)
                        .ok_or_else(|| Error::query(cql, format!("undefined column name {}", name)))
                })
                .collect::<Result<_>>()?,
        };

        let columns = indices
            .iter()
            .map(|&i| ColumnDesc::new(table.columns[i].name.clone(), table.columns[i].cql_type.clone()))
            .collect();
        let limit = select.limit.unwrap_or(usize::MAX);
        let rows = table
            .rows
            .iter()
            .take(limit)
            .map(|row| indices.iter().map(|&i| row.get(i).cloned().flatten()).collect())
            .collect();

        Ok(ResultSet { columns, rows })
    }
}

impl CqlSession for MemorySession {
    fn execute(&self, cql: &str, params: &[&str]) -> Result<ResultSet> {
        self.run(cql, params)
    }

    fn query_iter(&self, cql: &str) -> Result<Box<dyn RowCursor>> {
        let result = self.run(cql, &[])?;
        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryCursor {
            columns: result.columns,
            rows: result.rows.into(),
            open_cursors: Arc::clone(&self.open_cursors),
        }))
    }

    fn describe(&self, cql: &str) -> Result<Vec<ColumnDesc>> {
        Self::record(&self.prepared, cql);
        Ok(self.answer(cql, &[])?.columns)
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

struct MemoryCursor {
    columns: Vec<ColumnDesc>,
    rows: VecDeque<Row>,
    open_cursors: Arc<AtomicUsize>,
}

impl RowCursor for MemoryCursor {
    fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop_front())
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.open_cursors.fetch_sub(1, Ordering::SeqCst);
    }
}

fn param<'a>(cql: &str, params: &[&'a str], index: usize) -> Result<&'a str> {
    params
        .get(index)
        .copied()
        .ok_or_else(|| Error::query(cql, format!("missing bind value {}", index)))
}

/// The subset of SELECT the in-memory session understands
#[derive(Debug, PartialEq)]
struct SelectStatement {
    projection: Option<Vec<String>>,
    keyspace: String,
    table: String,
    limit: Option<usize>,
}

impl SelectStatement {
    fn parse(cql: &str) -> Result<Self> {
        let unsupported = || Error::query(cql, "unsupported statement");
        let upper = cql.to_ascii_uppercase();
        let body = upper
            .trim_start()
            .strip_prefix("SELECT ")
            .ok_or_else(unsupported)?;
        let offset = cql.len() - body.len();

        let from = upper.find(" FROM ").ok_or_else(unsupported)?;
        let projection = cql[offset..from].trim();
        let rest = &cql[from + " FROM ".len()..];
        let rest_upper = &upper[from + " FROM ".len()..];

        let target_end = [" WHERE ", " LIMIT "]
            .iter()
            .filter_map(|kw| rest_upper.find(kw))
            .min()
            .unwrap_or(rest.len());
        let target = rest[..target_end].trim().trim_end_matches(';');

        let limit = match rest_upper.find(" LIMIT ") {
            Some(pos) => {
                let value = rest[pos + " LIMIT ".len()..].trim().trim_end_matches(';');
                Some(value.trim().parse::<usize>().map_err(|_| unsupported())?)
            }
            None => None,
        };

        let (keyspace, table) = split_qualified(target).ok_or_else(unsupported)?;
        let projection = if projection == "*" {
            None
        } else {
            Some(projection.split(',').map(|c| unquote(c.trim())).collect())
        };

        Ok(Self {
            projection,
            keyspace,
            table,
            limit,
        })
    }
}

/// Split `ks.table` or `"ks"."table"`, honouring dots inside quotes
fn split_qualified(target: &str) -> Option<(String, String)> {
    let mut in_quotes = false;
    for (i, c) in target.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => {
                return Some((unquote(&target[..i]), unquote(&target[i + 1..])));
            }
            _ => {}
        }
    }
    None
}

fn unquote(identifier: &str) -> String {
    let identifier = identifier.trim();
    match identifier
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => identifier.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> MemorySession {
        MemorySession::new().with_table(
            MemoryTable::new("demo", "kv")
                .partition_key("k", "text")
                .column("v", "int")
                .rows((0..5).map(|i| vec![Some(CqlValue::Text(format!("k{}", i))), Some(CqlValue::Int(i))])),
        )
    }

    #[test]
    fn test_select_parsing() {
        let stmt = SelectStatement::parse("SELECT \"a\", b FROM \"my.ks\".\"t\" WHERE x = 1 LIMIT 3").unwrap();
        assert_eq!(stmt.projection, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(stmt.keyspace, "my.ks");
        assert_eq!(stmt.table, "t");
        assert_eq!(stmt.limit, Some(3));
    }

    #[test]
    fn test_select_projection_and_limit() {
        let result = session().execute("SELECT v FROM demo.kv LIMIT 2", &[]).unwrap();
        assert_eq!(result.columns, vec![ColumnDesc::new("v", CqlType::Int)]);
        assert_eq!(result.rows, vec![vec![Some(CqlValue::Int(0))], vec![Some(CqlValue::Int(1))]]);
    }

    #[test]
    fn test_unknown_table_fails() {
        let err = session().execute("SELECT * FROM demo.nope", &[]).unwrap_err();
        assert!(matches!(err, Error::QueryExecution { .. }));
    }

    #[test]
    fn test_cursor_count() {
        let session = session();
        let cursor = session.query_iter("SELECT * FROM demo.kv").unwrap();
        assert_eq!(session.open_cursors(), 1);
        drop(cursor);
        assert_eq!(session.open_cursors(), 0);
    }

    #[test]
    fn test_metadata_rows() {
        let session = session();
        let result = session.execute(COLUMNS_QUERY, &["demo", "kv"]).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0][2], Some(CqlValue::Text("partition_key".into())));
        assert_eq!(result.rows[1][3], Some(CqlValue::Int(-1)));
    }
}
