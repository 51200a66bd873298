//! SQL execution against DuckDB with the Cassandra table functions loaded

use duckdb::types::ValueRef;
use duckdb::Connection;
use serde_json::json;

/// Open the configured database and register the Cassandra table functions
pub fn open(path: Option<&str>) -> duckdb::Result<Connection> {
    let conn = match path {
        Some(path) => Connection::open(path)?,
        None => Connection::open_in_memory()?,
    };
    cassduck_duck::register(&conn)?;
    Ok(conn)
}

/// Run one statement and collect its rows as JSON objects keyed by column name
pub fn execute(
    conn: &Connection,
    sql: &str,
) -> duckdb::Result<Vec<serde_json::Map<String, serde_json::Value>>> {
    tracing::debug!(sql = %sql, "Executing");
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let columns: Vec<String> = rows
        .as_ref()
        .map(|stmt| stmt.column_names())
        .unwrap_or_default();

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = serde_json::Map::new();
        for (idx, name) in columns.iter().enumerate() {
            object.insert(name.clone(), value_to_json(row.get_ref(idx)?));
        }
        out.push(object);
    }
    tracing::debug!(rows = out.len(), "Statement finished");
    Ok(out)
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Boolean(b) => serde_json::Value::Bool(b),
        ValueRef::TinyInt(i) => json!(i),
        ValueRef::SmallInt(i) => json!(i),
        ValueRef::Int(i) => json!(i),
        ValueRef::BigInt(i) => json!(i),
        ValueRef::HugeInt(i) => json!(i.to_string()),
        ValueRef::UTinyInt(i) => json!(i),
        ValueRef::USmallInt(i) => json!(i),
        ValueRef::UInt(i) => json!(i),
        ValueRef::UBigInt(i) => json!(i),
        ValueRef::Float(f) => json!(f),
        ValueRef::Double(f) => json!(f),
        ValueRef::Text(s) => serde_json::Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => serde_json::Value::String(format!("<blob {} bytes>", b.len())),
        other => serde_json::Value::String(format!("{:?}", other.to_owned())),
    }
}
