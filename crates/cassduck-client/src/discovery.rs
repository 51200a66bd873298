//! Keyspace, table and column discovery
//!
//! Listing degrades gracefully when metadata is unreadable. Describing a
//! named table never does: it either yields columns or an error.

use crate::error::{Error, Result};
use crate::session::{ColumnDesc, CqlSession, ResultSet, Row};
use cassduck_types::{map_cql_type, CqlType, CqlValue, LogicalType};
use std::fmt;

pub const KEYSPACES_QUERY: &str = "SELECT keyspace_name FROM system_schema.keyspaces";
pub const TABLES_QUERY: &str = "SELECT table_name FROM system_schema.tables WHERE keyspace_name = ?";
pub const COLUMNS_QUERY: &str = "SELECT column_name, type, kind, position FROM system_schema.columns WHERE keyspace_name = ? AND table_name = ?";

/// Always present on a cluster; part of the fallback listing
pub const SYSTEM_KEYSPACE: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyspaceRef {
    name: String,
}

impl KeyspaceRef {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Configuration("keyspace name must not be empty".into()));
        }
        Ok(Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for KeyspaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub keyspace: String,
    pub table: String,
}

impl TableRef {
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
        }
    }

    /// Parse `keyspace.table`; a name without a separator is rejected
    pub fn parse(qualified: &str) -> Result<Self> {
        match qualified.split_once('.') {
            Some((keyspace, table)) if !keyspace.is_empty() && !table.is_empty() => {
                Ok(Self::new(keyspace, table))
            }
            _ => Err(Error::Configuration(format!(
                "table name must be of the form keyspace.table, got '{}'",
                qualified
            ))),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.keyspace, self.table)
    }

    /// Quoted name safe to splice into CQL
    pub fn cql_name(&self) -> String {
        format!("{}.{}", quote_identifier(&self.keyspace), quote_identifier(&self.table))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.keyspace, self.table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    PartitionKey,
    ClusteringKey,
    Regular,
    Static,
    /// Role not recoverable, e.g. columns found by probing
    Unknown,
}

impl ColumnRole {
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "partition_key" => ColumnRole::PartitionKey,
            "clustering" => ColumnRole::ClusteringKey,
            "regular" => ColumnRole::Regular,
            "static" => ColumnRole::Static,
            _ => ColumnRole::Unknown,
        }
    }

    /// Storage order of the roles in a table definition
    fn rank(&self) -> u8 {
        match self {
            ColumnRole::PartitionKey => 0,
            ColumnRole::ClusteringKey => 1,
            ColumnRole::Static | ColumnRole::Regular | ColumnRole::Unknown => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    /// CQL type name as reported by the source
    pub source_type: String,
    pub role: ColumnRole,
    /// Output position, strictly ascending from 0
    pub position: usize,
    pub logical_type: LogicalType,
}

impl ColumnInfo {
    pub fn cql_type(&self) -> CqlType {
        CqlType::parse(&self.source_type)
    }
}

/// How `describe_table` finds a table's columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescribeStrategy {
    /// Metadata tables, falling back to probing when they cannot be read
    #[default]
    Auto,
    Metadata,
    Probe,
}

/// Every keyspace on the cluster. Falls back to the system keyspace plus the
/// configured default keyspace when metadata cannot be read.
pub fn list_keyspaces(session: &dyn CqlSession) -> Vec<KeyspaceRef> {
    match session.execute(KEYSPACES_QUERY, &[]) {
        Ok(result) => {
            let mut keyspaces: Vec<KeyspaceRef> = text_column(&result, "keyspace_name")
                .filter_map(|name| KeyspaceRef::new(name).ok())
                .collect();
            keyspaces.sort();
            keyspaces.dedup();
            keyspaces
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to list keyspaces, using fallback set");
            fallback_keyspaces(session)
        }
    }
}

fn fallback_keyspaces(session: &dyn CqlSession) -> Vec<KeyspaceRef> {
    let mut keyspaces = vec![KeyspaceRef {
        name: SYSTEM_KEYSPACE.to_string(),
    }];
    if let Some(default) = session.config().keyspace.as_deref() {
        if let Ok(keyspace) = KeyspaceRef::new(default) {
            if !keyspaces.contains(&keyspace) {
                keyspaces.push(keyspace);
            }
        }
    }
    keyspaces
}

/// Tables of one keyspace; empty when metadata cannot be read
pub fn list_tables(session: &dyn CqlSession, keyspace: &KeyspaceRef) -> Vec<TableRef> {
    match session.execute(TABLES_QUERY, &[keyspace.name()]) {
        Ok(result) => {
            let mut tables: Vec<TableRef> = text_column(&result, "table_name")
                .map(|table| TableRef::new(keyspace.name(), table))
                .collect();
            tables.sort_by(|a, b| a.table.cmp(&b.table));
            tables
        }
        Err(e) => {
            tracing::warn!(keyspace = %keyspace, error = %e, "Failed to list tables");
            Vec::new()
        }
    }
}

pub fn keyspace_exists(session: &dyn CqlSession, name: &str) -> bool {
    list_keyspaces(session).iter().any(|ks| ks.name() == name)
}

pub fn table_exists(session: &dyn CqlSession, table: &TableRef) -> bool {
    match KeyspaceRef::new(table.keyspace.as_str()) {
        Ok(keyspace) => list_tables(session, &keyspace)
            .iter()
            .any(|t| t.table == table.table),
        Err(_) => false,
    }
}

/// Columns of `table` in output order. Never returns an empty list.
pub fn describe_table(
    session: &dyn CqlSession,
    table: &TableRef,
    strategy: DescribeStrategy,
) -> Result<Vec<ColumnInfo>> {
    match strategy {
        DescribeStrategy::Metadata => describe_from_metadata(session, table),
        DescribeStrategy::Probe => describe_by_probe(session, table),
        DescribeStrategy::Auto => match describe_from_metadata(session, table) {
            Err(Error::Discovery(reason)) => {
                tracing::warn!(
                    table = %table,
                    reason = %reason,
                    "Schema metadata unavailable, probing table instead"
                );
                describe_by_probe(session, table)
            }
            other => other,
        },
    }
}

fn describe_from_metadata(session: &dyn CqlSession, table: &TableRef) -> Result<Vec<ColumnInfo>> {
    let result = session
        .execute(COLUMNS_QUERY, &[table.keyspace.as_str(), table.table.as_str()])
        .map_err(|e| Error::Discovery(format!("metadata query for {} failed: {}", table, e)))?;

    let idx = |name: &str| {
        result
            .column_index(name)
            .ok_or_else(|| Error::Discovery(format!("metadata result has no '{}' column", name)))
    };
    let (name_idx, type_idx, kind_idx, pos_idx) =
        (idx("column_name")?, idx("type")?, idx("kind")?, idx("position")?);

    let mut rows: Vec<(String, String, ColumnRole, i32)> = result
        .rows
        .iter()
        .filter_map(|row| {
            let name = text_at(row, name_idx)?;
            let source_type = text_at(row, type_idx)?;
            let role = ColumnRole::from_kind(&text_at(row, kind_idx).unwrap_or_default());
            let position = int_at(row, pos_idx).unwrap_or(-1);
            Some((name, source_type, role, position))
        })
        .collect();

    if rows.is_empty() {
        return Err(Error::NotFound(format!("table {} does not exist", table)));
    }

    rows.sort_by(|a, b| {
        a.2.rank()
            .cmp(&b.2.rank())
            .then(a.3.cmp(&b.3))
            .then_with(|| a.0.cmp(&b.0))
    });

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(position, (name, source_type, role, _))| {
            let logical_type = map_cql_type(&CqlType::parse(&source_type));
            ColumnInfo {
                name,
                source_type,
                role,
                position,
                logical_type,
            }
        })
        .collect())
}

fn describe_by_probe(session: &dyn CqlSession, table: &TableRef) -> Result<Vec<ColumnInfo>> {
    let probe = format!("SELECT * FROM {} LIMIT 1", table.cql_name());
    let result = session
        .execute(&probe, &[])
        .map_err(|e| Error::Discovery(format!("probe of {} failed: {}", table, e)))?;
    if result.columns.is_empty() {
        return Err(Error::NotFound(format!("table {} has no columns", table)));
    }
    Ok(columns_from_descriptor(&result.columns))
}

/// Output columns of an arbitrary query, read from its result descriptor
pub fn describe_query(session: &dyn CqlSession, cql: &str) -> Result<Vec<ColumnInfo>> {
    let columns = columns_from_descriptor(&session.describe(cql)?);
    if columns.is_empty() {
        return Err(Error::Discovery(format!("query returns no columns: {}", cql)));
    }
    Ok(columns)
}

fn columns_from_descriptor(columns: &[ColumnDesc]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .enumerate()
        .map(|(position, column)| ColumnInfo {
            name: column.name.clone(),
            source_type: column.cql_type.to_string(),
            role: ColumnRole::Unknown,
            position,
            logical_type: map_cql_type(&column.cql_type),
        })
        .collect()
}

/// Partition key columns followed by clustering columns, each in position order
pub fn primary_key(columns: &[ColumnInfo]) -> Vec<String> {
    let mut keys: Vec<&ColumnInfo> = columns
        .iter()
        .filter(|c| matches!(c.role, ColumnRole::PartitionKey | ColumnRole::ClusteringKey))
        .collect();
    keys.sort_by_key(|c| (c.role.rank(), c.position));
    keys.into_iter().map(|c| c.name.clone()).collect()
}

/// Double-quote an identifier, escaping embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn text_column<'a>(result: &'a ResultSet, name: &str) -> impl Iterator<Item = String> + 'a {
    let idx = result.column_index(name).unwrap_or(0);
    result.rows.iter().filter_map(move |row| text_at(row, idx))
}

fn text_at(row: &Row, idx: usize) -> Option<String> {
    match row.get(idx)?.as_ref()? {
        CqlValue::Ascii(s) | CqlValue::Text(s) => Some(s.clone()),
        _ => None,
    }
}

fn int_at(row: &Row, idx: usize) -> Option<i32> {
    match row.get(idx)?.as_ref()? {
        CqlValue::Int(i) => Some(*i),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ref_parse() {
        let t = TableRef::parse("ks.table").unwrap();
        assert_eq!(t, TableRef::new("ks", "table"));
        assert_eq!(t.qualified_name(), "ks.table");
        assert!(matches!(TableRef::parse("table"), Err(Error::Configuration(_))));
        assert!(TableRef::parse(".t").is_err());
        assert!(TableRef::parse("ks.").is_err());
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(TableRef::new("demo", "Events").cql_name(), "\"demo\".\"Events\"");
    }

    #[test]
    fn test_keyspace_ref_rejects_empty() {
        assert!(KeyspaceRef::new("").is_err());
        assert_eq!(KeyspaceRef::new("demo").unwrap().name(), "demo");
    }

    #[test]
    fn test_primary_key_order() {
        let col = |name: &str, role, position| ColumnInfo {
            name: name.into(),
            source_type: "text".into(),
            role,
            position,
            logical_type: LogicalType::Varchar,
        };
        let columns = vec![
            col("v", ColumnRole::Regular, 0),
            col("c2", ColumnRole::ClusteringKey, 4),
            col("p1", ColumnRole::PartitionKey, 2),
            col("c1", ColumnRole::ClusteringKey, 3),
            col("p0", ColumnRole::PartitionKey, 1),
        ];
        assert_eq!(primary_key(&columns), vec!["p0", "p1", "c1", "c2"]);
    }
}
