//! Catalog, schema and table entries over a Cassandra attachment
//!
//! The catalog owns the session. Schema and table entries only hold a weak
//! handle, so scans started from them fail cleanly once the catalog is gone.

use arrow::datatypes::{Schema, SchemaRef};
use cassduck_client::{
    connect, describe_table, list_keyspaces, list_tables, primary_key, redact_connection_string,
    ColumnInfo, ConnectionConfig, CqlSession, DescribeStrategy, Error, KeyspaceRef, Result,
    SessionRef, TableRef,
};
use cassduck_scan::{ScanColumn, ScanExecutor, ScanSource};
use std::sync::Arc;

pub const CATALOG_TYPE: &str = "cassandra";

pub struct CassandraCatalog {
    name: String,
    path: String,
    config: ConnectionConfig,
    session: Arc<dyn CqlSession>,
}

impl CassandraCatalog {
    /// Parse the attach string and connect once for the lifetime of the catalog
    pub fn attach(name: impl Into<String>, connection_string: &str) -> Result<Self> {
        let config = ConnectionConfig::from_connection_string(connection_string)?;
        let session = connect(&config)?;
        Ok(Self::from_parts(name.into(), connection_string, config, session))
    }

    /// Attach over an existing session
    pub fn with_session(
        name: impl Into<String>,
        connection_string: &str,
        session: Arc<dyn CqlSession>,
    ) -> Result<Self> {
        let config = ConnectionConfig::from_connection_string(connection_string)?;
        Ok(Self::from_parts(name.into(), connection_string, config, session))
    }

    fn from_parts(
        name: String,
        connection_string: &str,
        config: ConnectionConfig,
        session: Arc<dyn CqlSession>,
    ) -> Self {
        tracing::info!(catalog = %name, "Attached Cassandra catalog");
        Self {
            name,
            path: redact_connection_string(connection_string),
            config,
            session,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog_type(&self) -> &'static str {
        CATALOG_TYPE
    }

    /// The attach string with secrets masked
    pub fn db_path(&self) -> &str {
        &self.path
    }

    pub fn in_memory(&self) -> bool {
        false
    }

    pub fn database_size(&self) -> u64 {
        0
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn session(&self) -> SessionRef {
        SessionRef::attached(&self.session)
    }

    /// Live keyspace listing
    pub fn list_schemas(&self) -> Vec<SchemaEntry> {
        list_keyspaces(self.session.as_ref())
            .into_iter()
            .map(|keyspace| SchemaEntry {
                keyspace,
                session: self.session(),
            })
            .collect()
    }

    pub fn scan_schemas<F>(&self, mut callback: F)
    where
        F: FnMut(&SchemaEntry),
    {
        for schema in self.list_schemas() {
            callback(&schema);
        }
    }

    pub fn lookup_schema(&self, name: &str) -> Result<SchemaEntry> {
        self.list_schemas()
            .into_iter()
            .find(|schema| schema.name() == name)
            .ok_or_else(|| Error::NotFound(format!("keyspace {} does not exist", name)))
    }

    pub fn create_schema(&self, name: &str) -> Result<()> {
        unsupported(&format!("CREATE SCHEMA {}", name))
    }

    pub fn drop_schema(&self, name: &str) -> Result<()> {
        unsupported(&format!("DROP SCHEMA {}", name))
    }
}

impl std::fmt::Debug for CassandraCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CassandraCatalog")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SchemaEntry {
    keyspace: KeyspaceRef,
    session: SessionRef,
}

impl SchemaEntry {
    pub fn name(&self) -> &str {
        self.keyspace.name()
    }

    pub fn keyspace(&self) -> &KeyspaceRef {
        &self.keyspace
    }

    pub fn list_tables(&self) -> Result<Vec<TableRef>> {
        let session = self.session.session()?;
        Ok(list_tables(session.as_ref(), &self.keyspace))
    }

    pub fn scan_tables<F>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut(&TableRef),
    {
        for table in self.list_tables()? {
            callback(&table);
        }
        Ok(())
    }

    /// Describe a table of this keyspace; unknown names are `NotFound`
    pub fn lookup_table(&self, name: &str) -> Result<TableEntry> {
        let session = self.session.session()?;
        let table = TableRef::new(self.keyspace.name(), name);
        let columns = describe_table(session.as_ref(), &table, DescribeStrategy::Auto)?;
        Ok(TableEntry::new(table, columns, self.session.clone()))
    }

    pub fn create_table(&self, name: &str) -> Result<()> {
        unsupported(&format!("CREATE TABLE {}.{}", self.name(), name))
    }

    pub fn create_table_as(&self, name: &str) -> Result<()> {
        unsupported(&format!("CREATE TABLE {}.{} AS", self.name(), name))
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        unsupported(&format!("DROP TABLE {}.{}", self.name(), name))
    }
}

#[derive(Debug, Clone)]
pub struct TableEntry {
    table: TableRef,
    columns: Vec<ColumnInfo>,
    primary_key: Vec<String>,
    session: SessionRef,
}

impl TableEntry {
    fn new(table: TableRef, columns: Vec<ColumnInfo>, session: SessionRef) -> Self {
        let primary_key = primary_key(&columns);
        Self {
            table,
            columns,
            primary_key,
            session,
        }
    }

    pub fn name(&self) -> &str {
        &self.table.table
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Partition key columns, then clustering columns
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn arrow_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.columns
                .iter()
                .map(|c| c.logical_type.to_arrow_field(&c.name))
                .collect::<Vec<_>>(),
        ))
    }

    /// A scan over every column, optionally filtered by a raw CQL predicate
    pub fn get_scan_function(&self, filter: Option<String>) -> ScanExecutor {
        ScanExecutor::new(
            self.session.clone(),
            ScanSource::Table {
                table: self.table.clone(),
                filter,
            },
            self.columns.iter().map(ScanColumn::from).collect(),
        )
    }

    pub fn insert(&self) -> Result<()> {
        unsupported(&format!("INSERT INTO {}", self.table))
    }

    pub fn update(&self) -> Result<()> {
        unsupported(&format!("UPDATE {}", self.table))
    }

    pub fn delete(&self) -> Result<()> {
        unsupported(&format!("DELETE FROM {}", self.table))
    }
}

fn unsupported(operation: &str) -> Result<()> {
    Err(Error::UnsupportedOperation(format!(
        "{} is not supported by the Cassandra catalog",
        operation
    )))
}
