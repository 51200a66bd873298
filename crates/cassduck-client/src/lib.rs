//! Connection boundary and schema discovery for Cassandra-compatible stores

mod config;
mod discovery;
mod driver;
mod error;
mod memory;
mod session;

pub use config::{
    redact_connection_string, Consistency, ConnectionConfig, GatewayConfig, TlsMaterial,
    DEFAULT_CONTACT_POINTS, DEFAULT_GATEWAY_PORT, DEFAULT_PORT,
};
pub use discovery::{
    describe_query, describe_table, keyspace_exists, list_keyspaces, list_tables, primary_key,
    quote_identifier, table_exists, ColumnInfo, ColumnRole, DescribeStrategy, KeyspaceRef,
    TableRef, COLUMNS_QUERY, KEYSPACES_QUERY, SYSTEM_KEYSPACE, TABLES_QUERY,
};
pub use driver::ScyllaSession;
pub use error::{Error, Result};
pub use memory::{MemorySession, MemoryTable};
pub use session::{ColumnDesc, CqlSession, ResultSet, Row, RowCursor, SessionRef};

use std::sync::Arc;

/// Open a driver-backed session for `config`
pub fn connect(config: &ConnectionConfig) -> Result<Arc<dyn CqlSession>> {
    Ok(Arc::new(ScyllaSession::connect(config)?))
}
