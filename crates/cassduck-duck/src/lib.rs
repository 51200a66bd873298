//! DuckDB surface for Cassandra: catalog entries and table functions

mod catalog;
mod chunk;
mod error;
mod registry;
mod vtab;

pub use catalog::{CassandraCatalog, SchemaEntry, TableEntry, CATALOG_TYPE};
pub use chunk::{logical_type_handle, write_batch};
pub use error::{BridgeError, Result};
pub use registry::{attach, attach_session, attached, attached_names, detach, DEFAULT_CATALOG};
pub use vtab::{
    bind_catalog_query, bind_catalog_table, bind_query, bind_table, register, AttachBindData,
    AttachInitData, CassandraAttachVTab, CassandraQueryVTab, CassandraScanVTab, ScanBindData,
    ScanInitData, ATTACH_FUNCTION, QUERY_FUNCTION, SCAN_FUNCTION,
};
