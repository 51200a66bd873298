//! Catalog listing for an attached Cassandra cluster

use cassduck_duck::{CassandraCatalog, SchemaEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub cql_type: String,
    pub data_type: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
    pub primary_key: Vec<String>,
    pub columns: Vec<ColumnSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyspaceSummary {
    pub name: String,
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub catalog: String,
    pub path: String,
    pub keyspaces: Vec<KeyspaceSummary>,
}

impl CatalogSummary {
    /// Walk every keyspace, or just `only` when given. Tables that fail to
    /// describe are logged and skipped.
    pub fn collect(catalog: &CassandraCatalog, only: Option<&str>) -> cassduck_client::Result<Self> {
        let schemas = match only {
            Some(name) => vec![catalog.lookup_schema(name)?],
            None => catalog.list_schemas(),
        };

        let mut keyspaces = Vec::with_capacity(schemas.len());
        for schema in &schemas {
            keyspaces.push(KeyspaceSummary {
                name: schema.name().to_string(),
                tables: summarize_tables(schema)?,
            });
        }

        Ok(Self {
            catalog: catalog.name().to_string(),
            path: catalog.db_path().to_string(),
            keyspaces,
        })
    }
}

fn summarize_tables(schema: &SchemaEntry) -> cassduck_client::Result<Vec<TableSummary>> {
    let mut tables = Vec::new();
    for table in schema.list_tables()? {
        match schema.lookup_table(&table.table) {
            Ok(entry) => tables.push(TableSummary {
                name: entry.name().to_string(),
                primary_key: entry.primary_key().to_vec(),
                columns: entry
                    .columns()
                    .iter()
                    .map(|c| ColumnSummary {
                        name: c.name.clone(),
                        cql_type: c.source_type.clone(),
                        data_type: c.logical_type.to_string(),
                        kind: format!("{:?}", c.role),
                    })
                    .collect(),
            }),
            Err(e) => tracing::warn!(table = %table, error = %e, "Skipping table"),
        }
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cassduck_client::{CqlSession, MemorySession, MemoryTable};
    use std::sync::Arc;

    fn catalog() -> CassandraCatalog {
        let session: Arc<dyn CqlSession> = Arc::new(
            MemorySession::new()
                .with_table(
                    MemoryTable::new("shop", "orders")
                        .partition_key("customer", "text")
                        .clustering_key("placed", "timestamp")
                        .column("total", "decimal"),
                )
                .with_table(MemoryTable::new("shop", "carts").partition_key("id", "uuid")),
        );
        CassandraCatalog::with_session("cass", "host=127.0.0.1 password=secret", session).unwrap()
    }

    #[test]
    fn test_summary_lists_tables_and_columns() {
        let summary = CatalogSummary::collect(&catalog(), None).unwrap();
        assert_eq!(summary.path, "host=127.0.0.1 password=***");
        assert_eq!(summary.keyspaces.len(), 1);

        let shop = &summary.keyspaces[0];
        let names: Vec<&str> = shop.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["carts", "orders"]);

        let orders = &shop.tables[1];
        assert_eq!(orders.primary_key, vec!["customer", "placed"]);
        assert_eq!(orders.columns[2].data_type, "VARCHAR");
        assert_eq!(orders.columns[1].data_type, "TIMESTAMP WITH TIME ZONE");
    }

    #[test]
    fn test_unknown_keyspace_is_an_error() {
        assert!(CatalogSummary::collect(&catalog(), Some("nope")).is_err());
    }
}
