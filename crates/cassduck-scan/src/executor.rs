//! Pull-based scan over a row cursor

use crate::builder::ColumnBuilder;
use crate::error::{Result, ScanError};
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use cassduck_client::{quote_identifier, ColumnInfo, RowCursor, SessionRef, TableRef};
use cassduck_types::{decode_value, LogicalType};
use std::sync::Arc;

/// Upper bound on rows per batch, the host engine's vector width
pub const VECTOR_SIZE: usize = 2048;

/// What a scan reads
#[derive(Debug, Clone, PartialEq)]
pub enum ScanSource {
    /// A whole table, optionally restricted by a raw CQL predicate
    Table { table: TableRef, filter: Option<String> },
    /// An arbitrary user query
    Query(String),
}

impl ScanSource {
    /// The row-producing statement for `columns`
    pub fn to_cql(&self, columns: &[ScanColumn]) -> String {
        match self {
            ScanSource::Table { table, filter } => {
                let projection = if columns.is_empty() {
                    "*".to_string()
                } else {
                    columns
                        .iter()
                        .map(|c| quote_identifier(&c.name))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                let mut cql = format!("SELECT {} FROM {}", projection, table.cql_name());
                if let Some(filter) = filter.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
                    cql.push_str(" WHERE ");
                    cql.push_str(filter);
                }
                cql
            }
            ScanSource::Query(query) => query.clone(),
        }
    }
}

/// A bound output column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanColumn {
    pub name: String,
    pub logical_type: LogicalType,
}

impl From<&ColumnInfo> for ScanColumn {
    fn from(column: &ColumnInfo) -> Self {
        Self {
            name: column.name.clone(),
            logical_type: column.logical_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Unstarted,
    Streaming,
    Exhausted,
}

enum ScanState {
    Unstarted,
    Streaming(Box<dyn RowCursor>),
    Exhausted,
}

/// Owns the cursor of one scan. The cursor is released exactly once: when a
/// pull comes back empty, when a pull fails, on `close`, or on drop.
pub struct ScanExecutor {
    session: SessionRef,
    source: ScanSource,
    columns: Vec<ScanColumn>,
    schema: SchemaRef,
    state: ScanState,
    rows_emitted: u64,
}

impl ScanExecutor {
    pub fn new(session: SessionRef, source: ScanSource, columns: Vec<ScanColumn>) -> Self {
        let schema = Arc::new(Schema::new(
            columns
                .iter()
                .map(|c| c.logical_type.to_arrow_field(&c.name))
                .collect::<Vec<_>>(),
        ));
        Self {
            session,
            source,
            columns,
            schema,
            state: ScanState::Unstarted,
            rows_emitted: 0,
        }
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn columns(&self) -> &[ScanColumn] {
        &self.columns
    }

    pub fn source(&self) -> &ScanSource {
        &self.source
    }

    pub fn phase(&self) -> ScanPhase {
        match self.state {
            ScanState::Unstarted => ScanPhase::Unstarted,
            ScanState::Streaming(_) => ScanPhase::Streaming,
            ScanState::Exhausted => ScanPhase::Exhausted,
        }
    }

    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }

    /// Pull up to `max_rows` rows (clamped to `1..=VECTOR_SIZE`).
    ///
    /// The first call runs the query; a failure there is returned as is and
    /// ends the scan. An empty batch means the scan is exhausted, and every
    /// later call returns another empty batch.
    pub fn next_batch(&mut self, max_rows: usize) -> Result<RecordBatch> {
        let max_rows = max_rows.clamp(1, VECTOR_SIZE);

        // Any early return below leaves the scan exhausted and drops the cursor
        let mut cursor = match std::mem::replace(&mut self.state, ScanState::Exhausted) {
            ScanState::Exhausted => return self.empty_batch(),
            ScanState::Unstarted => self.open()?,
            ScanState::Streaming(cursor) => cursor,
        };

        let mut builders: Vec<ColumnBuilder> = self
            .columns
            .iter()
            .map(|c| ColumnBuilder::new(c.logical_type, max_rows))
            .collect();
        let rows = self.fill(cursor.as_mut(), &mut builders, max_rows)?;

        if rows == 0 {
            tracing::debug!(rows_emitted = self.rows_emitted, "Scan exhausted");
            drop(cursor);
        } else {
            self.state = ScanState::Streaming(cursor);
        }
        self.rows_emitted += rows as u64;
        self.finish(builders, rows)
    }

    /// Release the cursor early; later pulls return empty batches
    pub fn close(&mut self) {
        self.state = ScanState::Exhausted;
    }

    fn open(&self) -> Result<Box<dyn RowCursor>> {
        let session = self.session.session()?;
        let cql = self.source.to_cql(&self.columns);
        tracing::debug!(cql = %cql, "Starting scan");
        let cursor = session.query_iter(&cql)?;
        if cursor.columns().len() < self.columns.len() {
            tracing::warn!(
                expected = self.columns.len(),
                actual = cursor.columns().len(),
                "Result has fewer columns than bound, missing columns read as NULL"
            );
        }
        Ok(cursor)
    }

    fn fill(
        &self,
        cursor: &mut dyn RowCursor,
        builders: &mut [ColumnBuilder],
        max_rows: usize,
    ) -> Result<usize> {
        let width = cursor.columns().len().min(self.columns.len());
        let mut rows = 0;
        while rows < max_rows {
            let Some(row) = cursor.next_row()? else {
                break;
            };
            for (idx, (column, builder)) in self.columns.iter().zip(builders.iter_mut()).enumerate() {
                let cell = if idx < width { row.get(idx).and_then(Option::as_ref) } else { None };
                match cell {
                    None => builder.append_null(),
                    Some(raw) => builder.append(decode_value(Some(raw), column.logical_type))?,
                }
            }
            rows += 1;
        }
        Ok(rows)
    }

    fn finish(&self, mut builders: Vec<ColumnBuilder>, rows: usize) -> Result<RecordBatch> {
        let arrays = builders.iter_mut().map(ColumnBuilder::finish).collect();
        RecordBatch::try_new_with_options(
            self.schema(),
            arrays,
            &RecordBatchOptions::new().with_row_count(Some(rows)),
        )
        .map_err(ScanError::from)
    }

    fn empty_batch(&self) -> Result<RecordBatch> {
        Ok(RecordBatch::new_empty(self.schema()))
    }
}

impl std::fmt::Debug for ScanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanExecutor")
            .field("source", &self.source)
            .field("columns", &self.columns)
            .field("phase", &self.phase())
            .field("rows_emitted", &self.rows_emitted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, logical_type: LogicalType) -> ScanColumn {
        ScanColumn {
            name: name.to_string(),
            logical_type,
        }
    }

    #[test]
    fn test_table_projection_is_explicit_and_quoted() {
        let source = ScanSource::Table {
            table: TableRef::new("demo", "events"),
            filter: None,
        };
        let columns = [column("id", LogicalType::Uuid), column("Val", LogicalType::Double)];
        assert_eq!(
            source.to_cql(&columns),
            "SELECT \"id\", \"Val\" FROM \"demo\".\"events\""
        );
    }

    #[test]
    fn test_filter_is_appended() {
        let source = ScanSource::Table {
            table: TableRef::new("demo", "events"),
            filter: Some(" val > 1 ALLOW FILTERING ".to_string()),
        };
        assert_eq!(
            source.to_cql(&[column("val", LogicalType::Double)]),
            "SELECT \"val\" FROM \"demo\".\"events\" WHERE val > 1 ALLOW FILTERING"
        );

        let blank = ScanSource::Table {
            table: TableRef::new("demo", "events"),
            filter: Some("  ".to_string()),
        };
        assert!(!blank.to_cql(&[]).contains("WHERE"));
    }

    #[test]
    fn test_raw_query_is_passed_through() {
        let source = ScanSource::Query("SELECT now() FROM system.local".to_string());
        assert_eq!(source.to_cql(&[]), "SELECT now() FROM system.local");
    }
}
