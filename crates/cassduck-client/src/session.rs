//! Synchronous session boundary over the store

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use cassduck_types::{CqlType, CqlValue};
use std::sync::{Arc, Weak};

/// Name and declared type of a result column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub cql_type: CqlType,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, cql_type: CqlType) -> Self {
        Self {
            name: name.into(),
            cql_type,
        }
    }
}

/// One row; `None` is a null cell
pub type Row = Vec<Option<CqlValue>>;

/// A fully materialized result, used for metadata queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnDesc>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// A blocking session. Implementations serialize requests internally so one
/// session can be shared by every scan of an attachment.
pub trait CqlSession: Send + Sync {
    /// Run a statement and collect every row. `params` bind to `?` markers.
    fn execute(&self, cql: &str, params: &[&str]) -> Result<ResultSet>;

    /// Start a paged query and return a cursor over its rows
    fn query_iter(&self, cql: &str) -> Result<Box<dyn RowCursor>>;

    /// Result columns of `cql`. Sessions that can prepare statements answer
    /// without running the query; the default opens and drops a cursor.
    fn describe(&self, cql: &str) -> Result<Vec<ColumnDesc>> {
        let cursor = self.query_iter(cql)?;
        Ok(cursor.columns().to_vec())
    }

    fn config(&self) -> &ConnectionConfig;
}

/// A live result iterator. Dropping the cursor releases it.
pub trait RowCursor: Send {
    fn columns(&self) -> &[ColumnDesc];

    /// Next row, or `None` once the result is exhausted
    fn next_row(&mut self) -> Result<Option<Row>>;
}

/// How a consumer holds the session: owned by a standalone scan, or borrowed
/// from the catalog that attached it.
#[derive(Clone)]
pub enum SessionRef {
    Owned(Arc<dyn CqlSession>),
    Attached(Weak<dyn CqlSession>),
}

impl SessionRef {
    pub fn attached(session: &Arc<dyn CqlSession>) -> Self {
        SessionRef::Attached(Arc::downgrade(session))
    }

    /// Upgrade to a usable session; fails once the owning catalog is gone
    pub fn session(&self) -> Result<Arc<dyn CqlSession>> {
        match self {
            SessionRef::Owned(session) => Ok(Arc::clone(session)),
            SessionRef::Attached(weak) => weak
                .upgrade()
                .ok_or_else(|| Error::Connection("catalog session has been detached".into())),
        }
    }
}

impl std::fmt::Debug for SessionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRef::Owned(_) => f.write_str("SessionRef::Owned"),
            SessionRef::Attached(weak) => {
                write!(f, "SessionRef::Attached(live: {})", weak.strong_count() > 0)
            }
        }
    }
}
