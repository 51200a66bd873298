//! Relational type system exposed to the query engine

use arrow::datatypes::{DataType, Field, IntervalUnit, TimeUnit};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Arrow extension metadata key
pub const EXTENSION_NAME_KEY: &str = "ARROW:extension:name";

/// Timezone attached to every timestamp column
pub const TIMESTAMP_TIMEZONE: &str = "UTC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    Varchar,
    Blob,
    /// Days since 1970-01-01
    Date,
    /// Microseconds since midnight
    Time,
    /// Microseconds since the Unix epoch, UTC
    TimestampTz,
    Interval,
    Uuid,
    /// Semi-structured text carrying collections, UDTs and tuples
    Json,
}

impl LogicalType {
    pub fn is_textual(&self) -> bool {
        matches!(self, LogicalType::Varchar | LogicalType::Json)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            LogicalType::TinyInt | LogicalType::SmallInt | LogicalType::Integer | LogicalType::BigInt
        )
    }

    /// Physical arrow type used for scan batches
    pub fn to_arrow(&self) -> DataType {
        match self {
            LogicalType::Boolean => DataType::Boolean,
            LogicalType::TinyInt => DataType::Int8,
            LogicalType::SmallInt => DataType::Int16,
            LogicalType::Integer => DataType::Int32,
            LogicalType::BigInt => DataType::Int64,
            LogicalType::Float => DataType::Float32,
            LogicalType::Double => DataType::Float64,
            LogicalType::Varchar | LogicalType::Json => DataType::Utf8,
            LogicalType::Blob => DataType::Binary,
            LogicalType::Date => DataType::Date32,
            LogicalType::Time => DataType::Time64(TimeUnit::Microsecond),
            LogicalType::TimestampTz => {
                DataType::Timestamp(TimeUnit::Microsecond, Some(TIMESTAMP_TIMEZONE.into()))
            }
            LogicalType::Interval => DataType::Interval(IntervalUnit::MonthDayNano),
            LogicalType::Uuid => DataType::FixedSizeBinary(16),
        }
    }

    /// Arrow field for a column of this type; UUID and JSON columns carry
    /// the canonical arrow extension names so consumers can tell them apart
    /// from plain binary and text.
    pub fn to_arrow_field(&self, name: &str) -> Field {
        let field = Field::new(name, self.to_arrow(), true);
        let extension = match self {
            LogicalType::Uuid => Some("arrow.uuid"),
            LogicalType::Json => Some("arrow.json"),
            _ => None,
        };
        match extension {
            Some(extension) => field.with_metadata(HashMap::from([(
                EXTENSION_NAME_KEY.to_string(),
                extension.to_string(),
            )])),
            None => field,
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalType::Boolean => "BOOLEAN",
            LogicalType::TinyInt => "TINYINT",
            LogicalType::SmallInt => "SMALLINT",
            LogicalType::Integer => "INTEGER",
            LogicalType::BigInt => "BIGINT",
            LogicalType::Float => "FLOAT",
            LogicalType::Double => "DOUBLE",
            LogicalType::Varchar => "VARCHAR",
            LogicalType::Blob => "BLOB",
            LogicalType::Date => "DATE",
            LogicalType::Time => "TIME",
            LogicalType::TimestampTz => "TIMESTAMP WITH TIME ZONE",
            LogicalType::Interval => "INTERVAL",
            LogicalType::Uuid => "UUID",
            LogicalType::Json => "JSON",
        };
        f.write_str(name)
    }
}
