//! Typed arrow column builders fed with decoded values

use arrow::array::{
    ArrayRef, BinaryBuilder, BooleanBuilder, Date32Builder, FixedSizeBinaryBuilder,
    Float32Builder, Float64Builder, Int16Builder, Int32Builder, Int64Builder, Int8Builder,
    IntervalMonthDayNanoBuilder, StringBuilder, Time64MicrosecondBuilder,
    TimestampMicrosecondBuilder,
};
use arrow::datatypes::IntervalMonthDayNano;
use arrow::error::ArrowError;
use cassduck_types::{LogicalType, Value, TIMESTAMP_TIMEZONE};
use std::sync::Arc;

/// One builder per output column, chosen from the column's declared type
pub(crate) enum ColumnBuilder {
    Boolean(BooleanBuilder),
    TinyInt(Int8Builder),
    SmallInt(Int16Builder),
    Integer(Int32Builder),
    BigInt(Int64Builder),
    Float(Float32Builder),
    Double(Float64Builder),
    Text(StringBuilder),
    Blob(BinaryBuilder),
    Date(Date32Builder),
    Time(Time64MicrosecondBuilder),
    Timestamp(TimestampMicrosecondBuilder),
    Interval(IntervalMonthDayNanoBuilder),
    Uuid(FixedSizeBinaryBuilder),
}

impl ColumnBuilder {
    pub(crate) fn new(logical_type: LogicalType, capacity: usize) -> Self {
        match logical_type {
            LogicalType::Boolean => ColumnBuilder::Boolean(BooleanBuilder::with_capacity(capacity)),
            LogicalType::TinyInt => ColumnBuilder::TinyInt(Int8Builder::with_capacity(capacity)),
            LogicalType::SmallInt => ColumnBuilder::SmallInt(Int16Builder::with_capacity(capacity)),
            LogicalType::Integer => ColumnBuilder::Integer(Int32Builder::with_capacity(capacity)),
            LogicalType::BigInt => ColumnBuilder::BigInt(Int64Builder::with_capacity(capacity)),
            LogicalType::Float => ColumnBuilder::Float(Float32Builder::with_capacity(capacity)),
            LogicalType::Double => ColumnBuilder::Double(Float64Builder::with_capacity(capacity)),
            LogicalType::Varchar | LogicalType::Json => {
                ColumnBuilder::Text(StringBuilder::with_capacity(capacity, capacity * 16))
            }
            LogicalType::Blob => ColumnBuilder::Blob(BinaryBuilder::with_capacity(capacity, capacity * 16)),
            LogicalType::Date => ColumnBuilder::Date(Date32Builder::with_capacity(capacity)),
            LogicalType::Time => ColumnBuilder::Time(Time64MicrosecondBuilder::with_capacity(capacity)),
            LogicalType::TimestampTz => ColumnBuilder::Timestamp(
                TimestampMicrosecondBuilder::with_capacity(capacity).with_timezone(TIMESTAMP_TIMEZONE),
            ),
            LogicalType::Interval => {
                ColumnBuilder::Interval(IntervalMonthDayNanoBuilder::with_capacity(capacity))
            }
            LogicalType::Uuid => ColumnBuilder::Uuid(FixedSizeBinaryBuilder::with_capacity(capacity, 16)),
        }
    }

    pub(crate) fn append_null(&mut self) {
        match self {
            ColumnBuilder::Boolean(b) => b.append_null(),
            ColumnBuilder::TinyInt(b) => b.append_null(),
            ColumnBuilder::SmallInt(b) => b.append_null(),
            ColumnBuilder::Integer(b) => b.append_null(),
            ColumnBuilder::BigInt(b) => b.append_null(),
            ColumnBuilder::Float(b) => b.append_null(),
            ColumnBuilder::Double(b) => b.append_null(),
            ColumnBuilder::Text(b) => b.append_null(),
            ColumnBuilder::Blob(b) => b.append_null(),
            ColumnBuilder::Date(b) => b.append_null(),
            ColumnBuilder::Time(b) => b.append_null(),
            ColumnBuilder::Timestamp(b) => b.append_null(),
            ColumnBuilder::Interval(b) => b.append_null(),
            ColumnBuilder::Uuid(b) => b.append_null(),
        }
    }

    /// Append a value already decoded into this column's type; anything else
    /// lands as NULL
    pub(crate) fn append(&mut self, value: Value) -> Result<(), ArrowError> {
        match (self, value) {
            (ColumnBuilder::Boolean(b), Value::Boolean(v)) => b.append_value(v),
            (ColumnBuilder::TinyInt(b), Value::TinyInt(v)) => b.append_value(v),
            (ColumnBuilder::SmallInt(b), Value::SmallInt(v)) => b.append_value(v),
            (ColumnBuilder::Integer(b), Value::Integer(v)) => b.append_value(v),
            (ColumnBuilder::BigInt(b), Value::BigInt(v)) => b.append_value(v),
            (ColumnBuilder::Float(b), Value::Float(v)) => b.append_value(v),
            (ColumnBuilder::Double(b), Value::Double(v)) => b.append_value(v),
            (ColumnBuilder::Text(b), Value::Varchar(v) | Value::Json(v)) => b.append_value(v),
            (ColumnBuilder::Blob(b), Value::Blob(v)) => b.append_value(v),
            (ColumnBuilder::Date(b), Value::Date(v)) => b.append_value(v),
            (ColumnBuilder::Time(b), Value::Time(v)) => b.append_value(v),
            (ColumnBuilder::Timestamp(b), Value::TimestampTz(v)) => b.append_value(v),
            (ColumnBuilder::Interval(b), Value::Interval { months, days, nanos }) => {
                b.append_value(IntervalMonthDayNano::new(months, days, nanos))
            }
            (ColumnBuilder::Uuid(b), Value::Uuid(v)) => b.append_value(v.as_bytes())?,
            (builder, _) => builder.append_null(),
        }
        Ok(())
    }

    pub(crate) fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Boolean(b) => Arc::new(b.finish()),
            ColumnBuilder::TinyInt(b) => Arc::new(b.finish()),
            ColumnBuilder::SmallInt(b) => Arc::new(b.finish()),
            ColumnBuilder::Integer(b) => Arc::new(b.finish()),
            ColumnBuilder::BigInt(b) => Arc::new(b.finish()),
            ColumnBuilder::Float(b) => Arc::new(b.finish()),
            ColumnBuilder::Double(b) => Arc::new(b.finish()),
            ColumnBuilder::Text(b) => Arc::new(b.finish()),
            ColumnBuilder::Blob(b) => Arc::new(b.finish()),
            ColumnBuilder::Date(b) => Arc::new(b.finish()),
            ColumnBuilder::Time(b) => Arc::new(b.finish()),
            ColumnBuilder::Timestamp(b) => Arc::new(b.finish()),
            ColumnBuilder::Interval(b) => Arc::new(b.finish()),
            ColumnBuilder::Uuid(b) => Arc::new(b.finish()),
        }
    }
}
