//! Copy arrow batches into DuckDB data chunks

use crate::error::{BridgeError, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    ArrowPrimitiveType, Date32Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, IntervalMonthDayNanoType, Time64MicrosecondType, TimestampMicrosecondType,
};
use arrow::record_batch::RecordBatch;
use cassduck_types::LogicalType;
use duckdb::core::{DataChunkHandle, FlatVector, Inserter, LogicalTypeHandle, LogicalTypeId};
use duckdb::ffi::{duckdb_hugeint, duckdb_interval};

/// DuckDB column type for a relational type. JSON travels as VARCHAR.
pub fn logical_type_handle(logical_type: LogicalType) -> LogicalTypeHandle {
    let id = match logical_type {
        LogicalType::Boolean => LogicalTypeId::Boolean,
        LogicalType::TinyInt => LogicalTypeId::Tinyint,
        LogicalType::SmallInt => LogicalTypeId::Smallint,
        LogicalType::Integer => LogicalTypeId::Integer,
        LogicalType::BigInt => LogicalTypeId::Bigint,
        LogicalType::Float => LogicalTypeId::Float,
        LogicalType::Double => LogicalTypeId::Double,
        LogicalType::Varchar | LogicalType::Json => LogicalTypeId::Varchar,
        LogicalType::Blob => LogicalTypeId::Blob,
        LogicalType::Date => LogicalTypeId::Date,
        LogicalType::Time => LogicalTypeId::Time,
        LogicalType::TimestampTz => LogicalTypeId::TimestampTZ,
        LogicalType::Interval => LogicalTypeId::Interval,
        LogicalType::Uuid => LogicalTypeId::Uuid,
    };
    LogicalTypeHandle::from(id)
}

/// Write `batch` into `output`. Values are copied first and nulls flagged
/// afterwards, so a null slot never carries a stale value.
pub fn write_batch(
    batch: &RecordBatch,
    types: &[LogicalType],
    output: &mut DataChunkHandle,
) -> Result<()> {
    if batch.num_columns() != types.len() {
        return Err(BridgeError::Schema(format!(
            "batch has {} columns, {} were bound",
            batch.num_columns(),
            types.len()
        )));
    }
    let rows = batch.num_rows();

    for (idx, (array, logical_type)) in batch.columns().iter().zip(types).enumerate() {
        let mut vector = output.flat_vector(idx);
        match logical_type {
            LogicalType::Boolean => {
                let values = array.as_boolean();
                let slots = unsafe { vector.as_mut_slice::<bool>() };
                for row in 0..rows {
                    slots[row] = values.is_valid(row) && values.value(row);
                }
            }
            LogicalType::TinyInt => copy_primitive::<Int8Type>(array, &mut vector),
            LogicalType::SmallInt => copy_primitive::<Int16Type>(array, &mut vector),
            LogicalType::Integer => copy_primitive::<Int32Type>(array, &mut vector),
            LogicalType::BigInt => copy_primitive::<Int64Type>(array, &mut vector),
            LogicalType::Float => copy_primitive::<Float32Type>(array, &mut vector),
            LogicalType::Double => copy_primitive::<Float64Type>(array, &mut vector),
            LogicalType::Date => copy_primitive::<Date32Type>(array, &mut vector),
            LogicalType::Time => copy_primitive::<Time64MicrosecondType>(array, &mut vector),
            LogicalType::TimestampTz => {
                copy_primitive::<TimestampMicrosecondType>(array, &mut vector)
            }
            LogicalType::Varchar | LogicalType::Json => {
                let values = array.as_string::<i32>();
                for row in 0..rows {
                    if values.is_valid(row) {
                        vector.insert(row, values.value(row));
                    }
                }
            }
            LogicalType::Blob => {
                let values = array.as_binary::<i32>();
                for row in 0..rows {
                    if values.is_valid(row) {
                        vector.insert(row, values.value(row));
                    }
                }
            }
            LogicalType::Interval => {
                let values = array.as_primitive::<IntervalMonthDayNanoType>();
                let slots = unsafe { vector.as_mut_slice::<duckdb_interval>() };
                for (row, value) in values.values().iter().enumerate().take(rows) {
                    slots[row] = duckdb_interval {
                        months: value.months,
                        days: value.days,
                        micros: value.nanoseconds / 1_000,
                    };
                }
            }
            LogicalType::Uuid => {
                let values = array.as_fixed_size_binary();
                let slots = unsafe { vector.as_mut_slice::<duckdb_hugeint>() };
                for row in 0..rows {
                    if values.is_valid(row) {
                        slots[row] = uuid_to_hugeint(values.value(row))?;
                    }
                }
            }
        }

        for row in 0..rows {
            if array.is_null(row) {
                vector.set_null(row);
            }
        }
    }

    output.set_len(rows);
    Ok(())
}

fn copy_primitive<T: ArrowPrimitiveType>(array: &ArrayRef, vector: &mut FlatVector) {
    let values = array.as_primitive::<T>().values();
    unsafe { vector.as_mut_slice::<T::Native>()[..values.len()].copy_from_slice(values) };
}

/// DuckDB orders UUIDs as signed 128-bit integers with the top bit flipped
fn uuid_to_hugeint(bytes: &[u8]) -> Result<duckdb_hugeint> {
    let bytes: [u8; 16] = bytes
        .try_into()
        .map_err(|_| BridgeError::Schema(format!("UUID must be 16 bytes, got {}", bytes.len())))?;
    let value = u128::from_be_bytes(bytes);
    Ok(duckdb_hugeint {
        lower: value as u64,
        upper: (((value >> 64) as u64) ^ (1 << 63)) as i64,
    })
}
