//! Raw source values and their decoding into relational values

use crate::cql::{type_id, type_name};
use crate::logical::LogicalType;
use crate::mapping::placeholder;
use chrono::{DateTime, NaiveTime, SecondsFormat};
use serde_json::{Map, Value as Json};
use std::net::IpAddr;
use uuid::Uuid;

/// Cassandra stores `date` as an unsigned day count centred on 2^31
pub const DATE_EPOCH_OFFSET: i64 = 1 << 31;

/// Widest decimal exponent rendered as text
const MAX_RENDERED_SCALE: u32 = 4096;

/// A single non-null value as delivered by the driver, tagged with its own
/// runtime type.
#[derive(Debug, Clone, PartialEq)]
pub enum CqlValue {
    Ascii(String),
    Text(String),
    BigInt(i64),
    Counter(i64),
    Int(i32),
    SmallInt(i16),
    TinyInt(i8),
    Boolean(bool),
    Float(f32),
    Double(f64),
    /// Big-endian two's complement unscaled value and its scale
    Decimal { unscaled: Vec<u8>, scale: i32 },
    /// Big-endian two's complement
    Varint(Vec<u8>),
    /// Milliseconds since the Unix epoch
    Timestamp(i64),
    /// Raw unsigned day count, see [`DATE_EPOCH_OFFSET`]
    Date(u32),
    /// Nanoseconds since midnight
    Time(i64),
    Uuid(Uuid),
    Timeuuid(Uuid),
    Inet(IpAddr),
    Blob(Vec<u8>),
    Duration { months: i32, days: i32, nanoseconds: i64 },
    List(Vec<CqlValue>),
    Set(Vec<CqlValue>),
    Map(Vec<(CqlValue, CqlValue)>),
    Udt { type_name: String, fields: Vec<(String, Option<CqlValue>)> },
    Tuple(Vec<Option<CqlValue>>),
    /// Zero-length value for a type that has no empty representation
    Empty,
}

impl CqlValue {
    pub fn type_id(&self) -> u16 {
        match self {
            CqlValue::Ascii(_) => type_id::ASCII,
            CqlValue::Text(_) => type_id::TEXT,
            CqlValue::BigInt(_) => type_id::BIGINT,
            CqlValue::Counter(_) => type_id::COUNTER,
            CqlValue::Int(_) => type_id::INT,
            CqlValue::SmallInt(_) => type_id::SMALLINT,
            CqlValue::TinyInt(_) => type_id::TINYINT,
            CqlValue::Boolean(_) => type_id::BOOLEAN,
            CqlValue::Float(_) => type_id::FLOAT,
            CqlValue::Double(_) => type_id::DOUBLE,
            CqlValue::Decimal { .. } => type_id::DECIMAL,
            CqlValue::Varint(_) => type_id::VARINT,
            CqlValue::Timestamp(_) => type_id::TIMESTAMP,
            CqlValue::Date(_) => type_id::DATE,
            CqlValue::Time(_) => type_id::TIME,
            CqlValue::Uuid(_) => type_id::UUID,
            CqlValue::Timeuuid(_) => type_id::TIMEUUID,
            CqlValue::Inet(_) => type_id::INET,
            CqlValue::Blob(_) => type_id::BLOB,
            CqlValue::Duration { .. } => type_id::DURATION,
            CqlValue::List(_) => type_id::LIST,
            CqlValue::Set(_) => type_id::SET,
            CqlValue::Map(_) => type_id::MAP,
            CqlValue::Udt { .. } => type_id::UDT,
            CqlValue::Tuple(_) => type_id::TUPLE,
            CqlValue::Empty => type_id::UNKNOWN,
        }
    }
}

/// A decoded relational value. `Null` remembers the column type it stands in for.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null(LogicalType),
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Varchar(String),
    Json(String),
    Blob(Vec<u8>),
    /// Days since the Unix epoch
    Date(i32),
    /// Microseconds since midnight
    Time(i64),
    /// Microseconds since the Unix epoch, UTC
    TimestampTz(i64),
    Interval { months: i32, days: i32, nanos: i64 },
    Uuid(Uuid),
}

impl Value {
    pub fn logical_type(&self) -> LogicalType {
        match self {
            Value::Null(ty) => *ty,
            Value::Boolean(_) => LogicalType::Boolean,
            Value::TinyInt(_) => LogicalType::TinyInt,
            Value::SmallInt(_) => LogicalType::SmallInt,
            Value::Integer(_) => LogicalType::Integer,
            Value::BigInt(_) => LogicalType::BigInt,
            Value::Float(_) => LogicalType::Float,
            Value::Double(_) => LogicalType::Double,
            Value::Varchar(_) => LogicalType::Varchar,
            Value::Json(_) => LogicalType::Json,
            Value::Blob(_) => LogicalType::Blob,
            Value::Date(_) => LogicalType::Date,
            Value::Time(_) => LogicalType::Time,
            Value::TimestampTz(_) => LogicalType::TimestampTz,
            Value::Interval { .. } => LogicalType::Interval,
            Value::Uuid(_) => LogicalType::Uuid,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// Text rendering used when a value lands in a VARCHAR column
    pub fn to_text(&self) -> Option<String> {
        Some(match self {
            Value::Null(_) => return None,
            Value::Boolean(b) => b.to_string(),
            Value::TinyInt(i) => i.to_string(),
            Value::SmallInt(i) => i.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::BigInt(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Double(f) => f.to_string(),
            Value::Varchar(s) | Value::Json(s) => s.clone(),
            Value::Blob(bytes) => format!("0x{}", hex::encode(bytes)),
            Value::Date(days) => format_date(*days as i64)?,
            Value::Time(micros) => format_time_nanos(micros.checked_mul(1_000)?)?,
            Value::TimestampTz(micros) => {
                DateTime::from_timestamp_micros(*micros)?.to_rfc3339_opts(SecondsFormat::AutoSi, true)
            }
            Value::Interval { months, days, nanos } => format_duration(*months, *days, *nanos),
            Value::Uuid(uuid) => uuid.hyphenated().to_string(),
        })
    }
}

/// Decode a raw driver value into the declared column type.
///
/// A missing value decodes to a typed NULL without inspecting anything else.
/// Otherwise the value's own type tag selects the payload extraction and the
/// result is coerced into `target`. Values that cannot be represented become
/// a `<type:ID>` placeholder in textual columns and NULL elsewhere; decoding
/// never fails.
pub fn decode_value(raw: Option<&CqlValue>, target: LogicalType) -> Value {
    let Some(raw) = raw else {
        return Value::Null(target);
    };

    match native_value(raw) {
        Some(value) => coerce(value, target, raw.type_id()),
        None => {
            let marker = placeholder(raw.type_id());
            tracing::warn!(
                type_name = type_name(raw.type_id()),
                type_id = raw.type_id(),
                target = %target,
                "Could not decode Cassandra value, using placeholder"
            );
            if target.is_textual() {
                text_value(marker, target)
            } else {
                Value::Null(target)
            }
        }
    }
}

fn native_value(raw: &CqlValue) -> Option<Value> {
    Some(match raw {
        CqlValue::Ascii(s) | CqlValue::Text(s) => Value::Varchar(s.clone()),
        CqlValue::BigInt(i) | CqlValue::Counter(i) => Value::BigInt(*i),
        CqlValue::Int(i) => Value::Integer(*i),
        CqlValue::SmallInt(i) => Value::SmallInt(*i),
        CqlValue::TinyInt(i) => Value::TinyInt(*i),
        CqlValue::Boolean(b) => Value::Boolean(*b),
        CqlValue::Float(f) => Value::Float(*f),
        CqlValue::Double(f) => Value::Double(*f),
        CqlValue::Decimal { unscaled, scale } => Value::Varchar(decimal_text(unscaled, *scale)?),
        CqlValue::Varint(bytes) => Value::Varchar(decimal_text(bytes, 0)?),
        CqlValue::Timestamp(millis) => Value::TimestampTz(millis.checked_mul(1_000)?),
        CqlValue::Date(raw_days) => Value::Date(date_days(*raw_days)?),
        CqlValue::Time(nanos) => Value::Time(nanos / 1_000),
        CqlValue::Uuid(uuid) | CqlValue::Timeuuid(uuid) => Value::Uuid(*uuid),
        CqlValue::Inet(addr) => Value::Varchar(addr.to_string()),
        CqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
        CqlValue::Duration { months, days, nanoseconds } => Value::Interval {
            months: *months,
            days: *days,
            nanos: *nanoseconds,
        },
        CqlValue::List(_)
        | CqlValue::Set(_)
        | CqlValue::Map(_)
        | CqlValue::Udt { .. }
        | CqlValue::Tuple(_) => Value::Json(to_json(raw).to_string()),
        CqlValue::Empty => return None,
    })
}

fn text_value(text: String, target: LogicalType) -> Value {
    if target == LogicalType::Json {
        Value::Json(text)
    } else {
        Value::Varchar(text)
    }
}

/// Coerce an already-decoded value into the declared column type
fn coerce(value: Value, target: LogicalType, source_id: u16) -> Value {
    if value.logical_type() == target {
        return value;
    }
    if target.is_textual() {
        return match value.to_text() {
            Some(text) => text_value(text, target),
            None => text_value(placeholder(source_id), target),
        };
    }

    let coerced = match (&value, target) {
        (Value::TinyInt(i), LogicalType::SmallInt) => Some(Value::SmallInt(*i as i16)),
        (Value::TinyInt(i), LogicalType::Integer) => Some(Value::Integer(*i as i32)),
        (Value::TinyInt(i), LogicalType::BigInt) => Some(Value::BigInt(*i as i64)),
        (Value::SmallInt(i), LogicalType::Integer) => Some(Value::Integer(*i as i32)),
        (Value::SmallInt(i), LogicalType::BigInt) => Some(Value::BigInt(*i as i64)),
        (Value::Integer(i), LogicalType::BigInt) => Some(Value::BigInt(*i as i64)),
        (Value::SmallInt(i), LogicalType::TinyInt) => i8::try_from(*i).ok().map(Value::TinyInt),
        (Value::Integer(i), LogicalType::TinyInt) => i8::try_from(*i).ok().map(Value::TinyInt),
        (Value::Integer(i), LogicalType::SmallInt) => i16::try_from(*i).ok().map(Value::SmallInt),
        (Value::BigInt(i), LogicalType::TinyInt) => i8::try_from(*i).ok().map(Value::TinyInt),
        (Value::BigInt(i), LogicalType::SmallInt) => i16::try_from(*i).ok().map(Value::SmallInt),
        (Value::BigInt(i), LogicalType::Integer) => i32::try_from(*i).ok().map(Value::Integer),
        (Value::Float(f), LogicalType::Double) => Some(Value::Double(*f as f64)),
        (Value::Double(f), LogicalType::Float) => Some(Value::Float(*f as f32)),
        (Value::Varchar(s), LogicalType::Uuid) => Uuid::parse_str(s).ok().map(Value::Uuid),
        (Value::BigInt(millis), LogicalType::TimestampTz) => {
            millis.checked_mul(1_000).map(Value::TimestampTz)
        }
        (Value::TimestampTz(micros), LogicalType::Date) => {
            Some(Value::Date(micros.div_euclid(86_400_000_000) as i32))
        }
        _ => None,
    };

    coerced.unwrap_or_else(|| {
        tracing::warn!(
            type_name = type_name(source_id),
            type_id = source_id,
            target = %target,
            "Cassandra value does not fit the declared column type, returning NULL"
        );
        Value::Null(target)
    })
}

/// Serialize a raw value into its JSON form; collections nest, map keys and
/// map values are rendered as strings.
pub fn to_json(raw: &CqlValue) -> Json {
    match raw {
        CqlValue::Ascii(s) | CqlValue::Text(s) => Json::String(s.clone()),
        CqlValue::BigInt(i) | CqlValue::Counter(i) => Json::from(*i),
        CqlValue::Int(i) => Json::from(*i),
        CqlValue::SmallInt(i) => Json::from(*i),
        CqlValue::TinyInt(i) => Json::from(*i),
        CqlValue::Boolean(b) => Json::Bool(*b),
        CqlValue::Float(f) => Json::from(*f),
        CqlValue::Double(f) => Json::from(*f),
        CqlValue::List(items) | CqlValue::Set(items) => {
            Json::Array(items.iter().map(to_json).collect())
        }
        CqlValue::Map(entries) => {
            let mut object = Map::new();
            for (key, value) in entries {
                object.insert(to_text(key), Json::String(to_text(value)));
            }
            Json::Object(object)
        }
        CqlValue::Udt { fields, .. } => {
            let mut object = Map::new();
            for (name, value) in fields {
                object.insert(name.clone(), value.as_ref().map(to_json).unwrap_or(Json::Null));
            }
            Json::Object(object)
        }
        CqlValue::Tuple(items) => Json::Array(
            items
                .iter()
                .map(|item| item.as_ref().map(to_json).unwrap_or(Json::Null))
                .collect(),
        ),
        CqlValue::Empty => Json::Null,
        scalar => Json::String(to_text(scalar)),
    }
}

/// Plain text rendering of a raw value
pub fn to_text(raw: &CqlValue) -> String {
    match raw {
        CqlValue::Ascii(s) | CqlValue::Text(s) => s.clone(),
        CqlValue::List(_)
        | CqlValue::Set(_)
        | CqlValue::Map(_)
        | CqlValue::Udt { .. }
        | CqlValue::Tuple(_) => to_json(raw).to_string(),
        CqlValue::Timestamp(millis) => DateTime::from_timestamp_millis(*millis)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| placeholder(raw.type_id())),
        CqlValue::Time(nanos) => {
            format_time_nanos(*nanos).unwrap_or_else(|| placeholder(raw.type_id()))
        }
        CqlValue::Date(raw_days) => date_days(*raw_days)
            .and_then(|days| format_date(days as i64))
            .unwrap_or_else(|| placeholder(raw.type_id())),
        other => native_value(other)
            .and_then(|value| value.to_text())
            .unwrap_or_else(|| placeholder(raw.type_id())),
    }
}

fn date_days(raw_days: u32) -> Option<i32> {
    i32::try_from(raw_days as i64 - DATE_EPOCH_OFFSET).ok()
}

fn format_date(days: i64) -> Option<String> {
    let dt = DateTime::from_timestamp(days.checked_mul(86_400)?, 0)?;
    Some(dt.date_naive().format("%Y-%m-%d").to_string())
}

fn format_time_nanos(nanos: i64) -> Option<String> {
    if nanos < 0 {
        return None;
    }
    let secs = u32::try_from(nanos / 1_000_000_000).ok()?;
    let subsec = (nanos % 1_000_000_000) as u32;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, subsec)?;
    Some(time.format("%H:%M:%S%.f").to_string())
}

fn format_duration(months: i32, days: i32, nanos: i64) -> String {
    format!("{}mo{}d{}ns", months, days, nanos)
}

/// Exact decimal text of a big-endian two's complement integer scaled by
/// 10^-scale. Returns `None` past 128 bits.
fn decimal_text(bytes: &[u8], scale: i32) -> Option<String> {
    if bytes.is_empty() || bytes.len() > 16 || scale.unsigned_abs() > MAX_RENDERED_SCALE {
        return None;
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut buf = [fill; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    let unscaled = i128::from_be_bytes(buf);

    let digits = unscaled.unsigned_abs().to_string();
    let body = if scale <= 0 {
        if unscaled == 0 {
            digits
        } else {
            format!("{}{}", digits, "0".repeat(scale.unsigned_abs() as usize))
        }
    } else {
        let scale = scale as usize;
        if digits.len() > scale {
            let split = digits.len() - scale;
            format!("{}.{}", &digits[..split], &digits[split..])
        } else {
            format!("0.{}{}", "0".repeat(scale - digits.len()), digits)
        }
    };
    Some(if unscaled < 0 { format!("-{}", body) } else { body })
}
