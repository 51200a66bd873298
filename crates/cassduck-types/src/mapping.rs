//! Source type identifier -> relational type tables
//!
//! The tables below are the wire-compatibility contract of this crate:
//! generated schemas and persisted plans depend on every entry staying put.
//! decimal and varint map to VARCHAR and decode to their exact decimal text.

use crate::cql::{type_id, type_name, CqlType};
use crate::logical::LogicalType;
use std::collections::HashMap;
use std::sync::OnceLock;

/// A source type identifier: the protocol tag or a textual CQL type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeIdentifier<'a> {
    Id(u16),
    Name(&'a str),
}

const TYPE_ID_TABLE: &[(u16, LogicalType)] = &[
    (type_id::ASCII, LogicalType::Varchar),
    (type_id::BIGINT, LogicalType::BigInt),
    (type_id::BLOB, LogicalType::Blob),
    (type_id::BOOLEAN, LogicalType::Boolean),
    (type_id::COUNTER, LogicalType::BigInt),
    (type_id::DECIMAL, LogicalType::Varchar),
    (type_id::DOUBLE, LogicalType::Double),
    (type_id::FLOAT, LogicalType::Float),
    (type_id::INT, LogicalType::Integer),
    (type_id::TEXT, LogicalType::Varchar),
    (type_id::TIMESTAMP, LogicalType::TimestampTz),
    (type_id::UUID, LogicalType::Uuid),
    (type_id::VARCHAR, LogicalType::Varchar),
    (type_id::VARINT, LogicalType::Varchar),
    (type_id::TIMEUUID, LogicalType::Uuid),
    (type_id::INET, LogicalType::Varchar),
    (type_id::DATE, LogicalType::Date),
    (type_id::TIME, LogicalType::Time),
    (type_id::SMALLINT, LogicalType::SmallInt),
    (type_id::TINYINT, LogicalType::TinyInt),
    (type_id::DURATION, LogicalType::Interval),
    (type_id::LIST, LogicalType::Json),
    (type_id::MAP, LogicalType::Json),
    (type_id::SET, LogicalType::Json),
    (type_id::UDT, LogicalType::Json),
    (type_id::TUPLE, LogicalType::Json),
    (type_id::CUSTOM, LogicalType::Varchar),
    (type_id::UNKNOWN, LogicalType::Varchar),
];

const TYPE_NAME_TABLE: &[(&str, LogicalType)] = &[
    ("ascii", LogicalType::Varchar),
    ("bigint", LogicalType::BigInt),
    ("blob", LogicalType::Blob),
    ("boolean", LogicalType::Boolean),
    ("counter", LogicalType::BigInt),
    ("decimal", LogicalType::Varchar),
    ("double", LogicalType::Double),
    ("float", LogicalType::Float),
    ("int", LogicalType::Integer),
    ("text", LogicalType::Varchar),
    ("timestamp", LogicalType::TimestampTz),
    ("uuid", LogicalType::Uuid),
    ("varchar", LogicalType::Varchar),
    ("varint", LogicalType::Varchar),
    ("timeuuid", LogicalType::Uuid),
    ("inet", LogicalType::Varchar),
    ("date", LogicalType::Date),
    ("time", LogicalType::Time),
    ("smallint", LogicalType::SmallInt),
    ("tinyint", LogicalType::TinyInt),
    ("duration", LogicalType::Interval),
    ("list", LogicalType::Json),
    ("set", LogicalType::Json),
    ("map", LogicalType::Json),
    ("tuple", LogicalType::Json),
    ("frozen", LogicalType::Json),
    ("udt", LogicalType::Json),
];

fn id_index() -> &'static HashMap<u16, LogicalType> {
    static INDEX: OnceLock<HashMap<u16, LogicalType>> = OnceLock::new();
    INDEX.get_or_init(|| TYPE_ID_TABLE.iter().copied().collect())
}

fn name_index() -> &'static HashMap<&'static str, LogicalType> {
    static INDEX: OnceLock<HashMap<&'static str, LogicalType>> = OnceLock::new();
    INDEX.get_or_init(|| TYPE_NAME_TABLE.iter().copied().collect())
}

/// Map any source type identifier; unknown identifiers fall back to VARCHAR
pub fn map_type(identifier: TypeIdentifier<'_>) -> LogicalType {
    match identifier {
        TypeIdentifier::Id(id) => map_type_id(id),
        TypeIdentifier::Name(name) => map_type_name(name),
    }
}

pub fn map_type_id(id: u16) -> LogicalType {
    match id_index().get(&id) {
        Some(logical) => *logical,
        None => {
            tracing::warn!(type_id = id, "Unknown Cassandra type id, mapping to VARCHAR");
            LogicalType::Varchar
        }
    }
}

/// Map a textual type name. Parameterized names are looked up by their
/// stem, so `list<text>` resolves through `list`. Any other bare identifier
/// is a user-defined type, as `system_schema.columns` reports non-frozen UDTs
/// by name alone.
pub fn map_type_name(name: &str) -> LogicalType {
    let stem = type_stem(name);
    if let Some(logical) = name_index().get(stem.as_str()) {
        return *logical;
    }
    match CqlType::parse(name) {
        CqlType::Udt(udt) if !udt.is_empty() => map_cql_type(&CqlType::Udt(udt)),
        _ => {
            tracing::warn!(type_name = name, "Unknown Cassandra type name, mapping to VARCHAR");
            LogicalType::Varchar
        }
    }
}

pub fn map_cql_type(ty: &CqlType) -> LogicalType {
    map_type_id(ty.type_id())
}

/// Lower-cased part of a type name before the first `<`
pub fn type_stem(name: &str) -> String {
    let stem = match name.find('<') {
        Some(pos) => &name[..pos],
        None => name,
    };
    stem.trim().to_ascii_lowercase()
}

/// `<type:ID>` placeholder for values that cannot be decoded
pub fn placeholder(id: u16) -> String {
    format!("<{}:{}>", type_name(id), id)
}
