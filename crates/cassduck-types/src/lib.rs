//! Cassandra type system and its mapping onto relational types
//!
//! Every source column type resolves to exactly one [`LogicalType`], and every
//! raw driver value decodes into a [`Value`] of the column's declared type.

mod cql;
mod logical;
mod mapping;
mod value;

pub use cql::{type_id, type_name, CqlType};
pub use logical::{LogicalType, EXTENSION_NAME_KEY, TIMESTAMP_TIMEZONE};
pub use mapping::{map_cql_type, map_type, map_type_id, map_type_name, placeholder, type_stem, TypeIdentifier};
pub use value::{decode_value, to_json, to_text, CqlValue, Value, DATE_EPOCH_OFFSET};
