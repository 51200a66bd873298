//! Source-side type descriptors for the Cassandra Query Language
//!
//! A `CqlType` is what a result-set descriptor or `system_schema.columns.type`
//! reports for a column. Every variant carries the protocol type id that the
//! native protocol uses on the wire; those ids are the numeric identifiers the
//! mapping tables are keyed on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol type ids (native protocol v4/v5, section 4.2.5.2)
pub mod type_id {
    pub const CUSTOM: u16 = 0x0000;
    pub const ASCII: u16 = 0x0001;
    pub const BIGINT: u16 = 0x0002;
    pub const BLOB: u16 = 0x0003;
    pub const BOOLEAN: u16 = 0x0004;
    pub const COUNTER: u16 = 0x0005;
    pub const DECIMAL: u16 = 0x0006;
    pub const DOUBLE: u16 = 0x0007;
    pub const FLOAT: u16 = 0x0008;
    pub const INT: u16 = 0x0009;
    pub const TEXT: u16 = 0x000A;
    pub const TIMESTAMP: u16 = 0x000B;
    pub const UUID: u16 = 0x000C;
    pub const VARCHAR: u16 = 0x000D;
    pub const VARINT: u16 = 0x000E;
    pub const TIMEUUID: u16 = 0x000F;
    pub const INET: u16 = 0x0010;
    pub const DATE: u16 = 0x0011;
    pub const TIME: u16 = 0x0012;
    pub const SMALLINT: u16 = 0x0013;
    pub const TINYINT: u16 = 0x0014;
    pub const DURATION: u16 = 0x0015;
    pub const LIST: u16 = 0x0020;
    pub const MAP: u16 = 0x0021;
    pub const SET: u16 = 0x0022;
    pub const UDT: u16 = 0x0030;
    pub const TUPLE: u16 = 0x0031;
    /// Not a protocol id; used by drivers for "could not determine"
    pub const UNKNOWN: u16 = 0xFFFF;
}

/// Canonical lower-case name of a protocol type id
pub fn type_name(id: u16) -> &'static str {
    match id {
        type_id::CUSTOM => "custom",
        type_id::ASCII => "ascii",
        type_id::BIGINT => "bigint",
        type_id::BLOB => "blob",
        type_id::BOOLEAN => "boolean",
        type_id::COUNTER => "counter",
        type_id::DECIMAL => "decimal",
        type_id::DOUBLE => "double",
        type_id::FLOAT => "float",
        type_id::INT => "int",
        type_id::TEXT => "text",
        type_id::TIMESTAMP => "timestamp",
        type_id::UUID => "uuid",
        type_id::VARCHAR => "varchar",
        type_id::VARINT => "varint",
        type_id::TIMEUUID => "timeuuid",
        type_id::INET => "inet",
        type_id::DATE => "date",
        type_id::TIME => "time",
        type_id::SMALLINT => "smallint",
        type_id::TINYINT => "tinyint",
        type_id::DURATION => "duration",
        type_id::LIST => "list",
        type_id::MAP => "map",
        type_id::SET => "set",
        type_id::UDT => "udt",
        type_id::TUPLE => "tuple",
        _ => "unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CqlType {
    // Scalars
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Int,
    Text,
    Timestamp,
    Uuid,
    Varchar,
    Varint,
    Timeuuid,
    Inet,
    Date,
    Time,
    SmallInt,
    TinyInt,
    Duration,

    // Collections
    List(Box<CqlType>),
    Set(Box<CqlType>),
    Map(Box<CqlType>, Box<CqlType>),

    // Composite
    Tuple(Vec<CqlType>),
    /// User-defined type, by name
    Udt(String),

    /// Server-side custom marshal class
    Custom(String),
}

impl CqlType {
    pub fn type_id(&self) -> u16 {
        match self {
            CqlType::Ascii => type_id::ASCII,
            CqlType::BigInt => type_id::BIGINT,
            CqlType::Blob => type_id::BLOB,
            CqlType::Boolean => type_id::BOOLEAN,
            CqlType::Counter => type_id::COUNTER,
            CqlType::Decimal => type_id::DECIMAL,
            CqlType::Double => type_id::DOUBLE,
            CqlType::Float => type_id::FLOAT,
            CqlType::Int => type_id::INT,
            CqlType::Text => type_id::TEXT,
            CqlType::Timestamp => type_id::TIMESTAMP,
            CqlType::Uuid => type_id::UUID,
            CqlType::Varchar => type_id::VARCHAR,
            CqlType::Varint => type_id::VARINT,
            CqlType::Timeuuid => type_id::TIMEUUID,
            CqlType::Inet => type_id::INET,
            CqlType::Date => type_id::DATE,
            CqlType::Time => type_id::TIME,
            CqlType::SmallInt => type_id::SMALLINT,
            CqlType::TinyInt => type_id::TINYINT,
            CqlType::Duration => type_id::DURATION,
            CqlType::List(_) => type_id::LIST,
            CqlType::Set(_) => type_id::SET,
            CqlType::Map(_, _) => type_id::MAP,
            CqlType::Tuple(_) => type_id::TUPLE,
            CqlType::Udt(_) => type_id::UDT,
            CqlType::Custom(_) => type_id::CUSTOM,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            CqlType::List(_)
                | CqlType::Set(_)
                | CqlType::Map(_, _)
                | CqlType::Tuple(_)
                | CqlType::Udt(_)
        )
    }

    /// Parse a textual CQL type as stored in `system_schema.columns.type`.
    ///
    /// Never fails: `frozen<..>` is unwrapped, quoted names become `Custom`,
    /// and any other unrecognized identifier is taken to be a UDT name.
    pub fn parse(text: &str) -> CqlType {
        let mut parser = TypeParser { input: text.trim(), pos: 0 };
        let parsed = parser.parse_type();
        parser.skip_whitespace();
        if parser.pos < parser.input.len() {
            // Trailing garbage: keep the whole string instead of guessing
            return CqlType::Custom(text.trim().to_string());
        }
        parsed
    }

    fn from_simple_name(name: &str) -> CqlType {
        match name.to_ascii_lowercase().as_str() {
            "ascii" => CqlType::Ascii,
            "bigint" => CqlType::BigInt,
            "blob" => CqlType::Blob,
            "boolean" => CqlType::Boolean,
            "counter" => CqlType::Counter,
            "decimal" => CqlType::Decimal,
            "double" => CqlType::Double,
            "float" => CqlType::Float,
            "int" => CqlType::Int,
            "text" => CqlType::Text,
            "timestamp" => CqlType::Timestamp,
            "uuid" => CqlType::Uuid,
            "varchar" => CqlType::Varchar,
            "varint" => CqlType::Varint,
            "timeuuid" => CqlType::Timeuuid,
            "inet" => CqlType::Inet,
            "date" => CqlType::Date,
            "time" => CqlType::Time,
            "smallint" => CqlType::SmallInt,
            "tinyint" => CqlType::TinyInt,
            "duration" => CqlType::Duration,
            _ => CqlType::Udt(name.to_string()),
        }
    }
}

impl fmt::Display for CqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CqlType::List(inner) => write!(f, "list<{}>", inner),
            CqlType::Set(inner) => write!(f, "set<{}>", inner),
            CqlType::Map(key, value) => write!(f, "map<{}, {}>", key, value),
            CqlType::Tuple(items) => {
                write!(f, "tuple<")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ">")
            }
            CqlType::Udt(name) => write!(f, "{}", name),
            CqlType::Custom(class) => write!(f, "'{}'", class),
            scalar => write!(f, "{}", type_name(scalar.type_id())),
        }
    }
}

struct TypeParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn identifier(&mut self) -> &'a str {
        self.skip_whitespace();
        let start = self.pos;
        if self.peek() == Some('"') {
            // Quoted UDT name, "" escapes a quote
            self.pos += 1;
            while let Some(c) = self.peek() {
                self.pos += c.len_utf8();
                if c == '"' {
                    if self.peek() == Some('"') {
                        self.pos += 1;
                        continue;
                    }
                    break;
                }
            }
            return &self.input[start..self.pos];
        }
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn parse_type(&mut self) -> CqlType {
        self.skip_whitespace();
        if self.peek() == Some('\'') {
            self.pos += 1;
            let start = self.pos;
            while let Some(c) = self.peek() {
                if c == '\'' {
                    break;
                }
                self.pos += c.len_utf8();
            }
            let class = self.input[start..self.pos].to_string();
            self.eat('\'');
            return CqlType::Custom(class);
        }

        let name = self.identifier();
        if name.starts_with('"') {
            let unquoted = name[1..name.len().saturating_sub(1).max(1)].replace("\"\"", "\"");
            return CqlType::Udt(unquoted);
        }
        if name.contains('.') {
            // Fully-qualified marshal class without quotes
            return CqlType::Custom(name.to_string());
        }

        if !self.eat('<') {
            return CqlType::from_simple_name(name);
        }

        let mut args = vec![self.parse_type()];
        while self.eat(',') {
            args.push(self.parse_type());
        }
        self.eat('>');

        let lowered = name.to_ascii_lowercase();
        let mut args = args.into_iter();
        match (lowered.as_str(), args.len()) {
            ("frozen", 1) => args.next().unwrap_or(CqlType::Blob),
            ("list", 1) => CqlType::List(Box::new(args.next().unwrap_or(CqlType::Blob))),
            ("set", 1) => CqlType::Set(Box::new(args.next().unwrap_or(CqlType::Blob))),
            ("map", 2) => {
                let key = args.next().unwrap_or(CqlType::Blob);
                let value = args.next().unwrap_or(CqlType::Blob);
                CqlType::Map(Box::new(key), Box::new(value))
            }
            ("tuple", _) => CqlType::Tuple(args.collect()),
            _ => CqlType::Custom(format!("{}<..>", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(CqlType::parse("text"), CqlType::Text);
        assert_eq!(CqlType::parse("BIGINT"), CqlType::BigInt);
        assert_eq!(CqlType::parse(" timeuuid "), CqlType::Timeuuid);
    }

    #[test]
    fn test_parse_nested_collections() {
        assert_eq!(
            CqlType::parse("map<text, frozen<list<int>>>"),
            CqlType::Map(
                Box::new(CqlType::Text),
                Box::new(CqlType::List(Box::new(CqlType::Int)))
            )
        );
        assert_eq!(
            CqlType::parse("tuple<int,text,uuid>"),
            CqlType::Tuple(vec![CqlType::Int, CqlType::Text, CqlType::Uuid])
        );
    }

    #[test]
    fn test_parse_udt_and_custom() {
        assert_eq!(CqlType::parse("frozen<address>"), CqlType::Udt("address".into()));
        assert_eq!(CqlType::parse("\"Home\"\"Addr\""), CqlType::Udt("Home\"Addr".into()));
        assert_eq!(
            CqlType::parse("'org.apache.cassandra.db.marshal.DynamicCompositeType'"),
            CqlType::Custom("org.apache.cassandra.db.marshal.DynamicCompositeType".into())
        );
    }

    #[test]
    fn test_display_is_canonical() {
        let ty = CqlType::parse("map<text,frozen<set<bigint>>>");
        assert_eq!(ty.to_string(), "map<text, set<bigint>>");
        assert_eq!(CqlType::parse(&ty.to_string()), ty);
    }

    #[test]
    fn test_type_ids() {
        assert_eq!(CqlType::List(Box::new(CqlType::Text)).type_id(), type_id::LIST);
        assert_eq!(type_name(type_id::SMALLINT), "smallint");
        assert_eq!(type_name(0x7777), "unknown");
    }
}
