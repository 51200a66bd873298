//! Session backed by the scylla driver
//!
//! The driver is async; a private single-worker runtime drives it so callers
//! stay synchronous. A gate mutex keeps one request in flight per session.

use crate::config::{Consistency, ConnectionConfig, TlsMaterial};
use crate::error::{Error, Result};
use crate::session::{ColumnDesc, CqlSession, ResultSet, Row, RowCursor};
use cassduck_types::{CqlType, CqlValue};
use futures::StreamExt;
use openssl::pkey::PKey;
use openssl::ssl::{SslContext, SslMethod, SslVerifyMode};
use openssl::x509::X509;
use scylla::frame::response::result::{ColumnSpec, ColumnType, CqlValue as DriverValue};
use scylla::statement::Consistency as DriverConsistency;
use scylla::transport::iterator::RowIterator;
use scylla::transport::load_balancing::DefaultPolicy;
use scylla::{ExecutionProfile, Session, SessionBuilder};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Runtime;
use uuid::Uuid;

struct Inner {
    session: Session,
    runtime: Runtime,
    gate: Mutex<()>,
    config: ConnectionConfig,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone)]
pub struct ScyllaSession {
    inner: Arc<Inner>,
}

impl ScyllaSession {
    /// Connect once; blocks for the handshake and certificate validation
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("cassduck-driver")
            .enable_all()
            .build()
            .map_err(|e| Error::Connection(format!("failed to start driver runtime: {}", e)))?;

        let nodes = config.known_nodes();
        if nodes.is_empty() {
            return Err(Error::Configuration("no contact points configured".into()));
        }

        let mut builder = SessionBuilder::new();
        for node in &nodes {
            builder = builder.known_node(node);
        }
        if let Some((user, password)) = config.credentials() {
            builder = builder.user(user, password);
        }
        if let Some(keyspace) = &config.keyspace {
            builder = builder.use_keyspace(keyspace, false);
        }
        if config.tls_enabled() {
            builder = builder.ssl_context(Some(build_ssl_context(config)?));
        }

        let mut profile = ExecutionProfile::builder().consistency(driver_consistency(config.consistency));
        if let Some(dc) = &config.gateway.datacenter {
            profile = profile
                .load_balancing_policy(DefaultPolicy::builder().prefer_datacenter(dc.clone()).build());
        }
        builder = builder.default_execution_profile_handle(profile.build().into_handle());

        tracing::info!(
            nodes = ?nodes,
            keyspace = ?config.keyspace,
            tls = config.tls_enabled(),
            gateway = config.gateway.is_enabled(),
            "Connecting to Cassandra"
        );
        let session = runtime
            .block_on(builder.build())
            .map_err(|e| Error::Connection(format!("failed to connect to {}: {}", nodes.join(","), e)))?;
        tracing::info!("Connected to Cassandra");

        Ok(Self {
            inner: Arc::new(Inner {
                session,
                runtime,
                gate: Mutex::new(()),
                config: config.clone(),
            }),
        })
    }
}

impl CqlSession for ScyllaSession {
    fn execute(&self, cql: &str, params: &[&str]) -> Result<ResultSet> {
        let values: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        tracing::debug!(cql, "Executing statement");

        let _guard = self.inner.lock();
        let result = self
            .inner
            .runtime
            .block_on(self.inner.session.query_unpaged(cql, values))
            .map_err(|e| Error::query(cql, e))?;

        let columns = result.col_specs().iter().map(column_desc).collect();
        let rows = result
            .rows_or_empty()
            .into_iter()
            .map(|row| convert_row(row.columns))
            .collect();
        Ok(ResultSet { columns, rows })
    }

    fn query_iter(&self, cql: &str) -> Result<Box<dyn RowCursor>> {
        tracing::debug!(cql, "Opening cursor");
        let iterator = {
            let _guard = self.inner.lock();
            self.inner
                .runtime
                .block_on(self.inner.session.query_iter(cql, Vec::<String>::new()))
                .map_err(|e| Error::query(cql, e))?
        };
        let columns = iterator.get_column_specs().iter().map(column_desc).collect();

        Ok(Box::new(ScyllaCursor {
            inner: Arc::clone(&self.inner),
            iterator,
            columns,
            query: cql.to_string(),
        }))
    }

    fn describe(&self, cql: &str) -> Result<Vec<ColumnDesc>> {
        tracing::debug!(cql, "Preparing statement");
        let _guard = self.inner.lock();
        let prepared = self
            .inner
            .runtime
            .block_on(self.inner.session.prepare(cql))
            .map_err(|e| Error::query(cql, e))?;
        Ok(prepared
            .get_result_set_col_specs()
            .iter()
            .map(column_desc)
            .collect())
    }

    fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }
}

/// Cursor over a paged driver iterator. Holds the session alive while open.
struct ScyllaCursor {
    inner: Arc<Inner>,
    iterator: RowIterator,
    columns: Vec<ColumnDesc>,
    query: String,
}

impl RowCursor for ScyllaCursor {
    fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        let _guard = self.inner.lock();
        match self.inner.runtime.block_on(self.iterator.next()) {
            Some(Ok(row)) => Ok(Some(convert_row(row.columns))),
            Some(Err(e)) => Err(Error::query(self.query.as_str(), e)),
            None => Ok(None),
        }
    }
}

fn build_ssl_context(config: &ConnectionConfig) -> Result<SslContext> {
    let tls_err = |e: openssl::error::ErrorStack| Error::Connection(format!("TLS setup failed: {}", e));

    let mut ctx = SslContext::builder(SslMethod::tls()).map_err(tls_err)?;
    // Gateway certificates are always verified
    let verify = config.gateway.is_enabled() || config.verify_peer;
    ctx.set_verify(if verify {
        SslVerifyMode::PEER
    } else {
        SslVerifyMode::NONE
    });

    let TlsMaterial {
        ca_cert,
        client_cert,
        client_key,
    } = config.tls_material();

    if let Some(ca) = ca_cert {
        let cert = X509::from_pem(ca.as_bytes()).map_err(tls_err)?;
        ctx.cert_store_mut().add_cert(cert).map_err(tls_err)?;
    }
    match (client_cert, client_key) {
        (Some(cert), Some(key)) => {
            let cert = X509::from_pem(cert.as_bytes()).map_err(tls_err)?;
            let key = PKey::private_key_from_pem(key.as_bytes()).map_err(tls_err)?;
            ctx.set_certificate(&cert).map_err(tls_err)?;
            ctx.set_private_key(&key).map_err(tls_err)?;
        }
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!("Client certificate and key must both be set, skipping mutual TLS");
        }
        (None, None) => {}
    }
    Ok(ctx.build())
}

fn driver_consistency(consistency: Consistency) -> DriverConsistency {
    match consistency {
        Consistency::Any => DriverConsistency::Any,
        Consistency::One => DriverConsistency::One,
        Consistency::Two => DriverConsistency::Two,
        Consistency::Three => DriverConsistency::Three,
        Consistency::Quorum => DriverConsistency::Quorum,
        Consistency::All => DriverConsistency::All,
        Consistency::LocalQuorum => DriverConsistency::LocalQuorum,
        Consistency::EachQuorum => DriverConsistency::EachQuorum,
        Consistency::LocalOne => DriverConsistency::LocalOne,
        Consistency::Serial => DriverConsistency::Serial,
        Consistency::LocalSerial => DriverConsistency::LocalSerial,
    }
}

fn column_desc(spec: &ColumnSpec) -> ColumnDesc {
    ColumnDesc::new(spec.name.clone(), cql_type(&spec.typ))
}

fn cql_type(typ: &ColumnType) -> CqlType {
    match typ {
        ColumnType::Ascii => CqlType::Ascii,
        ColumnType::Boolean => CqlType::Boolean,
        ColumnType::Blob => CqlType::Blob,
        ColumnType::Counter => CqlType::Counter,
        ColumnType::Date => CqlType::Date,
        ColumnType::Decimal => CqlType::Decimal,
        ColumnType::Double => CqlType::Double,
        ColumnType::Duration => CqlType::Duration,
        ColumnType::Float => CqlType::Float,
        ColumnType::Int => CqlType::Int,
        ColumnType::BigInt => CqlType::BigInt,
        ColumnType::Text => CqlType::Text,
        ColumnType::Timestamp => CqlType::Timestamp,
        ColumnType::Inet => CqlType::Inet,
        ColumnType::List(inner) => CqlType::List(Box::new(cql_type(inner))),
        ColumnType::Map(key, value) => {
            CqlType::Map(Box::new(cql_type(key)), Box::new(cql_type(value)))
        }
        ColumnType::Set(inner) => CqlType::Set(Box::new(cql_type(inner))),
        ColumnType::UserDefinedType { type_name, .. } => CqlType::Udt(type_name.to_string()),
        ColumnType::SmallInt => CqlType::SmallInt,
        ColumnType::TinyInt => CqlType::TinyInt,
        ColumnType::Time => CqlType::Time,
        ColumnType::Timeuuid => CqlType::Timeuuid,
        ColumnType::Tuple(items) => CqlType::Tuple(items.iter().map(cql_type).collect()),
        ColumnType::Uuid => CqlType::Uuid,
        ColumnType::Varint => CqlType::Varint,
        ColumnType::Custom(class) => CqlType::Custom(class.to_string()),
        #[allow(unreachable_patterns)]
        other => {
            tracing::warn!(column_type = ?other, "Unsupported driver column type, reading as custom");
            CqlType::Custom(format!("{:?}", other))
        }
    }
}

fn convert_row(columns: Vec<Option<DriverValue>>) -> Row {
    columns.into_iter().map(|cell| cell.map(convert_value)).collect()
}

fn convert_value(value: DriverValue) -> CqlValue {
    match value {
        DriverValue::Ascii(s) => CqlValue::Ascii(s),
        DriverValue::Text(s) => CqlValue::Text(s),
        DriverValue::Boolean(b) => CqlValue::Boolean(b),
        DriverValue::Blob(bytes) => CqlValue::Blob(bytes),
        DriverValue::Counter(counter) => CqlValue::Counter(counter.0),
        DriverValue::Decimal(decimal) => {
            let (unscaled, scale) = decimal.as_signed_be_bytes_slice_and_exponent();
            CqlValue::Decimal {
                unscaled: unscaled.to_vec(),
                scale,
            }
        }
        DriverValue::Varint(varint) => CqlValue::Varint(varint.as_signed_bytes_be_slice().to_vec()),
        DriverValue::Date(date) => CqlValue::Date(date.0),
        DriverValue::Double(f) => CqlValue::Double(f),
        DriverValue::Float(f) => CqlValue::Float(f),
        DriverValue::Duration(duration) => CqlValue::Duration {
            months: duration.months,
            days: duration.days,
            nanoseconds: duration.nanoseconds,
        },
        DriverValue::Int(i) => CqlValue::Int(i),
        DriverValue::BigInt(i) => CqlValue::BigInt(i),
        DriverValue::SmallInt(i) => CqlValue::SmallInt(i),
        DriverValue::TinyInt(i) => CqlValue::TinyInt(i),
        DriverValue::Timestamp(ts) => CqlValue::Timestamp(ts.0),
        DriverValue::Time(time) => CqlValue::Time(time.0),
        DriverValue::Inet(addr) => CqlValue::Inet(addr),
        DriverValue::Uuid(uuid) => CqlValue::Uuid(uuid),
        DriverValue::Timeuuid(uuid) => CqlValue::Timeuuid(Uuid::from_bytes(*uuid.as_bytes())),
        DriverValue::List(items) => CqlValue::List(items.into_iter().map(convert_value).collect()),
        DriverValue::Set(items) => CqlValue::Set(items.into_iter().map(convert_value).collect()),
        DriverValue::Map(entries) => CqlValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (convert_value(k), convert_value(v)))
                .collect(),
        ),
        DriverValue::UserDefinedType {
            type_name, fields, ..
        } => CqlValue::Udt {
            type_name,
            fields: fields
                .into_iter()
                .map(|(name, value)| (name, value.map(convert_value)))
                .collect(),
        },
        DriverValue::Tuple(items) => {
            CqlValue::Tuple(items.into_iter().map(|item| item.map(convert_value)).collect())
        }
        DriverValue::Empty => CqlValue::Empty,
        #[allow(unreachable_patterns)]
        other => {
            tracing::warn!(value = ?other, "Unsupported driver value, reading as NULL");
            CqlValue::Empty
        }
    }
}
