//! Connection configuration
//!
//! Attach strings are space-separated `key=value` tokens. Values cannot
//! contain spaces; PEM material therefore travels hex or base64 encoded, or
//! with literal `\n` escapes for the gateway keys.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_CONTACT_POINTS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9042;
pub const DEFAULT_GATEWAY_PORT: u16 = 29042;

/// Keys whose values never appear in logs or catalog paths
const SECRET_KEYS: &[&str] = &[
    "password",
    "client_secret",
    "userkey",
    "userkey_b64",
    "astra_client_key",
    "astra_client_key_b64",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    Any,
    #[default]
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    LocalOne,
    Serial,
    LocalSerial,
}

impl FromStr for Consistency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ANY" => Ok(Consistency::Any),
            "ONE" => Ok(Consistency::One),
            "TWO" => Ok(Consistency::Two),
            "THREE" => Ok(Consistency::Three),
            "QUORUM" => Ok(Consistency::Quorum),
            "ALL" => Ok(Consistency::All),
            "LOCAL_QUORUM" => Ok(Consistency::LocalQuorum),
            "EACH_QUORUM" => Ok(Consistency::EachQuorum),
            "LOCAL_ONE" => Ok(Consistency::LocalOne),
            "SERIAL" => Ok(Consistency::Serial),
            "LOCAL_SERIAL" => Ok(Consistency::LocalSerial),
            other => Err(Error::Configuration(format!(
                "unknown consistency level '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Consistency::Any => "ANY",
            Consistency::One => "ONE",
            Consistency::Two => "TWO",
            Consistency::Three => "THREE",
            Consistency::Quorum => "QUORUM",
            Consistency::All => "ALL",
            Consistency::LocalQuorum => "LOCAL_QUORUM",
            Consistency::EachQuorum => "EACH_QUORUM",
            Consistency::LocalOne => "LOCAL_ONE",
            Consistency::Serial => "SERIAL",
            Consistency::LocalSerial => "LOCAL_SERIAL",
        };
        f.write_str(name)
    }
}

/// PEM material for TLS, already decoded
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TlsMaterial {
    pub ca_cert: Option<String>,
    pub client_cert: Option<String>,
    pub client_key: Option<String>,
}

impl TlsMaterial {
    pub fn is_empty(&self) -> bool {
        self.ca_cert.is_none() && self.client_cert.is_none() && self.client_key.is_none()
    }

    pub fn has_client_identity(&self) -> bool {
        self.client_cert.is_some() && self.client_key.is_some()
    }
}

/// Managed cloud gateway (Astra-style) credentials and endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub host: Option<String>,
    pub port: u16,
    pub datacenter: Option<String>,
    pub tls: TlsMaterial,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            host: None,
            port: DEFAULT_GATEWAY_PORT,
            datacenter: None,
            tls: TlsMaterial::default(),
        }
    }
}

impl GatewayConfig {
    pub fn is_enabled(&self) -> bool {
        self.client_id.is_some() || self.client_secret.is_some()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Comma-separated list of hosts, optionally with `:port`
    pub contact_points: String,
    pub port: u16,
    pub keyspace: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub consistency: Consistency,
    pub use_ssl: bool,
    pub verify_peer: bool,
    pub tls: TlsMaterial,
    pub gateway: GatewayConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            contact_points: DEFAULT_CONTACT_POINTS.to_string(),
            port: DEFAULT_PORT,
            keyspace: None,
            username: None,
            password: None,
            consistency: Consistency::default(),
            use_ssl: false,
            verify_peer: true,
            tls: TlsMaterial::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl ConnectionConfig {
    /// Parse an attach string such as `host=127.0.0.1 port=9042 keyspace=demo`
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let mut config = Self::default();
        config.apply_connection_string(connection_string)?;
        Ok(config)
    }

    /// Defaults overridden by `CASSANDRA_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        const ENV_KEYS: &[(&str, &str)] = &[
            ("CASSANDRA_CONTACT_POINTS", "contact_points"),
            ("CASSANDRA_PORT", "port"),
            ("CASSANDRA_USERNAME", "username"),
            ("CASSANDRA_PASSWORD", "password"),
            ("CASSANDRA_KEYSPACE", "keyspace"),
            ("CASSANDRA_CONSISTENCY", "consistency"),
            ("CASSANDRA_USE_SSL", "use_ssl"),
        ];

        let mut config = Self::default();
        for (var, key) in ENV_KEYS {
            if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                config.set(key, &value)?;
            }
        }
        Ok(config)
    }

    pub fn apply_connection_string(&mut self, connection_string: &str) -> Result<()> {
        for token in connection_string.split_whitespace() {
            match token.split_once('=') {
                Some((key, value)) => self.set(key, value)?,
                None => tracing::debug!(token, "Ignoring connection token without '='"),
            }
        }
        Ok(())
    }

    /// Apply a single option. Keys are case-insensitive; unknown keys are ignored.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = key.to_ascii_lowercase();
        match key.as_str() {
            "host" | "contact_points" => self.contact_points = value.to_string(),
            "port" => self.port = parse_port(&key, value)?,
            "keyspace" => self.keyspace = non_empty(value),
            "username" => self.username = non_empty(value),
            "password" => self.password = Some(value.to_string()),
            "consistency" => self.consistency = value.parse()?,
            "ssl" | "use_ssl" => self.use_ssl = parse_flag(value),
            "verify_peer" => self.verify_peer = parse_flag(value),

            "certfile" | "cacert" => {
                self.tls.ca_cert = Some(decode_hex(&key, value)?);
                self.use_ssl = true;
            }
            "usercert" => {
                self.tls.client_cert = Some(decode_hex(&key, value)?);
                self.use_ssl = true;
            }
            "userkey" => {
                self.tls.client_key = Some(decode_hex(&key, value)?);
                self.use_ssl = true;
            }
            "certfile_b64" => {
                self.tls.ca_cert = Some(decode_b64(&key, value)?);
                self.use_ssl = true;
            }
            "usercert_b64" => {
                self.tls.client_cert = Some(decode_b64(&key, value)?);
                self.use_ssl = true;
            }
            "userkey_b64" => {
                self.tls.client_key = Some(decode_b64(&key, value)?);
                self.use_ssl = true;
            }

            "client_id" => self.gateway.client_id = Some(value.to_string()),
            "client_secret" => self.gateway.client_secret = Some(value.to_string()),
            "astra_host" => self.gateway.host = non_empty(value),
            "astra_port" => self.gateway.port = parse_port(&key, value)?,
            "astra_dc" => self.gateway.datacenter = non_empty(value),
            "astra_ca_cert" => self.gateway.tls.ca_cert = Some(unescape_pem(value)),
            "astra_client_cert" => self.gateway.tls.client_cert = Some(unescape_pem(value)),
            "astra_client_key" => self.gateway.tls.client_key = Some(unescape_pem(value)),
            "astra_ca_cert_b64" => self.gateway.tls.ca_cert = Some(decode_b64(&key, value)?),
            "astra_client_cert_b64" => {
                self.gateway.tls.client_cert = Some(decode_b64(&key, value)?)
            }
            "astra_client_key_b64" => {
                self.gateway.tls.client_key = Some(decode_b64(&key, value)?)
            }

            _ => tracing::debug!(key = %key, "Ignoring unknown connection option"),
        }
        Ok(())
    }

    /// `host:port` entries the driver should contact first
    pub fn known_nodes(&self) -> Vec<String> {
        if self.gateway.is_enabled() {
            let host = self
                .gateway
                .host
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTACT_POINTS.to_string());
            return vec![format!("{}:{}", host, self.gateway.port)];
        }
        self.contact_points
            .split(',')
            .map(str::trim)
            .filter(|point| !point.is_empty())
            .map(|point| {
                if point.contains(':') {
                    point.to_string()
                } else {
                    format!("{}:{}", point, self.port)
                }
            })
            .collect()
    }

    /// TLS is in effect for gateway connections and whenever SSL was requested
    pub fn tls_enabled(&self) -> bool {
        self.gateway.is_enabled() || self.use_ssl
    }

    /// Material used for the TLS context of this connection
    pub fn tls_material(&self) -> &TlsMaterial {
        if self.gateway.is_enabled() {
            &self.gateway.tls
        } else {
            &self.tls
        }
    }

    /// Username/password pair, or the gateway's client id/secret
    pub fn credentials(&self) -> Option<(String, String)> {
        if self.gateway.is_enabled() {
            return Some((
                self.gateway.client_id.clone().unwrap_or_default(),
                self.gateway.client_secret.clone().unwrap_or_default(),
            ));
        }
        self.username
            .clone()
            .map(|user| (user, self.password.clone().unwrap_or_default()))
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("contact_points", &self.contact_points)
            .field("port", &self.port)
            .field("keyspace", &self.keyspace)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("consistency", &self.consistency)
            .field("use_ssl", &self.use_ssl)
            .field("verify_peer", &self.verify_peer)
            .field("tls", &self.tls)
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca_cert", &self.ca_cert.is_some())
            .field("client_cert", &self.client_cert.is_some())
            .field("client_key", &self.client_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("datacenter", &self.datacenter)
            .field("tls", &self.tls)
            .finish()
    }
}

/// Attach string with secret values masked
pub fn redact_connection_string(connection_string: &str) -> String {
    connection_string
        .split_whitespace()
        .map(|token| match token.split_once('=') {
            Some((key, _)) if SECRET_KEYS.contains(&key.to_ascii_lowercase().as_str()) => {
                format!("{}=***", key)
            }
            _ => token.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value.trim().parse::<u16>().map_err(|_| {
        Error::Configuration(format!("{} must be an integer port, got '{}'", key, value))
    })
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn decode_hex(key: &str, value: &str) -> Result<String> {
    let bytes = hex::decode(value)
        .map_err(|e| Error::Configuration(format!("{} is not valid hex: {}", key, e)))?;
    String::from_utf8(bytes)
        .map_err(|_| Error::Configuration(format!("{} does not decode to PEM text", key)))
}

fn decode_b64(key: &str, value: &str) -> Result<String> {
    let bytes = B64
        .decode(value)
        .map_err(|e| Error::Configuration(format!("{} is not valid base64: {}", key, e)))?;
    String::from_utf8(bytes)
        .map_err(|_| Error::Configuration(format!("{} does not decode to PEM text", key)))
}

fn unescape_pem(value: &str) -> String {
    value.replace("\\n", "\n")
}
