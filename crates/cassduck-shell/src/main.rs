//! cassduck: query Cassandra tables from DuckDB
//!
//! ```text
//! cassduck [--config config.yaml] "SELECT * FROM cassandra_scan('demo.events')"
//! cassduck [--config config.yaml] --catalog [keyspace]
//! ```
//!
//! With `cassandra.connection` configured the cluster is attached once as
//! the `cassandra` catalog, and SQL can scan through it with
//! `cassandra_scan('demo.events', catalog := 'cassandra')`.

use anyhow::{bail, Context};
use cassduck_client::redact_connection_string;
use cassduck_duck::{CassandraCatalog, DEFAULT_CATALOG};
use std::sync::Arc;
use tracing::info;

mod catalog;
mod config;
mod logging;
mod query;

use catalog::CatalogSummary;
use config::Config;

const USAGE: &str = "usage: cassduck [--config PATH] (--catalog [KEYSPACE] | SQL)";

#[derive(Debug, PartialEq)]
enum Command {
    Catalog(Option<String>),
    Sql(String),
}

#[derive(Debug, PartialEq)]
struct Args {
    config: String,
    command: Command,
}

fn parse_args<I>(args: I) -> anyhow::Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut config = "config.yaml".to_string();
    let mut catalog = false;
    let mut rest = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = args.next().context("--config needs a path")?;
            }
            "--catalog" => catalog = true,
            "-h" | "--help" => bail!(USAGE),
            _ => rest.push(arg),
        }
    }

    let command = if catalog {
        if rest.len() > 1 {
            bail!(USAGE);
        }
        Command::Catalog(rest.pop())
    } else if rest.is_empty() {
        bail!(USAGE);
    } else {
        Command::Sql(rest.join(" "))
    };
    Ok(Args { config, command })
}

/// Attach the configured cluster, if any, under the default catalog name
fn attach_configured(config: &Config) -> anyhow::Result<Option<Arc<CassandraCatalog>>> {
    let connection = &config.cassandra.connection;
    if connection.is_empty() {
        return Ok(None);
    }
    info!(
        catalog = DEFAULT_CATALOG,
        connection = %redact_connection_string(connection),
        "Attaching catalog"
    );
    let catalog = cassduck_duck::attach(DEFAULT_CATALOG, connection)
        .with_context(|| format!("attaching {}", redact_connection_string(connection)))?;
    Ok(Some(catalog))
}

fn main() -> anyhow::Result<()> {
    // Credentials may live in .env
    dotenvy::dotenv().ok();

    let args = parse_args(std::env::args().skip(1))?;
    let config = Config::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config))?;
    config.apply_logging_env();
    logging::init()?;

    match args.command {
        Command::Catalog(keyspace) => {
            let Some(catalog) = attach_configured(&config)? else {
                bail!("no Cassandra connection configured (cassandra.connection or CASSDUCK_CONNECTION)");
            };
            let summary = CatalogSummary::collect(&catalog, keyspace.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Sql(sql) => {
            attach_configured(&config)?;
            let conn = query::open(config.duckdb.path.as_deref())?;
            let rows = query::execute(&conn, &sql)?;
            for row in &rows {
                println!("{}", serde_json::Value::Object(row.clone()));
            }
            info!(rows = rows.len(), "Query complete");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> anyhow::Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_sql_command() {
        let parsed = args(&["SELECT", "42"]).unwrap();
        assert_eq!(parsed.config, "config.yaml");
        assert_eq!(parsed.command, Command::Sql("SELECT 42".to_string()));
    }

    #[test]
    fn test_catalog_command() {
        let parsed = args(&["--config", "/etc/cassduck.yaml", "--catalog", "demo"]).unwrap();
        assert_eq!(parsed.config, "/etc/cassduck.yaml");
        assert_eq!(parsed.command, Command::Catalog(Some("demo".to_string())));
        assert_eq!(args(&["--catalog"]).unwrap().command, Command::Catalog(None));
    }

    #[test]
    fn test_bad_arguments() {
        assert!(args(&[]).is_err());
        assert!(args(&["--config"]).is_err());
        assert!(args(&["--catalog", "a", "b"]).is_err());
    }
}
