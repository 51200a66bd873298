use cassduck_scan::ScanError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Client(#[from] cassduck_client::Error),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("DuckDB error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Schema mismatch: {0}")]
    Schema(String),

    #[error("Scan state lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, BridgeError>;
