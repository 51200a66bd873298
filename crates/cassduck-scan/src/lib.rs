//! Streaming scans from Cassandra into arrow record batches

mod builder;
mod error;
mod executor;

pub use error::{Result, ScanError};
pub use executor::{ScanColumn, ScanExecutor, ScanPhase, ScanSource, VECTOR_SIZE};
