use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Query execution failed: {message} (query: {query})")]
    QueryExecution { query: String, message: String },

    #[error("Operation not supported: {0}")]
    UnsupportedOperation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn query(query: impl Into<String>, message: impl ToString) -> Self {
        Error::QueryExecution {
            query: query.into(),
            message: message.to_string(),
        }
    }

    /// Failures raised while reading metadata; `NotFound` counts as one
    pub fn is_discovery(&self) -> bool {
        matches!(self, Error::Discovery(_) | Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
