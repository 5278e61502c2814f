use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashError {
    /// The backing store rejected or failed to run the query.
    #[error("Query execution error: {0}")]
    QueryExecution(String),

    /// No usable session to the backing store.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl DashError {
    pub fn is_connection(&self) -> bool {
        matches!(self, DashError::Connection(_))
    }

    pub fn is_query_execution(&self) -> bool {
        matches!(self, DashError::QueryExecution(_))
    }
}

pub type Result<T> = std::result::Result<T, DashError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = DashError::Connection("session closed".into());
        assert!(err.is_connection());
        assert!(!err.is_query_execution());
        assert_eq!(err.to_string(), "Connection error: session closed");

        let err = DashError::QueryExecution("SQL compilation error".into());
        assert!(err.is_query_execution());
    }
}
