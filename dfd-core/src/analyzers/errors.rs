//! Error types for column analysis.

use thiserror::Error;

/// Result type for analyzer operations.
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Errors that can occur while analysing a single column.
///
/// The tabular engine recovers from these per column; they only escape as
/// [`DatasheetError::Analysis`](crate::error::DatasheetError::Analysis) when
/// the dataset as a whole cannot be read.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// The requested column does not exist in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The column's storage type has no summary semantics.
    #[error("Unsupported storage type {data_type} for column '{column}'")]
    UnsupportedType { column: String, data_type: String },

    /// DataFusion query execution error.
    #[cfg(feature = "datafusion-backend")]
    #[error("Query execution failed: {0}")]
    QueryExecution(#[from] datafusion::error::DataFusionError),

    /// Arrow computation error.
    #[error("Arrow computation failed: {0}")]
    ArrowComputation(#[from] arrow::error::ArrowError),

    /// Invalid configuration or parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Data type mismatch or invalid data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Generic analyzer error with custom message.
    #[error("{0}")]
    Custom(String),
}

impl AnalyzerError {
    /// Creates an invalid configuration error with the given message.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates an invalid data error with the given message.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Creates a custom error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Custom(format!("Execution error: {}", msg.into()))
    }

    /// Creates an unsupported type error.
    pub fn unsupported_type(column: impl Into<String>, data_type: impl ToString) -> Self {
        Self::UnsupportedType {
            column: column.into(),
            data_type: data_type.to_string(),
        }
    }
}
