//! Error types for dfd-core.
//!
//! Fatal conditions surface as [`DatasheetError`]. Failures confined to a
//! single column use [`AnalyzerError`](crate::analyzers::AnalyzerError) and are
//! recovered by the analysis engine as warnings instead.

use thiserror::Error;

use crate::analyzers::AnalyzerError;
use crate::backends::EngineKind;

/// The main error type for dataset loading, analysis and datasheet compilation.
#[derive(Error, Debug)]
pub enum DatasheetError {
    /// An engine was requested explicitly but is not compiled into this build.
    #[error("Engine '{engine}' is not available in this build")]
    EngineUnavailable { engine: EngineKind },

    /// Automatic backend selection found no usable engine.
    #[error("No dataframe engine is available; enable the 'arrow-backend' or 'datafusion-backend' feature")]
    NoBackendAvailable,

    /// The data source cannot be handled by the selected engine.
    #[error("Unsupported data source '{location}': {reason}")]
    UnsupportedSourceKind {
        /// Path or description of the rejected source
        location: String,
        /// Why it was rejected
        reason: String,
    },

    /// The data source exists but could not be read or decoded.
    #[error("Failed to load '{location}': {message}")]
    DataSource {
        location: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The template could not be split into sections.
    #[error(
        "Template parse error at line {line} (section: {}): {reason}",
        .section.as_deref().unwrap_or("<none>")
    )]
    TemplateParse {
        /// 1-based line number of the offending line
        line: usize,
        /// Heading of the enclosing section, if any
        section: Option<String>,
        reason: String,
    },

    /// Analysis failed as a whole.
    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalyzerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[cfg(feature = "datafusion-backend")]
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Writing rendered markdown failed.
    #[error("Render error: {0}")]
    Render(#[from] std::fmt::Error),
}

/// A type alias for `Result<T, DatasheetError>`.
pub type Result<T> = std::result::Result<T, DatasheetError>;

impl DatasheetError {
    /// Creates an unsupported source error.
    pub fn unsupported_source(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedSourceKind {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Creates a data source error without an underlying cause.
    pub fn data_source(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            location: location.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a data source error wrapping the cause.
    pub fn data_source_with_source(
        location: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::DataSource {
            location: location.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a template parse error.
    pub fn template_parse(
        line: usize,
        section: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Self::TemplateParse {
            line,
            section: section.map(str::to_string),
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<serde_json::Error> for DatasheetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
